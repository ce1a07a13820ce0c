//! Filtering, sorting and pagination for task listings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::model::{Task, TaskPriority, TaskStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// AND-combined listing filters. `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<i64>,
    /// Case-insensitive substring of the title or the description.
    pub search: Option<String>,
}

impl TaskFilter {
    /// Whether an active task passes every supplied filter.
    pub fn matches(&self, task: &Task) -> bool {
        if !task.active {
            return false;
        }
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if self
            .assigned_to
            .is_some_and(|user_id| task.assigned_to != Some(user_id))
        {
            return false;
        }
        match self.search.as_deref() {
            Some(search) => {
                let needle = search.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|desc| desc.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// Columns a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Title,
    Priority,
    Status,
}

impl TaskSortField {
    pub const ALL: [TaskSortField; 6] = [
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::DueDate,
        Self::Title,
        Self::Priority,
        Self::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::DueDate => "due_date",
            Self::Title => "title",
            Self::Priority => "priority",
            Self::Status => "status",
        }
    }

    /// SQL expression for this key. Enum columns sort by rank, not alphabetically.
    pub fn sql_expr(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::DueDate => "due_date",
            Self::Title => "title",
            Self::Priority => {
                "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 WHEN 'high' THEN 2 ELSE 3 END"
            }
            Self::Status => {
                "CASE status WHEN 'pending' THEN 0 WHEN 'in_progress' THEN 1 WHEN 'completed' THEN 2 ELSE 3 END"
            }
        }
    }
}

impl FromStr for TaskSortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| {
                format!(
                    "Sort by must be one of: {}",
                    Self::ALL.map(TaskSortField::as_str).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err("Sort order must be either asc or desc".to_string()),
        }
    }
}

/// A single sort key plus direction. Ties are broken by id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub order: SortOrder,
}

impl TaskSort {
    pub fn new(field: TaskSortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// `ORDER BY` clause built only from enum-controlled fragments.
    pub fn order_clause(&self) -> String {
        let direction = self.order.as_sql();
        format!(
            "ORDER BY {} {}, id {}",
            self.field.sql_expr(),
            direction,
            direction
        )
    }

    /// In-memory equivalent of [`TaskSort::order_clause`]; NULL due dates sort first ascending.
    pub fn compare(&self, left: &Task, right: &Task) -> Ordering {
        let primary = match self.field {
            TaskSortField::CreatedAt => left.created_at.cmp(&right.created_at),
            TaskSortField::UpdatedAt => left.updated_at.cmp(&right.updated_at),
            TaskSortField::DueDate => left.due_date.cmp(&right.due_date),
            TaskSortField::Title => left.title.cmp(&right.title),
            TaskSortField::Priority => left.priority.rank().cmp(&right.priority.rank()),
            TaskSortField::Status => left.status.rank().cmp(&right.status.rank()),
        };
        self.order.apply(primary.then_with(|| left.id.cmp(&right.id)))
    }
}

impl fmt::Display for TaskSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.order.as_sql())
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamps into the accepted range (page >= 1, 1 <= limit <= 100).
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of a listing plus the number of rows matching before pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u64,
}

impl TaskPage {
    pub fn total_pages(&self, limit: u32) -> u64 {
        let limit = u64::from(limit.max(1));
        self.total.div_ceil(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use chrono::Duration;

    fn task(id: i64, title: &str) -> Task {
        let now = now_utc();
        Task {
            id,
            title: title.to_string(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            tags: None,
            assigned_to: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            active: true,
        }
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let mut with_desc = task(1, "Plain");
        with_desc.description = Some("Fix the LOGIN page".to_string());
        let filter = TaskFilter {
            search: Some("login".to_string()),
            ..Default::default()
        };

        assert!(filter.matches(&with_desc));
        assert!(filter.matches(&task(2, "Login flow")));
        assert!(!filter.matches(&task(3, "Unrelated")));
    }

    #[test]
    fn inactive_tasks_never_match() {
        let mut deleted = task(1, "Gone");
        deleted.active = false;
        assert!(!TaskFilter::default().matches(&deleted));
    }

    #[test]
    fn due_date_sort_puts_missing_dates_first_when_ascending() {
        let now = now_utc();
        let mut later = task(1, "later");
        later.due_date = Some(now + Duration::days(2));
        let mut sooner = task(2, "sooner");
        sooner.due_date = Some(now + Duration::days(1));
        let undated = task(3, "undated");

        let mut tasks = vec![later.clone(), sooner.clone(), undated.clone()];
        let sort = TaskSort::new(TaskSortField::DueDate, SortOrder::Asc);
        tasks.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let sort = TaskSort::new(TaskSortField::DueDate, SortOrder::Desc);
        tasks.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn priority_sorts_by_rank_with_id_tiebreak() {
        let mut urgent = task(1, "a");
        urgent.priority = TaskPriority::Urgent;
        let mut low = task(2, "b");
        low.priority = TaskPriority::Low;
        let medium_a = task(3, "c");
        let medium_b = task(4, "d");

        let mut tasks = vec![medium_b, urgent, medium_a, low];
        let sort = TaskSort::new(TaskSortField::Priority, SortOrder::Desc);
        tasks.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 4, 3, 2]);
    }

    #[test]
    fn order_clause_uses_rank_expression() {
        let clause = TaskSort::new(TaskSortField::Status, SortOrder::Asc).order_clause();
        assert!(clause.starts_with("ORDER BY CASE status"));
        assert!(clause.ends_with("ASC, id ASC"));
        assert_eq!(
            TaskSort::default().order_clause(),
            "ORDER BY created_at DESC, id DESC"
        );
    }

    #[test]
    fn pagination_offsets_and_total_pages() {
        assert_eq!(Pagination::new(3, 10).offset(), 20);
        assert_eq!(Pagination::new(0, 500), Pagination::new(1, 100));
        let page = TaskPage {
            tasks: Vec::new(),
            total: 21,
        };
        assert_eq!(page.total_pages(10), 3);
        assert_eq!(page.total_pages(21), 1);
        let empty = TaskPage {
            tasks: Vec::new(),
            total: 0,
        };
        assert_eq!(empty.total_pages(10), 0);
    }
}
