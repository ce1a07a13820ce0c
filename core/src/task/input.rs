//! Request-side task inputs and their validation.
//!
//! The `*Input` / [`TaskListQuery`] types mirror what clients send (loosely typed,
//! every field optional). `validate` turns them into the typed [`NewTask`],
//! [`TaskPatch`] and [`TaskListParams`] the repositories accept, collecting every
//! rejected field into one [`Error::Validation`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};

use super::model::{TaskPriority, TaskStatus};
use super::query::{Pagination, SortOrder, TaskFilter, TaskSort, TaskSortField, MAX_PAGE_SIZE};
use crate::db::{from_millis, to_millis};
use crate::{Error, Result, ValidationErrors};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_SEARCH_LEN: usize = 255;
pub const MAX_BULK_TASKS: usize = 100;

/// Validated input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<i64>,
}

impl NewTask {
    /// Create a new task input with the given title and default status/priority
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            tags: None,
            assigned_to: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(from_millis(to_millis(due_date)));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = if tags.is_empty() { None } else { Some(tags) };
        self
    }

    pub fn with_assignee(mut self, user_id: i64) -> Self {
        self.assigned_to = Some(user_id);
        self
    }
}

/// Partial update. Outer `None` leaves the field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Option<Vec<String>>>,
    pub assigned_to: Option<Option<i64>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
            && self.assigned_to.is_none()
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
}

impl CreateTaskInput {
    pub fn validate(self) -> Result<NewTask> {
        self.check().map_err(Error::Validation)
    }

    fn check(self) -> std::result::Result<NewTask, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = check_title(self.title.as_deref().unwrap_or(""), &mut errors);
        let description = self
            .description
            .as_deref()
            .and_then(|raw| check_description(raw, &mut errors));
        let status = self
            .status
            .as_deref()
            .and_then(|raw| parse_choice::<TaskStatus>("status", raw, &mut errors))
            .unwrap_or_default();
        let priority = self
            .priority
            .as_deref()
            .and_then(|raw| parse_choice::<TaskPriority>("priority", raw, &mut errors))
            .unwrap_or_default();
        let due_date = self
            .due_date
            .as_deref()
            .and_then(|raw| check_due_date(raw, &mut errors));
        let tags = self.tags.and_then(|tags| check_tags(tags, &mut errors));
        let assigned_to = self.assigned_to.filter(|id| check_assignee(*id, &mut errors));

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewTask {
            title,
            description,
            status,
            priority,
            due_date,
            tags,
            assigned_to,
        })
    }
}

/// Body of an update request. Fields that may be cleared accept an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tags: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,
}

impl UpdateTaskInput {
    pub fn validate(self) -> Result<TaskPatch> {
        let mut errors = ValidationErrors::new();

        let title = self
            .title
            .as_deref()
            .map(|raw| check_title(raw, &mut errors));
        let description = self
            .description
            .map(|value| value.and_then(|raw| check_description(&raw, &mut errors)));
        let status = self
            .status
            .as_deref()
            .and_then(|raw| parse_choice::<TaskStatus>("status", raw, &mut errors));
        let priority = self
            .priority
            .as_deref()
            .and_then(|raw| parse_choice::<TaskPriority>("priority", raw, &mut errors));
        let due_date = self
            .due_date
            .map(|value| value.and_then(|raw| check_due_date(&raw, &mut errors)));
        let tags = self
            .tags
            .map(|value| value.and_then(|tags| check_tags(tags, &mut errors)));
        let assigned_to = self
            .assigned_to
            .map(|value| value.filter(|id| check_assignee(*id, &mut errors)));

        errors.into_result()?;

        Ok(TaskPatch {
            title,
            description,
            status,
            priority,
            due_date,
            tags,
            assigned_to,
        })
    }
}

/// Body of a bulk create request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkCreateTasksInput {
    #[serde(default)]
    pub tasks: Option<Vec<CreateTaskInput>>,
}

impl BulkCreateTasksInput {
    pub fn validate(self) -> Result<Vec<NewTask>> {
        let mut errors = ValidationErrors::new();
        let items = self.tasks.unwrap_or_default();
        if items.is_empty() || items.len() > MAX_BULK_TASKS {
            errors.push(
                "tasks",
                format!("Tasks must be an array with 1 to {} items", MAX_BULK_TASKS),
            );
            return Err(Error::Validation(errors));
        }

        let mut tasks = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match item.check() {
                Ok(task) => tasks.push(task),
                Err(item_errors) => errors.extend(item_errors.prefixed(&format!("tasks[{}]", index))),
            }
        }

        errors.into_result()?;
        Ok(tasks)
    }
}

/// Query string of a listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

/// Everything `find_all` needs, validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListParams {
    pub filter: TaskFilter,
    pub sort: TaskSort,
    pub pagination: Pagination,
}

impl TaskListQuery {
    pub fn validate(self) -> Result<TaskListParams> {
        let mut errors = ValidationErrors::new();

        let status = trim_to_none(self.status)
            .and_then(|raw| parse_choice::<TaskStatus>("status", &raw, &mut errors));
        let priority = trim_to_none(self.priority)
            .and_then(|raw| parse_choice::<TaskPriority>("priority", &raw, &mut errors));
        let assigned_to = trim_to_none(self.assigned_to).and_then(|raw| {
            parse_positive(&raw).or_else(|| {
                errors.push("assignedTo", "Assigned to must be a positive integer");
                None
            })
        });
        let search = trim_to_none(self.search);
        if search
            .as_ref()
            .is_some_and(|value| value.chars().count() > MAX_SEARCH_LEN)
        {
            errors.push(
                "search",
                format!("Search query must be less than {} characters", MAX_SEARCH_LEN),
            );
        }

        let field = trim_to_none(self.sort_by)
            .and_then(|raw| parse_choice::<TaskSortField>("sortBy", &raw, &mut errors))
            .unwrap_or_default();
        let order = trim_to_none(self.sort_order)
            .and_then(|raw| parse_choice::<SortOrder>("sortOrder", &raw.to_lowercase(), &mut errors))
            .unwrap_or_default();

        let page = trim_to_none(self.page)
            .and_then(|raw| {
                parse_positive(&raw).and_then(|v| u32::try_from(v).ok()).or_else(|| {
                    errors.push("page", "Page must be a positive integer");
                    None
                })
            })
            .unwrap_or(1);
        let limit = trim_to_none(self.limit)
            .and_then(|raw| {
                parse_positive(&raw)
                    .and_then(|v| u32::try_from(v).ok())
                    .filter(|v| *v <= MAX_PAGE_SIZE)
                    .or_else(|| {
                        errors.push(
                            "limit",
                            format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
                        );
                        None
                    })
            })
            .unwrap_or(Pagination::default().limit);

        errors.into_result()?;

        Ok(TaskListParams {
            filter: TaskFilter {
                status,
                priority,
                assigned_to,
                search,
            },
            sort: TaskSort::new(field, order),
            pagination: Pagination::new(page, limit),
        })
    }
}

/// Parse a due date: RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) or `YYYY-MM-DD` (midnight UTC).
/// An empty string means "no due date".
pub fn parse_due_date(raw: &str) -> std::result::Result<Option<DateTime<Utc>>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|value| value.and_utc())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_time(NaiveTime::default()).and_utc())
        })
        .map_err(|_| "Due date must be a valid date".to_string())?;
    Ok(Some(from_millis(to_millis(parsed))))
}

/// Accepts a positive integer id, e.g. from a path segment.
pub fn parse_positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|value| *value >= 1)
}

fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn trim_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn check_title(raw: &str, errors: &mut ValidationErrors) -> String {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_LEN {
        errors.push(
            "title",
            format!(
                "Title is required and must be less than {} characters",
                MAX_TITLE_LEN
            ),
        );
    }
    title.to_string()
}

fn check_description(raw: &str, errors: &mut ValidationErrors) -> Option<String> {
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(
            "description",
            format!(
                "Description must be less than {} characters",
                MAX_DESCRIPTION_LEN
            ),
        );
    }
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}

fn check_due_date(raw: &str, errors: &mut ValidationErrors) -> Option<DateTime<Utc>> {
    parse_due_date(raw).unwrap_or_else(|message| {
        errors.push("dueDate", message);
        None
    })
}

fn check_tags(tags: Vec<String>, errors: &mut ValidationErrors) -> Option<Vec<String>> {
    let mut cleaned = Vec::with_capacity(tags.len());
    for (index, tag) in tags.iter().enumerate() {
        let tag = tag.trim();
        let len = tag.chars().count();
        if len == 0 || len > MAX_TAG_LEN {
            errors.push(
                format!("tags[{}]", index),
                format!("Each tag must be between 1 and {} characters", MAX_TAG_LEN),
            );
        } else {
            cleaned.push(tag.to_string());
        }
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn check_assignee(id: i64, errors: &mut ValidationErrors) -> bool {
    if id < 1 {
        errors.push("assignedTo", "Assigned to must be a positive integer");
        return false;
    }
    true
}

fn parse_choice<T>(field: &str, raw: &str, errors: &mut ValidationErrors) -> Option<T>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            errors.push(field, message);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn create_applies_defaults_and_trims() {
        let input: CreateTaskInput = serde_json::from_value(json!({
            "title": "  Ship release  ",
            "priority": "high",
            "description": "   "
        }))
        .unwrap();
        let task = input.validate().unwrap();

        assert_eq!(task.title, "Ship release");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::High);
        assert!(task.description.is_none());
        assert!(task.tags.is_none());
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn create_reports_every_bad_field() {
        let input: CreateTaskInput = serde_json::from_value(json!({
            "title": "",
            "status": "done",
            "priority": "critical",
            "dueDate": "not-a-date",
            "tags": ["ok", ""],
            "assignedTo": 0
        }))
        .unwrap();

        let Err(Error::Validation(errors)) = input.validate() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.fields().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["title", "status", "priority", "dueDate", "tags[1]", "assignedTo"]
        );
    }

    #[test]
    fn overlong_title_is_rejected() {
        let input = CreateTaskInput {
            title: Some("x".repeat(MAX_TITLE_LEN + 1)),
            ..Default::default()
        };
        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn update_distinguishes_absent_from_null() {
        let input: UpdateTaskInput = serde_json::from_value(json!({
            "description": "",
            "dueDate": null,
            "assignedTo": null
        }))
        .unwrap();
        let patch = input.validate().unwrap();

        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.assigned_to, Some(None));
        assert_eq!(patch.tags, None);
        assert_eq!(patch.title, None);
    }

    #[test]
    fn empty_update_body_yields_empty_patch() {
        let input: UpdateTaskInput = serde_json::from_value(json!({ "unknown": 1 })).unwrap();
        assert!(input.validate().unwrap().is_empty());
    }

    #[test]
    fn due_date_formats() {
        let date_only = parse_due_date("2025-03-04").unwrap().unwrap();
        assert_eq!((date_only.year(), date_only.month(), date_only.day()), (2025, 3, 4));
        assert_eq!(date_only.hour(), 0);

        let rfc = parse_due_date("2025-03-04T10:30:00+02:00").unwrap().unwrap();
        assert_eq!(rfc.hour(), 8);

        assert_eq!(parse_due_date("").unwrap(), None);
        assert!(parse_due_date("31/12/2025").is_err());
    }

    #[test]
    fn list_query_defaults() {
        let params = TaskListQuery::default().validate().unwrap();
        assert_eq!(params.pagination, Pagination::new(1, 10));
        assert_eq!(params.sort.field, TaskSortField::CreatedAt);
        assert_eq!(params.sort.order, SortOrder::Desc);
        assert_eq!(params.filter, TaskFilter::default());
    }

    #[test]
    fn list_query_parses_everything() {
        let query = TaskListQuery {
            status: Some("completed".to_string()),
            priority: Some("urgent".to_string()),
            assigned_to: Some("7".to_string()),
            search: Some(" login ".to_string()),
            sort_by: Some("due_date".to_string()),
            sort_order: Some("ASC".to_string()),
            page: Some("2".to_string()),
            limit: Some("25".to_string()),
        };
        let params = query.validate().unwrap();

        assert_eq!(params.filter.status, Some(TaskStatus::Completed));
        assert_eq!(params.filter.priority, Some(TaskPriority::Urgent));
        assert_eq!(params.filter.assigned_to, Some(7));
        assert_eq!(params.filter.search.as_deref(), Some("login"));
        assert_eq!(
            params.sort,
            TaskSort::new(TaskSortField::DueDate, SortOrder::Asc)
        );
        assert_eq!(params.pagination, Pagination::new(2, 25));
    }

    #[test]
    fn list_query_rejects_out_of_range_values() {
        let query = TaskListQuery {
            sort_by: Some("owner".to_string()),
            page: Some("0".to_string()),
            limit: Some("101".to_string()),
            assigned_to: Some("abc".to_string()),
            ..Default::default()
        };
        let Err(Error::Validation(errors)) = query.validate() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.fields().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["assignedTo", "sortBy", "page", "limit"]);
    }

    #[test]
    fn bulk_limits_and_prefixes() {
        let empty = BulkCreateTasksInput { tasks: Some(Vec::new()) };
        assert!(matches!(empty.validate(), Err(Error::Validation(_))));

        let too_many = BulkCreateTasksInput {
            tasks: Some(vec![
                CreateTaskInput {
                    title: Some("t".to_string()),
                    ..Default::default()
                };
                MAX_BULK_TASKS + 1
            ]),
        };
        assert!(matches!(too_many.validate(), Err(Error::Validation(_))));

        let input: BulkCreateTasksInput = serde_json::from_value(json!({
            "tasks": [{ "title": "A" }, { "title": "" }]
        }))
        .unwrap();
        let Err(Error::Validation(errors)) = input.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields()[0].field, "tasks[1].title");
    }
}
