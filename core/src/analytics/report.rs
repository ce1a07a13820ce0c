//! Pure aggregation and CSV rendering.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};

use super::model::{ExportRow, TaskFacts, TaskStatistics, UserPerformance};
use crate::task::{TaskPriority, TaskStatus};

pub const CSV_HEADERS: [&str; 13] = [
    "ID",
    "Title",
    "Description",
    "Status",
    "Priority",
    "Due Date",
    "Tags",
    "Created At",
    "Updated At",
    "Created By Email",
    "Created By Name",
    "Assigned To Email",
    "Assigned To Name",
];

fn count_by<'a>(
    rows: impl Iterator<Item = &'a TaskFacts>,
) -> (BTreeMap<TaskStatus, u64>, BTreeMap<TaskPriority, u64>) {
    let mut by_status = BTreeMap::new();
    let mut by_priority = BTreeMap::new();
    for row in rows {
        *by_status.entry(row.status).or_insert(0) += 1;
        *by_priority.entry(row.priority).or_insert(0) += 1;
    }
    (by_status, by_priority)
}

pub fn overview(rows: &[TaskFacts]) -> TaskStatistics {
    let (by_status, by_priority) = count_by(rows.iter());
    TaskStatistics {
        total: rows.len() as u64,
        by_status,
        by_priority,
    }
}

/// Metrics for `user_id`. Each task is counted once even if the user both created
/// and is assigned to it.
pub fn performance(user_id: i64, rows: &[TaskFacts]) -> UserPerformance {
    let mut seen = BTreeSet::new();
    let unique: Vec<&TaskFacts> = rows.iter().filter(|row| seen.insert(row.id)).collect();

    let total_tasks = unique.len() as u64;
    let tasks_created = unique.iter().filter(|row| row.created_by == user_id).count() as u64;
    let tasks_assigned = unique
        .iter()
        .filter(|row| row.assigned_to == Some(user_id))
        .count() as u64;
    let tasks_completed = unique
        .iter()
        .filter(|row| row.status == TaskStatus::Completed)
        .count() as u64;
    let completion_rate = if total_tasks == 0 {
        0.0
    } else {
        round2(tasks_completed as f64 / total_tasks as f64 * 100.0)
    };
    let (tasks_by_status, tasks_by_priority) = count_by(unique.iter().copied());

    UserPerformance {
        user_id,
        total_tasks,
        tasks_created,
        tasks_assigned,
        tasks_completed,
        completion_rate,
        tasks_by_status,
        tasks_by_priority,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Quote a cell containing a comma, a double quote or a newline, doubling inner quotes.
pub fn escape_csv(cell: &str) -> String {
    if cell.contains([',', '"', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ExportRow {
    pub fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.description.clone().unwrap_or_default(),
            self.status.to_string(),
            self.priority.to_string(),
            self.due_date.map(timestamp).unwrap_or_default(),
            self.tags
                .as_ref()
                .map(|tags| tags.join("; "))
                .unwrap_or_default(),
            timestamp(self.created_at),
            timestamp(self.updated_at),
            self.created_by_email.clone().unwrap_or_default(),
            self.created_by_name.clone().unwrap_or_default(),
            self.assigned_to_email.clone().unwrap_or_default(),
            self.assigned_to_name.clone().unwrap_or_default(),
        ]
    }
}

/// Header line plus one line per row, joined with `\n`.
pub fn render_csv(rows: &[ExportRow]) -> String {
    let header = CSV_HEADERS
        .iter()
        .map(|cell| escape_csv(cell))
        .collect::<Vec<_>>()
        .join(",");
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header);
    for row in rows {
        lines.push(
            row.to_csv_row()
                .iter()
                .map(|cell| escape_csv(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn facts(id: i64, created_by: i64, assigned_to: Option<i64>, status: TaskStatus) -> TaskFacts {
        TaskFacts {
            id,
            created_by,
            assigned_to,
            status,
            priority: TaskPriority::Medium,
        }
    }

    #[test]
    fn overview_counts_present_values_only() {
        let stats = overview(&[
            facts(1, 1, None, TaskStatus::Pending),
            facts(2, 1, None, TaskStatus::Pending),
            facts(3, 1, None, TaskStatus::Completed),
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.get(&TaskStatus::Pending), Some(&2));
        assert_eq!(stats.by_status.get(&TaskStatus::Cancelled), None);
        assert_eq!(stats.by_priority.get(&TaskPriority::Medium), Some(&3));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["byStatus"]["pending"], 2);
        assert_eq!(json["byPriority"]["medium"], 3);
    }

    #[test]
    fn performance_counts_distinct_tasks_and_rounds() {
        let rows = [
            facts(1, 7, Some(7), TaskStatus::Completed),
            facts(1, 7, Some(7), TaskStatus::Completed),
            facts(2, 7, None, TaskStatus::Pending),
            facts(3, 9, Some(7), TaskStatus::InProgress),
        ];
        let metrics = performance(7, &rows);

        assert_eq!(metrics.total_tasks, 3);
        assert_eq!(metrics.tasks_created, 2);
        assert_eq!(metrics.tasks_assigned, 2);
        assert_eq!(metrics.tasks_completed, 1);
        assert_eq!(metrics.completion_rate, 33.33);
        assert_eq!(metrics.tasks_by_status.values().sum::<u64>(), 3);
    }

    #[test]
    fn performance_without_tasks_is_zero() {
        let metrics = performance(1, &[]);
        assert_eq!(metrics.total_tasks, 0);
        assert_eq!(metrics.completion_rate, 0.0);
    }

    #[test]
    fn two_of_three_rounds_up() {
        let rows = [
            facts(1, 1, None, TaskStatus::Completed),
            facts(2, 1, None, TaskStatus::Completed),
            facts(3, 1, None, TaskStatus::Pending),
        ];
        assert_eq!(performance(1, &rows).completion_rate, 66.67);
    }

    #[test]
    fn escapes_special_cells() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv(""), "");
    }

    #[test]
    fn renders_header_and_rows() {
        let created = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let row = ExportRow {
            id: 4,
            title: "Plan, then ship".to_string(),
            description: None,
            status: TaskStatus::InProgress,
            priority: TaskPriority::Urgent,
            due_date: None,
            tags: Some(vec!["infra".to_string(), "q1".to_string()]),
            created_at: created,
            updated_at: created,
            created_by_email: Some("owner@example.com".to_string()),
            created_by_name: Some("Owner".to_string()),
            assigned_to_email: None,
            assigned_to_name: None,
        };
        let csv = render_csv(&[row]);
        let lines: Vec<&str> = csv.split('\n').collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert_eq!(
            lines[1],
            "4,\"Plan, then ship\",,in_progress,urgent,,infra; q1,\
             2025-01-02T03:04:05.000Z,2025-01-02T03:04:05.000Z,owner@example.com,Owner,,"
        );
    }
}
