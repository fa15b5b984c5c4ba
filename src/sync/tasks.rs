//! Row mapping for the `tasks` table.

use super::Entity;
use super::projects::non_blank;
use super::row::{RowBuilder, opt_date, opt_text, opt_timestamp};
use crate::error::{SyncError, SyncResult};
use crate::store::Row;
use crate::types::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use tracing::warn;

/// Synchronized tasks table.
pub type TaskCollection = super::Collection<Task>;

fn status_of(row: &Row) -> TaskStatus {
    match opt_text(row, "status") {
        None => TaskStatus::default(),
        Some(raw) => TaskStatus::parse(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "Unknown task status; using todo");
            TaskStatus::default()
        }),
    }
}

fn priority_of(row: &Row) -> TaskPriority {
    match opt_text(row, "priority") {
        None => TaskPriority::default(),
        Some(raw) => TaskPriority::parse(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "Unknown task priority; using medium");
            TaskPriority::default()
        }),
    }
}

impl Entity for Task {
    type New = NewTask;
    type Patch = TaskPatch;

    const TABLE: &'static str = "tasks";
    const NOUN: &'static str = "task";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> SyncResult<Self> {
        let id = opt_text(row, "id").ok_or_else(|| SyncError::invalid_row(Self::TABLE, "missing id"))?;
        let title = opt_text(row, "title")
            .ok_or_else(|| SyncError::invalid_row(Self::TABLE, format!("task {} has no title", id)))?;

        Ok(Task {
            id,
            title,
            description: opt_text(row, "description"),
            status: status_of(row),
            priority: priority_of(row),
            project_id: opt_text(row, "project_id"),
            date: opt_date(row, "date"),
            deadline: opt_date(row, "deadline"),
            reminder: opt_timestamp(row, "reminder"),
            created_at: opt_timestamp(row, "created_at"),
            updated_at: opt_timestamp(row, "updated_at"),
        })
    }

    fn validate_new(new: &NewTask) -> SyncResult<()> {
        if new.title.trim().is_empty() {
            return Err(SyncError::missing_field("title"));
        }
        Ok(())
    }

    fn insert_row(new: &NewTask) -> Row {
        RowBuilder::new()
            .set("title", new.title.trim())
            .set_opt("description", new.description.as_deref().map(str::trim))
            .set("status", new.status)
            .set("priority", new.priority)
            .set_opt("project_id", new.project_id.as_deref())
            .set_opt("date", new.date)
            .set_opt("deadline", new.deadline)
            .set_opt("reminder", new.reminder)
            .build()
    }

    fn validate_patch(patch: &TaskPatch) -> SyncResult<()> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(SyncError::invalid_value("title", "title cannot be empty"));
        }
        Ok(())
    }

    fn patch_row(patch: &TaskPatch) -> Row {
        RowBuilder::new()
            .set_opt("title", patch.title.as_deref().map(str::trim))
            .patch("description", patch.description.clone())
            .set_opt("status", patch.status)
            .set_opt("priority", patch.priority)
            .patch("project_id", patch.project_id.clone())
            .patch("date", patch.date)
            .patch("deadline", patch.deadline)
            .patch("reminder", patch.reminder)
            .build()
    }

    fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(ref description) = patch.description {
            self.description = non_blank(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(ref project_id) = patch.project_id {
            self.project_id = non_blank(project_id);
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(reminder) = patch.reminder {
            self.reminder = reminder;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::{Value, json};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_row_defaults() {
        let payload = Task::insert_row(&NewTask::new("Write brief"));
        assert_eq!(
            Value::Object(payload),
            json!({"title": "Write brief", "status": "todo", "priority": "medium"})
        );
    }

    #[test]
    fn test_insert_row_formats_dates() {
        let mut new = NewTask::new("Write brief");
        new.status = TaskStatus::InProgress;
        new.deadline = NaiveDate::from_ymd_opt(2025, 2, 14);
        new.reminder = Some(Utc.with_ymd_and_hms(2025, 2, 13, 9, 0, 0).unwrap());
        let payload = Task::insert_row(&new);
        assert_eq!(payload["status"], "in progress");
        assert_eq!(payload["deadline"], "2025-02-14");
        assert_eq!(payload["reminder"], "2025-02-13T09:00:00Z");
        assert!(!payload.contains_key("date"));
    }

    #[test]
    fn test_from_row_tolerates_unknown_enums() {
        let task = Task::from_row(&row(json!({
            "id": "t1",
            "title": "Review",
            "status": "blocked",
            "priority": "urgent",
            "project_id": "",
            "deadline": "2025-02-14T00:00:00+00:00",
            "reminder": "garbage"
        })))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.project_id, None);
        assert_eq!(task.deadline, NaiveDate::from_ymd_opt(2025, 2, 14));
        assert_eq!(task.reminder, None);
    }

    #[test]
    fn test_from_row_reads_in_progress_variants() {
        for raw in ["in progress", "in-progress", "in_progress"] {
            let task =
                Task::from_row(&row(json!({"id": "t1", "title": "x", "status": raw}))).unwrap();
            assert_eq!(task.status, TaskStatus::InProgress);
        }
    }

    #[test]
    fn test_patch_clears_and_sets() {
        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            project_id: Some(None),
            deadline: Some(NaiveDate::from_ymd_opt(2025, 3, 1)),
            ..TaskPatch::default()
        };
        let payload = Task::patch_row(&patch);
        assert_eq!(
            Value::Object(payload),
            json!({"status": "done", "project_id": null, "deadline": "2025-03-01"})
        );

        let mut task = Task::from_row(&row(json!({
            "id": "t1", "title": "x", "project_id": "p1"
        })))
        .unwrap();
        task.apply_patch(&patch);
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.project_id, None);
        assert_eq!(task.deadline, NaiveDate::from_ymd_opt(2025, 3, 1));
    }
}
