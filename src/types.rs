//! Core types for taskboard records.
//!
//! Records are the normalized, typed form of remote rows. The mapping from
//! rows lives in [`crate::sync::projects`] and [`crate::sync::tasks`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Color assigned to projects that do not carry one.
pub const DEFAULT_PROJECT_COLOR: &str = "#6366f1";

/// Icon tag assigned to projects that do not carry one.
pub const DEFAULT_PROJECT_ICON: &str = "folder";

/// Task workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Backlog,
    #[default]
    Todo,
    #[serde(rename = "in progress", alias = "in-progress", alias = "in_progress")]
    InProgress,
    Done,
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Canceled,
    ];

    /// Wire representation stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
            TaskStatus::Canceled => "canceled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "Backlog",
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Canceled => "Canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "backlog" => Some(TaskStatus::Backlog),
            "todo" => Some(TaskStatus::Todo),
            "in progress" | "in-progress" | "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "canceled" | "cancelled" => Some(TaskStatus::Canceled),
            _ => None,
        }
    }

    /// Done and canceled tasks need no further attention.
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Canceled)
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// A project as mirrored from the `projects` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub project_link: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Serialized team-member list. Opaque to the sync layer; see [`crate::team`].
    pub team_assigned: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for creating a project. Server assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub project_link: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub team_assigned: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: default_color(),
            icon: default_icon(),
            project_link: None,
            due_date: None,
            team_assigned: None,
        }
    }
}

fn default_color() -> String {
    DEFAULT_PROJECT_COLOR.to_string()
}

fn default_icon() -> String {
    DEFAULT_PROJECT_ICON.to_string()
}

/// Partial project update.
///
/// For clearable columns the outer `Option` says whether the field is part of
/// the patch; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub team_assigned: Option<Option<String>>,
}

/// A task as mirrored from the `tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub project_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub reminder: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// The date a task is due: its deadline, or its scheduled date.
    pub fn due_on(&self) -> Option<NaiveDate> {
        self.deadline.or(self.date)
    }
}

/// Fields for creating a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            project_id: None,
            date: None,
            deadline: None,
            reminder: None,
        }
    }
}

/// Partial task update. Same clearing convention as [`ProjectPatch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reminder: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in progress"
        );
        for alias in ["\"in progress\"", "\"in-progress\"", "\"in_progress\""] {
            let status: TaskStatus = serde_json::from_str(alias).unwrap();
            assert_eq!(status, TaskStatus::InProgress);
        }
        assert_eq!(TaskStatus::parse("Cancelled"), Some(TaskStatus::Canceled));
        assert_eq!(TaskStatus::parse("blocked"), None);
    }

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: ProjectPatch =
            serde_json::from_str(r#"{"name": "Renamed", "description": null}"#).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Renamed"));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.project_link, None);
    }

    #[test]
    fn test_new_project_defaults() {
        let project: NewProject = serde_json::from_str(r#"{"name": "Launch"}"#).unwrap();
        assert_eq!(project, NewProject::new("Launch"));
        assert_eq!(project.color, DEFAULT_PROJECT_COLOR);
        assert_eq!(project.icon, DEFAULT_PROJECT_ICON);
    }

    #[test]
    fn test_due_on_prefers_deadline() {
        let mut task = Task {
            id: "t1".into(),
            title: "Ship".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::High,
            project_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 1),
            deadline: None,
            reminder: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(task.due_on(), NaiveDate::from_ymd_opt(2025, 3, 1));
        task.deadline = NaiveDate::from_ymd_opt(2025, 3, 5);
        assert_eq!(task.due_on(), NaiveDate::from_ymd_opt(2025, 3, 5));
    }
}
