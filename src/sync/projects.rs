//! Row mapping for the `projects` table.

use super::Entity;
use super::row::{RowBuilder, opt_date, opt_text, opt_timestamp, text_or};
use crate::error::{SyncError, SyncResult};
use crate::store::Row;
use crate::types::{DEFAULT_PROJECT_COLOR, DEFAULT_PROJECT_ICON, NewProject, Project, ProjectPatch};

/// Synchronized projects table.
pub type ProjectCollection = super::Collection<Project>;

impl Entity for Project {
    type New = NewProject;
    type Patch = ProjectPatch;

    const TABLE: &'static str = "projects";
    const NOUN: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> SyncResult<Self> {
        let id = opt_text(row, "id").ok_or_else(|| SyncError::invalid_row(Self::TABLE, "missing id"))?;
        let name = opt_text(row, "name")
            .ok_or_else(|| SyncError::invalid_row(Self::TABLE, format!("project {} has no name", id)))?;

        Ok(Project {
            id,
            name,
            description: opt_text(row, "description"),
            color: text_or(row, "color", DEFAULT_PROJECT_COLOR),
            icon: text_or(row, "icon", DEFAULT_PROJECT_ICON),
            project_link: opt_text(row, "project_link"),
            due_date: opt_date(row, "due_date"),
            team_assigned: opt_text(row, "team_assigned"),
            created_at: opt_timestamp(row, "created_at"),
            updated_at: opt_timestamp(row, "updated_at"),
        })
    }

    fn validate_new(new: &NewProject) -> SyncResult<()> {
        if new.name.trim().is_empty() {
            return Err(SyncError::missing_field("name"));
        }
        Ok(())
    }

    fn insert_row(new: &NewProject) -> Row {
        // Optional columns are left out entirely when unset: older schemas
        // may not have them.
        RowBuilder::new()
            .set("name", new.name.trim())
            .set_opt("description", new.description.as_deref().map(str::trim))
            .set("color", &new.color)
            .set("icon", &new.icon)
            .set_opt("project_link", new.project_link.as_deref().map(str::trim))
            .set_opt("due_date", new.due_date)
            .set_opt("team_assigned", new.team_assigned.as_deref())
            .build()
    }

    fn validate_patch(patch: &ProjectPatch) -> SyncResult<()> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(SyncError::invalid_value("name", "name cannot be empty"));
        }
        if patch.color.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(SyncError::invalid_value("color", "color cannot be empty"));
        }
        if patch.icon.as_deref().is_some_and(|i| i.trim().is_empty()) {
            return Err(SyncError::invalid_value("icon", "icon cannot be empty"));
        }
        Ok(())
    }

    fn patch_row(patch: &ProjectPatch) -> Row {
        RowBuilder::new()
            .set_opt("name", patch.name.as_deref().map(str::trim))
            .patch("description", patch.description.clone())
            .set_opt("color", patch.color.as_deref())
            .set_opt("icon", patch.icon.as_deref())
            .patch("project_link", patch.project_link.clone())
            .patch("due_date", patch.due_date)
            .patch("team_assigned", patch.team_assigned.clone())
            .build()
    }

    fn apply_patch(&mut self, patch: &ProjectPatch) {
        if let Some(ref name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(ref description) = patch.description {
            self.description = non_blank(description);
        }
        if let Some(ref color) = patch.color {
            self.color = color.clone();
        }
        if let Some(ref icon) = patch.icon {
            self.icon = icon.clone();
        }
        if let Some(ref link) = patch.project_link {
            self.project_link = non_blank(link);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(ref team) = patch.team_assigned {
            self.team_assigned = non_blank(team);
        }
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_row_omits_unset_optionals() {
        let payload = Project::insert_row(&NewProject::new("Launch"));
        assert_eq!(
            Value::Object(payload),
            json!({"name": "Launch", "color": "#6366f1", "icon": "folder"})
        );
    }

    #[test]
    fn test_insert_row_includes_set_optionals() {
        let mut new = NewProject::new("Launch");
        new.description = Some("Q3 release".into());
        new.due_date = NaiveDate::from_ymd_opt(2025, 9, 1);
        new.project_link = Some("https://example.com/launch".into());
        let payload = Project::insert_row(&new);
        assert_eq!(payload["due_date"], "2025-09-01");
        assert_eq!(payload["description"], "Q3 release");
        assert_eq!(payload["project_link"], "https://example.com/launch");
        assert!(!payload.contains_key("team_assigned"));
    }

    #[test]
    fn test_from_row_applies_defaults() {
        let project = Project::from_row(&row(json!({
            "id": "p1",
            "name": "Launch",
            "description": "",
            "color": null,
            "icon": "",
            "due_date": "2025-09-01",
            "team_assigned": "not json",
            "created_at": "2025-01-01T00:00:00+00:00"
        })))
        .unwrap();

        assert_eq!(project.description, None);
        assert_eq!(project.color, DEFAULT_PROJECT_COLOR);
        assert_eq!(project.icon, DEFAULT_PROJECT_ICON);
        assert_eq!(project.due_date, NaiveDate::from_ymd_opt(2025, 9, 1));
        // Opaque to the sync layer, even when malformed.
        assert_eq!(project.team_assigned.as_deref(), Some("not json"));
        assert!(project.created_at.is_some());
        assert!(project.updated_at.is_none());
    }

    #[test]
    fn test_from_row_requires_id_and_name() {
        assert!(Project::from_row(&row(json!({"name": "x"}))).is_err());
        assert!(Project::from_row(&row(json!({"id": "p1", "name": " "}))).is_err());
    }

    #[test]
    fn test_patch_row_and_apply() {
        let mut project = Project::from_row(&row(json!({
            "id": "p1", "name": "Launch", "project_link": "https://old"
        })))
        .unwrap();
        let patch = ProjectPatch {
            name: Some("Relaunch".into()),
            project_link: Some(None),
            ..ProjectPatch::default()
        };

        let payload = Project::patch_row(&patch);
        assert_eq!(
            Value::Object(payload),
            json!({"name": "Relaunch", "project_link": null})
        );

        project.apply_patch(&patch);
        assert_eq!(project.name, "Relaunch");
        assert_eq!(project.project_link, None);
    }

    #[test]
    fn test_validation() {
        assert!(Project::validate_new(&NewProject::new("  ")).is_err());
        let patch = ProjectPatch {
            name: Some(String::new()),
            ..ProjectPatch::default()
        };
        assert!(Project::validate_patch(&patch).is_err());
    }
}
