//! `projects` subcommand.

use super::parse_date_arg;
use crate::team::{TeamMember, serialize_team_members};
use crate::types::{NewProject, ProjectPatch};
use chrono::NaiveDate;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List projects with their task counts
    List,

    /// Show a project with its tasks, team and linked projects
    Show {
        /// Project id
        id: String,
    },

    /// Create a project
    Add(ProjectAddArgs),

    /// Change fields of a project. An empty value clears an optional field.
    Edit(ProjectEditArgs),

    /// Delete a project
    Delete {
        /// Project id
        id: String,
    },
}

/// Arguments for `projects add`
#[derive(Args, Debug)]
pub struct ProjectAddArgs {
    /// Project name
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Hex color (default: #6366f1)
    #[arg(long)]
    pub color: Option<String>,

    /// Icon tag (default: folder)
    #[arg(long)]
    pub icon: Option<String>,

    /// External link
    #[arg(long)]
    pub link: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long, value_parser = parse_date_arg)]
    pub due: Option<NaiveDate>,

    /// Team member as NAME or NAME:EMAIL (repeatable)
    #[arg(long = "member", value_name = "NAME[:EMAIL]")]
    pub members: Vec<String>,
}

impl ProjectAddArgs {
    pub fn to_new(&self) -> NewProject {
        let mut new = NewProject::new(self.name.clone());
        new.description = self.description.clone();
        if let Some(ref color) = self.color {
            new.color = color.clone();
        }
        if let Some(ref icon) = self.icon {
            new.icon = icon.clone();
        }
        new.project_link = self.link.clone();
        new.due_date = self.due;
        new.team_assigned = serialize_team_members(&parse_members(&self.members));
        new
    }
}

/// Arguments for `projects edit`
#[derive(Args, Debug)]
pub struct ProjectEditArgs {
    /// Project id
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    #[arg(long)]
    pub link: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long, value_parser = parse_date_arg)]
    pub due: Option<NaiveDate>,

    /// Remove the due date
    #[arg(long, conflicts_with = "due")]
    pub clear_due: bool,

    /// Replace the team (repeatable)
    #[arg(long = "member", value_name = "NAME[:EMAIL]")]
    pub members: Vec<String>,

    /// Remove every team member
    #[arg(long, conflicts_with = "members")]
    pub clear_team: bool,
}

impl ProjectEditArgs {
    pub fn to_patch(&self) -> ProjectPatch {
        ProjectPatch {
            name: self.name.clone(),
            description: self.description.clone().map(Some),
            color: self.color.clone(),
            icon: self.icon.clone(),
            project_link: self.link.clone().map(Some),
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
            team_assigned: if self.clear_team {
                Some(None)
            } else if self.members.is_empty() {
                None
            } else {
                Some(serialize_team_members(&parse_members(&self.members)))
            },
        }
    }
}

/// `NAME` or `NAME:EMAIL`. The email, when given, doubles as the member id.
pub fn parse_members(values: &[String]) -> Vec<TeamMember> {
    values
        .iter()
        .filter_map(|value| {
            let (name, email) = match value.split_once(':') {
                Some((name, email)) => (name.trim(), email.trim()),
                None => (value.trim(), ""),
            };
            if name.is_empty() {
                return None;
            }
            let id = if email.is_empty() { name } else { email };
            Some(TeamMember::new(id, name, email))
        })
        .collect()
}
