//! Output formatting for the command line: JSON or markdown-style text.

use crate::team::{TeamMember, initials};
use crate::types::{Project, Task, TaskStatus};
use crate::views::{DashboardSummary, ProfileStats};
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "text" | "markdown" | "md" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

/// Pretty JSON; serialization of the crate's own types does not fail.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Backlog => "[ ]",
        TaskStatus::Todo => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Done => "[x]",
        TaskStatus::Canceled => "[-]",
    }
}

/// One line per task.
pub fn format_task_short(task: &Task) -> String {
    let mut line = format!(
        "- {} {} ({}, {})",
        status_marker(task.status),
        task.title,
        task.status.label(),
        task.priority.as_str()
    );
    if let Some(due) = task.due_on() {
        line.push_str(&format!(" due {}", due));
    }
    line.push_str(&format!(" `{}`\n", task.id));
    line
}

pub fn format_tasks(heading: &str, tasks: &[Task]) -> String {
    let mut md = format!("# {} ({})\n\n", heading, tasks.len());
    if tasks.is_empty() {
        md.push_str("_No tasks._\n");
    }
    for task in tasks {
        md.push_str(&format_task_short(task));
    }
    md
}

/// Project list; `counts` gives the task count per project, in the same order.
pub fn format_projects(projects: &[Project], counts: &[usize]) -> String {
    let mut md = format!("# Projects ({})\n\n", projects.len());
    if projects.is_empty() {
        md.push_str("_No projects._\n");
    }
    for (project, count) in projects.iter().zip(counts.iter().copied()) {
        md.push_str(&format!(
            "- **{}** {} task{} `{}`",
            project.name,
            count,
            if count == 1 { "" } else { "s" },
            project.id
        ));
        if let Some(due) = project.due_date {
            md.push_str(&format!(" due {}", due));
        }
        md.push('\n');
    }
    md
}

/// Project detail page.
pub fn format_project(
    project: &Project,
    tasks: &[Task],
    team: &[TeamMember],
    linked: &[Project],
) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Project: {}\n", project.name));
    md.push_str(&format!("- **id**: `{}`\n", project.id));
    md.push_str(&format!("- **color**: {}\n", project.color));
    md.push_str(&format!("- **icon**: {}\n", project.icon));
    if let Some(due) = project.due_date {
        md.push_str(&format!("- **due**: {}\n", due));
    }
    if let Some(ref link) = project.project_link {
        md.push_str(&format!("- **link**: {}\n", link));
    }

    if let Some(ref desc) = project.description {
        md.push_str("\n### Description\n");
        md.push_str(desc);
        md.push('\n');
    }

    if !team.is_empty() {
        md.push_str("\n### Team\n");
        for member in team {
            md.push_str(&format!("- [{}] {}", initials(&member.name), member.name));
            if !member.email.is_empty() {
                md.push_str(&format!(" <{}>", member.email));
            }
            md.push('\n');
        }
    }

    md.push_str(&format!("\n### Tasks ({})\n", tasks.len()));
    for task in tasks {
        md.push_str(&format_task_short(task));
    }

    if !linked.is_empty() {
        md.push_str("\n### Linked projects\n");
        for other in linked {
            md.push_str(&format!("- {} `{}`\n", other.name, other.id));
        }
    }
    md
}

pub fn format_profile(stats: &ProfileStats) -> String {
    let mut md = String::from("# Profile\n\n");
    md.push_str(&format!("- **tasks**: {}\n", stats.total_tasks));
    md.push_str(&format!(
        "- **completed**: {} ({}%)\n",
        stats.completed_tasks, stats.completion_rate
    ));
    md.push_str(&format!("- **in progress**: {}\n", stats.in_progress_tasks));
    md.push_str(&format!(
        "- **projects**: {} ({} active)\n",
        stats.total_projects, stats.active_projects
    ));
    md
}

pub fn format_dashboard(summary: &DashboardSummary) -> String {
    let mut md = format!(
        "# Dashboard\n\n{} tasks across {} projects ({} unassigned)\n\n## By status\n",
        summary.total_tasks, summary.total_projects, summary.unassigned
    );
    for status in TaskStatus::ALL {
        let count = summary.by_status.get(status.as_str()).copied().unwrap_or(0);
        md.push_str(&format!("- {}: {}\n", status.label(), count));
    }
    md.push_str("\n## By priority\n");
    for (priority, count) in &summary.by_priority {
        md.push_str(&format!("- {}: {}\n", priority, count));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPriority;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("md"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_task_line() {
        let task = Task {
            id: "t1".into(),
            title: "Ship".into(),
            description: None,
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            project_id: None,
            date: None,
            deadline: NaiveDate::from_ymd_opt(2025, 3, 5),
            reminder: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(
            format_task_short(&task),
            "- [~] Ship (In Progress, high) due 2025-03-05 `t1`\n"
        );
    }
}
