//! Derived views over collection snapshots.
//!
//! Everything here is a pure function of the records passed in.

use crate::team::{TeamMember, parse_team_members};
use crate::types::{Project, Task, TaskPriority, TaskStatus};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// High and medium priority tasks, high first. Order is otherwise preserved.
pub fn important_tasks(tasks: &[Task]) -> Vec<Task> {
    let mut important: Vec<Task> = tasks
        .iter()
        .filter(|t| matches!(t.priority, TaskPriority::High | TaskPriority::Medium))
        .cloned()
        .collect();
    // sort_by_key is stable
    important.sort_by_key(|t| t.priority != TaskPriority::High);
    important
}

/// Open tasks due today or later, soonest first.
///
/// With a window, only tasks due within `window_days` of `today` are kept.
pub fn upcoming_tasks(tasks: &[Task], today: NaiveDate, window_days: Option<u32>) -> Vec<Task> {
    let horizon = window_days.and_then(|days| today.checked_add_days(Days::new(days.into())));
    let mut upcoming: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.status.is_closed())
        .filter(|t| match t.due_on() {
            Some(due) => due >= today && horizon.is_none_or(|h| due <= h),
            None => false,
        })
        .cloned()
        .collect();
    upcoming.sort_by_key(|t| t.due_on());
    upcoming
}

pub fn tasks_for_project(tasks: &[Task], project_id: &str) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.project_id.as_deref() == Some(project_id))
        .cloned()
        .collect()
}

pub fn project_task_count(tasks: &[Task], project_id: &str) -> usize {
    tasks
        .iter()
        .filter(|t| t.project_id.as_deref() == Some(project_id))
        .count()
}

/// Team members assigned to a project. Malformed payloads yield an empty team.
pub fn project_team(project: &Project) -> Vec<TeamMember> {
    parse_team_members(project.team_assigned.as_deref())
}

/// Other projects sharing at least one team member with `project`.
pub fn linked_projects(project: &Project, projects: &[Project]) -> Vec<Project> {
    let team = project_team(project);
    if team.is_empty() {
        return Vec::new();
    }
    projects
        .iter()
        .filter(|other| other.id != project.id)
        .filter(|other| {
            project_team(other)
                .iter()
                .any(|member| team.iter().any(|m| m.same_as(member)))
        })
        .cloned()
        .collect()
}

/// Totals shown on the profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub total_projects: usize,
    /// Projects with at least one task not done.
    pub active_projects: usize,
    /// Whole percent of tasks done, 0 when there are no tasks.
    pub completion_rate: u32,
}

pub fn profile_stats(projects: &[Project], tasks: &[Task]) -> ProfileStats {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    let active_projects = projects
        .iter()
        .filter(|p| {
            tasks
                .iter()
                .any(|t| t.project_id.as_deref() == Some(p.id.as_str()) && t.status != TaskStatus::Done)
        })
        .count();

    ProfileStats {
        total_tasks,
        completed_tasks,
        in_progress_tasks: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
        total_projects: projects.len(),
        active_projects,
        completion_rate: if total_tasks == 0 {
            0
        } else {
            (completed_tasks * 100 / total_tasks) as u32
        },
    }
}

/// Task counts for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_tasks: usize,
    pub total_projects: usize,
    /// Every status is present, zero counts included.
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    /// Tasks with no project.
    pub unassigned: usize,
}

pub fn dashboard_summary(projects: &[Project], tasks: &[Task]) -> DashboardSummary {
    let mut by_status: BTreeMap<String, usize> = TaskStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_priority: BTreeMap<String, usize> = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High]
        .iter()
        .map(|p| (p.as_str().to_string(), 0))
        .collect();

    for task in tasks {
        *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        *by_priority.entry(task.priority.as_str().to_string()).or_default() += 1;
    }

    DashboardSummary {
        total_tasks: tasks.len(),
        total_projects: projects.len(),
        by_status,
        by_priority,
        unassigned: tasks.iter().filter(|t| t.project_id.is_none()).count(),
    }
}

/// Open tasks whose reminder falls in `(since, now]`.
pub fn due_reminders(tasks: &[Task], since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<Task> {
    let mut due: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.status.is_closed())
        .filter(|t| t.reminder.is_some_and(|r| r > since && r <= now))
        .cloned()
        .collect();
    due.sort_by_key(|t| t.reminder);
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: &str, priority: TaskPriority, status: TaskStatus) -> Task {
        Task {
            id: id.into(),
            title: id.into(),
            description: None,
            status,
            priority,
            project_id: None,
            date: None,
            deadline: None,
            reminder: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_important_orders_high_first_and_is_stable() {
        let tasks = vec![
            task("m1", TaskPriority::Medium, TaskStatus::Todo),
            task("l1", TaskPriority::Low, TaskStatus::Todo),
            task("h1", TaskPriority::High, TaskStatus::Done),
            task("m2", TaskPriority::Medium, TaskStatus::Todo),
            task("h2", TaskPriority::High, TaskStatus::Todo),
        ];
        let ids: Vec<_> = important_tasks(&tasks).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["h1", "h2", "m1", "m2"]);
    }

    #[test]
    fn test_upcoming_window() {
        let mut a = task("a", TaskPriority::Low, TaskStatus::Todo);
        a.deadline = Some(day(20));
        let mut b = task("b", TaskPriority::Low, TaskStatus::Todo);
        b.date = Some(day(11));
        let mut past = task("past", TaskPriority::Low, TaskStatus::Todo);
        past.deadline = Some(day(1));
        let mut done = task("done", TaskPriority::Low, TaskStatus::Done);
        done.deadline = Some(day(12));
        let tasks = vec![a, b, past, done, task("none", TaskPriority::Low, TaskStatus::Todo)];

        let ids: Vec<_> = upcoming_tasks(&tasks, day(10), None)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["b", "a"]);

        let ids: Vec<_> = upcoming_tasks(&tasks, day(10), Some(7))
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["b"]);
    }

    #[test]
    fn test_due_reminders_half_open_window() {
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 10, h, 0, 0).unwrap();
        let mut early = task("early", TaskPriority::Low, TaskStatus::Todo);
        early.reminder = Some(at(8));
        let mut edge = task("edge", TaskPriority::Low, TaskStatus::Todo);
        edge.reminder = Some(at(10));
        let mut closed = task("closed", TaskPriority::Low, TaskStatus::Canceled);
        closed.reminder = Some(at(9));

        let ids: Vec<_> = due_reminders(&[early, edge, closed], at(8), at(10))
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["edge"]);
    }

    #[test]
    fn test_dashboard_counts_every_status() {
        let summary = dashboard_summary(&[], &[task("a", TaskPriority::High, TaskStatus::InProgress)]);
        assert_eq!(summary.by_status.len(), TaskStatus::ALL.len());
        assert_eq!(summary.by_status["in progress"], 1);
        assert_eq!(summary.by_status["backlog"], 0);
        assert_eq!(summary.by_priority["high"], 1);
        assert_eq!(summary.unassigned, 1);
    }
}
