//! `tasks` subcommand.

use super::parse_date_arg;
use crate::sync::row::parse_timestamp;
use crate::types::{NewTask, TaskPatch, TaskPriority, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// List tasks
    List(TaskListArgs),

    /// Create a task
    Add(TaskAddArgs),

    /// Change fields of a task. An empty value clears an optional field.
    Edit(TaskEditArgs),

    /// Delete a task
    Delete {
        /// Task id
        id: String,
    },
}

/// Arguments for `tasks list`
#[derive(Args, Debug, Default)]
pub struct TaskListArgs {
    /// Only tasks of this project
    #[arg(long)]
    pub project: Option<String>,

    /// Only tasks with this status
    #[arg(long, value_parser = parse_status_arg)]
    pub status: Option<TaskStatus>,
}

/// Arguments for `tasks add`
#[derive(Args, Debug)]
pub struct TaskAddArgs {
    /// Task title
    pub title: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// backlog, todo, in progress, done or canceled (default: todo)
    #[arg(long, value_parser = parse_status_arg)]
    pub status: Option<TaskStatus>,

    /// low, medium or high (default: medium)
    #[arg(long, value_parser = parse_priority_arg)]
    pub priority: Option<TaskPriority>,

    /// Owning project id
    #[arg(long)]
    pub project: Option<String>,

    /// Scheduled date, YYYY-MM-DD
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<NaiveDate>,

    /// Deadline, YYYY-MM-DD
    #[arg(long, value_parser = parse_date_arg)]
    pub deadline: Option<NaiveDate>,

    /// Reminder time, RFC 3339
    #[arg(long, value_parser = parse_timestamp_arg)]
    pub reminder: Option<DateTime<Utc>>,
}

impl TaskAddArgs {
    pub fn to_new(&self) -> NewTask {
        let mut new = NewTask::new(self.title.clone());
        new.description = self.description.clone();
        new.status = self.status.unwrap_or_default();
        new.priority = self.priority.unwrap_or_default();
        new.project_id = self.project.clone();
        new.date = self.date;
        new.deadline = self.deadline;
        new.reminder = self.reminder;
        new
    }
}

/// Arguments for `tasks edit`
#[derive(Args, Debug)]
pub struct TaskEditArgs {
    /// Task id
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_status_arg)]
    pub status: Option<TaskStatus>,

    #[arg(long, value_parser = parse_priority_arg)]
    pub priority: Option<TaskPriority>,

    /// Move to another project; an empty value detaches the task
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<NaiveDate>,

    #[arg(long, value_parser = parse_date_arg)]
    pub deadline: Option<NaiveDate>,

    #[arg(long, value_parser = parse_timestamp_arg)]
    pub reminder: Option<DateTime<Utc>>,

    /// Remove the date, deadline and reminder
    #[arg(long, conflicts_with_all = ["date", "deadline", "reminder"])]
    pub clear_schedule: bool,
}

impl TaskEditArgs {
    pub fn to_patch(&self) -> TaskPatch {
        let clear = self.clear_schedule;
        TaskPatch {
            title: self.title.clone(),
            description: self.description.clone().map(Some),
            status: self.status,
            priority: self.priority,
            project_id: self.project.clone().map(Some),
            date: if clear { Some(None) } else { self.date.map(Some) },
            deadline: if clear { Some(None) } else { self.deadline.map(Some) },
            reminder: if clear { Some(None) } else { self.reminder.map(Some) },
        }
    }
}

fn parse_status_arg(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| {
        format!(
            "unknown status '{}', expected one of: {}",
            s,
            TaskStatus::ALL.map(|st| st.as_str()).join(", ")
        )
    })
}

fn parse_priority_arg(s: &str) -> Result<TaskPriority, String> {
    TaskPriority::parse(s).ok_or_else(|| format!("unknown priority '{}', expected low, medium or high", s))
}

fn parse_timestamp_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).ok_or_else(|| format!("invalid timestamp '{}', expected RFC 3339", s))
}
