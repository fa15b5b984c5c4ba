//! CLI command definitions for taskboard
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod projects;
pub mod tasks;

use crate::format::OutputFormat;
use crate::sync::row::parse_date;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use projects::ProjectsCommand;
use tasks::TasksCommand;

/// Sync client for a hosted task and project board
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the project and user config files)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    pub store_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format: json or text
    #[arg(short, long, default_value = "text", global = true, value_parser = parse_format_arg)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage projects
    #[command(subcommand)]
    Projects(ProjectsCommand),

    /// Manage tasks
    #[command(subcommand)]
    Tasks(TasksCommand),

    /// High and medium priority tasks, high first
    Important,

    /// Open tasks due soon
    Upcoming {
        /// Days ahead to include, 0 for no limit (overrides config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Task and project totals
    Profile,

    /// Task counts by status and priority
    Dashboard,

    /// Stay connected and print changes and due reminders as they happen
    Watch,

    /// Serve the dashboard JSON API
    Serve {
        /// Port for the dashboard API (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

pub(crate) fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

fn parse_format_arg(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("unknown format '{}', expected json or text", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_subcommand() {
        let cli = Cli::try_parse_from([
            "taskboard",
            "--format",
            "json",
            "tasks",
            "add",
            "Write brief",
            "--priority",
            "high",
            "--deadline",
            "2025-02-14",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log, "2");
        match cli.command {
            Command::Tasks(TasksCommand::Add(args)) => {
                let new = args.to_new();
                assert_eq!(new.title, "Write brief");
                assert_eq!(new.deadline, NaiveDate::from_ymd_opt(2025, 2, 14));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Cli::try_parse_from(["taskboard", "projects", "add", "X", "--due", "soon"]).is_err());
    }

    #[test]
    fn test_serve_port() {
        let cli = Cli::try_parse_from(["taskboard", "serve", "--port", "4000"]).unwrap();
        assert!(matches!(cli.command, Command::Serve { port: Some(4000) }));
    }
}
