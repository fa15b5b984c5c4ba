//! taskboard
//!
//! Command-line client that mirrors a hosted task and project board,
//! applies edits with optimistic updates, and follows changes made by
//! other clients.

use anyhow::{Result, bail};
use chrono::{Duration, Local, Utc};
use clap::Parser;
use std::sync::Arc;
use taskboard_sync::cli::projects::ProjectsCommand;
use taskboard_sync::cli::tasks::TasksCommand;
use taskboard_sync::cli::{Cli, Command};
use taskboard_sync::config::{Config, ConfigLoader, ConfigPaths};
use taskboard_sync::dashboard;
use taskboard_sync::error::SyncError;
use taskboard_sync::format::{self, OutputFormat};
use taskboard_sync::logging::{LogTarget, init_logging};
use taskboard_sync::store::{RemoteStore, RestStore};
use taskboard_sync::sync::{Board, Collection, Entity};
use taskboard_sync::types::{Project, Task};
use taskboard_sync::views;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut paths = ConfigPaths::discover();
    if let Some(ref config_path) = cli.config {
        paths = paths.with_explicit_file(config_path);
    }
    let mut loader = ConfigLoader::load_with_paths(paths)?;
    if let Some(path) = loader.config_path() {
        debug!("Config file: {}", path.display());
    }

    let config = loader.config_mut();
    if let Some(ref url) = cli.store_url {
        config.store.url = url.clone();
    }
    let config = loader.into_config();

    if config.store.url.trim().is_empty() {
        bail!(
            "No backend URL configured. Set store.url in taskboard/config.yaml, \
             TASKBOARD_STORE_URL, or pass --store-url."
        );
    }

    let store: Arc<dyn RemoteStore> = Arc::new(RestStore::from_config(&config.store)?);
    info!("Connecting to {}", config.store.url);
    let board = Board::mount(store).await;

    let result = run(&cli, &config, &board).await;
    board.unmount().await;
    result
}

async fn run(cli: &Cli, config: &Config, board: &Board) -> Result<()> {
    let fmt = cli.format;

    match &cli.command {
        Command::Projects(cmd) => run_projects(cmd, fmt, board).await,
        Command::Tasks(cmd) => run_tasks(cmd, fmt, board).await,
        Command::Important => {
            let tasks = loaded(&board.tasks)?;
            print_tasks(fmt, "Important", &views::important_tasks(&tasks));
            Ok(())
        }
        Command::Upcoming { days } => {
            let tasks = loaded(&board.tasks)?;
            let window = match days {
                Some(0) => None,
                Some(days) => Some(*days),
                None => config.views.upcoming_window(),
            };
            let today = Local::now().date_naive();
            print_tasks(fmt, "Upcoming", &views::upcoming_tasks(&tasks, today, window));
            Ok(())
        }
        Command::Profile => {
            let stats = views::profile_stats(&loaded(&board.projects)?, &loaded(&board.tasks)?);
            match fmt {
                OutputFormat::Json => println!("{}", format::to_json(&stats)),
                OutputFormat::Text => print!("{}", format::format_profile(&stats)),
            }
            Ok(())
        }
        Command::Dashboard => {
            let summary =
                views::dashboard_summary(&loaded(&board.projects)?, &loaded(&board.tasks)?);
            match fmt {
                OutputFormat::Json => println!("{}", format::to_json(&summary)),
                OutputFormat::Text => print!("{}", format::format_dashboard(&summary)),
            }
            Ok(())
        }
        Command::Watch => watch(config, board).await,
        Command::Serve { port } => {
            let port = port.unwrap_or(config.ui.port);
            let (shutdown, addr) =
                dashboard::start_server(board.clone(), config.views.clone(), port).await?;
            println!("Dashboard API on http://{}/api", addr);
            tokio::signal::ctrl_c().await?;
            let _ = shutdown.send(());
            Ok(())
        }
    }
}

async fn run_projects(cmd: &ProjectsCommand, fmt: OutputFormat, board: &Board) -> Result<()> {
    match cmd {
        ProjectsCommand::List => {
            let projects = loaded(&board.projects)?;
            let tasks = loaded(&board.tasks)?;
            match fmt {
                OutputFormat::Json => println!("{}", format::to_json(&projects)),
                OutputFormat::Text => {
                    let counts: Vec<usize> = projects
                        .iter()
                        .map(|p| views::project_task_count(&tasks, &p.id))
                        .collect();
                    print!("{}", format::format_projects(&projects, &counts));
                }
            }
        }
        ProjectsCommand::Show { id } => {
            let projects = loaded(&board.projects)?;
            let Some(project) = projects.iter().find(|p| &p.id == id) else {
                return Err(SyncError::not_found(Project::TABLE, id).into());
            };
            let tasks = views::tasks_for_project(&loaded(&board.tasks)?, id);
            let team = views::project_team(project);
            let linked = views::linked_projects(project, &projects);
            match fmt {
                OutputFormat::Json => println!(
                    "{}",
                    format::to_json(&serde_json::json!({
                        "project": project,
                        "tasks": tasks,
                        "task_count": tasks.len(),
                        "team": team,
                        "linked_projects": linked,
                    }))
                ),
                OutputFormat::Text => {
                    print!("{}", format::format_project(project, &tasks, &team, &linked))
                }
            }
        }
        ProjectsCommand::Add(args) => {
            let project = board.projects.create(args.to_new()).await?;
            print_record(fmt, &project, &project.id, "Created project");
        }
        ProjectsCommand::Edit(args) => {
            let project = board.projects.update(&args.id, args.to_patch()).await?;
            print_record(fmt, &project, &project.id, "Updated project");
        }
        ProjectsCommand::Delete { id } => {
            board.projects.delete(id).await?;
            print_deleted(fmt, id);
        }
    }
    Ok(())
}

async fn run_tasks(cmd: &TasksCommand, fmt: OutputFormat, board: &Board) -> Result<()> {
    match cmd {
        TasksCommand::List(args) => {
            let tasks: Vec<Task> = loaded(&board.tasks)?
                .into_iter()
                .filter(|t| {
                    args.project
                        .as_deref()
                        .is_none_or(|p| t.project_id.as_deref() == Some(p))
                })
                .filter(|t| args.status.is_none_or(|s| t.status == s))
                .collect();
            print_tasks(fmt, "Tasks", &tasks);
        }
        TasksCommand::Add(args) => {
            let task = board.tasks.create(args.to_new()).await?;
            print_record(fmt, &task, &task.id, "Created task");
        }
        TasksCommand::Edit(args) => {
            let task = board.tasks.update(&args.id, args.to_patch()).await?;
            print_record(fmt, &task, &task.id, "Updated task");
        }
        TasksCommand::Delete { id } => {
            board.tasks.delete(id).await?;
            print_deleted(fmt, id);
        }
    }
    Ok(())
}

/// Items of a mounted collection, or the error its initial fetch recorded.
fn loaded<E: Entity>(collection: &Arc<Collection<E>>) -> Result<Vec<E>> {
    let state = collection.snapshot();
    if let Some(err) = state.error {
        return Err(err.into());
    }
    Ok(state.items)
}

fn print_tasks(fmt: OutputFormat, heading: &str, tasks: &[Task]) {
    match fmt {
        OutputFormat::Json => println!("{}", format::to_json(&tasks)),
        OutputFormat::Text => print!("{}", format::format_tasks(heading, tasks)),
    }
}

fn print_record<T: serde::Serialize>(fmt: OutputFormat, record: &T, id: &str, verb: &str) {
    match fmt {
        OutputFormat::Json => println!("{}", format::to_json(record)),
        OutputFormat::Text => println!("{} `{}`", verb, id),
    }
}

fn print_deleted(fmt: OutputFormat, id: &str) {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": id })),
        OutputFormat::Text => println!("Deleted `{}`", id),
    }
}

/// Print collection changes and due reminders until interrupted.
async fn watch(config: &Config, board: &Board) -> Result<()> {
    let mut projects_rx = board.projects.subscribe_state();
    let mut tasks_rx = board.tasks.subscribe_state();
    let mut reminders = tokio::time::interval(std::time::Duration::from_secs(30));
    let mut since = Utc::now() - Duration::minutes(config.views.reminder_lookback_minutes);

    println!(
        "Watching {} projects and {} tasks (Ctrl-C to stop)",
        board.projects.items().len(),
        board.tasks.items().len()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = projects_rx.changed() => {
                if changed.is_err() {
                    warn!("Projects collection closed");
                    break;
                }
                let state = projects_rx.borrow_and_update().clone();
                if !state.loading {
                    match state.error {
                        Some(err) => println!("projects: {}", err),
                        None => println!("projects: {} total", state.items.len()),
                    }
                }
            }
            changed = tasks_rx.changed() => {
                if changed.is_err() {
                    warn!("Tasks collection closed");
                    break;
                }
                let state = tasks_rx.borrow_and_update().clone();
                if !state.loading {
                    match state.error {
                        Some(err) => println!("tasks: {}", err),
                        None => println!("tasks: {} total", state.items.len()),
                    }
                }
            }
            _ = reminders.tick() => {
                let now = Utc::now();
                for task in views::due_reminders(&board.tasks.items(), since, now) {
                    println!("reminder: {} `{}`", task.title, task.id);
                }
                since = now;
            }
        }
    }
    Ok(())
}
