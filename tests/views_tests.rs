//! Derived views over records loaded through a collection.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use taskboard_sync::store::{MemoryStore, RemoteStore, Row};
use taskboard_sync::sync::Collection;
use taskboard_sync::team::{TeamMember, parse_team_members, serialize_team_members};
use taskboard_sync::types::{Project, Task};
use taskboard_sync::views;

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

async fn load<E: taskboard_sync::sync::Entity>(store: &Arc<MemoryStore>) -> Vec<E> {
    let collection = Collection::<E>::new(store.clone() as Arc<dyn RemoteStore>);
    collection.fetch_all().await.unwrap();
    collection.items()
}

/// Two projects sharing a member (by email), one unrelated, and a handful of tasks.
async fn seeded() -> (Vec<Project>, Vec<Task>) {
    let store = Arc::new(MemoryStore::new());
    let ada = TeamMember::new("m1", "Ada Lovelace", "ada@example.com");
    let ada_again = TeamMember::new("m9", "Ada L.", "ada@example.com");
    let grace = TeamMember::new("m2", "Grace Hopper", "grace@example.com");

    let fixtures = [
        ("p-launch", "Launch", serialize_team_members(&[ada, grace])),
        ("p-docs", "Docs", serialize_team_members(&[ada_again])),
        ("p-misc", "Misc", Some("not json".to_string())),
    ];
    for (id, name, team) in fixtures {
        store
            .insert("projects", row(json!({"id": id, "name": name, "team_assigned": team})))
            .await
            .unwrap();
    }

    for (title, status, priority, project, deadline) in [
        ("design", "done", "high", Some("p-launch"), None),
        ("build", "in progress", "high", Some("p-launch"), Some("2025-06-12")),
        ("review", "todo", "medium", Some("p-docs"), Some("2025-06-20")),
        ("tidy", "todo", "low", None, Some("2025-06-11")),
        ("archive", "done", "low", Some("p-docs"), None),
    ] {
        store
            .insert(
                "tasks",
                row(json!({
                    "title": title,
                    "status": status,
                    "priority": priority,
                    "project_id": project,
                    "deadline": deadline,
                })),
            )
            .await
            .unwrap();
    }

    (load::<Project>(&store).await, load::<Task>(&store).await)
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

#[tokio::test]
async fn test_linked_projects_share_a_member() {
    let (projects, _) = seeded().await;
    let launch = projects.iter().find(|p| p.id == "p-launch").unwrap();
    let misc = projects.iter().find(|p| p.id == "p-misc").unwrap();

    let linked: Vec<_> = views::linked_projects(launch, &projects)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(linked, ["p-docs"]);

    // A malformed team payload is an empty team, not an error.
    assert!(views::project_team(misc).is_empty());
    assert!(views::linked_projects(misc, &projects).is_empty());
    assert!(parse_team_members(misc.team_assigned.as_deref()).is_empty());
}

#[tokio::test]
async fn test_profile_stats() {
    let (projects, tasks) = seeded().await;
    let stats = views::profile_stats(&projects, &tasks);

    assert_eq!(stats.total_tasks, 5);
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.in_progress_tasks, 1);
    assert_eq!(stats.total_projects, 3);
    // Launch and Docs each have an open task; Misc has none.
    assert_eq!(stats.active_projects, 2);
    assert_eq!(stats.completion_rate, 40);
}

#[tokio::test]
async fn test_task_views() {
    let (_, tasks) = seeded().await;

    let important = views::important_tasks(&tasks);
    assert_eq!(important.len(), 3);
    assert!(important[..2].iter().all(|t| t.title == "design" || t.title == "build"));
    assert_eq!(important[2].title, "review");

    let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    assert_eq!(
        titles(&views::upcoming_tasks(&tasks, today, None)),
        ["tidy", "build", "review"]
    );
    assert_eq!(
        titles(&views::upcoming_tasks(&tasks, today, Some(3))),
        ["tidy", "build"]
    );

    assert_eq!(views::project_task_count(&tasks, "p-launch"), 2);
    assert_eq!(views::tasks_for_project(&tasks, "p-misc").len(), 0);

    let summary = views::dashboard_summary(&[], &tasks);
    assert_eq!(summary.by_status["done"], 2);
    assert_eq!(summary.by_priority["low"], 2);
    assert_eq!(summary.unassigned, 1);
}
