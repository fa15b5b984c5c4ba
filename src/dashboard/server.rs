//! HTTP server for the dashboard API.
//!
//! Reads are served from the mounted collections; writes go through them, so
//! every client sees the same optimistic and rollback behavior.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ViewsConfig;
use crate::error::{ErrorCode, SyncError};
use crate::sync::Board;
use crate::team::TeamMember;
use crate::types::{NewProject, NewTask, Project, ProjectPatch, Task, TaskPatch, TaskStatus};
use crate::views::{self, DashboardSummary, ProfileStats};

/// State shared across handlers.
#[derive(Clone)]
pub struct DashboardServer {
    board: Board,
    views: ViewsConfig,
}

impl DashboardServer {
    pub fn new(board: Board, views: ViewsConfig) -> Self {
        Self { board, views }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
}

/// [`SyncError`] as an HTTP response: `{code, message}` plus a status.
#[derive(Debug)]
pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError(err)
    }
}

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
        ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
        ErrorCode::SchemaMismatch
        | ErrorCode::RemoteRejected
        | ErrorCode::Transport
        | ErrorCode::InvalidRow => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(self.0.code), Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    loading: bool,
    projects_error: Option<SyncError>,
    tasks_error: Option<SyncError>,
}

async fn health(State(state): State<DashboardServer>) -> impl IntoResponse {
    let board = state.board();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        loading: board.projects.loading() || board.tasks.loading(),
        projects_error: board.projects.error(),
        tasks_error: board.tasks.error(),
    })
}

/// API root - lists the available endpoints.
async fn api_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "projects": "/api/projects",
            "tasks": "/api/tasks",
            "important": "/api/important",
            "upcoming": "/api/upcoming",
            "profile": "/api/profile",
            "dashboard": "/api/dashboard",
        }
    }))
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ProjectListItem {
    #[serde(flatten)]
    project: Project,
    task_count: usize,
}

#[derive(Serialize)]
struct ProjectDetail {
    project: Project,
    tasks: Vec<Task>,
    task_count: usize,
    team: Vec<TeamMember>,
    linked_projects: Vec<Project>,
}

async fn list_projects(State(state): State<DashboardServer>) -> Json<Vec<ProjectListItem>> {
    let tasks = state.board.tasks.items();
    let items = state
        .board
        .projects
        .items()
        .into_iter()
        .map(|project| ProjectListItem {
            task_count: views::project_task_count(&tasks, &project.id),
            project,
        })
        .collect();
    Json(items)
}

async fn create_project(
    State(state): State<DashboardServer>,
    Json(new): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.board.projects.create(new).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<DashboardServer>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = state
        .board
        .projects
        .get(&id)
        .ok_or_else(|| SyncError::not_found("projects", &id))?;
    let all_tasks = state.board.tasks.items();
    let tasks = views::tasks_for_project(&all_tasks, &id);
    let linked_projects = views::linked_projects(&project, &state.board.projects.items());

    Ok(Json(ProjectDetail {
        task_count: tasks.len(),
        tasks,
        team: views::project_team(&project),
        linked_projects,
        project,
    }))
}

async fn update_project(
    State(state): State<DashboardServer>,
    Path(id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.board.projects.update(&id, patch).await?))
}

async fn delete_project(
    State(state): State<DashboardServer>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.board.projects.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct TaskListQuery {
    project_id: Option<String>,
    status: Option<String>,
}

async fn list_tasks(
    State(state): State<DashboardServer>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(TaskStatus::parse(raw).ok_or_else(|| {
            SyncError::invalid_value("status", &format!("Unknown status '{}'", raw))
        })?),
        None => None,
    };

    let tasks = state
        .board
        .tasks
        .items()
        .into_iter()
        .filter(|t| {
            query
                .project_id
                .as_deref()
                .is_none_or(|p| t.project_id.as_deref() == Some(p))
        })
        .filter(|t| status.is_none_or(|s| t.status == s))
        .collect();
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<DashboardServer>,
    Json(new): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.board.tasks.create(new).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<DashboardServer>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.board.tasks.update(&id, patch).await?))
}

async fn delete_task(
    State(state): State<DashboardServer>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.board.tasks.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

async fn important(State(state): State<DashboardServer>) -> Json<Vec<Task>> {
    Json(views::important_tasks(&state.board.tasks.items()))
}

async fn upcoming(State(state): State<DashboardServer>) -> Json<Vec<Task>> {
    let today = chrono::Local::now().date_naive();
    Json(views::upcoming_tasks(
        &state.board.tasks.items(),
        today,
        state.views.upcoming_window(),
    ))
}

async fn profile(State(state): State<DashboardServer>) -> Json<ProfileStats> {
    Json(views::profile_stats(
        &state.board.projects.items(),
        &state.board.tasks.items(),
    ))
}

async fn dashboard(State(state): State<DashboardServer>) -> Json<DashboardSummary> {
    Json(views::dashboard_summary(
        &state.board.projects.items(),
        &state.board.tasks.items(),
    ))
}

/// Build the router with all routes.
pub fn build_router(state: DashboardServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_root))
        .route("/api/health", get(health))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", axum::routing::patch(update_task).delete(delete_task))
        .route("/api/important", get(important))
        .route("/api/upcoming", get(upcoming))
        .route("/api/profile", get(profile))
        .route("/api/dashboard", get(dashboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the specified port (0 picks a free one).
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    board: Board,
    views: ViewsConfig,
    port: u16,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(DashboardServer::new(board, views));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Dashboard API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dashboard API shutting down");
            })
            .await
        {
            error!("Dashboard server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::memory::Operation;
    use crate::store::{MemoryStore, RemoteStore};
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn serve() -> (Arc<MemoryStore>, String, oneshot::Sender<()>) {
        let store = Arc::new(MemoryStore::new());
        let board = Board::mount(store.clone() as Arc<dyn RemoteStore>).await;
        let (shutdown, addr) = start_server(board, ViewsConfig::default(), 0).await.unwrap();
        (store, format!("http://{}", addr), shutdown)
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCode::MissingRequiredField), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::EntityNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::Transport), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorCode::SchemaMismatch), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_project_crud_over_http() {
        let (_store, base, shutdown) = serve().await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{}/api/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");

        let created = client
            .post(format!("{}/api/projects", base))
            .json(&json!({"name": "Launch"}))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), reqwest::StatusCode::CREATED);
        let project: Value = created.json().await.unwrap();
        let id = project["id"].as_str().unwrap().to_string();
        assert_eq!(project["color"], "#6366f1");

        client
            .post(format!("{}/api/tasks", base))
            .json(&json!({"title": "Draft", "project_id": id, "priority": "high"}))
            .send()
            .await
            .unwrap();

        let detail: Value = client
            .get(format!("{}/api/projects/{}", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(detail["task_count"], 1);
        assert_eq!(detail["tasks"][0]["title"], "Draft");

        let renamed: Value = client
            .patch(format!("{}/api/projects/{}", base, id))
            .json(&json!({"name": "Relaunch"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(renamed["name"], "Relaunch");

        let deleted = client
            .delete(format!("{}/api/projects/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);

        // A refetch triggered by the rename may still land; poll briefly.
        let mut status = reqwest::StatusCode::OK;
        for _ in 0..100 {
            status = client
                .get(format!("{}/api/projects/{}", base, id))
                .send()
                .await
                .unwrap()
                .status();
            if status == reqwest::StatusCode::NOT_FOUND {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn test_errors_map_to_status() {
        let (store, base, shutdown) = serve().await;
        let client = reqwest::Client::new();

        let invalid = client
            .post(format!("{}/api/tasks", base))
            .json(&json!({"title": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = invalid.json().await.unwrap();
        assert_eq!(body["code"], "MISSING_REQUIRED_FIELD");

        let unknown = client
            .patch(format!("{}/api/tasks/nope", base))
            .json(&json!({"status": "done"}))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

        store.fail_next(Operation::Insert, StoreError::Transport("connection reset".into()));
        let remote = client
            .post(format!("{}/api/projects", base))
            .json(&json!({"name": "Launch"}))
            .send()
            .await
            .unwrap();
        assert_eq!(remote.status(), reqwest::StatusCode::BAD_GATEWAY);

        let bad_filter = client
            .get(format!("{}/api/tasks?status=blocked", base))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_filter.status(), reqwest::StatusCode::BAD_REQUEST);

        let _ = shutdown.send(());
    }
}
