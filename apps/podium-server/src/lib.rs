//! Podium HTTP surface.
//!
//! REST routes over the runtime, a server-push event stream, and a manual
//! socket upgrade sharing the same hub fan-out.

mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use podium_bus::EventFilter;
use podium_gates::GateError;
use podium_runtime::{
    AgentRuntime, ApprovalDecision, ChainTaskSpec, CreateTaskRequest, RuntimeError, SchedulerError,
};

#[derive(Clone)]
struct AppState {
    runtime: AgentRuntime,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Serve the runtime on the given address until the process ends
pub async fn run_server(runtime: AgentRuntime, listen: SocketAddr) -> anyhow::Result<()> {
    let app = router(runtime);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    tracing::info!(listen = %listen, "podium-server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

/// Build the full route table
pub fn router(runtime: AgentRuntime) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/chain", post(create_chain))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/logs", get(task_logs))
        .route("/tasks/{id}/cancel", post(cancel_task))
        .route("/tasks/{id}/retry", post(retry_task))
        .route("/approvals", get(list_approvals))
        .route("/approvals/{id}/approve", post(approve_item))
        .route("/approvals/{id}/reject", post(reject_item))
        .route("/sessions", post(open_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/input", post(session_input))
        .route("/sessions/{id}/close", post(close_session))
        .route("/files/actions", post(file_actions))
        .route("/repo/actions", post(repo_actions))
        .route("/integrations/actions", post(integration_actions))
        .route("/live/snapshot", get(live_snapshot))
        .route("/live/events", get(live_events))
        .route("/live/ws", get(ws::live_ws))
        .with_state(AppState { runtime })
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Json<podium_core::Task> {
    Json(state.runtime.scheduler.create_task(req).await)
}

#[derive(Debug, Deserialize)]
struct ChainRequest {
    tasks: Vec<ChainTaskSpec>,
}

async fn create_chain(
    State(state): State<AppState>,
    Json(req): Json<ChainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .runtime
        .scheduler
        .create_chain(req.tasks)
        .await
        .map_err(|err| map_runtime_error(err.into()))?;
    Ok(Json(view))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<podium_core::Task>> {
    Json(state.runtime.scheduler.list_tasks().await)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .runtime
        .scheduler
        .get_task(&id)
        .await
        .map_err(|err| map_runtime_error(err.into()))?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn task_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .runtime
        .scheduler
        .task_logs(&id, query.limit.unwrap_or(100), query.kind.as_deref())
        .await
        .map_err(|err| map_runtime_error(err.into()))?;
    Ok(Json(entries))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .runtime
        .scheduler
        .cancel_task(&id)
        .await
        .map_err(|err| map_runtime_error(err.into()))?;
    Ok(Json(task))
}

async fn retry_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .runtime
        .scheduler
        .retry_task(&id)
        .await
        .map_err(|err| map_runtime_error(err.into()))?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct ApprovalsQuery {
    category: Option<String>,
}

async fn list_approvals(
    State(state): State<AppState>,
    Query(query): Query<ApprovalsQuery>,
) -> Json<Vec<podium_gates::ApprovalItem>> {
    Json(state.runtime.approvals.list(query.category.as_deref()).await)
}

async fn approve_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .runtime
        .resolve_approval(&id, ApprovalDecision::Approve)
        .await
        .map_err(map_runtime_error)?;
    Ok(Json(item))
}

async fn reject_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .runtime
        .resolve_approval(&id, ApprovalDecision::Reject)
        .await
        .map_err(map_runtime_error)?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionRequest {
    #[serde(default = "default_session_kind")]
    kind: String,
    #[serde(default = "default_session_source")]
    source_id: String,
}

fn default_session_kind() -> String {
    "terminal".to_string()
}

fn default_session_source() -> String {
    "api".to_string()
}

async fn open_session(
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> Json<podium_sessions::SessionInfo> {
    Json(state.runtime.sessions.open(req.kind, req.source_id).await)
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<podium_sessions::SessionInfo>> {
    Json(state.runtime.sessions.list().await)
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .runtime
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| map_session_error(podium_sessions::SessionError::NotFound(id)))?;
    let chunks = state
        .runtime
        .sessions
        .buffer(&info.id)
        .await
        .map_err(map_session_error)?;
    Ok(Json(json!({"session": info, "buffer": chunks})))
}

#[derive(Debug, Deserialize)]
struct SessionInputRequest {
    data: String,
}

async fn session_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SessionInputRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .runtime
        .sessions
        .push(&id, req.data)
        .await
        .map_err(map_session_error)?;
    Ok(Json(json!({"ok": true})))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .runtime
        .sessions
        .close(&id)
        .await
        .map_err(map_session_error)?;
    Ok(Json(json!({"ok": true})))
}

fn map_session_error(err: podium_sessions::SessionError) -> ApiError {
    let (status, code) = match &err {
        podium_sessions::SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        podium_sessions::SessionError::Closed(_) => (StatusCode::BAD_REQUEST, "session_closed"),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActionMode {
    DryRun,
    Execute,
}

/// Shared body of the two-phase action surfaces: mode and token up front,
/// every other field is the action's parameter bag.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwoPhaseBody {
    mode: ActionMode,
    confirm_token: Option<String>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

async fn file_actions(
    State(state): State<AppState>,
    Json(body): Json<TwoPhaseBody>,
) -> Result<impl IntoResponse, ApiError> {
    two_phase(&state, "file_write", body).await
}

async fn repo_actions(
    State(state): State<AppState>,
    Json(body): Json<TwoPhaseBody>,
) -> Result<impl IntoResponse, ApiError> {
    two_phase(&state, "shell", body).await
}

async fn integration_actions(
    State(state): State<AppState>,
    Json(body): Json<TwoPhaseBody>,
) -> Result<impl IntoResponse, ApiError> {
    two_phase(&state, "http_request", body).await
}

async fn two_phase(
    state: &AppState,
    executor_id: &str,
    body: TwoPhaseBody,
) -> Result<Json<Value>, ApiError> {
    let params = Value::Object(body.params);
    match body.mode {
        ActionMode::DryRun => {
            let plan = state
                .runtime
                .actions
                .plan(executor_id, &params)
                .await
                .map_err(map_runtime_error)?;
            Ok(Json(serde_json::to_value(plan).unwrap_or_default()))
        }
        ActionMode::Execute => {
            let result = state
                .runtime
                .actions
                .execute(executor_id, &params, body.confirm_token.as_deref())
                .await
                .map_err(map_runtime_error)?;
            Ok(Json(json!({"result": result})))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotQuery {
    session_id: Option<String>,
    source_id: Option<String>,
    task_id: Option<String>,
    limit: Option<usize>,
}

async fn live_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<Vec<podium_bus::LiveEvent>> {
    let filter = EventFilter {
        session_id: query.session_id,
        source_id: query.source_id,
        task_id: query.task_id,
    };
    Json(
        state
            .runtime
            .hub
            .snapshot(&filter, query.limit.unwrap_or(50))
            .await,
    )
}

async fn live_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    let mut sub = state.runtime.hub.subscribe(filter).await;

    let event_stream = stream! {
        while let Some(event) = sub.rx.recv().await {
            let payload = serde_json::to_string(&event)
                .unwrap_or_else(|_| "{}".to_string());
            yield Ok(SseEvent::default().event(event.event_type.clone()).data(payload));
        }
    };

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keepalive"),
    )
}

fn map_runtime_error(err: RuntimeError) -> ApiError {
    let (status, code) = match &err {
        RuntimeError::Scheduler(SchedulerError::TaskNotFound(_)) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        RuntimeError::Scheduler(SchedulerError::InvalidArgument(_)) => {
            (StatusCode::BAD_REQUEST, "invalid_argument")
        }
        RuntimeError::Gate(GateError::ApprovalNotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
        RuntimeError::Gate(GateError::ApprovalAlreadyResolved { .. }) => {
            (StatusCode::BAD_REQUEST, "approval_already_resolved")
        }
        RuntimeError::Gate(GateError::ConfirmRequired { .. }) => {
            (StatusCode::CONFLICT, "confirm_required")
        }
        RuntimeError::UnknownExecutor(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        RuntimeError::Execution { code, .. } => (StatusCode::BAD_REQUEST, code.as_str()),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
