//! Task API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use transcode_core::{ErrorKind, SchedulerError, Task, TaskProgress, TranscodeParams};

use crate::state::AppState;

/// Default limit for task listings
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a task
#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    /// Source file; its extension selects the plugin
    pub input: String,
    /// Destination file
    pub output: String,
    /// Plugin parameters
    #[serde(default)]
    pub params: TranscodeParams,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Maximum number of tasks to return; negative returns all
    pub limit: Option<i64>,
    /// Number of tasks to skip
    pub skip: Option<usize>,
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
    pub limit: i64,
    pub skip: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

/// Scheduler error mapped onto an HTTP response.
pub struct ApiError(SchedulerError);

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SchedulerError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            SchedulerError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::CancelFailed { .. } => StatusCode::CONFLICT,
            SchedulerError::Plugin(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Task request failed: {}", self.0);
        }
        (
            status,
            Json(TaskErrorResponse {
                error: self.0.to_string(),
                kind: self.0.kind(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new task
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .scheduler()
        .add_task(body.input, body.output, body.params)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// List tasks in submission order
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Json<ListTasksResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let skip = params.skip.unwrap_or(0);
    let (tasks, total) = state.scheduler().list_tasks(limit, skip);

    Json(ListTasksResponse {
        tasks,
        total,
        limit,
        skip,
    })
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.scheduler().get_task(&id)?))
}

/// Cancel a task
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler().cancel(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get task progress as reported by its plugin
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskProgress>, ApiError> {
    Ok(Json(state.scheduler().process(&id).await?))
}
