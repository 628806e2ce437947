use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use transcode_core::SchedulerStatus;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<String>,
}

/// Format keys with a registered plugin, in registration order.
pub async fn list_formats(State(state): State<Arc<AppState>>) -> Json<FormatsResponse> {
    Json(FormatsResponse {
        formats: state.scheduler().formats(),
    })
}

/// Scheduler snapshot plus the settings it was started with.
#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub scheduler: SchedulerStatus,
    pub retry_limit: u32,
    pub ffmpeg_path: PathBuf,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let config = state.config();
    Json(StatusResponse {
        scheduler: state.scheduler().status(),
        retry_limit: config.scheduler.retry_limit,
        ffmpeg_path: config.ffmpeg.ffmpeg_path.clone(),
    })
}

/// Prometheus text exposition.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
