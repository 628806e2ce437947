//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with a mock plugin bound to `.flv`, so requests exercise the real
//! scheduler without an encoder installed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use transcode_core::{
    testing::{MockPlugin, RecordingSink},
    Config, Scheduler, SchedulerConfig,
};
use transcode_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use transcode_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_task_creation() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/tasks", json!({
///         "input": "clip.flv",
///         "output": "clip.mp4"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Scheduler behind the router
    pub scheduler: Scheduler,
    /// Mock plugin bound to `.flv`
    pub plugin: MockPlugin,
    /// Sink recording every result
    pub sink: RecordingSink,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose scheduler is not started.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a fixture with a custom scheduler configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (scheduler, plugin, sink) = fixtures::scheduler_with_mock(config.clone());
        let app_config = Config {
            scheduler: config,
            ..Default::default()
        };
        let state = Arc::new(AppState::new(app_config, scheduler.clone()));

        Self {
            router: create_router(state),
            scheduler,
            plugin,
            sink,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// GET returning the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
