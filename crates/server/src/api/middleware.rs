//! Request metrics middleware.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::warn;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Keeps the in-flight gauge balanced when a request future is dropped early.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        HTTP_REQUESTS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HTTP_REQUESTS_IN_FLIGHT.dec();
    }
}

/// Route template used as the `path` label, e.g. `/api/v1/tasks/{id}`.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| normalize_path(request.uri().path()))
}

/// Records duration and count of every routed request, labelled by method,
/// route template and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let route = route_label(&request);
    let _in_flight = InFlight::enter();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let code = status.as_u16().to_string();
    let labels = [method.as_str(), route.as_str(), code.as_str()];
    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();

    if status.is_server_error() {
        warn!(method = %method, route = %route, status = %code, "Request failed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "OK"
    }

    async fn failing_handler() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn app() -> Router {
        Router::new()
            .route("/middleware-test/{id}", get(ok_handler))
            .route("/middleware-fail", get(failing_handler))
            .route_layer(middleware::from_fn(metrics_middleware))
    }

    async fn send(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_labels_use_route_template() {
        let counter =
            HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/middleware-test/{id}", "200"]);
        let before = counter.get();

        assert_eq!(send(app(), "/middleware-test/first").await, StatusCode::OK);
        assert_eq!(send(app(), "/middleware-test/second").await, StatusCode::OK);

        assert_eq!(counter.get(), before + 2);
    }

    #[tokio::test]
    async fn test_server_errors_are_counted() {
        let counter = HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/middleware-fail", "500"]);
        let before = counter.get();

        assert_eq!(
            send(app(), "/middleware-fail").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_route_label_falls_back_to_normalized_path() {
        let request = Request::builder()
            .uri("/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "/api/v1/tasks/{id}");
    }
}
