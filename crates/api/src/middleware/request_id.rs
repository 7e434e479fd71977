//! Request-id propagation into error bodies.
//!
//! The request-id layer stamps `x-request-id` on every request; this
//! middleware copies that value into the JSON body of error responses so
//! failures carry the originating `request_id` alongside `error` and
//! `code`. Success bodies pass through untouched.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use axum::middleware::Next;
use axum::response::Response;

/// Upper bound on bodies buffered for patching. Error bodies are small
/// JSON objects; anything larger passes through unmodified.
const MAX_PATCHED_BODY_BYTES: usize = 64 * 1024;

/// Patch `request_id` into JSON error bodies. Must sit inside the
/// request-id layer so the header is already present on the request.
pub async fn inject_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;

    let Some(request_id) = request_id else {
        return response;
    };

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let declared_len = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > MAX_PATCHED_BODY_BYTES) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_PATCHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer error body for request-id patch");
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.entry("request_id")
                .or_insert_with(|| serde_json::Value::String(request_id));
            let patched = serde_json::Value::Object(map).to_string();
            parts
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(patched.len()));
            Response::from_parts(parts, Body::from(patched))
        }
        _ => Response::from_parts(parts, Body::from(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use tower::ServiceExt;

    use scout_core::error::CoreError;

    use crate::error::{AppError, AppResult};

    async fn failing() -> AppResult<()> {
        Err(AppError::Core(CoreError::Validation("bad input".into())))
    }

    async fn succeeding() -> Json<serde_json::Value> {
        Json(serde_json::json!({"ok": true}))
    }

    fn app() -> Router {
        Router::new()
            .route("/boom", get(failing))
            .route("/fine", get(succeeding))
            .layer(axum::middleware::from_fn(inject_request_id))
    }

    #[tokio::test]
    async fn error_bodies_carry_the_request_id() {
        let request = Request::builder()
            .uri("/boom")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), MAX_PATCHED_BODY_BYTES)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["request_id"], "req-123");
        assert_eq!(body["code"], "validation");
        assert!(body["error"].as_str().unwrap().contains("bad input"));
    }

    #[tokio::test]
    async fn success_bodies_pass_through_untouched() {
        let request = Request::builder()
            .uri("/fine")
            .header("x-request-id", "req-456")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), MAX_PATCHED_BODY_BYTES)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("request_id").is_none());
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn errors_without_a_request_id_are_unchanged() {
        let request = Request::builder()
            .uri("/boom")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), MAX_PATCHED_BODY_BYTES)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("request_id").is_none());
        assert_eq!(body["code"], "validation");
    }
}
