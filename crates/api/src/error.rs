//! Application-level error type for HTTP handlers.
//!
//! Wraps [`CoreError`] for domain errors and implements [`IntoResponse`]
//! to produce consistent JSON error bodies. The originating request id is
//! injected into the body by `middleware::request_id` and also propagated
//! on the `x-request-id` response header.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use scout_core::error::CoreError;

/// Header echoing the scope of the rate-limit decision.
pub static X_RATELIMIT_SCOPE: HeaderName = HeaderName::from_static("x-ratelimit-scope");
/// Header echoing the floor of the remaining tokens.
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error carrying the wire taxonomy.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Map a domain error kind to its HTTP status.
fn status_for(core: &CoreError) -> StatusCode {
    match core {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) | CoreError::Cancelled => StatusCode::CONFLICT,
        CoreError::RateLimited { .. } | CoreError::OverCap { .. } => {
            StatusCode::TOO_MANY_REQUESTS
        }
        CoreError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Core(core) => {
                let status = status_for(&core);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %core, "Internal core error");
                }

                let body = json!({
                    "error": core.to_string(),
                    "code": core.code(),
                });
                let mut response = (status, axum::Json(body)).into_response();

                // Rate-limited responses echo the bucket state.
                if let CoreError::RateLimited { scope, remaining } = &core {
                    let headers = response.headers_mut();
                    if let Ok(value) = HeaderValue::from_str(scope) {
                        headers.insert(X_RATELIMIT_SCOPE.clone(), value);
                    }
                    let floor = remaining.floor().max(0.0) as i64;
                    if let Ok(value) = HeaderValue::from_str(&floor.to_string()) {
                        headers.insert(X_RATELIMIT_REMAINING.clone(), value);
                    }
                }
                response
            }

            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                let body = json!({
                    "error": "An internal error occurred",
                    "code": "internal",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }

            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let body = json!({
                    "error": "An internal error occurred",
                    "code": "internal",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(status_for(&CoreError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&CoreError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&CoreError::NotFound { entity: "Job" }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(&CoreError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&CoreError::RateLimited { scope: "s", remaining: 0.2 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&CoreError::OverCap { active: 3, cap: 3 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&CoreError::Upstream { service: "s", message: "m".into() }),
            StatusCode::BAD_GATEWAY
        );
    }
}
