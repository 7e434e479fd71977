//! Admin inspector: jobs across principals and provider usage/cost
//! aggregates from the external-call ledger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use scout_core::error::CoreError;
use scout_core::keys::generate_api_key;
use scout_core::status::JobStatus;
use scout_core::types::DbId;
use scout_db::repositories::{ApiKeyRepo, ExternalCallRepo, JobRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum page size for the admin job listing.
const MAX_LIMIT: i64 = 200;

/// Query parameters for `GET /admin/jobs`.
#[derive(Debug, Deserialize)]
pub struct AdminJobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /admin/jobs
///
/// List jobs for every principal, optionally filtered by status.
pub async fn list_jobs(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<AdminJobsQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(status) = query.status.as_deref() {
        if JobStatus::parse(status).is_none() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "unknown status '{status}'"
            ))));
        }
    }

    let limit = query.limit.unwrap_or(50).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let jobs = JobRepo::list_all(&state.pool, query.status.as_deref(), limit, offset).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /admin/usage
///
/// Per-service call counts, durations, and estimated spend.
pub async fn usage(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let usage = ExternalCallRepo::usage_by_service(&state.pool).await?;
    Ok(Json(DataResponse { data: usage }))
}

// ---------------------------------------------------------------------------
// Key provisioning
// ---------------------------------------------------------------------------

/// Request body for `POST /admin/keys`.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    pub rate_rps: Option<f64>,
    pub burst: Option<i32>,
    pub active_cap: Option<i32>,
    pub is_admin: Option<bool>,
}

/// Response for a freshly created key. The plaintext is shown exactly
/// once and never stored.
#[derive(Debug, Serialize)]
pub struct KeyCreatedResponse {
    pub id: DbId,
    pub name: String,
    pub key_prefix: String,
    /// The full plaintext key. Shown **once** and never stored.
    pub plaintext_key: String,
}

/// POST /admin/keys
///
/// Provision a new API key. Returns 201 with the plaintext, which is
/// never persisted or logged.
pub async fn create_key(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateKeyRequest>,
) -> AppResult<impl IntoResponse> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "name must be non-empty".into(),
        )));
    }

    let generated = generate_api_key();
    let key = ApiKeyRepo::create(
        &state.pool,
        name,
        &generated.hash,
        &generated.prefix,
        body.rate_rps.unwrap_or(5.0),
        body.burst.unwrap_or(10),
        body.active_cap.unwrap_or(state.config.max_active_jobs as i32),
        body.is_admin.unwrap_or(false),
    )
    .await?;

    tracing::info!(api_key_id = key.id, key_prefix = %key.key_prefix, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: KeyCreatedResponse {
                id: key.id,
                name: key.name,
                key_prefix: key.key_prefix,
                plaintext_key: generated.plaintext,
            },
        }),
    ))
}

/// POST /admin/keys/{id}/revoke
///
/// Revoke a key. 409 when it is already revoked.
pub async fn revoke_key(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(key_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let revoked = ApiKeyRepo::revoke(&state.pool, key_id).await?;
    if !revoked {
        return Err(AppError::Core(CoreError::Conflict(
            "API key is already revoked or does not exist".into(),
        )));
    }

    tracing::info!(api_key_id = key_id, "API key revoked");
    Ok(Json(DataResponse {
        data: serde_json::json!({"id": key_id, "revoked": true}),
    }))
}
