//! Handlers for the `/pipeline` resource: submit, status, results,
//! artifacts, cancel.
//!
//! Admission order on submit: validation, active-job cap, idempotent
//! replay, rate limit, then the atomic create + enqueue.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use scout_core::error::CoreError;
use scout_core::platform::Platform;
use scout_core::status::{ArtifactKind, EventLevel, JobStatus};
use scout_core::types::JobId;
use scout_db::models::job::{JobProjection, PipelineJob, PipelineParams};
use scout_db::repositories::{
    ArtifactRepo, EventRepo, IdempotencyRepo, JobRepo, QueueRepo, RateLimitRepo,
};

use crate::error::{AppError, AppResult, X_RATELIMIT_REMAINING, X_RATELIMIT_SCOPE};
use crate::middleware::auth::AuthPrincipal;
use crate::response::DataResponse;
use crate::state::AppState;

/// Rate-limit scope for job submission.
const SCOPE_SUBMIT: &str = "pipeline_start";

/// Maximum accepted `Idempotency-Key` length.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Default `top_n` when the request omits it.
const DEFAULT_TOP_N: i32 = 30;

/// Default vector-search pool size when the request omits it.
const DEFAULT_WEAVIATE_TOP_N: i32 = 500;

// ---------------------------------------------------------------------------
// Request types and validation
// ---------------------------------------------------------------------------

/// Request body for `POST /pipeline/start`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub business_description: Option<String>,
    pub top_n: Option<i32>,
    pub weaviate_top_n: Option<i32>,
    pub llm_top_n: Option<i32>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    pub platform: Option<String>,
    #[serde(default)]
    pub exclude_profile_urls: Vec<String>,
    pub strict_location_matching: Option<bool>,
}

/// Validate a submit request into persisted parameters.
pub fn validate_start(req: &StartRequest) -> Result<PipelineParams, CoreError> {
    let description = req
        .business_description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if description.is_empty() {
        return Err(CoreError::Validation(
            "business_description must be non-empty".into(),
        ));
    }

    let top_n = req.top_n.unwrap_or(DEFAULT_TOP_N);
    if !(1..=1000).contains(&top_n) {
        return Err(CoreError::Validation("top_n must be in [1, 1000]".into()));
    }

    let weaviate_top_n = req.weaviate_top_n.unwrap_or(DEFAULT_WEAVIATE_TOP_N);
    if !(10..=5000).contains(&weaviate_top_n) {
        return Err(CoreError::Validation(
            "weaviate_top_n must be in [10, 5000]".into(),
        ));
    }

    let llm_top_n = req.llm_top_n.unwrap_or(top_n);
    if !(1..=1000).contains(&llm_top_n) {
        return Err(CoreError::Validation("llm_top_n must be in [1, 1000]".into()));
    }
    if llm_top_n > weaviate_top_n {
        return Err(CoreError::Validation(
            "llm_top_n must not exceed weaviate_top_n".into(),
        ));
    }

    if let Some(min) = req.min_followers {
        if min < 0 {
            return Err(CoreError::Validation("min_followers must be >= 0".into()));
        }
    }
    if let Some(max) = req.max_followers {
        if max < 0 {
            return Err(CoreError::Validation("max_followers must be >= 0".into()));
        }
    }
    if let (Some(min), Some(max)) = (req.min_followers, req.max_followers) {
        if min > max {
            return Err(CoreError::Validation(
                "min_followers must not exceed max_followers".into(),
            ));
        }
    }

    let platform = match req.platform.as_deref() {
        None => None,
        Some(p) => match Platform::parse(p) {
            Some(Platform::Unknown) | None => {
                return Err(CoreError::Validation(format!(
                    "platform must be one of: instagram, tiktok (got '{p}')"
                )))
            }
            Some(platform) => Some(platform),
        },
    };

    Ok(PipelineParams {
        business_description: description.to_string(),
        top_n,
        weaviate_top_n,
        llm_top_n,
        min_followers: req.min_followers,
        max_followers: req.max_followers,
        platform,
        exclude_profile_urls: req.exclude_profile_urls.clone(),
        strict_location_matching: req.strict_location_matching.unwrap_or(false),
    })
}

/// Read the validated `Idempotency-Key` header, if present.
fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, CoreError> {
    match headers.get("idempotency-key") {
        None => Ok(None),
        Some(value) => {
            let key = value
                .to_str()
                .map_err(|_| CoreError::Validation("Idempotency-Key is not valid ASCII".into()))?;
            if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(CoreError::Validation(format!(
                    "Idempotency-Key must be 1..={MAX_IDEMPOTENCY_KEY_LEN} characters"
                )));
            }
            Ok(Some(key.to_string()))
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /pipeline/start
///
/// Validates, enforces the active-job cap and the token bucket, honors
/// idempotent replay, then creates the job row and enqueues it in one
/// transaction. Returns 202 with the job id.
pub async fn start_pipeline(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StartRequest>,
) -> AppResult<Response> {
    let params = validate_start(&body)?;
    let idem_key = idempotency_key(&headers)?;
    let request_id = request_id(&headers);

    // Active-job cap. The per-key cap is authoritative: a key provisioned
    // with a cap of zero admits no jobs. The server-wide default applies
    // only when keys are created.
    let cap = principal.active_cap.max(0) as i64;
    let active = JobRepo::count_active(&state.pool, principal.id).await?;
    if active >= cap {
        return Err(AppError::Core(CoreError::OverCap { active, cap }));
    }

    // Idempotent replay short-circuits before the rate limit is charged.
    if let Some(key) = &idem_key {
        if let Some(existing) = IdempotencyRepo::get(&state.pool, principal.id, key).await? {
            tracing::info!(
                api_key_id = principal.id,
                job_id = %existing,
                "Idempotent replay",
            );
            return Ok(accepted_response(existing, &request_id, None));
        }
    }

    // Token bucket.
    let decision = RateLimitRepo::check_and_take(
        &state.pool,
        principal.id,
        SCOPE_SUBMIT,
        principal.rate_rps,
        principal.burst,
    )
    .await?;
    if !decision.allowed {
        return Err(AppError::Core(CoreError::RateLimited {
            scope: SCOPE_SUBMIT,
            remaining: decision.tokens,
        }));
    }

    // Create + enqueue atomically.
    let job_id: JobId = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;
    JobRepo::create(&mut *tx, job_id, principal.id, &params).await?;
    QueueRepo::enqueue(&mut *tx, job_id).await?;
    tx.commit().await?;

    // The mapping is recorded only after creation succeeded.
    if let Some(key) = &idem_key {
        IdempotencyRepo::put(&state.pool, principal.id, key, job_id).await?;
    }

    EventRepo::append(
        &state.pool,
        job_id,
        EventLevel::Info,
        "job_submitted",
        &serde_json::json!({
            "request_id": request_id,
            "top_n": params.top_n,
            "weaviate_top_n": params.weaviate_top_n,
            "llm_top_n": params.llm_top_n,
        }),
    )
    .await?;

    tracing::info!(
        job_id = %job_id,
        api_key_id = principal.id,
        top_n = params.top_n,
        "Job submitted",
    );

    Ok(accepted_response(job_id, &request_id, Some(decision.tokens)))
}

/// Build the 202 body, attaching rate-limit headers when a bucket
/// decision was made.
fn accepted_response(job_id: JobId, request_id: &str, remaining: Option<f64>) -> Response {
    let body = serde_json::json!({
        "job_id": job_id,
        "status": "accepted",
        "request_id": request_id,
    });
    let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
    if let Some(remaining) = remaining {
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_SCOPE.clone(), SCOPE_SUBMIT.parse().unwrap());
        let floor = remaining.floor().max(0.0) as i64;
        if let Ok(value) = floor.to_string().parse() {
            headers.insert(X_RATELIMIT_REMAINING.clone(), value);
        }
    }
    response
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// Fetch a job owned by the caller. An ownership mismatch reads the same
/// as a missing job.
pub async fn find_owned_job(
    pool: &scout_db::DbPool,
    job_id: JobId,
    api_key_id: scout_core::types::DbId,
) -> AppResult<PipelineJob> {
    JobRepo::find_owned(pool, job_id, api_key_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job" }))
}

/// GET /pipeline/jobs/{id}
pub async fn get_job(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned_job(&state.pool, job_id, principal.id).await?;
    Ok(Json(DataResponse {
        data: JobProjection::from(job),
    }))
}

/// GET /pipeline/jobs/{id}/results
///
/// 200 with the final artifact once the job is `completed`; 409 before.
pub async fn get_results(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned_job(&state.pool, job_id, principal.id).await?;

    if job.job_status() != JobStatus::Completed {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is {}; results are available once it is completed",
            job.status
        ))));
    }

    let artifact = ArtifactRepo::get(&state.pool, job_id, ArtifactKind::Final)
        .await?
        .ok_or_else(|| AppError::Internal("completed job is missing its final artifact".into()))?;

    Ok(Json(DataResponse { data: artifact.data }))
}

/// GET /pipeline/jobs/{id}/artifacts/{kind}
///
/// `kind` is restricted to `candidates`, `progressive`, `remaining`, and
/// `timing`; anything else is a validation error.
pub async fn get_artifact(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Path((job_id, kind)): Path<(JobId, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = ArtifactKind::parse(&kind)
        .filter(|k| k.is_client_fetchable())
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "artifact kind must be one of: candidates, progressive, remaining, timing (got '{kind}')"
            )))
        })?;

    let _job = find_owned_job(&state.pool, job_id, principal.id).await?;

    let artifact = ArtifactRepo::get(&state.pool, job_id, kind)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Artifact" }))?;

    Ok(Json(DataResponse { data: artifact.data }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /pipeline/jobs/{id}/cancel
///
/// Sets the soft cancellation flag; the engine observes it at its next
/// await point. 409 when the job is already terminal.
pub async fn cancel_job(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let _job = find_owned_job(&state.pool, job_id, principal.id).await?;

    let cancelled = JobRepo::request_cancel(&state.pool, job_id).await?;
    if !cancelled {
        return Err(AppError::Core(CoreError::Conflict(
            "Job is already in a terminal state and cannot be cancelled".into(),
        )));
    }

    EventRepo::append(
        &state.pool,
        job_id,
        EventLevel::Info,
        "cancel_requested",
        &serde_json::json!({}),
    )
    .await?;

    tracing::info!(job_id = %job_id, api_key_id = principal.id, "Cancel requested");

    Ok(Json(DataResponse {
        data: serde_json::json!({"job_id": job_id, "status": "cancel_requested"}),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> StartRequest {
        StartRequest {
            business_description: Some("austin coffee lifestyle creators".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_applied() {
        let params = validate_start(&base_request()).expect("valid");
        assert_eq!(params.top_n, 30);
        assert_eq!(params.weaviate_top_n, 500);
        assert_eq!(params.llm_top_n, 30);
        assert!(!params.strict_location_matching);
        assert!(params.platform.is_none());
    }

    #[test]
    fn empty_description_is_rejected() {
        let mut req = base_request();
        req.business_description = Some("   ".into());
        assert!(matches!(
            validate_start(&req),
            Err(CoreError::Validation(_))
        ));
        req.business_description = None;
        assert!(validate_start(&req).is_err());
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        let mut req = base_request();
        req.top_n = Some(0);
        assert!(validate_start(&req).is_err());
        req.top_n = Some(1001);
        assert!(validate_start(&req).is_err());
        req.top_n = Some(5);
        req.weaviate_top_n = Some(9);
        assert!(validate_start(&req).is_err());
        req.weaviate_top_n = Some(5001);
        assert!(validate_start(&req).is_err());
    }

    #[test]
    fn llm_top_n_must_not_exceed_weaviate_top_n() {
        let mut req = base_request();
        req.weaviate_top_n = Some(50);
        req.llm_top_n = Some(51);
        assert!(validate_start(&req).is_err());
        req.llm_top_n = Some(50);
        assert!(validate_start(&req).is_ok());
    }

    #[test]
    fn inconsistent_follower_bounds_are_rejected() {
        let mut req = base_request();
        req.min_followers = Some(5000);
        req.max_followers = Some(1000);
        assert!(validate_start(&req).is_err());
        req.max_followers = Some(10_000);
        assert!(validate_start(&req).is_ok());
        req.min_followers = Some(-1);
        assert!(validate_start(&req).is_err());
    }

    #[test]
    fn platform_must_be_a_known_tag() {
        let mut req = base_request();
        req.platform = Some("instagram".into());
        assert_eq!(
            validate_start(&req).unwrap().platform,
            Some(Platform::Instagram)
        );
        req.platform = Some("youtube".into());
        assert!(validate_start(&req).is_err());
        req.platform = Some("unknown".into());
        assert!(validate_start(&req).is_err());
    }

    #[test]
    fn idempotency_key_length_is_bounded() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert("idempotency-key", "A1B2".parse().unwrap());
        assert_eq!(idempotency_key(&headers).unwrap().as_deref(), Some("A1B2"));

        headers.insert("idempotency-key", "x".repeat(129).parse().unwrap());
        assert!(idempotency_key(&headers).is_err());
    }
}
