//! Auxiliary `/weaviate/search` endpoint.
//!
//! One embedded hybrid search with the same filter, exclusion, and
//! deduplication semantics as pipeline stage 2, returning normalized
//! candidates synchronously.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use scout_core::error::CoreError;
use scout_core::platform::Platform;
use scout_engine::search::merge_candidates;
use scout_providers::vector::{HybridQuery, SearchFilters};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthPrincipal;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default and maximum result counts.
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Default dense/lexical mix for one-shot searches.
const DEFAULT_ALPHA: f64 = 0.75;

/// Request body for `POST /weaviate/search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub alpha: Option<f64>,
    pub platform: Option<String>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    #[serde(default)]
    pub exclude_profile_urls: Vec<String>,
}

/// POST /weaviate/search
pub async fn search(
    AuthPrincipal(_principal): AuthPrincipal,
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> AppResult<impl IntoResponse> {
    let query_text = body.query.trim().to_string();
    if query_text.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "query must be non-empty".into(),
        )));
    }

    let platform = match body.platform.as_deref() {
        None => None,
        Some(p) => match Platform::parse(p) {
            Some(Platform::Unknown) | None => {
                return Err(AppError::Core(CoreError::Validation(format!(
                    "platform must be one of: instagram, tiktok (got '{p}')"
                ))))
            }
            Some(platform) => Some(platform),
        },
    };

    let limit = body.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let vectors = state
        .providers
        .embeddings
        .embed_batch(&[query_text.clone()])
        .await
        .map_err(|e| {
            AppError::Core(CoreError::Upstream {
                service: "embeddings",
                message: e.to_string(),
            })
        })?;
    let vector = vectors.into_iter().next().unwrap_or_default();

    let fetch_limit = limit + body.exclude_profile_urls.len();
    let hybrid = HybridQuery {
        query: query_text,
        vector,
        alpha: body.alpha.unwrap_or(DEFAULT_ALPHA),
        limit: fetch_limit,
        filters: SearchFilters {
            platform,
            min_followers: body.min_followers,
            max_followers: body.max_followers,
        },
    };

    let results = state
        .providers
        .vector
        .hybrid_search(&hybrid)
        .await
        .map_err(|e| {
            AppError::Core(CoreError::Upstream {
                service: "vector_index",
                message: e.to_string(),
            })
        })?;

    let candidates = merge_candidates(vec![results], &body.exclude_profile_urls, limit);

    Ok(Json(DataResponse {
        data: serde_json::json!({"candidates": candidates}),
    }))
}
