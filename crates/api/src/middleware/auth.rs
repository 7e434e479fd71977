//! API-key authentication extractor.
//!
//! Credentials arrive as `Authorization: Bearer <key>`; the key is
//! SHA-256 hashed and looked up against `api_keys.key_hash`. Revoked keys
//! fail with the same message as unknown keys.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use scout_core::error::CoreError;
use scout_core::keys::hash_api_key;
use scout_db::models::api_key::Principal;
use scout_db::repositories::ApiKeyRepo;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated principal extracted from the API key header.
///
/// Use as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(principal: AuthPrincipal) -> AppResult<Json<()>> {
///     tracing::info!(api_key_id = principal.0.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let key = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <api key>".into(),
            ))
        })?;

        let api_key = ApiKeyRepo::find_by_hash(&state.pool, &hash_api_key(key))
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Invalid or revoked API key".into()))
            })?;

        // Best-effort usage stamp; never blocks the request.
        let pool = state.pool.clone();
        let key_id = api_key.id;
        tokio::spawn(async move {
            if let Err(e) = ApiKeyRepo::touch_last_used(&pool, key_id).await {
                tracing::debug!(api_key_id = key_id, error = %e, "last_used_at stamp failed");
            }
        });

        Ok(AuthPrincipal(Principal::from(&api_key)))
    }
}

/// Admin-gated extractor for the inspector endpoints.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthPrincipal(principal) = AuthPrincipal::from_request_parts(parts, state).await?;
        if !principal.is_admin {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Admin API key required".into(),
            )));
        }
        Ok(RequireAdmin(principal))
    }
}
