//! Repository for the `api_keys` table.

use sqlx::PgPool;

use scout_core::types::DbId;

use crate::models::api_key::ApiKey;

/// Column list for `api_keys` queries.
const COLUMNS: &str = "\
    id, name, key_hash, key_prefix, rate_rps, burst, active_cap, \
    monthly_quota_usd, is_admin, last_used_at, created_at, revoked_at";

/// Provides lookup and provisioning operations for API keys.
pub struct ApiKeyRepo;

impl ApiKeyRepo {
    /// Authenticate: find an unrevoked key by its SHA-256 hash.
    pub async fn find_by_hash(
        pool: &PgPool,
        key_hash: &str,
    ) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(key_hash)
            .fetch_optional(pool)
            .await
    }

    /// Stamp `last_used_at`. Best-effort; callers ignore failures.
    pub async fn touch_last_used(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Provision a new key row (operator tooling; the plaintext never
    /// reaches this layer).
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        rate_rps: f64,
        burst: i32,
        active_cap: i32,
        is_admin: bool,
    ) -> Result<ApiKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_keys \
                 (name, key_hash, key_prefix, rate_rps, burst, active_cap, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(name)
            .bind(key_hash)
            .bind(key_prefix)
            .bind(rate_rps)
            .bind(burst)
            .bind(active_cap)
            .bind(is_admin)
            .fetch_one(pool)
            .await
    }

    /// Revoke a key. Revoked keys fail authentication immediately.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
