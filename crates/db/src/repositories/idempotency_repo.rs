//! Idempotency key store: `(principal, token) -> job_id` with a 24h TTL.
//!
//! Mappings are written only after job creation succeeds, so a replayed
//! token always resolves to a fully admitted job.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use scout_core::types::{DbId, JobId};

/// Idempotency mappings expire after this many hours.
pub const IDEMPOTENCY_TTL_HOURS: i64 = 24;

/// Provides lookup and insert for idempotency mappings.
pub struct IdempotencyRepo;

impl IdempotencyRepo {
    /// Resolve a token to a prior job id, if the mapping is unexpired.
    pub async fn get(
        pool: &PgPool,
        api_key_id: DbId,
        idem_key: &str,
    ) -> Result<Option<JobId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT job_id FROM idempotency_keys \
             WHERE api_key_id = $1 AND idem_key = $2 AND expires_at > NOW()",
        )
        .bind(api_key_id)
        .bind(idem_key)
        .fetch_optional(pool)
        .await
    }

    /// Record a mapping. On a concurrent duplicate the first writer wins,
    /// matching replay semantics.
    pub async fn put(
        pool: &PgPool,
        api_key_id: DbId,
        idem_key: &str,
        job_id: JobId,
    ) -> Result<(), sqlx::Error> {
        let expires_at = Utc::now() + Duration::hours(IDEMPOTENCY_TTL_HOURS);
        sqlx::query(
            "INSERT INTO idempotency_keys (api_key_id, idem_key, job_id, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (api_key_id, idem_key) DO NOTHING",
        )
        .bind(api_key_id)
        .bind(idem_key)
        .bind(job_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete expired mappings. Returns the number removed.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
