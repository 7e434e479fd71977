//! Server-side token-bucket rate limiter.
//!
//! The refill-and-take runs inside a row-locked transaction so it is
//! atomic against concurrent callers on the same `(principal, scope)`
//! key. The arithmetic itself lives in `scout_core::ratelimit` where it
//! is unit-tested.

use chrono::Utc;
use sqlx::PgPool;

use scout_core::ratelimit::{refill_and_take, BucketDecision, BUCKET_TTL_MS};
use scout_core::types::DbId;

/// Provides the atomic bucket check and the idle-bucket sweep.
pub struct RateLimitRepo;

impl RateLimitRepo {
    /// Refill the `(api_key_id, scope)` bucket and take one token if
    /// available. Missing buckets start full at `burst`.
    pub async fn check_and_take(
        pool: &PgPool,
        api_key_id: DbId,
        scope: &str,
        rate_per_second: f64,
        burst: i32,
    ) -> Result<BucketDecision, sqlx::Error> {
        let now_ms = Utc::now().timestamp_millis();
        let burst = burst.max(1) as f64;

        let mut tx = pool.begin().await?;

        // Ensure the row exists, then lock it for the read-modify-write.
        sqlx::query(
            "INSERT INTO rate_limit_buckets (api_key_id, scope, tokens, updated_at_ms) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (api_key_id, scope) DO NOTHING",
        )
        .bind(api_key_id)
        .bind(scope)
        .bind(burst)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        let (tokens, updated_at_ms): (f64, i64) = sqlx::query_as(
            "SELECT tokens, updated_at_ms FROM rate_limit_buckets \
             WHERE api_key_id = $1 AND scope = $2 \
             FOR UPDATE",
        )
        .bind(api_key_id)
        .bind(scope)
        .fetch_one(&mut *tx)
        .await?;

        let decision = refill_and_take(tokens, updated_at_ms, now_ms, rate_per_second, burst);

        sqlx::query(
            "UPDATE rate_limit_buckets SET tokens = $3, updated_at_ms = $4 \
             WHERE api_key_id = $1 AND scope = $2",
        )
        .bind(api_key_id)
        .bind(scope)
        .bind(decision.tokens)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(decision)
    }

    /// Evict buckets idle for longer than the TTL. Returns the number
    /// removed.
    pub async fn delete_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now().timestamp_millis() - BUCKET_TTL_MS;
        let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE updated_at_ms < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
