//! Repository for the TTL profile cache.
//!
//! The cache is shared-read across jobs with no per-row exclusion;
//! last-writer-wins on identical keys is acceptable.

use sqlx::PgPool;

use scout_core::platform::Platform;
use scout_core::types::Timestamp;

use crate::models::profile_cache::ProfileCacheEntry;

/// Provides bulk lookup and TTL upsert for cached profiles.
pub struct ProfileCacheRepo;

impl ProfileCacheRepo {
    /// Fetch all unexpired entries for the given cache keys.
    pub async fn bulk_get(
        pool: &PgPool,
        cache_keys: &[String],
    ) -> Result<Vec<ProfileCacheEntry>, sqlx::Error> {
        if cache_keys.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            "SELECT cache_key, normalized_url, platform, raw_data, cached_at, expires_at \
             FROM profile_cache \
             WHERE cache_key = ANY($1) AND expires_at > NOW()",
        )
        .bind(cache_keys)
        .fetch_all(pool)
        .await
    }

    /// Upsert one enriched payload with the given expiry.
    pub async fn upsert(
        pool: &PgPool,
        cache_key: &str,
        normalized_url: &str,
        platform: Platform,
        raw_data: &serde_json::Value,
        expires_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO profile_cache \
                 (cache_key, normalized_url, platform, raw_data, cached_at, expires_at) \
             VALUES ($1, $2, $3, $4, NOW(), $5) \
             ON CONFLICT (cache_key) \
             DO UPDATE SET raw_data = EXCLUDED.raw_data, \
                           cached_at = NOW(), \
                           expires_at = EXCLUDED.expires_at",
        )
        .bind(cache_key)
        .bind(normalized_url)
        .bind(platform.as_str())
        .bind(raw_data)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete expired rows. Returns the number removed.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profile_cache WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
