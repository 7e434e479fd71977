//! Profile cache row model.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::Timestamp;

/// A row from the `profile_cache` table. `cache_key` is the SHA-256 of the
/// normalized profile URL.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProfileCacheEntry {
    pub cache_key: String,
    pub normalized_url: String,
    pub platform: String,
    pub raw_data: serde_json::Value,
    pub cached_at: Timestamp,
    pub expires_at: Timestamp,
}
