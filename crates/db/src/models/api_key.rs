//! API key row model and the authenticated principal projection.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::{DbId, Timestamp};

/// A row from the `api_keys` table.
///
/// `key_hash` is never serialized into responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiKey {
    pub id: DbId,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub rate_rps: f64,
    pub burst: i32,
    pub active_cap: i32,
    pub monthly_quota_usd: Option<f64>,
    pub is_admin: bool,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

/// The authenticated principal carried through request handling.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: DbId,
    pub rate_rps: f64,
    pub burst: i32,
    pub active_cap: i32,
    pub is_admin: bool,
}

impl From<&ApiKey> for Principal {
    fn from(key: &ApiKey) -> Self {
        Principal {
            id: key.id,
            rate_rps: key.rate_rps,
            burst: key.burst,
            active_cap: key.active_cap,
            is_admin: key.is_admin,
        }
    }
}
