//! External call ledger models.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::{DbId, JobId, Timestamp};

/// A row from the `external_calls` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExternalCall {
    pub id: DbId,
    pub job_id: Option<JobId>,
    pub api_key_id: Option<DbId>,
    pub service: String,
    pub operation: String,
    pub ts: Timestamp,
    pub duration_ms: i64,
    pub status: String,
    pub cost_usd: f64,
    pub meta: serde_json::Value,
}

/// Per-service aggregate for the admin usage view.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceUsage {
    pub service: String,
    pub calls: i64,
    pub total_duration_ms: i64,
    pub total_cost_usd: f64,
}
