//! Job event row model. Events are append-only and id-ordered; the id is
//! the canonical cursor for streaming and batched polling.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::{DbId, JobId, Timestamp};

/// A row from the `pipeline_job_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEvent {
    pub id: DbId,
    pub job_id: JobId,
    pub ts: Timestamp,
    pub level: String,
    pub event_type: String,
    pub data: serde_json::Value,
}
