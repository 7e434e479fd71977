//! Job artifact row model. At most one row per `(job_id, kind)`.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::{JobId, Timestamp};

/// A row from the `pipeline_job_artifacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobArtifact {
    pub job_id: JobId,
    pub kind: String,
    pub data: serde_json::Value,
    pub updated_at: Timestamp,
}
