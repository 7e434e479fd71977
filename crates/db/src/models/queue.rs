//! Work-queue entry model.

use serde::Serialize;
use sqlx::FromRow;

use scout_core::types::{DbId, JobId, Timestamp};

/// A row from the `pipeline_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    pub id: DbId,
    pub job_id: JobId,
    pub state: String,
    /// Delivery count; incremented when a worker claims the entry.
    pub attempts: i16,
    pub max_attempts: i16,
    pub next_attempt_at: Timestamp,
    pub locked_by: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub enqueued_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}
