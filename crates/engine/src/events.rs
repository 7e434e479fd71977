//! Job event logging and cancellation checks.
//!
//! [`JobLog`] appends typed rows to the durable event log; SSE and
//! batched readers poll that log, so there is no separate in-process
//! fan-out channel.

use sqlx::PgPool;

use scout_core::status::{EventLevel, JobStatus};
use scout_core::types::JobId;
use scout_db::repositories::{EventRepo, JobRepo};

use crate::error::EngineError;

/// Append-only event writer bound to one job.
#[derive(Clone)]
pub struct JobLog {
    pool: PgPool,
    job_id: JobId,
}

impl JobLog {
    pub fn new(pool: PgPool, job_id: JobId) -> Self {
        Self { pool, job_id }
    }

    pub async fn debug(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        EventRepo::append(&self.pool, self.job_id, EventLevel::Debug, event_type, &data).await?;
        Ok(())
    }

    pub async fn info(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        EventRepo::append(&self.pool, self.job_id, EventLevel::Info, event_type, &data).await?;
        Ok(())
    }

    pub async fn warn(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        EventRepo::append(&self.pool, self.job_id, EventLevel::Warn, event_type, &data).await?;
        Ok(())
    }

    pub async fn error(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        EventRepo::append(&self.pool, self.job_id, EventLevel::Error, event_type, &data).await?;
        Ok(())
    }
}

/// Cancellation check, called before every outbound call, before each
/// batch, and around every sleep. Returns `EngineError::Cancelled` when
/// the soft signal has been set (or the status already flipped).
pub async fn ensure_active(pool: &PgPool, job_id: JobId) -> Result<(), EngineError> {
    match JobRepo::cancel_state(pool, job_id).await? {
        None => Err(EngineError::fatal(
            scout_core::status::Stage::None,
            "job row disappeared mid-run",
        )),
        Some((status, cancel_requested)) => {
            if cancel_requested || status == JobStatus::Cancelled {
                Err(EngineError::Cancelled)
            } else {
                Ok(())
            }
        }
    }
}
