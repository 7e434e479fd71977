//! Repository for the append-only `pipeline_job_events` log.
//!
//! Rows are only ever inserted; the BIGSERIAL id is the canonical cursor.
//! Readers polling with `id > after` see a prefix-consistent, idempotent
//! view.

use sqlx::PgPool;

use scout_core::status::EventLevel;
use scout_core::types::{DbId, JobId};

use crate::models::event::JobEvent;

/// Maximum events returned per batched read.
pub const MAX_BATCH: i64 = 200;

/// Provides append and cursor-read operations for job events.
pub struct EventRepo;

impl EventRepo {
    /// Append one event, returning its id.
    pub async fn append(
        pool: &PgPool,
        job_id: JobId,
        level: EventLevel,
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO pipeline_job_events (job_id, level, event_type, data) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(job_id)
        .bind(level.as_str())
        .bind(event_type)
        .bind(data)
        .fetch_one(pool)
        .await
    }

    /// Read events with `id > after` in ascending id order, up to `limit`
    /// (clamped to [`MAX_BATCH`]).
    pub async fn list_after(
        pool: &PgPool,
        job_id: JobId,
        after: DbId,
        limit: i64,
    ) -> Result<Vec<JobEvent>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, job_id, ts, level, event_type, data \
             FROM pipeline_job_events \
             WHERE job_id = $1 AND id > $2 \
             ORDER BY id ASC \
             LIMIT $3",
        )
        .bind(job_id)
        .bind(after)
        .bind(limit.clamp(1, MAX_BATCH))
        .fetch_all(pool)
        .await
    }
}
