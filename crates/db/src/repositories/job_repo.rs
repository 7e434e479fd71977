//! Repository for the `pipeline_jobs` table.
//!
//! Jobs are created by the admission service and mutated by the execution
//! engine, except `cancel_requested` which admission may set. Every
//! status write validates the transition through
//! `scout_core::state_machine` and re-checks the status it read in the
//! `UPDATE`, so concurrent writers lose cleanly and a terminal row is
//! write-once regardless of caller interleaving.

use sqlx::PgPool;

use scout_core::state_machine;
use scout_core::status::{JobStatus, Stage};
use scout_core::types::{DbId, JobId, Timestamp};

use crate::models::job::{PipelineJob, PipelineParams};

/// Column list for `pipeline_jobs` queries.
const COLUMNS: &str = "\
    job_id, api_key_id, status, current_stage, progress, params, meta, \
    error, cancel_requested, created_at, started_at, finished_at";

/// Statuses that count against a principal's active-job cap.
const ACTIVE_STATUSES: [&str; 2] = ["pending", "running"];

/// Provides CRUD operations for pipeline jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job inside the caller's transaction.
    pub async fn create(
        tx: &mut sqlx::PgConnection,
        job_id: JobId,
        api_key_id: DbId,
        params: &PipelineParams,
    ) -> Result<PipelineJob, sqlx::Error> {
        let params_json =
            serde_json::to_value(params).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let query = format!(
            "INSERT INTO pipeline_jobs (job_id, api_key_id, params) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PipelineJob>(&query)
            .bind(job_id)
            .bind(api_key_id)
            .bind(params_json)
            .fetch_one(tx)
            .await
    }

    /// Find a job by its id.
    pub async fn find(pool: &PgPool, job_id: JobId) -> Result<Option<PipelineJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pipeline_jobs WHERE job_id = $1");
        sqlx::query_as::<_, PipelineJob>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job owned by the given principal. An ownership mismatch
    /// returns `None`, indistinguishable from a missing row.
    pub async fn find_owned(
        pool: &PgPool,
        job_id: JobId,
        api_key_id: DbId,
    ) -> Result<Option<PipelineJob>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM pipeline_jobs WHERE job_id = $1 AND api_key_id = $2");
        sqlx::query_as::<_, PipelineJob>(&query)
            .bind(job_id)
            .bind(api_key_id)
            .fetch_optional(pool)
            .await
    }

    /// Count the principal's jobs in `{pending, running}` for the
    /// active-job cap check.
    pub async fn count_active(pool: &PgPool, api_key_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM pipeline_jobs \
             WHERE api_key_id = $1 AND status = ANY($2)",
        )
        .bind(api_key_id)
        .bind(&ACTIVE_STATUSES[..])
        .fetch_one(pool)
        .await
    }

    /// Read the current status tag. Unknown values (operator tampering)
    /// read as terminal `Error`.
    async fn current_status(
        pool: &PgPool,
        job_id: JobId,
    ) -> Result<Option<JobStatus>, sqlx::Error> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM pipeline_jobs WHERE job_id = $1")
                .bind(job_id)
                .fetch_optional(pool)
                .await?;
        Ok(status.map(|s| JobStatus::parse(&s).unwrap_or(JobStatus::Error)))
    }

    /// Transition `pending -> running` and stamp `started_at`. The
    /// transition is validated through the core state machine; `false`
    /// means the job was not pending (redelivery after a terminal
    /// transition, or a concurrent cancel).
    pub async fn mark_running(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
        let Some(current) = Self::current_status(pool, job_id).await? else {
            return Ok(false);
        };
        if state_machine::validate_transition(current, JobStatus::Running).is_err() {
            return Ok(false);
        }

        // Re-check the status read above so a concurrent transition loses.
        let result = sqlx::query(
            "UPDATE pipeline_jobs \
             SET status = 'running', started_at = COALESCE(started_at, NOW()) \
             WHERE job_id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(current.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Advance the current stage tag.
    pub async fn set_stage(pool: &PgPool, job_id: JobId, stage: Stage) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE pipeline_jobs SET current_stage = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(stage.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Raise progress to `percent`. `GREATEST` keeps progress monotonic
    /// even if updates arrive out of order.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: JobId,
        percent: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE pipeline_jobs SET progress = GREATEST(progress, $2) WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(percent)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Shallow-merge a JSON patch into the job's meta map.
    pub async fn merge_meta(
        pool: &PgPool,
        job_id: JobId,
        patch: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE pipeline_jobs SET meta = meta || $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(patch)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Set `cancel_requested` unless the job is already terminal.
    /// Cancellability is the state-machine question "could this job still
    /// transition to cancelled"; `false` means it cannot.
    pub async fn request_cancel(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
        let Some(current) = Self::current_status(pool, job_id).await? else {
            return Ok(false);
        };
        if state_machine::validate_transition(current, JobStatus::Cancelled).is_err() {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE pipeline_jobs SET cancel_requested = TRUE \
             WHERE job_id = $1 AND status NOT IN ('completed', 'error', 'cancelled')",
        )
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Read the cancellation flag and status in one round-trip. The engine
    /// calls this at every await point.
    pub async fn cancel_state(
        pool: &PgPool,
        job_id: JobId,
    ) -> Result<Option<(JobStatus, bool)>, sqlx::Error> {
        let row: Option<(String, bool)> = sqlx::query_as(
            "SELECT status, cancel_requested FROM pipeline_jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(status, cancel)| {
            (JobStatus::parse(&status).unwrap_or(JobStatus::Error), cancel)
        }))
    }

    /// Transition into a terminal status, stamping `finished_at` and
    /// forcing progress to 100. The transition is validated through the
    /// core state machine and the `UPDATE` re-checks the status it was
    /// validated against, so terminal states are write-once and the first
    /// caller wins. Returns `false` when no transition was performed.
    pub async fn finish(
        pool: &PgPool,
        job_id: JobId,
        to: JobStatus,
        error: Option<&serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        debug_assert!(to.is_terminal());
        let Some(current) = Self::current_status(pool, job_id).await? else {
            return Ok(false);
        };
        if state_machine::validate_transition(current, to).is_err() {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE pipeline_jobs \
             SET status = $2, error = $3, progress = 100, finished_at = NOW() \
             WHERE job_id = $1 AND status = $4",
        )
        .bind(job_id)
        .bind(to.as_str())
        .bind(error)
        .bind(current.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Admin listing across principals with optional status filter.
    pub async fn list_all(
        pool: &PgPool,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PipelineJob>, sqlx::Error> {
        let query = if status.is_some() {
            format!(
                "SELECT {COLUMNS} FROM pipeline_jobs WHERE status = $3 \
                 ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            )
        } else {
            format!(
                "SELECT {COLUMNS} FROM pipeline_jobs \
                 ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            )
        };

        let mut q = sqlx::query_as::<_, PipelineJob>(&query).bind(limit).bind(offset);
        if let Some(s) = status {
            q = q.bind(s);
        }
        q.fetch_all(pool).await
    }

    /// Delete terminal jobs finished before `cutoff`. Artifacts and events
    /// cascade via foreign keys. Returns the number of jobs removed.
    pub async fn delete_terminal_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pipeline_jobs \
             WHERE status IN ('completed', 'error', 'cancelled') AND finished_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
