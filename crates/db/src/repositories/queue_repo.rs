//! Repository for the Postgres-backed work queue.
//!
//! Delivery is at-least-once: a claim locks the entry with
//! `FOR UPDATE SKIP LOCKED` (one worker per job at a time), and a worker
//! crash is recovered by the stale-lock reclaim. Attempts are counted at
//! claim time; redelivery backs off exponentially from a 5s base.

use std::time::Duration;

use sqlx::PgPool;

use scout_core::retry::{queue_backoff, QUEUE_MAX_ATTEMPTS};
use scout_core::types::{DbId, JobId};

use crate::models::queue::QueueEntry;

/// Column list for `pipeline_queue` queries.
const COLUMNS: &str = "\
    id, job_id, state, attempts, max_attempts, next_attempt_at, \
    locked_by, locked_at, last_error, enqueued_at, finished_at";

/// Outcome of releasing a claimed entry after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The entry was requeued with backoff.
    Requeued { attempt: i16, delay: Duration },
    /// All attempts are spent; the entry is failed and the job should be
    /// marked terminal by the caller.
    Exhausted,
}

/// Provides enqueue/claim/ack operations for the work queue.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue a job inside the caller's transaction (paired with job
    /// creation so admission is atomic).
    pub async fn enqueue(
        tx: &mut sqlx::PgConnection,
        job_id: JobId,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO pipeline_queue (job_id, max_attempts) \
             VALUES ($1, $2) RETURNING id",
        )
        .bind(job_id)
        .bind(QUEUE_MAX_ATTEMPTS)
        .fetch_one(tx)
        .await
    }

    /// Atomically claim the next due entry for a worker.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same entry; `attempts` is incremented as part of the claim.
    pub async fn claim(
        pool: &PgPool,
        worker_id: &str,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE pipeline_queue \
             SET state = 'running', locked_by = $1, locked_at = NOW(), \
                 attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM pipeline_queue \
                 WHERE state = 'pending' AND next_attempt_at <= NOW() \
                 ORDER BY enqueued_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(worker_id)
            .fetch_optional(pool)
            .await
    }

    /// Acknowledge a claimed entry as done.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE pipeline_queue \
             SET state = 'done', finished_at = NOW(), locked_by = NULL, locked_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Release a claimed entry after a retryable failure. Requeues with
    /// exponential backoff until attempts are exhausted, then fails the
    /// entry permanently.
    pub async fn release_for_retry(
        pool: &PgPool,
        entry: &QueueEntry,
        error: &str,
    ) -> Result<RetryOutcome, sqlx::Error> {
        if entry.attempts >= entry.max_attempts {
            sqlx::query(
                "UPDATE pipeline_queue \
                 SET state = 'failed', last_error = $2, finished_at = NOW(), \
                     locked_by = NULL, locked_at = NULL \
                 WHERE id = $1",
            )
            .bind(entry.id)
            .bind(error)
            .execute(pool)
            .await?;
            return Ok(RetryOutcome::Exhausted);
        }

        let delay = queue_backoff(entry.attempts);
        sqlx::query(
            "UPDATE pipeline_queue \
             SET state = 'pending', last_error = $2, \
                 next_attempt_at = NOW() + ($3 || ' seconds')::interval, \
                 locked_by = NULL, locked_at = NULL \
             WHERE id = $1",
        )
        .bind(entry.id)
        .bind(error)
        .bind(delay.as_secs().to_string())
        .execute(pool)
        .await?;

        Ok(RetryOutcome::Requeued {
            attempt: entry.attempts,
            delay,
        })
    }

    /// Requeue entries stuck in `running` past `stale_after` (worker
    /// crash recovery). Returns the number reclaimed.
    pub async fn reclaim_stale(
        pool: &PgPool,
        stale_after: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pipeline_queue \
             SET state = 'pending', locked_by = NULL, locked_at = NULL, \
                 last_error = 'reclaimed stale lock' \
             WHERE state = 'running' \
               AND locked_at < NOW() - ($1 || ' seconds')::interval",
        )
        .bind(stale_after.as_secs().to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Prune done/failed entries finished before the retention window.
    pub async fn prune_finished(
        pool: &PgPool,
        keep_for: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pipeline_queue \
             WHERE state IN ('done', 'failed') \
               AND finished_at < NOW() - ($1 || ' seconds')::interval",
        )
        .bind(keep_for.as_secs().to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
