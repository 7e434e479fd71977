//! Queue consumer loop.
//!
//! Each worker task polls the queue, claims one due entry at a time, and
//! runs the pipeline to a terminal state. Persistence failures release
//! the entry for redelivery with backoff; when attempts are exhausted the
//! job is marked fatal.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scout_core::status::JobStatus;
use scout_db::models::queue::QueueEntry;
use scout_db::repositories::{JobRepo, QueueRepo, RetryOutcome};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::JobLog;
use crate::runner::run_pipeline;

/// Queue polling interval when idle.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Claims older than this are presumed orphaned by a crashed worker.
/// Slightly above the stage-wide timeout so live runs are never stolen.
const STALE_CLAIM_AFTER: Duration = Duration::from_secs(3900);

/// How often the stale-claim reclaim runs.
const RECLAIM_EVERY: u32 = 60;

/// One queue-consuming worker.
pub struct Worker {
    ctx: EngineContext,
    worker_id: String,
}

impl Worker {
    pub fn new(ctx: EngineContext, worker_id: String) -> Self {
        Self { ctx, worker_id }
    }

    /// Run the claim loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(worker_id = %self.worker_id, "Worker started");
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        let mut ticks = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker_id = %self.worker_id, "Worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    ticks = ticks.wrapping_add(1);
                    if ticks % RECLAIM_EVERY == 0 {
                        self.reclaim_stale().await;
                    }
                    // Drain available work before sleeping again.
                    loop {
                        match QueueRepo::claim(&self.ctx.pool, &self.worker_id).await {
                            Ok(Some(entry)) => self.execute(entry).await,
                            Ok(None) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Queue claim failed");
                                break;
                            }
                        }
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Execute one claimed entry to an ack or a retry release.
    async fn execute(&self, entry: QueueEntry) {
        tracing::info!(
            worker_id = %self.worker_id,
            job_id = %entry.job_id,
            attempt = entry.attempts,
            "Job claimed",
        );

        match run_pipeline(&self.ctx, entry.job_id).await {
            Ok(()) => {
                if let Err(e) = QueueRepo::complete(&self.ctx.pool, entry.id).await {
                    tracing::error!(job_id = %entry.job_id, error = %e, "Queue ack failed");
                }
            }
            Err(err) => self.release(entry, err).await,
        }
    }

    /// Release a failed delivery for redelivery, or mark the job fatal
    /// once attempts are exhausted.
    async fn release(&self, entry: QueueEntry, err: EngineError) {
        tracing::warn!(
            job_id = %entry.job_id,
            attempt = entry.attempts,
            error = %err,
            "Pipeline run failed, releasing for retry",
        );

        match QueueRepo::release_for_retry(&self.ctx.pool, &entry, &err.to_string()).await {
            Ok(RetryOutcome::Requeued { attempt, delay }) => {
                tracing::info!(
                    job_id = %entry.job_id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Job requeued with backoff",
                );
            }
            Ok(RetryOutcome::Exhausted) => {
                let error = serde_json::json!({
                    "kind": "fatal",
                    "message": format!("queue attempts exhausted: {err}"),
                });
                match JobRepo::finish(&self.ctx.pool, entry.job_id, JobStatus::Error, Some(&error))
                    .await
                {
                    Ok(true) => {
                        let log = JobLog::new(self.ctx.pool.clone(), entry.job_id);
                        if let Err(e) = log
                            .error(
                                "pipeline_summary",
                                serde_json::json!({"status": "error"}),
                            )
                            .await
                        {
                            tracing::error!(job_id = %entry.job_id, error = %e, "Summary append failed");
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(
                            job_id = %entry.job_id,
                            error = %e,
                            "Failed to mark job fatal after exhausted retries",
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(job_id = %entry.job_id, error = %e, "Queue release failed");
            }
        }
    }

    async fn reclaim_stale(&self) {
        match QueueRepo::reclaim_stale(&self.ctx.pool, STALE_CLAIM_AFTER).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(reclaimed = n, "Reclaimed stale queue claims"),
            Err(e) => tracing::error!(error = %e, "Stale claim reclaim failed"),
        }
    }
}
