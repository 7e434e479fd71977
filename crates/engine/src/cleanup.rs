//! Periodic retention sweep.
//!
//! Deletes terminal jobs past the retention window (artifacts and events
//! cascade via foreign keys), expired profile-cache rows, idle rate-limit
//! buckets, expired idempotency keys, and finished queue entries.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use scout_db::repositories::{
    IdempotencyRepo, JobRepo, ProfileCacheRepo, QueueRepo, RateLimitRepo,
};
use scout_db::DbPool;

/// Default job retention, in days.
const DEFAULT_RETENTION_DAYS: i64 = 7;

/// How often the sweep runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(6 * 3600);

/// Finished queue entries are kept this long for inspection.
const QUEUE_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Run the retention sweep loop until `cancel` is triggered.
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    let retention_days: i64 = std::env::var("JOB_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS);

    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Cleanup task started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup task stopping");
                break;
            }
            _ = interval.tick() => {
                sweep(&pool, retention_days).await;
            }
        }
    }
}

async fn sweep(pool: &DbPool, retention_days: i64) {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);

    match JobRepo::delete_terminal_older_than(pool, cutoff).await {
        Ok(n) if n > 0 => tracing::info!(deleted = n, "Cleanup: purged terminal jobs"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Cleanup: job purge failed"),
    }

    match ProfileCacheRepo::delete_expired(pool).await {
        Ok(n) if n > 0 => tracing::info!(deleted = n, "Cleanup: purged expired cache rows"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Cleanup: cache purge failed"),
    }

    match RateLimitRepo::delete_stale(pool).await {
        Ok(n) if n > 0 => tracing::debug!(deleted = n, "Cleanup: evicted idle buckets"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Cleanup: bucket eviction failed"),
    }

    match IdempotencyRepo::delete_expired(pool).await {
        Ok(n) if n > 0 => tracing::debug!(deleted = n, "Cleanup: purged idempotency keys"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Cleanup: idempotency purge failed"),
    }

    match QueueRepo::prune_finished(pool, QUEUE_RETENTION).await {
        Ok(n) if n > 0 => tracing::debug!(deleted = n, "Cleanup: pruned queue entries"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Cleanup: queue prune failed"),
    }
}
