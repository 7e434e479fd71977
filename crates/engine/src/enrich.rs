//! Stages 3/4: cache-first enrichment with interleaved scoring.
//!
//! Phase A processes cache-servable batches sequentially. Phase B runs
//! only if the good-fit target is still unmet: it keeps at most five
//! snapshots in flight with the enrichment provider, polls them every ten
//! seconds (sleeping in ≤500ms slices so cancellation stays responsive),
//! ages out snapshots after five minutes, and processes ready snapshots
//! strictly sequentially because scoring concurrency is a global cap.
//! In-flight slots are topped up before downloads so trigger latency and
//! download latency overlap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use scout_core::profiles::Candidate;
use scout_core::status::Stage;
use scout_core::urls::profile_cache_key;
use scout_db::models::job::{PipelineJob, PipelineParams};
use scout_db::repositories::{JobRepo, ProfileCacheRepo};
use scout_providers::enrichment::SnapshotStatus;

use crate::batch::process_batch;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::{ensure_active, JobLog};
use crate::plan::{build_plan, PlannedBatch};
use crate::stats::RunStats;

/// Cap on snapshots in flight with the provider.
pub const MAX_IN_FLIGHT: usize = 5;

/// Delay between snapshot progress polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A snapshot in flight longer than this is marked timed out.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on the whole enrichment stage.
pub const STAGE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Sleeps yield in slices of this size so `cancel_requested` is observed
/// within half a second.
const CANCEL_SLICE: Duration = Duration::from_millis(500);

/// How many batches may be triggered right now. Zero once the adaptive
/// stop target is met.
pub fn top_up_capacity(
    in_flight: usize,
    pending: usize,
    good_found: usize,
    target_good: usize,
) -> usize {
    if good_found >= target_good {
        return 0;
    }
    MAX_IN_FLIGHT.saturating_sub(in_flight).min(pending)
}

/// Whether a snapshot has exceeded its in-flight lifetime.
pub fn snapshot_aged_out(age: Duration) -> bool {
    age >= SNAPSHOT_TIMEOUT
}

/// Bookkeeping for one triggered snapshot.
struct InFlightSnapshot {
    batch: PlannedBatch,
    snapshot_id: String,
    triggered_at: Instant,
}

pub async fn run(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    candidates: Vec<Candidate>,
    log: &JobLog,
) -> Result<RunStats, EngineError> {
    JobRepo::set_stage(&ctx.pool, job.job_id, Stage::Enrichment).await?;
    log.info(
        "stage_started",
        serde_json::json!({"stage": Stage::Enrichment.as_str()}),
    )
    .await?;

    // --- Plan construction -------------------------------------------------
    ensure_active(&ctx.pool, job.job_id).await?;

    let keys: Vec<String> = candidates
        .iter()
        .map(|c| profile_cache_key(&c.profile_url))
        .collect();
    let cached_rows = ProfileCacheRepo::bulk_get(&ctx.pool, &keys).await?;
    let cache_map: HashMap<String, serde_json::Value> = cached_rows
        .into_iter()
        .map(|row| (row.normalized_url, row.raw_data))
        .collect();
    let cached_urls: HashSet<String> = cache_map.keys().cloned().collect();

    let plan = build_plan(&candidates, &cached_urls);
    let target_good = params.llm_top_n as usize;

    let mut stats = RunStats {
        total_candidates: candidates.len(),
        batches_total: plan.total_batches(),
        cache_hits: plan.cache_hits,
        ..Default::default()
    };

    // The plan block is written once; per-batch counters live under their
    // own key so the shallow meta merge never clobbers it.
    JobRepo::merge_meta(
        &ctx.pool,
        job.job_id,
        &serde_json::json!({
            "enrichment_plan": {
                "batches_total": plan.total_batches(),
                "cache_batches": plan.cache_batches.len(),
                "fetch_batches": plan.fetch_batches.len(),
                "cache_hits": plan.cache_hits,
                "uncached": plan.uncached,
                "skipped_unknown": plan.skipped_unknown,
            },
        }),
    )
    .await?;
    log.info(
        "cache_classified",
        serde_json::json!({
            "cache_hits": plan.cache_hits,
            "uncached": plan.uncached,
            "skipped_unknown": plan.skipped_unknown,
            "total_batches": plan.total_batches(),
        }),
    )
    .await?;

    // --- Phase A: cache batches, sequential --------------------------------
    for batch in &plan.cache_batches {
        ensure_active(&ctx.pool, job.job_id).await?;
        let raws: Vec<serde_json::Value> = batch
            .urls
            .iter()
            .filter_map(|url| cache_map.get(url).cloned())
            .collect();
        process_batch(ctx, job, params, batch, raws, &mut stats, log).await?;
    }

    // --- Phase B: bounded provider fan-out ----------------------------------
    if stats.good_found >= target_good {
        if !plan.fetch_batches.is_empty() {
            log.info(
                "enrichment_skipped",
                serde_json::json!({
                    "reason": "good-fit target met from cache",
                    "good_found": stats.good_found,
                    "skipped_batches": plan.fetch_batches.len(),
                }),
            )
            .await?;
        }
    } else if !plan.fetch_batches.is_empty() {
        fetch_phase(ctx, job, params, &plan.fetch_batches, target_good, &mut stats, log)
            .await?;
    }

    // Only a run where no batch yielded usable data fails.
    if stats.batches_total > 0 && stats.batches_completed == 0 {
        return Err(EngineError::fatal(
            Stage::Enrichment,
            "no enrichment batch yielded usable data",
        ));
    }

    Ok(stats)
}

/// Phase B loop: trigger, poll, age out, download, process.
async fn fetch_phase(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    fetch_batches: &[PlannedBatch],
    target_good: usize,
    stats: &mut RunStats,
    log: &JobLog,
) -> Result<(), EngineError> {
    let mut pending: VecDeque<PlannedBatch> = fetch_batches.to_vec().into();
    let mut in_flight: Vec<InFlightSnapshot> = Vec::new();
    let stage_deadline = Instant::now() + STAGE_TIMEOUT;

    loop {
        ensure_active(&ctx.pool, job.job_id).await?;

        if Instant::now() >= stage_deadline {
            let abandoned = in_flight.len() + pending.len();
            stats.batches_failed += abandoned;
            log.warn(
                "enrichment_stage_timeout",
                serde_json::json!({"abandoned_batches": abandoned}),
            )
            .await?;
            return Ok(());
        }

        top_up(ctx, job, &mut pending, &mut in_flight, target_good, stats, log).await?;

        if in_flight.is_empty() {
            // Nothing running and nothing more to trigger: either drained
            // or the adaptive stop fired.
            if pending.is_empty() || stats.good_found >= target_good {
                return Ok(());
            }
            // Every remaining trigger failed this round; wait and retry the
            // queue rather than spinning.
            sleep_observing_cancel(ctx, job, POLL_INTERVAL).await?;
            continue;
        }

        // Poll every in-flight snapshot in parallel.
        let polls = futures::future::join_all(
            in_flight
                .iter()
                .map(|snap| ctx.providers.enrichment.progress(&snap.snapshot_id)),
        )
        .await;

        let mut ready: Vec<String> = Vec::new();
        let mut dropped: Vec<String> = Vec::new();
        for (snap, poll) in in_flight.iter().zip(polls) {
            match poll {
                Ok(SnapshotStatus::Ready) => ready.push(snap.snapshot_id.clone()),
                Ok(SnapshotStatus::Failed) => {
                    stats.batches_failed += 1;
                    log.warn(
                        "batch_failed",
                        serde_json::json!({
                            "batch": snap.batch.index,
                            "snapshot_id": snap.snapshot_id,
                            "reason": "provider reported failure",
                        }),
                    )
                    .await?;
                    dropped.push(snap.snapshot_id.clone());
                }
                Ok(SnapshotStatus::Running) | Ok(SnapshotStatus::Unknown(_)) | Err(_) => {
                    if snapshot_aged_out(snap.triggered_at.elapsed()) {
                        stats.batches_failed += 1;
                        log.warn(
                            "snapshot_timeout",
                            serde_json::json!({
                                "batch": snap.batch.index,
                                "snapshot_id": snap.snapshot_id,
                                "in_flight_secs": snap.triggered_at.elapsed().as_secs(),
                            }),
                        )
                        .await?;
                        dropped.push(snap.snapshot_id.clone());
                    }
                }
            }
        }
        in_flight.retain(|snap| !dropped.contains(&snap.snapshot_id));

        // Top up before downloading so trigger latency overlaps download
        // latency.
        top_up(ctx, job, &mut pending, &mut in_flight, target_good, stats, log).await?;

        if ready.is_empty() {
            sleep_observing_cancel(ctx, job, POLL_INTERVAL).await?;
            continue;
        }

        // Process ready snapshots strictly sequentially.
        for snapshot_id in ready {
            ensure_active(&ctx.pool, job.job_id).await?;
            let Some(pos) = in_flight.iter().position(|s| s.snapshot_id == snapshot_id)
            else {
                continue;
            };
            let snap = in_flight.remove(pos);

            match ctx.providers.enrichment.download(&snap.snapshot_id).await {
                Ok(raws) => {
                    process_batch(ctx, job, params, &snap.batch, raws, stats, log).await?;
                }
                Err(err) => {
                    stats.batches_failed += 1;
                    log.warn(
                        "batch_download_failed",
                        serde_json::json!({
                            "batch": snap.batch.index,
                            "snapshot_id": snap.snapshot_id,
                            "error_kind": err.kind(),
                            "message": err.to_string(),
                        }),
                    )
                    .await?;
                }
            }
        }
    }
}

/// Trigger pending batches while slots are free, unless the adaptive stop
/// has fired. A failed trigger counts the batch as failed and moves on.
async fn top_up(
    ctx: &EngineContext,
    job: &PipelineJob,
    pending: &mut VecDeque<PlannedBatch>,
    in_flight: &mut Vec<InFlightSnapshot>,
    target_good: usize,
    stats: &mut RunStats,
    log: &JobLog,
) -> Result<(), EngineError> {
    while top_up_capacity(in_flight.len(), pending.len(), stats.good_found, target_good) > 0 {
        ensure_active(&ctx.pool, job.job_id).await?;
        let batch = pending.pop_front().expect("pending checked non-empty");

        match ctx
            .providers
            .enrichment
            .trigger(&batch.urls, batch.platform)
            .await
        {
            Ok(snapshot_id) => {
                log.info(
                    "enrichment_triggered",
                    serde_json::json!({
                        "batch": batch.index,
                        "platform": batch.platform.as_str(),
                        "url_count": batch.urls.len(),
                        "snapshot_id": snapshot_id,
                    }),
                )
                .await?;
                in_flight.push(InFlightSnapshot {
                    batch,
                    snapshot_id,
                    triggered_at: Instant::now(),
                });
            }
            Err(err) => {
                stats.batches_failed += 1;
                log.warn(
                    "batch_trigger_failed",
                    serde_json::json!({
                        "batch": batch.index,
                        "error_kind": err.kind(),
                        "message": err.to_string(),
                    }),
                )
                .await?;
            }
        }
    }
    Ok(())
}

/// Sleep `total`, yielding in ≤500ms slices and re-checking cancellation
/// between slices.
async fn sleep_observing_cancel(
    ctx: &EngineContext,
    job: &PipelineJob,
    total: Duration,
) -> Result<(), EngineError> {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let slice = remaining.min(CANCEL_SLICE);
        tokio::time::sleep(slice).await;
        ensure_active(&ctx.pool, job.job_id).await?;
        remaining = remaining.saturating_sub(slice);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_up_respects_the_in_flight_cap() {
        assert_eq!(top_up_capacity(0, 10, 0, 5), 5);
        assert_eq!(top_up_capacity(3, 10, 0, 5), 2);
        assert_eq!(top_up_capacity(5, 10, 0, 5), 0);
    }

    #[test]
    fn top_up_is_bounded_by_pending_work() {
        assert_eq!(top_up_capacity(0, 2, 0, 5), 2);
        assert_eq!(top_up_capacity(4, 0, 0, 5), 0);
    }

    #[test]
    fn adaptive_stop_halts_topping_up() {
        assert_eq!(top_up_capacity(0, 10, 5, 5), 0);
        assert_eq!(top_up_capacity(2, 10, 7, 5), 0);
        // One short of the target keeps triggering.
        assert_eq!(top_up_capacity(0, 10, 4, 5), 5);
    }

    #[test]
    fn in_flight_never_exceeds_cap_under_simulation() {
        // Simulate trigger/complete interleavings and assert the invariant.
        let mut in_flight = 0usize;
        let mut pending = 23usize;
        let mut completed = 0usize;
        while pending > 0 || in_flight > 0 {
            let take = top_up_capacity(in_flight, pending, 0, usize::MAX);
            in_flight += take;
            pending -= take;
            assert!(in_flight <= MAX_IN_FLIGHT);
            // One snapshot finishes per round.
            if in_flight > 0 {
                in_flight -= 1;
                completed += 1;
            }
        }
        assert_eq!(completed, 23);
    }

    #[test]
    fn snapshots_age_out_at_the_batch_timeout() {
        assert!(!snapshot_aged_out(Duration::from_secs(299)));
        assert!(snapshot_aged_out(Duration::from_secs(300)));
        assert!(snapshot_aged_out(Duration::from_secs(1000)));
    }
}
