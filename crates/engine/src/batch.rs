//! Per-batch processing: normalize, score, publish, account.
//!
//! The routine is shared between Phase A (cache batches) and Phase B
//! (downloaded snapshots). Scoring fans out per profile behind the
//! process-wide 100-permit bound, with two retries and a fit-0 default so
//! a single bad profile never fails its batch.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;

use scout_core::profiles::{ProfileRecord, ScoredProfile};
use scout_core::scoring::{
    fit_from_score, is_inactive, GOOD_FIT_THRESHOLD, INACTIVE_RATIONALE,
};
use scout_core::retry::{scoring_backoff, SCORING_MAX_RETRIES};
use scout_core::status::ArtifactKind;
use scout_core::urls::profile_cache_key;
use scout_db::models::job::{PipelineJob, PipelineParams};
use scout_db::repositories::{ArtifactRepo, JobRepo, ProfileCacheRepo};
use scout_providers::scoring::ScoringModel;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::{ensure_active, JobLog};
use crate::finalize::merge_batch_artifacts;
use crate::normalize::{normalize_profile, render_profile_text};
use crate::plan::PlannedBatch;
use crate::stats::RunStats;

/// Progress span covered by the enrichment + scoring stages (50 → 95).
const PROGRESS_ENRICH_BASE: i16 = 50;
const PROGRESS_ENRICH_SPAN: i16 = 45;

// ---------------------------------------------------------------------------
// Scoring fan-out (database-free)
// ---------------------------------------------------------------------------

/// Score one profile with retries. Inactive profiles short-circuit to
/// fit 0 without consulting the model; exhausted retries also default to
/// fit 0 with an explanatory rationale.
async fn score_one(
    scoring: Arc<dyn ScoringModel>,
    permits: Arc<Semaphore>,
    profile: ProfileRecord,
    description: String,
    strict_location: bool,
    now: DateTime<Utc>,
) -> ScoredProfile {
    if is_inactive(profile.newest_post_at(), now) {
        return ScoredProfile {
            fit_score: 0,
            fit_rationale: INACTIVE_RATIONALE.to_string(),
            fit_summary: format!(
                "{} has no recent activity",
                profile.display_name.as_deref().unwrap_or(&profile.profile_url)
            ),
            profile,
        };
    }

    let profile_text = render_profile_text(&profile);
    let _permit = permits.acquire().await.expect("scoring semaphore closed");

    let mut attempt = 0u32;
    loop {
        match scoring
            .score_profile(&profile_text, &description, strict_location)
            .await
        {
            Ok(raw) => {
                return ScoredProfile {
                    fit_score: fit_from_score(raw.score),
                    fit_rationale: raw.rationale,
                    fit_summary: raw.summary,
                    profile,
                };
            }
            Err(err) if attempt < SCORING_MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    profile_url = %profile.profile_url,
                    attempt,
                    error = %err,
                    "Scoring call failed, retrying",
                );
                tokio::time::sleep(scoring_backoff(attempt)).await;
            }
            Err(err) => {
                return ScoredProfile {
                    fit_score: 0,
                    fit_rationale: format!("scoring failed after retries: {}", err.kind()),
                    fit_summary: String::new(),
                    profile,
                };
            }
        }
    }
}

/// Score a whole batch concurrently, bounded by the shared semaphore.
pub async fn score_batch(
    scoring: Arc<dyn ScoringModel>,
    permits: Arc<Semaphore>,
    profiles: Vec<ProfileRecord>,
    description: &str,
    strict_location: bool,
    now: DateTime<Utc>,
) -> Vec<ScoredProfile> {
    let futures: Vec<_> = profiles
        .into_iter()
        .map(|profile| {
            score_one(
                scoring.clone(),
                permits.clone(),
                profile,
                description.to_string(),
                strict_location,
                now,
            )
        })
        .collect();
    join_all(futures).await
}

/// Sort descending by fit with a stable URL tie-break so merges are
/// deterministic.
pub fn sort_by_fit(profiles: &mut [ScoredProfile]) {
    profiles.sort_by(|a, b| {
        b.fit_score
            .cmp(&a.fit_score)
            .then_with(|| a.profile.profile_url.cmp(&b.profile.profile_url))
    });
}

/// Count profiles at the good-fit threshold.
pub fn count_good(profiles: &[ScoredProfile]) -> usize {
    profiles
        .iter()
        .filter(|p| p.fit_score >= GOOD_FIT_THRESHOLD)
        .count()
}

// ---------------------------------------------------------------------------
// Full per-batch routine
// ---------------------------------------------------------------------------

/// Normalize, score, publish, and account one batch of raw payloads.
pub async fn process_batch(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    batch: &PlannedBatch,
    raws: Vec<Value>,
    stats: &mut RunStats,
    log: &JobLog,
) -> Result<(), EngineError> {
    ensure_active(&ctx.pool, job.job_id).await?;

    let now = Utc::now();
    let profiles: Vec<ProfileRecord> = raws
        .iter()
        .filter_map(|raw| normalize_profile(raw, batch.platform, now))
        .collect();

    let mut scored = score_batch(
        ctx.providers.scoring.clone(),
        ctx.scoring_permits.clone(),
        profiles,
        &params.business_description,
        params.strict_location_matching,
        now,
    )
    .await;
    sort_by_fit(&mut scored);

    let good_in_batch = count_good(&scored);
    let profile_count = scored.len();

    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Batch(batch.index),
        &serde_json::json!({"profiles": scored}),
    )
    .await?;

    // Recompute the progressive ranking from every published batch.
    let batches = ArtifactRepo::list_batches(&ctx.pool, job.job_id).await?;
    let mut merged = merge_batch_artifacts(&batches);
    sort_by_fit(&mut merged);
    merged.truncate(params.llm_top_n as usize);
    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Progressive,
        &serde_json::json!({"profiles": merged, "is_complete": false}),
    )
    .await?;

    stats.batches_completed += 1;
    stats.profiles_scored += profile_count;
    stats.good_found += good_in_batch;
    if !batch.from_cache {
        // Cost accounting counts profiles returned by the provider.
        stats.api_calls += raws.len();
    }

    let progress = PROGRESS_ENRICH_BASE
        + (PROGRESS_ENRICH_SPAN as usize * stats.batches_completed
            / stats.batches_total.max(1)) as i16;
    JobRepo::update_progress(&ctx.pool, job.job_id, progress.min(95)).await?;
    JobRepo::merge_meta(
        &ctx.pool,
        job.job_id,
        &serde_json::json!({
            "enrichment": {
                "batches_total": stats.batches_total,
                "batches_completed": stats.batches_completed,
                "batches_failed": stats.batches_failed,
                "good_found": stats.good_found,
            },
        }),
    )
    .await?;

    log.info(
        "batch_completed",
        serde_json::json!({
            "batch": batch.index,
            "from_cache": batch.from_cache,
            "profiles": profile_count,
            "good_in_batch": good_in_batch,
            "good_found": stats.good_found,
            "progress": progress.min(95),
        }),
    )
    .await?;

    if !batch.from_cache {
        spawn_cache_writeback(ctx, batch.platform, raws);
    }

    Ok(())
}

/// Write fetched raw payloads back into the profile cache. Best-effort:
/// failures are logged, never fatal.
fn spawn_cache_writeback(
    ctx: &EngineContext,
    platform: scout_core::platform::Platform,
    raws: Vec<Value>,
) {
    let pool = ctx.pool.clone();
    let ttl = Duration::days(ctx.config.cache_ttl_days);
    tokio::spawn(async move {
        let now = Utc::now();
        let expires_at = now + ttl;
        for raw in raws {
            let Some(record) = normalize_profile(&raw, platform, now) else {
                continue;
            };
            let key = profile_cache_key(&record.profile_url);
            if let Err(e) = ProfileCacheRepo::upsert(
                &pool,
                &key,
                &record.profile_url,
                record.platform,
                &raw,
                expires_at,
            )
            .await
            {
                tracing::warn!(
                    profile_url = %record.profile_url,
                    error = %e,
                    "Profile cache write-back failed",
                );
            }
        }
    });
}
