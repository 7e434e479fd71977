//! Per-job pipeline runner.
//!
//! Drives the four stages in order, records the timing waterfall, and
//! owns every terminal transition. The terminal write is guarded by the
//! write-once `finish` update, so the `pipeline_summary` event is emitted
//! exactly once per job no matter how deliveries interleave.

use chrono::Utc;

use scout_core::status::{ArtifactKind, JobStatus};
use scout_core::types::JobId;
use scout_db::models::job::{PipelineJob, PipelineParams};
use scout_db::repositories::{ArtifactRepo, JobRepo};

use crate::context::EngineContext;
use crate::enrich;
use crate::error::EngineError;
use crate::events::{ensure_active, JobLog};
use crate::expansion;
use crate::finalize;
use crate::search;
use crate::stats::RunStats;
use crate::timing::Waterfall;

/// Execute one job to a terminal state.
///
/// Returns `Ok` when the job reached a terminal state (including
/// `cancelled` and `error`); only persistence failures propagate, so the
/// worker can release the queue entry for redelivery.
pub async fn run_pipeline(ctx: &EngineContext, job_id: JobId) -> Result<(), EngineError> {
    let Some(job) = JobRepo::find(&ctx.pool, job_id).await? else {
        tracing::warn!(job_id = %job_id, "Queue entry references a missing job");
        return Ok(());
    };

    // Redelivery safety: terminal rows are never re-executed.
    if job.job_status().is_terminal() {
        tracing::debug!(job_id = %job_id, status = %job.status, "Skipping terminal job");
        return Ok(());
    }

    let log = JobLog::new(ctx.pool.clone(), job_id);

    // A cancel that landed before any worker picked the job up terminates
    // it without ever entering `running`.
    if job.cancel_requested {
        if JobRepo::finish(&ctx.pool, job_id, JobStatus::Cancelled, None).await? {
            log.info("pipeline_summary", summary_payload("cancelled", None))
                .await?;
        }
        return Ok(());
    }

    let params = match job.pipeline_params() {
        Ok(params) => params,
        Err(e) => {
            // Params were validated at admission; failing to decode them
            // means the row is unusable and retrying cannot help.
            let error = serde_json::json!({
                "kind": "fatal",
                "message": format!("stored params failed to decode: {e}"),
            });
            if JobRepo::finish(&ctx.pool, job_id, JobStatus::Error, Some(&error)).await? {
                log.error("pipeline_summary", summary_payload("error", None)).await?;
            }
            return Ok(());
        }
    };

    if job.job_status() == JobStatus::Pending && !JobRepo::mark_running(&ctx.pool, job_id).await? {
        // Lost the transition race; re-read and bail if terminal now.
        if let Some(current) = JobRepo::find(&ctx.pool, job_id).await? {
            if current.job_status().is_terminal() {
                return Ok(());
            }
        }
    }

    let job = JobRepo::find(&ctx.pool, job_id)
        .await?
        .ok_or_else(|| EngineError::fatal(scout_core::status::Stage::None, "job row disappeared"))?;

    log.info(
        "job_started",
        serde_json::json!({"attempted_at": Utc::now()}),
    )
    .await?;

    let run_started = job.started_at.unwrap_or_else(Utc::now);
    let mut waterfall = Waterfall::new(run_started);

    match execute_stages(ctx, &job, &params, &log, &mut waterfall).await {
        Ok(stats) => {
            write_timing(ctx, &job, &mut waterfall).await?;
            if JobRepo::finish(&ctx.pool, job_id, JobStatus::Completed, None).await? {
                log.info(
                    "pipeline_summary",
                    summary_payload("completed", Some(&stats)),
                )
                .await?;
            }
            Ok(())
        }
        Err(EngineError::Cancelled) => {
            write_timing(ctx, &job, &mut waterfall).await?;
            if JobRepo::finish(&ctx.pool, job_id, JobStatus::Cancelled, None).await? {
                log.info("pipeline_summary", summary_payload("cancelled", None))
                    .await?;
            }
            tracing::info!(job_id = %job_id, "Job cancelled");
            Ok(())
        }
        Err(EngineError::Fatal { stage, message }) => {
            // Stage-scoped error in meta, then the terminal transition.
            let mut patch = serde_json::Map::new();
            patch.insert(
                stage.as_str().to_string(),
                serde_json::json!({"status": "error", "message": message}),
            );
            JobRepo::merge_meta(&ctx.pool, job_id, &serde_json::Value::Object(patch)).await?;
            write_timing(ctx, &job, &mut waterfall).await?;
            let error = serde_json::json!({
                "kind": "fatal",
                "stage": stage.as_str(),
                "message": message,
            });
            if JobRepo::finish(&ctx.pool, job_id, JobStatus::Error, Some(&error)).await? {
                log.error("pipeline_summary", summary_payload("error", None))
                    .await?;
            }
            tracing::error!(job_id = %job_id, stage = stage.as_str(), error = %message, "Job failed");
            Ok(())
        }
        Err(db @ EngineError::Db(_)) => Err(db),
    }
}

/// The linear stage sequence. Every stage entry re-checks cancellation.
async fn execute_stages(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    log: &JobLog,
    waterfall: &mut Waterfall,
) -> Result<RunStats, EngineError> {
    ensure_active(&ctx.pool, job.job_id).await?;

    waterfall.begin("query_expansion", Utc::now());
    let keywords = expansion::run(ctx, job, &params.business_description, log).await?;
    waterfall.end("query_expansion", Utc::now());

    ensure_active(&ctx.pool, job.job_id).await?;

    waterfall.begin("vector_search", Utc::now());
    let candidates = search::run(ctx, job, params, keywords, log).await?;
    waterfall.end("vector_search", Utc::now());

    ensure_active(&ctx.pool, job.job_id).await?;

    waterfall.begin("enrichment", Utc::now());
    let stats = enrich::run(ctx, job, params, candidates, log).await?;
    waterfall.end("enrichment", Utc::now());

    waterfall.begin("finalize", Utc::now());
    finalize::run(ctx, job, params, &stats, log).await?;
    waterfall.end("finalize", Utc::now());

    Ok(stats)
}

/// Close open spans and publish the `timing` artifact.
async fn write_timing(
    ctx: &EngineContext,
    job: &PipelineJob,
    waterfall: &mut Waterfall,
) -> Result<(), EngineError> {
    let now = Utc::now();
    waterfall.end_open(now);
    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Timing,
        &waterfall.to_artifact(now),
    )
    .await?;
    Ok(())
}

fn summary_payload(status: &str, stats: Option<&RunStats>) -> serde_json::Value {
    match stats {
        Some(stats) => serde_json::json!({
            "status": status,
            "stats": stats.to_pipeline_stats(),
        }),
        None => serde_json::json!({"status": status}),
    }
}
