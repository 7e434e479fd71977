//! Stage 1: query expansion.
//!
//! One scoring-model call turns the business description into a small
//! ordered list of keyword queries. A failure here is fatal for the job.

use chrono::Utc;

use scout_core::status::Stage;
use scout_db::models::job::PipelineJob;
use scout_db::repositories::{ExternalCallRepo, JobRepo};
use scout_providers::scoring::expansion_prompt;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::JobLog;

/// Progress reached when expansion completes.
const PROGRESS_EXPANDED: i16 = 10;

pub async fn run(
    ctx: &EngineContext,
    job: &PipelineJob,
    description: &str,
    log: &JobLog,
) -> Result<Vec<String>, EngineError> {
    JobRepo::set_stage(&ctx.pool, job.job_id, Stage::QueryExpansion).await?;
    log.info(
        "stage_started",
        serde_json::json!({"stage": Stage::QueryExpansion.as_str()}),
    )
    .await?;

    let started = Utc::now();
    let result = ctx.providers.scoring.expand_queries(description).await;
    let duration_ms = Utc::now()
        .signed_duration_since(started)
        .num_milliseconds();

    let call_status = if result.is_ok() { "ok" } else { "error" };
    ExternalCallRepo::record(
        &ctx.pool,
        Some(job.job_id),
        Some(job.api_key_id),
        "scoring",
        "expand_queries",
        duration_ms,
        call_status,
        0.0,
        &serde_json::json!({}),
    )
    .await?;

    let queries = match result {
        Ok(queries) => queries,
        Err(err) => {
            log.error(
                "stage_failed",
                serde_json::json!({
                    "stage": Stage::QueryExpansion.as_str(),
                    "error_kind": err.kind(),
                    "message": err.to_string(),
                }),
            )
            .await?;
            return Err(EngineError::fatal(Stage::QueryExpansion, err.to_string()));
        }
    };

    JobRepo::merge_meta(
        &ctx.pool,
        job.job_id,
        &serde_json::json!({
            "query_expansion": {
                "status": "completed",
                "query_count": queries.len(),
                "prompt": expansion_prompt(description),
            },
        }),
    )
    .await?;
    JobRepo::update_progress(&ctx.pool, job.job_id, PROGRESS_EXPANDED).await?;

    log.info(
        "stage_completed",
        serde_json::json!({
            "stage": Stage::QueryExpansion.as_str(),
            "queries": queries,
            "progress": PROGRESS_EXPANDED,
        }),
    )
    .await?;

    Ok(queries)
}
