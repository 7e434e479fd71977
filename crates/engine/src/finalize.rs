//! Run finalization: merge every published batch into the definitive
//! ranking and write the `final`, `remaining`, and completed
//! `progressive` artifacts plus the ledger entries.

use scout_core::profiles::ScoredProfile;
use scout_core::status::{ArtifactKind, Stage};
use scout_db::models::artifact::JobArtifact;
use scout_db::models::job::{PipelineJob, PipelineParams};
use scout_db::repositories::{ArtifactRepo, ExternalCallRepo, JobRepo};

use crate::batch::sort_by_fit;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::JobLog;
use crate::stats::RunStats;

/// Decode the `profiles` arrays out of `batch:N` artifacts. Rows that no
/// longer parse (schema drift) are skipped rather than failing the merge.
pub fn merge_batch_artifacts(artifacts: &[JobArtifact]) -> Vec<ScoredProfile> {
    artifacts
        .iter()
        .filter_map(|artifact| artifact.data.get("profiles"))
        .filter_map(|profiles| profiles.as_array())
        .flatten()
        .filter_map(|profile| serde_json::from_value(profile.clone()).ok())
        .collect()
}

pub async fn run(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    stats: &RunStats,
    log: &JobLog,
) -> Result<(), EngineError> {
    JobRepo::set_stage(&ctx.pool, job.job_id, Stage::Scoring).await?;

    let batches = ArtifactRepo::list_batches(&ctx.pool, job.job_id).await?;
    let mut merged = merge_batch_artifacts(&batches);
    sort_by_fit(&mut merged);

    let top_n = params.llm_top_n as usize;
    let remaining: Vec<ScoredProfile> = if merged.len() > top_n {
        merged.split_off(top_n)
    } else {
        Vec::new()
    };
    let final_profiles = merged;

    let pipeline_stats = stats.to_pipeline_stats();

    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Final,
        &serde_json::json!({
            "profiles": &final_profiles,
            "pipeline_stats": pipeline_stats,
        }),
    )
    .await?;

    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Remaining,
        &serde_json::json!({"profiles": &remaining}),
    )
    .await?;

    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Progressive,
        &serde_json::json!({"profiles": &final_profiles, "is_complete": true}),
    )
    .await?;

    // Ledger entries for the two billable collaborators.
    let costs = stats.cost_estimates();
    ExternalCallRepo::record(
        &ctx.pool,
        Some(job.job_id),
        Some(job.api_key_id),
        "enrichment",
        "batch_enrichment",
        0,
        "ok",
        costs.enrichment_usd,
        &serde_json::json!({"profiles_returned": stats.api_calls}),
    )
    .await?;
    ExternalCallRepo::record(
        &ctx.pool,
        Some(job.job_id),
        Some(job.api_key_id),
        "scoring",
        "profile_scoring",
        0,
        "ok",
        costs.scoring_usd,
        &serde_json::json!({"profiles_analyzed": stats.profiles_scored}),
    )
    .await?;

    log.info(
        "results_published",
        serde_json::json!({
            "final_count": final_profiles.len(),
            "remaining_count": remaining.len(),
        }),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_core::platform::Platform;
    use scout_core::profiles::ProfileRecord;
    use scout_core::types::JobId;

    fn scored(url: &str, fit: i32) -> serde_json::Value {
        serde_json::to_value(ScoredProfile {
            profile: ProfileRecord {
                platform: Platform::Instagram,
                account_id: None,
                display_name: None,
                followers: None,
                biography: None,
                profile_url: url.to_string(),
                posts_data: vec![],
            },
            fit_score: fit,
            fit_rationale: "r".into(),
            fit_summary: "s".into(),
        })
        .unwrap()
    }

    fn artifact(kind: &str, profiles: Vec<serde_json::Value>) -> JobArtifact {
        JobArtifact {
            job_id: JobId::nil(),
            kind: kind.to_string(),
            data: serde_json::json!({"profiles": profiles}),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merges_profiles_across_batches() {
        let artifacts = vec![
            artifact("batch:0", vec![scored("https://instagram.com/a", 90)]),
            artifact("batch:1", vec![scored("https://instagram.com/b", 100)]),
        ];
        let merged = merge_batch_artifacts(&artifacts);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn unparseable_rows_are_skipped() {
        let mut bad = artifact("batch:0", vec![scored("https://instagram.com/a", 50)]);
        bad.data["profiles"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"not": "a profile"}));
        let merged = merge_batch_artifacts(&[bad]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_then_sort_ranks_by_fit() {
        let artifacts = vec![
            artifact("batch:0", vec![scored("https://instagram.com/low", 40)]),
            artifact("batch:1", vec![scored("https://instagram.com/top", 100)]),
            artifact("batch:2", vec![scored("https://instagram.com/mid", 70)]),
        ];
        let mut merged = merge_batch_artifacts(&artifacts);
        sort_by_fit(&mut merged);
        let fits: Vec<i32> = merged.iter().map(|p| p.fit_score).collect();
        assert_eq!(fits, vec![100, 70, 40]);
    }
}
