//! Pipeline job row model and the persisted request parameters.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use scout_core::platform::Platform;
use scout_core::status::{JobStatus, Stage};
use scout_core::types::{DbId, JobId, Timestamp};

/// A row from the `pipeline_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineJob {
    pub job_id: JobId,
    pub api_key_id: DbId,
    pub status: String,
    pub current_stage: String,
    pub progress: i16,
    pub params: serde_json::Value,
    pub meta: serde_json::Value,
    pub error: Option<serde_json::Value>,
    pub cancel_requested: bool,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl PipelineJob {
    /// Typed view of the TEXT status column. Unknown values (which would
    /// indicate operator tampering) read as terminal `Error`.
    pub fn job_status(&self) -> JobStatus {
        JobStatus::parse(&self.status).unwrap_or(JobStatus::Error)
    }

    pub fn stage(&self) -> Stage {
        Stage::parse(&self.current_stage).unwrap_or(Stage::None)
    }

    /// Decode the persisted request parameters.
    pub fn pipeline_params(&self) -> Result<PipelineParams, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}

/// Validated request parameters persisted in `pipeline_jobs.params`.
///
/// Bounds are enforced at admission; the engine trusts this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    pub business_description: String,
    /// Number of profiles requested in the final ranking.
    pub top_n: i32,
    /// Vector-search candidate pool size.
    pub weaviate_top_n: i32,
    /// Target size of the scored shortlist; also the adaptive-stop target.
    pub llm_top_n: i32,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    pub platform: Option<Platform>,
    #[serde(default)]
    pub exclude_profile_urls: Vec<String>,
    #[serde(default)]
    pub strict_location_matching: bool,
}

/// Client-facing projection of a job row (`GET /pipeline/jobs/{id}`).
#[derive(Debug, Clone, Serialize)]
pub struct JobProjection {
    pub job_id: JobId,
    pub status: String,
    pub current_stage: String,
    pub progress: i16,
    pub params: serde_json::Value,
    pub meta: serde_json::Value,
    pub error: Option<serde_json::Value>,
    pub cancel_requested: bool,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl From<PipelineJob> for JobProjection {
    fn from(job: PipelineJob) -> Self {
        JobProjection {
            job_id: job.job_id,
            status: job.status,
            current_stage: job.current_stage,
            progress: job.progress,
            params: job.params,
            meta: job.meta,
            error: job.error,
            cancel_requested: job.cancel_requested,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}
