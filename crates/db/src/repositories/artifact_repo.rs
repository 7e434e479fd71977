//! Repository for the `pipeline_job_artifacts` table.
//!
//! Artifacts are upserted idempotently on `(job_id, kind)`; `updated_at`
//! is refreshed on every write and is therefore non-decreasing.

use sqlx::PgPool;

use scout_core::status::ArtifactKind;
use scout_core::types::JobId;

use crate::models::artifact::JobArtifact;

/// Provides upsert and read operations for job artifacts.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Idempotent upsert of `(job_id, kind)`.
    pub async fn upsert(
        pool: &PgPool,
        job_id: JobId,
        kind: ArtifactKind,
        data: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO pipeline_job_artifacts (job_id, kind, data, updated_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (job_id, kind) \
             DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(job_id)
        .bind(kind.to_key())
        .bind(data)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Fetch one artifact by kind.
    pub async fn get(
        pool: &PgPool,
        job_id: JobId,
        kind: ArtifactKind,
    ) -> Result<Option<JobArtifact>, sqlx::Error> {
        sqlx::query_as(
            "SELECT job_id, kind, data, updated_at \
             FROM pipeline_job_artifacts WHERE job_id = $1 AND kind = $2",
        )
        .bind(job_id)
        .bind(kind.to_key())
        .fetch_optional(pool)
        .await
    }

    /// Fetch every `batch:N` artifact for a job, ordered by batch index.
    /// Indices are assigned at plan time, so this ordering makes the
    /// downstream merge deterministic.
    pub async fn list_batches(
        pool: &PgPool,
        job_id: JobId,
    ) -> Result<Vec<JobArtifact>, sqlx::Error> {
        sqlx::query_as(
            "SELECT job_id, kind, data, updated_at \
             FROM pipeline_job_artifacts \
             WHERE job_id = $1 AND kind LIKE 'batch:%' \
             ORDER BY split_part(kind, ':', 2)::int ASC",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }
}
