//! Repository for the `external_calls` ledger.

use sqlx::PgPool;

use scout_core::types::{DbId, JobId};

use crate::models::external_call::ServiceUsage;

/// Provides append and aggregate operations for the call ledger.
pub struct ExternalCallRepo;

impl ExternalCallRepo {
    /// Record one outbound service invocation.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        pool: &PgPool,
        job_id: Option<JobId>,
        api_key_id: Option<DbId>,
        service: &str,
        operation: &str,
        duration_ms: i64,
        status: &str,
        cost_usd: f64,
        meta: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO external_calls \
                 (job_id, api_key_id, service, operation, duration_ms, status, cost_usd, meta) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(job_id)
        .bind(api_key_id)
        .bind(service)
        .bind(operation)
        .bind(duration_ms)
        .bind(status)
        .bind(cost_usd)
        .bind(meta)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Per-service aggregates for the admin usage view.
    pub async fn usage_by_service(pool: &PgPool) -> Result<Vec<ServiceUsage>, sqlx::Error> {
        sqlx::query_as(
            "SELECT service, \
                    COUNT(*) AS calls, \
                    COALESCE(SUM(duration_ms), 0)::BIGINT AS total_duration_ms, \
                    COALESCE(SUM(cost_usd), 0)::DOUBLE PRECISION AS total_cost_usd \
             FROM external_calls \
             GROUP BY service \
             ORDER BY total_cost_usd DESC",
        )
        .fetch_all(pool)
        .await
    }
}
