//! Per-run counters feeding job meta, the final artifact, and the
//! external-call ledger.

use serde::Serialize;

use scout_core::scoring::{ENRICHMENT_COST_PER_PROFILE_USD, SCORING_COST_PER_PROFILE_USD};

/// Counters accumulated across the enrichment + scoring stages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_candidates: usize,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub cache_hits: usize,
    /// Profiles returned by the enrichment provider (the cost basis —
    /// deliberately not the number of trigger calls).
    pub api_calls: usize,
    pub profiles_scored: usize,
    pub good_found: usize,
}

/// Cost estimate block for the final artifact and the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimates {
    pub enrichment_usd: f64,
    pub scoring_usd: f64,
    pub total_usd: f64,
}

impl RunStats {
    pub fn cost_estimates(&self) -> CostEstimates {
        let enrichment_usd = self.api_calls as f64 * ENRICHMENT_COST_PER_PROFILE_USD;
        let scoring_usd = self.profiles_scored as f64 * SCORING_COST_PER_PROFILE_USD;
        CostEstimates {
            enrichment_usd,
            scoring_usd,
            total_usd: enrichment_usd + scoring_usd,
        }
    }

    /// The `pipeline_stats` block embedded in the final artifact.
    pub fn to_pipeline_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "total_candidates": self.total_candidates,
            "batches_total": self.batches_total,
            "batches_completed": self.batches_completed,
            "batches_failed": self.batches_failed,
            "cache_hits": self.cache_hits,
            "api_calls": self.api_calls,
            "profiles_scored": self.profiles_scored,
            "good_found": self.good_found,
            "cost_estimates": self.cost_estimates(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_scale_with_profile_counts() {
        let stats = RunStats {
            api_calls: 40,
            profiles_scored: 60,
            ..Default::default()
        };
        let costs = stats.cost_estimates();
        assert!((costs.enrichment_usd - 0.06).abs() < 1e-9);
        assert!((costs.scoring_usd - 0.09).abs() < 1e-9);
        assert!((costs.total_usd - 0.15).abs() < 1e-9);
    }

    #[test]
    fn zero_api_calls_cost_nothing() {
        let stats = RunStats::default();
        assert_eq!(stats.cost_estimates().total_usd, 0.0);
    }
}
