//! Shared engine context and concurrency bounds.
//!
//! One context is built per worker process at startup and cloned into
//! each job run. The semaphores are process-wide: every scoring call and
//! every vector search in the process passes through them, no matter how
//! many jobs are executing.

use std::sync::Arc;

use tokio::sync::Semaphore;

use scout_db::DbPool;
use scout_providers::Providers;

/// Process-wide cap on concurrent scoring-model calls.
pub const MAX_CONCURRENT_SCORING: usize = 100;

/// Process-wide cap on concurrent vector-index searches.
pub const MAX_CONCURRENT_SEARCHES: usize = 24;

/// Engine tunables loaded from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// TTL for profile-cache write-backs, in days.
    pub cache_ttl_days: i64,
}

impl EngineConfig {
    /// | Env Var          | Default |
    /// |------------------|---------|
    /// | `CACHE_TTL_DAYS` | `14`    |
    pub fn from_env() -> Self {
        let cache_ttl_days: i64 = std::env::var("CACHE_TTL_DAYS")
            .unwrap_or_else(|_| "14".into())
            .parse()
            .expect("CACHE_TTL_DAYS must be a valid i64");
        Self { cache_ttl_days }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { cache_ttl_days: 14 }
    }
}

/// Everything a pipeline run needs: the pool, the four provider handles,
/// and the shared concurrency bounds.
#[derive(Clone)]
pub struct EngineContext {
    pub pool: DbPool,
    pub providers: Providers,
    pub config: EngineConfig,
    /// Bound on concurrent scoring-model calls (capacity 100).
    pub scoring_permits: Arc<Semaphore>,
    /// Bound on concurrent vector searches (capacity 24).
    pub search_permits: Arc<Semaphore>,
}

impl EngineContext {
    pub fn new(pool: DbPool, providers: Providers, config: EngineConfig) -> Self {
        Self {
            pool,
            providers,
            config,
            scoring_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_SCORING)),
            search_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_SEARCHES)),
        }
    }
}
