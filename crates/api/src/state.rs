use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via
/// `State<AppState>`. Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: scout_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// External provider handles (used by the auxiliary search endpoint).
    pub providers: scout_providers::Providers,
}
