//! Server configuration loaded from environment variables.

/// All fields have defaults suitable for local development; production
/// overrides them via the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Streaming
    /// endpoints are exempt.
    pub request_timeout_secs: u64,
    /// Active-job cap assigned to newly provisioned keys that do not
    /// specify their own (default: `3`). Each key row's stored cap is
    /// authoritative at submit time.
    pub max_active_jobs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `8080`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `MAX_ACTIVE_JOBS_PER_KEY` | `3`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_active_jobs: i64 = std::env::var("MAX_ACTIVE_JOBS_PER_KEY")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("MAX_ACTIVE_JOBS_PER_KEY must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_active_jobs,
        }
    }
}
