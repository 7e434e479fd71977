use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_api::config::ServerConfig;
use scout_api::routes;
use scout_api::state::AppState;
use scout_providers::{Providers, ProvidersConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = scout_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    scout_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    scout_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    bootstrap_admin_key(&pool).await;

    // --- Providers ---
    let providers = Providers::from_config(&ProvidersConfig::from_env());
    match providers.vector.ready().await {
        Ok(()) => tracing::info!("Vector index ready"),
        Err(e) => tracing::warn!(error = %e, "Vector index not ready yet; searches will retry"),
    }

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        providers,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        // Runs inside the request-id layers: the header is already set on
        // the request, and error bodies are patched before propagation.
        .layer(axum::middleware::from_fn(
            scout_api::middleware::request_id::inject_request_id,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(&config))
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting admission service");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Provision the first admin key from `BOOTSTRAP_ADMIN_KEY`, if set and
/// not already present. The variable holds the plaintext; only its hash
/// is stored and the value is never logged.
async fn bootstrap_admin_key(pool: &scout_db::DbPool) {
    let Ok(plaintext) = std::env::var("BOOTSTRAP_ADMIN_KEY") else {
        return;
    };
    if plaintext.is_empty() {
        return;
    }

    let hash = scout_core::keys::hash_api_key(&plaintext);
    match scout_db::repositories::ApiKeyRepo::find_by_hash(pool, &hash).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let prefix = &plaintext[..plaintext.len().min(8)];
            match scout_db::repositories::ApiKeyRepo::create(
                pool, "bootstrap-admin", &hash, prefix, 10.0, 20, 10, true,
            )
            .await
            {
                Ok(key) => tracing::info!(api_key_id = key.id, "Bootstrap admin key created"),
                Err(e) => tracing::error!(error = %e, "Bootstrap admin key creation failed"),
            }
        }
        Err(e) => tracing::error!(error = %e, "Bootstrap admin key lookup failed"),
    }
}

/// Wait for SIGINT or SIGTERM so the server shuts down cleanly whether
/// stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS layer. Panics on an invalid configured origin; we want
/// misconfiguration to fail fast at startup.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
