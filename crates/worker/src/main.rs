//! Worker entrypoint: queue consumers plus the retention sweep.
//!
//! Multiple worker processes may run against the same database; the
//! queue's claim statement gives each job to exactly one worker at a
//! time.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_engine::context::{EngineConfig, EngineContext};
use scout_engine::worker::Worker;
use scout_providers::{Providers, ProvidersConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout_worker=debug,scout_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = scout_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    scout_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    scout_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Providers ---
    let providers = Providers::from_config(&ProvidersConfig::from_env());
    match providers.vector.ready().await {
        Ok(()) => tracing::info!("Vector index ready"),
        Err(e) => tracing::warn!(error = %e, "Vector index not ready yet; searches will retry"),
    }

    let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
        .unwrap_or_else(|_| "2".into())
        .parse()
        .expect("WORKER_CONCURRENCY must be a valid usize");

    let ctx = EngineContext::new(pool.clone(), providers, EngineConfig::from_env());
    let cancel = CancellationToken::new();

    // --- Worker loops ---
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".into());
    let mut handles = Vec::new();
    for slot in 0..concurrency {
        let worker = Worker::new(ctx.clone(), format!("{hostname}-{slot}"));
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }
    tracing::info!(concurrency, "Worker loops started");

    // --- Cleanup loop ---
    let cleanup_handle = tokio::spawn(scout_engine::cleanup::run(pool, cancel.clone()));

    // --- Shutdown ---
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping workers");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    let _ = cleanup_handle.await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
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
        () = ctrl_c => {}
        () = terminate => {}
    }
}
