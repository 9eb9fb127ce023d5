use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use webapk_db::store::PgStore;
use webapk_pipeline::toolchain::CordovaCli;
use webapk_pipeline::{Orchestrator, PipelineConfig};
use webapk_worker::recovery::fail_interrupted_jobs;
use webapk_worker::{telemetry, BuildDispatcher, DispatcherConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("webapk_worker=debug,webapk_pipeline=debug");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(webapk_db::DEFAULT_MAX_CONNECTIONS);

    let pool = webapk_db::create_pool(&database_url, max_connections)
        .await
        .context("failed to connect to database")?;
    webapk_db::health_check(&pool)
        .await
        .context("database health check failed")?;
    webapk_db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("Database ready");

    let pipeline_config = PipelineConfig::from_env();
    let dispatcher_config = DispatcherConfig::from_env();
    tracing::info!(
        work_root = %pipeline_config.work_root.display(),
        downloads_dir = %pipeline_config.downloads_dir.display(),
        toolchain = %pipeline_config.toolchain_bin,
        max_concurrent_builds = dispatcher_config.max_concurrent_builds,
        "Loaded worker configuration",
    );

    let store = Arc::new(PgStore::new(pool));
    fail_interrupted_jobs(&*store)
        .await
        .context("startup recovery failed")?;

    let toolchain = Arc::new(CordovaCli::new(
        pipeline_config.toolchain_bin.clone(),
        pipeline_config.build_timeout,
    ));
    let orchestrator = Orchestrator::new(store, toolchain, pipeline_config)
        .context("failed to build orchestrator")?;
    let dispatcher = BuildDispatcher::new(Arc::new(orchestrator), &dispatcher_config);

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(dispatcher.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    worker.await.context("dispatcher task panicked")?;

    tracing::info!("Worker shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
