use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use webapk_api::config::ServerConfig;
use webapk_api::router::build_app_router;
use webapk_api::state::AppState;
use webapk_db::store::PgStore;
use webapk_pipeline::toolchain::CordovaCli;
use webapk_pipeline::{Orchestrator, PipelineConfig};
use webapk_worker::recovery::fail_interrupted_jobs;
use webapk_worker::{telemetry, BuildDispatcher, DispatcherConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    telemetry::init("webapk_api=debug,webapk_pipeline=debug,webapk_worker=debug,tower_http=debug");

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        embedded_worker = config.embedded_worker,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(webapk_db::DEFAULT_MAX_CONNECTIONS);

    let pool = webapk_db::create_pool(&database_url, max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    webapk_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    webapk_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Pipeline ---
    let store = Arc::new(PgStore::new(pool));
    let toolchain = Arc::new(CordovaCli::new(
        pipeline_config.toolchain_bin.clone(),
        pipeline_config.build_timeout,
    ));
    let orchestrator = Arc::new(
        Orchestrator::new(store.clone(), toolchain, pipeline_config)
            .expect("Failed to build HTTP client for URL probing"),
    );

    // --- Embedded dispatcher ---
    let cancel = CancellationToken::new();
    let (dispatch_handle, dispatcher_task) = if config.embedded_worker {
        fail_interrupted_jobs(&*store)
            .await
            .expect("Startup recovery failed");
        let dispatcher = BuildDispatcher::new(Arc::clone(&orchestrator), &DispatcherConfig::from_env());
        let handle = dispatcher.handle();
        let task = tokio::spawn(dispatcher.run(cancel.clone()));
        (Some(handle), Some(task))
    } else {
        tracing::info!("Builds are run by a standalone worker");
        (None, None)
    };

    // --- App state ---
    let state = AppState {
        orchestrator,
        config: Arc::new(config.clone()),
        dispatcher: dispatch_handle,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    if let Some(task) = dispatcher_task {
        // In-flight builds left behind are failed by recovery on next start.
        if tokio::time::timeout(Duration::from_secs(config.request_timeout_secs), task)
            .await
            .is_err()
        {
            tracing::warn!("Dispatcher did not drain in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
