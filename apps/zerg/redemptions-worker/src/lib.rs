//! Redemptions Worker Service
//!
//! Accepts redemption requests over HTTP and executes them in the background
//! against the delegation service.
//!
//! ## Architecture
//!
//! ```text
//! POST /redemptions
//!   ↓ (bounded queue, 503 + Retry-After when full)
//! WorkerPool<RedemptionTask, RedemptionPipeline>
//!   ↓ (health probe → circuit breaker)
//! DelegationService (gRPC)
//!   ↓
//! PostgreSQL (subscription_events, subscriptions)
//! ```
//!
//! ## Features
//!
//! - Fixed worker pool over a bounded in-memory queue
//! - Circuit breaker that parks redemptions while the delegation service is down
//! - Health monitor that drains parked redemptions after recovery
//! - Health, readiness, status and Prometheus endpoints
//! - Graceful shutdown handling

use axum::{routing::get, Json, Router};
use core_config::{
    database::PostgresConfig, server::ServerConfig, Environment, FromEnv,
};
use domain_redemptions::{
    handlers, ApiDoc, GrpcDelegationClient, PgRedemptionRepository, RedemptionConfig,
    RedemptionProcessor,
};
use eyre::{Result, WrapErr};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use task_worker::{health_router, init_metrics, HealthState};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use utoipa::OpenApi;

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

async fn connect_database(config: &PostgresConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    info!(
        max_connections = config.max_connections,
        "Connecting to PostgreSQL..."
    );
    let db = Database::connect(options)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL successfully");

    Ok(db)
}

/// Run the redemptions worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up error reporting, structured logging and metrics
/// 2. Loads server, PostgreSQL and redemption configuration
/// 3. Connects to PostgreSQL and prepares a lazy gRPC channel
/// 4. Starts the worker pool and serves HTTP until SIGINT/SIGTERM
/// 5. Stops the pool, aborting in-flight redemptions
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, the database is
/// unreachable, the delegation service address is malformed, or the HTTP
/// server fails.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    init_metrics();

    info!(name = %APP_NAME, version = %APP_VERSION, ?environment, "Starting redemptions worker service");

    let server_config =
        ServerConfig::from_env().wrap_err("Failed to load server configuration")?;
    let pg_config =
        PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    let redemption_config =
        RedemptionConfig::from_env().wrap_err("Failed to load redemption configuration")?;

    let db = connect_database(&pg_config).await?;

    let client = GrpcDelegationClient::connect_lazy(&redemption_config.delegation)
        .wrap_err("Failed to create delegation service client")?;

    let worker = &redemption_config.worker;
    info!(
        pool = %worker.name,
        workers = worker.worker_count,
        queue_capacity = worker.queue_capacity,
        failure_threshold = worker.failure_threshold,
        reset_timeout_secs = worker.reset_timeout.as_secs(),
        delegation_service = %redemption_config.delegation.addr,
        "Worker configuration loaded"
    );

    let processor = Arc::new(RedemptionProcessor::new(
        Arc::new(PgRedemptionRepository::new(db)),
        Arc::new(client),
        &redemption_config,
    ));
    processor.start();

    let health_state = HealthState::new(processor.clone(), APP_NAME, APP_VERSION);
    let app: Router = health_router(health_state)
        .nest("/redemptions", handlers::router(Arc::clone(&processor)))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    let address = server_config.address();
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind HTTP server to {}", address))?;
    info!(address = %address, "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("HTTP server failed");

    info!("Stopping redemption workers...");
    processor.stop().await;
    served?;

    info!("Redemptions worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
