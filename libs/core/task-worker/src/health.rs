//! Health check handlers for worker pools.
//!
//! This module provides reusable Axum handlers for:
//! - Liveness probes (`/health`, `/healthz`)
//! - Readiness probes (`/ready`, `/readyz`)
//! - Pool monitoring (`/status`)
//! - Prometheus metrics (`/metrics`)

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::metrics;
use crate::worker::{PoolStatus, TaskProcessor, WorkerPool, WorkerTask};

/// Anything that can report the status of a worker pool.
pub trait PoolStatusSource: Send + Sync + 'static {
    fn pool_status(&self) -> PoolStatus;
}

impl<T, P> PoolStatusSource for WorkerPool<T, P>
where
    T: WorkerTask,
    P: TaskProcessor<T>,
{
    fn pool_status(&self) -> PoolStatus {
        self.status()
    }
}

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Pool being reported on.
    pub pool: Arc<dyn PoolStatusSource>,
    /// Application name.
    pub app_name: String,
    /// Application version.
    pub app_version: String,
}

impl HealthState {
    pub fn new(
        pool: Arc<dyn PoolStatusSource>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            app_name: app_name.into(),
            app_version: app_version.into(),
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status (always "healthy" if responding).
    pub status: String,
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

/// Liveness probe handler.
///
/// Always returns OK if the server is running.
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

/// Readiness probe handler.
///
/// Ready while the pool's workers are running. An open circuit does not make
/// the service unready: submissions are still accepted and parked.
pub async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let status = state.pool.pool_status();
    let body = json!({
        "status": if status.running { "ready" } else { "not_ready" },
        "checks": {
            "workers": if status.running { "ok" } else { "stopped" },
            "circuit": status.circuit.state,
        }
    });

    if status.running {
        Ok((StatusCode::OK, Json(body)))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(body)))
    }
}

/// Pool status handler for monitoring.
///
/// Returns queue depth, worker count and the circuit breaker snapshot.
pub async fn status_handler(State(state): State<HealthState>) -> Json<PoolStatus> {
    Json(state.pool.pool_status())
}

/// Prometheus metrics endpoint handler.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized. Call init_metrics() at startup.".to_string(),
        )
            .into_response(),
    }
}

/// Create a standard health router.
///
/// - `/health`, `/healthz` - Liveness probe
/// - `/ready`, `/readyz` - Readiness probe
/// - `/status` - Pool status
/// - `/metrics` - Prometheus metrics
pub fn health_router(state: HealthState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
