//! Prometheus metrics for worker pools
//!
//! Every series carries a `pool` label with the pool name.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ErrorCategory;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize Prometheus metrics
///
/// Call this once at startup. Subsequent calls are no-ops. If another global
/// recorder is already installed, a detached handle is kept so `/metrics`
/// still answers (with no series).
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics initialized");
            handle
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });
}

/// Get the Prometheus handle for rendering metrics
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus format
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Worker pool metrics helper
#[derive(Clone, Debug)]
pub struct WorkerMetrics {
    pool: String,
}

impl WorkerMetrics {
    pub fn new(pool: impl Into<String>) -> Self {
        Self { pool: pool.into() }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Record a task accepted onto the queue
    pub fn task_enqueued(&self) {
        counter!("task_worker_tasks_enqueued_total", "pool" => self.pool.clone()).increment(1);
    }

    /// Record a task parked on the open breaker
    pub fn task_parked(&self) {
        counter!("task_worker_tasks_parked_total", "pool" => self.pool.clone()).increment(1);
    }

    /// Record a submit rejected because the queue stayed full
    pub fn task_rejected(&self) {
        counter!("task_worker_tasks_rejected_total", "pool" => self.pool.clone()).increment(1);
    }

    /// Record a task handed back to the queue after a failed probe
    pub fn task_requeued(&self) {
        counter!("task_worker_tasks_requeued_total", "pool" => self.pool.clone()).increment(1);
    }

    /// Record a task completing successfully
    pub fn task_completed(&self, duration: Duration) {
        counter!(
            "task_worker_tasks_processed_total",
            "pool" => self.pool.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!("task_worker_task_duration_seconds", "pool" => self.pool.clone())
            .record(duration.as_secs_f64());
    }

    /// Record a task failing
    pub fn task_failed(&self, category: ErrorCategory) {
        counter!(
            "task_worker_tasks_processed_total",
            "pool" => self.pool.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "task_worker_task_errors_total",
            "pool" => self.pool.clone(),
            "category" => category.as_ref().to_string()
        )
        .increment(1);
    }

    /// Record parked tasks resubmitted after the breaker closed
    pub fn tasks_resubmitted(&self, count: usize) {
        counter!("task_worker_tasks_resubmitted_total", "pool" => self.pool.clone())
            .increment(count as u64);
    }

    /// Record a task lost because it could not be resubmitted
    pub fn task_dropped(&self) {
        counter!("task_worker_tasks_dropped_total", "pool" => self.pool.clone()).increment(1);
    }

    /// Record circuit breaker state change
    pub fn circuit_transition(&self, state: &str) {
        counter!(
            "task_worker_circuit_breaker_transitions_total",
            "pool" => self.pool.clone(),
            "state" => state.to_string()
        )
        .increment(1);
    }

    /// Update queue depth gauge
    pub fn queue_depth(&self, depth: usize) {
        gauge!("task_worker_queue_depth", "pool" => self.pool.clone()).set(depth as f64);
    }

    /// Update parked tasks gauge
    pub fn pending_tasks(&self, count: usize) {
        gauge!("task_worker_pending_tasks", "pool" => self.pool.clone()).set(count as f64);
    }
}
