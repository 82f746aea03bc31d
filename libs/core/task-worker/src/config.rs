//! Worker pool configuration
//!
//! `WorkerConfig` carries the sizing of the queue and pool together with the
//! circuit breaker thresholds and the cadence of the health monitor.

use std::time::Duration;

/// Configuration for a worker pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pool name, used as the `pool` label on every metric and log line
    pub name: String,

    /// Number of concurrent workers
    pub worker_count: usize,

    /// Maximum number of tasks waiting in the queue
    pub queue_capacity: usize,

    /// How long `submit` waits for room in a full queue
    pub enqueue_timeout: Duration,

    /// Consecutive failed probes before the breaker opens
    pub failure_threshold: u32,

    /// Minimum time the breaker stays open after the last failure
    pub reset_timeout: Duration,

    /// Interval between health monitor ticks
    pub health_check_interval: Duration,

    /// Upper bound for one task, probe included
    pub task_timeout: Duration,
}

impl WorkerConfig {
    /// Create a config with default sizing for the named pool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worker_count: 5,
            queue_capacity: 100,
            enqueue_timeout: Duration::from_secs(5),
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(5 * 60),
            health_check_interval: Duration::from_secs(30),
            task_timeout: Duration::from_secs(60),
        }
    }

    /// Set the number of workers (at least one)
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Set the queue capacity (at least one; tokio channels reject zero)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the enqueue timeout
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Set the breaker failure threshold (at least one)
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the breaker reset timeout
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Set the health monitor interval
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the per-task timeout
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("tasks")
    }
}
