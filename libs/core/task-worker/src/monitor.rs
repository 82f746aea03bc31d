//! Periodic health monitor that closes the circuit breaker.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::metrics::WorkerMetrics;
use crate::queue::TaskQueue;
use crate::worker::{TaskProcessor, WorkerTask};

/// Result of one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCheck {
    /// Breaker closed with nothing held, or open but still inside its reset
    /// timeout.
    Idle,
    /// Breaker closed; tasks held back by a full queue were put back in line.
    Released { requeued: usize },
    /// Reset timeout elapsed but the probe failed; breaker stays open.
    StillUnavailable,
    /// Probe succeeded; breaker closed and parked tasks resubmitted.
    Closed { resubmitted: usize, dropped: usize },
}

/// Probes the downstream service while the breaker is open and closes it on
/// recovery.
pub struct HealthMonitor<T, P> {
    processor: Arc<P>,
    queue: TaskQueue<T>,
    metrics: WorkerMetrics,
    interval: Duration,
}

impl<T, P> HealthMonitor<T, P>
where
    T: WorkerTask,
    P: TaskProcessor<T>,
{
    pub fn new(
        processor: Arc<P>,
        queue: TaskQueue<T>,
        metrics: WorkerMetrics,
        interval: Duration,
    ) -> Self {
        Self {
            processor,
            queue,
            metrics,
            interval,
        }
    }

    /// Tick until shutdown is signalled.
    ///
    /// A check in progress is abandoned on shutdown; parked tasks not yet
    /// resubmitted are dropped with the pool.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        debug!(
            pool = %self.metrics.pool(),
            interval_secs = self.interval.as_secs(),
            "Health monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => break,
                _ = self.check() => {}
            }
        }

        debug!(pool = %self.metrics.pool(), "Health monitor stopped");
    }

    /// Run one monitor check.
    ///
    /// While the breaker is closed, requeues any task a worker held back
    /// because the queue was full. While open, does nothing until the reset
    /// timeout has elapsed. Then probes once: on success closes the breaker
    /// and resubmits every drained task; on failure leaves it open without
    /// touching the last failure time, so the next tick probes again.
    pub async fn check(&self) -> MonitorCheck {
        let breaker = self.queue.breaker();
        if !breaker.is_open() {
            return self.release_held();
        }
        if !breaker.reset_due() {
            return MonitorCheck::Idle;
        }

        if let Err(e) = self.processor.health_check().await {
            warn!(
                pool = %self.metrics.pool(),
                pending_tasks = breaker.pending_count(),
                error = %e,
                "Downstream service still unavailable, circuit stays open"
            );
            return MonitorCheck::StillUnavailable;
        }

        let drained = breaker.close();
        self.metrics.circuit_transition("closed");
        self.metrics.pending_tasks(0);

        let total = drained.len();
        let mut resubmitted = 0;
        let mut dropped = 0;

        for task in drained {
            let task_id = task.task_id();
            match self.queue.submit(task).await {
                Ok(()) => resubmitted += 1,
                Err(e) => {
                    dropped += 1;
                    self.metrics.task_dropped();
                    error!(
                        pool = %self.metrics.pool(),
                        task_id = %task_id,
                        error = %e,
                        "Failed to resubmit parked task"
                    );
                }
            }
        }

        self.metrics.tasks_resubmitted(resubmitted);
        info!(
            pool = %self.metrics.pool(),
            total,
            resubmitted,
            dropped,
            "Downstream service recovered, parked tasks resubmitted"
        );

        MonitorCheck::Closed {
            resubmitted,
            dropped,
        }
    }

    fn release_held(&self) -> MonitorCheck {
        let held = self.queue.breaker().take_held();
        if held.is_empty() {
            return MonitorCheck::Idle;
        }

        let mut requeued = 0;
        for task in held {
            let task_id = task.task_id();
            match self.queue.requeue(task) {
                Ok(()) => requeued += 1,
                Err(e) => {
                    self.metrics.task_dropped();
                    error!(
                        pool = %self.metrics.pool(),
                        task_id = %task_id,
                        error = %e,
                        "Failed to requeue held task"
                    );
                }
            }
        }
        self.metrics.pending_tasks(self.queue.breaker().pending_count());
        debug!(pool = %self.metrics.pool(), requeued, "Held tasks requeued");

        MonitorCheck::Released { requeued }
    }
}
