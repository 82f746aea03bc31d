//! Core worker traits and the generic `WorkerPool` implementation.
//!
//! This module provides:
//! - `WorkerTask` trait for task payloads
//! - `TaskProcessor` trait for task processors
//! - `WorkerPool` struct running a fixed set of workers over one bounded queue

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::metrics::WorkerMetrics;
use crate::monitor::HealthMonitor;
use crate::queue::{TaskQueue, TaskReceiver};
use crate::resilience::{CircuitBreaker, CircuitSnapshot, FailureOutcome};

/// Trait for task payloads.
///
/// Tasks are immutable values; the pool moves them between the queue, the
/// workers and the breaker's pending list.
pub trait WorkerTask: Clone + Debug + Send + Sync + 'static {
    /// Returns the task ID for logging and tracking.
    fn task_id(&self) -> String;
}

/// Trait for task processors.
///
/// # Example
///
/// ```rust,ignore
/// use task_worker::{TaskProcessor, WorkerError};
///
/// struct InvoiceProcessor {
///     billing: Arc<dyn BillingApi>,
/// }
///
/// #[async_trait]
/// impl TaskProcessor<InvoiceTask> for InvoiceProcessor {
///     async fn process(&self, task: &InvoiceTask) -> Result<(), WorkerError> {
///         self.billing.charge(task.invoice_id).await.map_err(WorkerError::business)
///     }
///
///     async fn health_check(&self) -> Result<(), WorkerError> {
///         self.billing.ping().await.map_err(WorkerError::unavailable)
///     }
///
///     fn name(&self) -> &'static str {
///         "InvoiceProcessor"
///     }
/// }
/// ```
#[async_trait]
pub trait TaskProcessor<T: WorkerTask>: Send + Sync + 'static {
    /// Process a single task.
    ///
    /// Errors are logged and counted by the pool. They never feed the
    /// circuit breaker and the task is not retried.
    async fn process(&self, task: &T) -> Result<(), WorkerError>;

    /// Probe the downstream dependency.
    ///
    /// Runs before every task and on every health monitor tick once the
    /// breaker's reset timeout has elapsed. Default: always healthy.
    async fn health_check(&self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Called when the probe failed and `task` was not processed.
    ///
    /// Use it to persist a failure record. Default: no-op.
    async fn on_unavailable(&self, _task: &T, _error: &WorkerError) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;
}

/// Snapshot of a pool, served by the `/status` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub name: String,
    pub processor: &'static str,
    pub running: bool,
    pub workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub circuit: CircuitSnapshot,
}

/// How a task left the worker when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Completed,
    Parked,
    Requeued,
}

struct PoolRuntime {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Fixed-size pool of workers draining one bounded queue.
///
/// # Type Parameters
///
/// * `T` - The task type (must implement `WorkerTask`)
/// * `P` - The processor type (must implement `TaskProcessor<T>`)
///
/// The pool owns the queue, the circuit breaker and the health monitor.
/// `start` spawns the workers and the monitor; `stop` signals them, aborting
/// any task in flight, and waits for them to exit.
pub struct WorkerPool<T, P>
where
    T: WorkerTask,
    P: TaskProcessor<T>,
{
    config: WorkerConfig,
    processor: Arc<P>,
    queue: TaskQueue<T>,
    receiver: TaskReceiver<T>,
    metrics: WorkerMetrics,
    runtime: Mutex<Option<PoolRuntime>>,
}

impl<T, P> WorkerPool<T, P>
where
    T: WorkerTask,
    P: TaskProcessor<T>,
{
    /// Create a new, stopped pool.
    pub fn new(processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(Arc::new(processor), config)
    }

    /// Create a new, stopped pool with an Arc processor.
    pub fn with_arc_processor(processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = WorkerMetrics::new(config.name.clone());
        let breaker = Arc::new(CircuitBreaker::new(
            config.name.clone(),
            config.failure_threshold,
            config.reset_timeout,
        ));
        let (queue, receiver) = TaskQueue::new(
            config.queue_capacity,
            config.enqueue_timeout,
            breaker,
            metrics.clone(),
        );

        Self {
            config,
            processor,
            queue,
            receiver,
            metrics,
            runtime: Mutex::new(None),
        }
    }

    /// Spawn the workers and the health monitor.
    ///
    /// Returns immediately. Starting a running pool is a no-op.
    pub fn start(&self) {
        let mut runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if runtime.is_some() {
            warn!(pool = %self.config.name, "Worker pool already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(self.config.worker_count + 1);

        for id in 0..self.config.worker_count {
            let worker = Worker {
                id,
                processor: Arc::clone(&self.processor),
                queue: self.queue.clone(),
                receiver: Arc::clone(&self.receiver),
                metrics: self.metrics.clone(),
                task_timeout: self.config.task_timeout,
            };
            handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        }

        let monitor = HealthMonitor::new(
            Arc::clone(&self.processor),
            self.queue.clone(),
            self.metrics.clone(),
            self.config.health_check_interval,
        );
        handles.push(tokio::spawn(monitor.run(shutdown_rx)));

        info!(
            pool = %self.config.name,
            processor = %self.processor.name(),
            workers = self.config.worker_count,
            queue_capacity = self.queue.capacity(),
            failure_threshold = self.config.failure_threshold,
            reset_timeout_secs = self.config.reset_timeout.as_secs(),
            "Worker pool started"
        );

        *runtime = Some(PoolRuntime { shutdown, handles });
    }

    /// Signal shutdown and wait for every worker and the monitor to exit.
    ///
    /// Tasks being executed are abandoned along with their in-flight calls.
    /// Tasks still queued or parked are not processed.
    pub async fn stop(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(PoolRuntime { shutdown, handles }) = runtime else {
            debug!(pool = %self.config.name, "Worker pool not running");
            return;
        };

        info!(pool = %self.config.name, "Stopping worker pool");
        let _ = shutdown.send(true);

        for handle in handles {
            if let Err(e) = handle.await {
                error!(pool = %self.config.name, error = %e, "Worker task panicked");
            }
        }

        let queued = self.queue.depth();
        let parked = self.queue.breaker().pending_count();
        if queued > 0 || parked > 0 {
            warn!(
                pool = %self.config.name,
                queued,
                parked,
                "Worker pool stopped with unprocessed tasks"
            );
        } else {
            info!(pool = %self.config.name, "Worker pool stopped");
        }
    }

    /// Submit a task to the pool.
    ///
    /// Parks the task if the breaker is open, otherwise enqueues it, failing
    /// with [`WorkerError::QueueFull`] after the enqueue timeout.
    pub async fn submit(&self, task: T) -> Result<(), WorkerError> {
        self.queue.submit(task).await
    }

    pub fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            name: self.config.name.clone(),
            processor: self.processor.name(),
            running: self.is_running(),
            workers: self.config.worker_count,
            queue_depth: self.queue.depth(),
            queue_capacity: self.queue.capacity(),
            circuit: self.queue.breaker().snapshot(),
        }
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker<T>> {
        self.queue.breaker()
    }

    /// Get a producer handle for the pool's queue.
    pub fn queue(&self) -> &TaskQueue<T> {
        &self.queue
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

struct Worker<T, P> {
    id: usize,
    processor: Arc<P>,
    queue: TaskQueue<T>,
    receiver: TaskReceiver<T>,
    metrics: WorkerMetrics,
    task_timeout: Duration,
}

impl<T, P> Worker<T, P>
where
    T: WorkerTask,
    P: TaskProcessor<T>,
{
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(pool = %self.metrics.pool(), worker_id = self.id, "Worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => None,
                task = async { self.receiver.lock().await.recv().await } => task,
            };

            let Some(task) = next else {
                break;
            };

            self.metrics.queue_depth(self.queue.depth());
            self.execute(task, &mut shutdown).await;
        }

        debug!(pool = %self.metrics.pool(), worker_id = self.id, "Worker stopped");
    }

    /// Run one task, abandoning it as soon as shutdown is signalled.
    async fn execute(&self, task: T, shutdown: &mut watch::Receiver<bool>) {
        let task_id = task.task_id();
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopped| *stopped) => {
                warn!(worker_id = self.id, task_id = %task_id, "Task aborted by shutdown");
                return;
            }
            result = self.run_task(task) => result,
        };

        match result {
            Ok(TaskOutcome::Completed) => {
                let duration = started.elapsed();
                self.metrics.task_completed(duration);
                debug!(
                    worker_id = self.id,
                    task_id = %task_id,
                    duration_ms = duration.as_millis() as u64,
                    "Task completed"
                );
            }
            Ok(outcome) => {
                debug!(worker_id = self.id, task_id = %task_id, ?outcome, "Task deferred");
            }
            Err(e) => {
                self.metrics.task_failed(e.category());
                error!(
                    worker_id = self.id,
                    task_id = %task_id,
                    processor = %self.processor.name(),
                    error = %e,
                    error_category = %e.category(),
                    "Task failed"
                );
            }
        }
    }

    /// Health check then process, both within one task timeout.
    ///
    /// A health check that outlives the timeout counts as unavailability.
    async fn run_task(&self, task: T) -> Result<TaskOutcome, WorkerError> {
        let deadline = Instant::now() + self.task_timeout;

        match tokio::time::timeout_at(deadline, self.processor.health_check()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.defer(task, e).await,
            Err(_) => {
                let e = WorkerError::unavailable(format!(
                    "health check timed out after {:?}",
                    self.task_timeout
                ));
                return self.defer(task, e).await;
            }
        }

        tokio::time::timeout_at(deadline, self.processor.process(&task))
            .await
            .map_err(|_| WorkerError::Timeout(self.task_timeout))??;

        self.queue.breaker().record_success();
        self.release_held();
        Ok(TaskOutcome::Completed)
    }

    /// Hand a task whose health check failed to the breaker.
    async fn defer(&self, task: T, cause: WorkerError) -> Result<TaskOutcome, WorkerError> {
        let task_id = task.task_id();
        warn!(
            worker_id = self.id,
            task_id = %task_id,
            error = %cause,
            "Downstream service unavailable, task not processed"
        );

        match tokio::time::timeout(self.task_timeout, self.processor.on_unavailable(&task, &cause))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(
                worker_id = self.id,
                task_id = %task_id,
                error = %e,
                "Failed to record unavailability"
            ),
            Err(_) => error!(
                worker_id = self.id,
                task_id = %task_id,
                timeout_ms = self.task_timeout.as_millis() as u64,
                "Recording unavailability timed out"
            ),
        }

        let breaker = self.queue.breaker();
        match breaker.record_failure(task) {
            FailureOutcome::Parked { opened } => {
                if opened {
                    self.metrics.circuit_transition("open");
                }
                self.metrics.task_parked();
                self.metrics.pending_tasks(breaker.pending_count());
                Ok(TaskOutcome::Parked)
            }
            FailureOutcome::BelowThreshold(task) => {
                // Never wait on our own queue: a full queue holds the task instead
                if let Err(e) = self.queue.requeue(task) {
                    self.metrics.task_dropped();
                    return Err(e);
                }
                Ok(TaskOutcome::Requeued)
            }
        }
    }

    /// Put tasks held back by a full queue in line again.
    fn release_held(&self) {
        for task in self.queue.breaker().take_held() {
            let task_id = task.task_id();
            if let Err(e) = self.queue.requeue(task) {
                self.metrics.task_dropped();
                error!(worker_id = self.id, task_id = %task_id, error = %e, "Failed to requeue held task");
            }
        }
    }
}
