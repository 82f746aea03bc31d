//! Bounded task queue with breaker-aware submission.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, warn};

use crate::error::WorkerError;
use crate::metrics::WorkerMetrics;
use crate::resilience::CircuitBreaker;

/// Receiving half shared by every worker of a pool.
///
/// Workers take turns holding the lock while they wait for the next task.
pub type TaskReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Producer handle for a bounded queue guarded by a circuit breaker.
///
/// Cloning is cheap; every clone feeds the same channel and breaker.
pub struct TaskQueue<T> {
    sender: mpsc::Sender<T>,
    breaker: Arc<CircuitBreaker<T>>,
    capacity: usize,
    enqueue_timeout: Duration,
    metrics: WorkerMetrics,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            breaker: Arc::clone(&self.breaker),
            capacity: self.capacity,
            enqueue_timeout: self.enqueue_timeout,
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Create a queue of `capacity` slots and the receiver the workers share.
    pub fn new(
        capacity: usize,
        enqueue_timeout: Duration,
        breaker: Arc<CircuitBreaker<T>>,
        metrics: WorkerMetrics,
    ) -> (Self, TaskReceiver<T>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            breaker,
            capacity,
            enqueue_timeout,
            metrics,
        };
        (queue, Arc::new(Mutex::new(receiver)))
    }

    /// Submit a task.
    ///
    /// - breaker open: the task is parked and `Ok(())` is returned at once;
    /// - otherwise the task is queued, waiting at most the enqueue timeout
    ///   for a free slot before returning [`WorkerError::QueueFull`].
    pub async fn submit(&self, task: T) -> Result<(), WorkerError> {
        let task = match self.breaker.park_if_open(task) {
            Ok(()) => {
                self.metrics.task_parked();
                self.metrics.pending_tasks(self.breaker.pending_count());
                debug!(pool = %self.metrics.pool(), "Circuit open, task parked");
                return Ok(());
            }
            Err(task) => task,
        };

        match self.sender.send_timeout(task, self.enqueue_timeout).await {
            Ok(()) => {
                self.metrics.task_enqueued();
                self.metrics.queue_depth(self.depth());
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.metrics.task_rejected();
                warn!(
                    pool = %self.metrics.pool(),
                    capacity = self.capacity,
                    timeout_ms = self.enqueue_timeout.as_millis() as u64,
                    "Task queue full, rejecting task"
                );
                Err(WorkerError::QueueFull)
            }
            Err(SendTimeoutError::Closed(_)) => Err(WorkerError::QueueClosed),
        }
    }

    /// Put a task back without waiting for a slot.
    ///
    /// Used from inside a worker, which must never block on its own queue.
    /// When the breaker is open the task is parked; when the queue is full it
    /// is held by the breaker until a later success or close releases it.
    pub fn requeue(&self, task: T) -> Result<(), WorkerError> {
        let task = match self.breaker.park_if_open(task) {
            Ok(()) => {
                self.metrics.task_parked();
                self.metrics.pending_tasks(self.breaker.pending_count());
                return Ok(());
            }
            Err(task) => task,
        };

        match self.sender.try_send(task) {
            Ok(()) => {
                self.metrics.task_requeued();
                self.metrics.queue_depth(self.depth());
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                self.breaker.hold(task);
                self.metrics.task_parked();
                self.metrics.pending_tasks(self.breaker.pending_count());
                debug!(pool = %self.metrics.pool(), "Task queue full, holding task for retry");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(WorkerError::QueueClosed),
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<T>> {
        &self.breaker
    }
}
