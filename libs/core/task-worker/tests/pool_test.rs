use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use task_worker::{
    CircuitBreaker, CircuitState, HealthMonitor, MonitorCheck, TaskProcessor, TaskQueue,
    WorkerConfig, WorkerError, WorkerMetrics, WorkerPool, WorkerTask,
};

#[derive(Clone, Debug, PartialEq)]
struct Job(u32);

impl WorkerTask for Job {
    fn task_id(&self) -> String {
        format!("job-{}", self.0)
    }
}

struct ScriptedProcessor {
    healthy: AtomicBool,
    fail_next_health_checks: AtomicUsize,
    fail_processing: AtomicBool,
    hang_health_checks: AtomicBool,
    health_check_delay_ms: AtomicU64,
    process_delay_ms: AtomicU64,
    health_checks: AtomicUsize,
    processed: Mutex<Vec<u32>>,
    unavailable: Mutex<Vec<u32>>,
}

impl ScriptedProcessor {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            fail_next_health_checks: AtomicUsize::new(0),
            fail_processing: AtomicBool::new(false),
            hang_health_checks: AtomicBool::new(false),
            health_check_delay_ms: AtomicU64::new(0),
            process_delay_ms: AtomicU64::new(0),
            health_checks: AtomicUsize::new(0),
            processed: Mutex::new(Vec::new()),
            unavailable: Mutex::new(Vec::new()),
        })
    }

    fn down() -> Arc<Self> {
        let processor = Self::healthy();
        processor.set_healthy(false);
        processor
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn processed(&self) -> Vec<u32> {
        let mut processed = self.processed.lock().unwrap().clone();
        processed.sort_unstable();
        processed
    }

    fn unavailable(&self) -> Vec<u32> {
        self.unavailable.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskProcessor<Job> for ScriptedProcessor {
    async fn process(&self, task: &Job) -> Result<(), WorkerError> {
        self.processed.lock().unwrap().push(task.0);
        let delay = self.process_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_processing.load(Ordering::SeqCst) {
            return Err(WorkerError::business("rejected"));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), WorkerError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.hang_health_checks.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = self.health_check_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let scripted_failure = self
            .fail_next_health_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure || !self.healthy.load(Ordering::SeqCst) {
            return Err(WorkerError::unavailable("connection refused"));
        }
        Ok(())
    }

    async fn on_unavailable(&self, task: &Job, _error: &WorkerError) -> Result<(), WorkerError> {
        self.unavailable.lock().unwrap().push(task.0);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ScriptedProcessor"
    }
}

fn config() -> WorkerConfig {
    WorkerConfig::new("test")
        .with_worker_count(2)
        .with_queue_capacity(10)
        .with_failure_threshold(3)
        .with_reset_timeout(Duration::from_secs(300))
        .with_health_check_interval(Duration::from_secs(30))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test(start_paused = true)]
async fn test_healthy_service_processes_every_task() {
    let processor = ScriptedProcessor::healthy();
    let pool = WorkerPool::with_arc_processor(Arc::clone(&processor), config());
    pool.start();

    for id in 1..=5 {
        pool.submit(Job(id)).await.unwrap();
    }

    wait_until(|| processor.processed().len() == 5).await;
    assert_eq!(processor.processed(), vec![1, 2, 3, 4, 5]);
    assert!(processor.unavailable().is_empty());

    let status = pool.status();
    assert_eq!(status.circuit.state, CircuitState::Closed);
    assert_eq!(status.circuit.consecutive_failures, 0);
    assert_eq!(status.queue_depth, 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_outage_parks_tasks_then_recovers() {
    let processor = ScriptedProcessor::down();
    let pool = WorkerPool::with_arc_processor(Arc::clone(&processor), config());
    pool.start();

    // One task keeps failing its health check until the breaker opens
    pool.submit(Job(1)).await.unwrap();
    wait_until(|| pool.circuit_breaker().is_open()).await;
    assert_eq!(processor.unavailable(), vec![1, 1, 1]);
    assert_eq!(pool.circuit_breaker().pending_count(), 1);

    // While open, submissions are accepted and parked
    for id in 2..=4 {
        pool.submit(Job(id)).await.unwrap();
    }
    assert_eq!(pool.circuit_breaker().pending_count(), 4);
    assert_eq!(pool.status().queue_depth, 0);

    // Still down when the reset timeout elapses: stays open
    tokio::time::sleep(Duration::from_secs(310)).await;
    assert!(pool.circuit_breaker().is_open());
    assert!(processor.processed().is_empty());

    // Recovery is picked up on the next monitor tick
    processor.set_healthy(true);
    tokio::time::sleep(Duration::from_secs(30)).await;
    wait_until(|| processor.processed().len() == 4).await;

    assert_eq!(processor.processed(), vec![1, 2, 3, 4]);
    assert_eq!(pool.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(pool.circuit_breaker().pending_count(), 0);
    assert_eq!(pool.circuit_breaker().failure_count(), 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_rejects_after_enqueue_timeout() {
    let processor = ScriptedProcessor::healthy();
    // Not started: nothing drains the queue
    let pool = WorkerPool::with_arc_processor(
        processor,
        config()
            .with_queue_capacity(2)
            .with_enqueue_timeout(Duration::from_secs(5)),
    );

    pool.submit(Job(1)).await.unwrap();
    pool.submit(Job(2)).await.unwrap();

    let started = tokio::time::Instant::now();
    let err = pool.submit(Job(3)).await.unwrap_err();

    assert!(matches!(err, WorkerError::QueueFull));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(pool.status().queue_depth, 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_success_resets_failure_count() {
    let processor = ScriptedProcessor::healthy();
    processor.fail_next_health_checks.store(2, Ordering::SeqCst);

    let pool = WorkerPool::with_arc_processor(Arc::clone(&processor), config());
    pool.start();
    pool.submit(Job(7)).await.unwrap();

    wait_until(|| processor.processed() == vec![7]).await;
    assert_eq!(processor.unavailable(), vec![7, 7]);
    assert_eq!(pool.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(pool.circuit_breaker().failure_count(), 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_processing_errors_do_not_trip_breaker() {
    let processor = ScriptedProcessor::healthy();
    processor.fail_processing.store(true, Ordering::SeqCst);

    let pool = WorkerPool::with_arc_processor(Arc::clone(&processor), config());
    pool.start();
    for id in 1..=6 {
        pool.submit(Job(id)).await.unwrap();
    }

    wait_until(|| processor.processed().len() == 6).await;
    assert_eq!(pool.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(pool.circuit_breaker().failure_count(), 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_health_check_with_full_queue_keeps_task() {
    let processor = ScriptedProcessor::healthy();
    processor.fail_next_health_checks.store(1, Ordering::SeqCst);
    processor.health_check_delay_ms.store(1000, Ordering::SeqCst);

    let pool = WorkerPool::with_arc_processor(
        Arc::clone(&processor),
        config().with_worker_count(1).with_queue_capacity(1),
    );
    pool.start();

    // The only worker is busy with job 1 while job 2 fills the queue
    pool.submit(Job(1)).await.unwrap();
    wait_until(|| processor.health_checks.load(Ordering::SeqCst) == 1).await;
    pool.submit(Job(2)).await.unwrap();

    wait_until(|| processor.processed().len() == 2).await;
    assert_eq!(processor.processed(), vec![1, 2]);
    assert_eq!(processor.unavailable(), vec![1]);
    assert_eq!(pool.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(pool.circuit_breaker().failure_count(), 0);
    assert_eq!(pool.circuit_breaker().pending_count(), 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_hanging_health_check_opens_breaker() {
    let processor = ScriptedProcessor::healthy();
    processor.hang_health_checks.store(true, Ordering::SeqCst);

    let pool = WorkerPool::with_arc_processor(
        Arc::clone(&processor),
        config().with_task_timeout(Duration::from_secs(10)),
    );
    pool.start();
    pool.submit(Job(1)).await.unwrap();

    // Three attempts, each cut off at the task timeout
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(pool.circuit_breaker().is_open());
    assert_eq!(pool.circuit_breaker().pending_count(), 1);
    assert_eq!(processor.unavailable(), vec![1, 1, 1]);
    assert!(processor.processed().is_empty());

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_task_in_flight() {
    let processor = ScriptedProcessor::healthy();
    processor.process_delay_ms.store(50_000, Ordering::SeqCst);

    let pool = WorkerPool::with_arc_processor(Arc::clone(&processor), config());
    pool.start();
    pool.submit(Job(1)).await.unwrap();
    wait_until(|| processor.processed() == vec![1]).await;

    let started = tokio::time::Instant::now();
    pool.stop().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!pool.is_running());
}

#[tokio::test]
async fn test_start_is_idempotent_and_stop_joins() {
    let pool = WorkerPool::with_arc_processor(ScriptedProcessor::healthy(), config());
    assert!(!pool.is_running());

    pool.start();
    pool.start();
    assert!(pool.is_running());
    assert!(pool.status().running);

    pool.stop().await;
    assert!(!pool.is_running());

    // Stopping twice is harmless
    pool.stop().await;
}

fn standalone(
    processor: Arc<ScriptedProcessor>,
) -> (HealthMonitor<Job, ScriptedProcessor>, TaskQueue<Job>, task_worker::TaskReceiver<Job>) {
    let breaker = Arc::new(CircuitBreaker::new("test", 3, Duration::from_secs(300)));
    let (queue, receiver) = TaskQueue::new(
        100,
        Duration::from_secs(5),
        breaker,
        WorkerMetrics::new("test"),
    );
    let monitor = HealthMonitor::new(
        processor,
        queue.clone(),
        WorkerMetrics::new("test"),
        Duration::from_secs(30),
    );
    (monitor, queue, receiver)
}

#[tokio::test(start_paused = true)]
async fn test_monitor_never_closes_before_reset_timeout() {
    let processor = ScriptedProcessor::healthy();
    let (monitor, queue, _receiver) = standalone(Arc::clone(&processor));

    for id in 0..3 {
        let _ = queue.breaker().record_failure(Job(id));
    }
    assert!(queue.breaker().is_open());

    // Healthy service, but the timeout has not elapsed
    assert_eq!(monitor.check().await, MonitorCheck::Idle);
    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(monitor.check().await, MonitorCheck::Idle);
    assert!(queue.breaker().is_open());
    assert_eq!(processor.health_checks.load(Ordering::SeqCst), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(
        monitor.check().await,
        MonitorCheck::Closed {
            resubmitted: 1,
            dropped: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_monitor_resubmits_each_parked_task_once() {
    let processor = ScriptedProcessor::down();
    let (monitor, queue, receiver) = standalone(Arc::clone(&processor));

    for id in 0..3 {
        let _ = queue.breaker().record_failure(Job(id));
    }
    for id in 3..20 {
        queue.submit(Job(id)).await.unwrap();
    }
    assert_eq!(queue.breaker().pending_count(), 18);

    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(monitor.check().await, MonitorCheck::StillUnavailable);
    assert!(queue.breaker().is_open());

    processor.set_healthy(true);
    assert_eq!(
        monitor.check().await,
        MonitorCheck::Closed {
            resubmitted: 18,
            dropped: 0
        }
    );

    let mut rx = receiver.lock().await;
    let mut received = Vec::new();
    while let Ok(job) = rx.try_recv() {
        received.push(job.0);
    }
    received.sort_unstable();
    assert_eq!(received, (2..20).collect::<Vec<_>>());

    assert_eq!(monitor.check().await, MonitorCheck::Idle);
}

#[tokio::test]
async fn test_monitor_requeues_held_tasks_while_closed() {
    let processor = ScriptedProcessor::healthy();
    let (monitor, queue, receiver) = standalone(Arc::clone(&processor));

    queue.breaker().hold(Job(1));
    queue.breaker().hold(Job(2));

    assert_eq!(monitor.check().await, MonitorCheck::Released { requeued: 2 });
    assert_eq!(queue.breaker().pending_count(), 0);
    assert_eq!(queue.depth(), 2);
    assert_eq!(processor.health_checks.load(Ordering::SeqCst), 0);

    let mut rx = receiver.lock().await;
    assert_eq!(rx.try_recv().ok(), Some(Job(1)));
    assert_eq!(rx.try_recv().ok(), Some(Job(2)));
    drop(rx);

    assert_eq!(monitor.check().await, MonitorCheck::Idle);
}
