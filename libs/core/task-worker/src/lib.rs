//! Task Worker Framework
//!
//! An in-process worker pool for tasks that call a flaky downstream service.
//!
//! ## Features
//!
//! - **Bounded queue**: `submit` waits a bounded time for room, then fails fast
//! - **Worker pool**: `WorkerPool<T, P>` runs a fixed number of workers
//! - **Parking circuit breaker**: tasks are held, not failed, while the
//!   downstream service is down, and resubmitted when it recovers
//! - **Health monitor**: periodic probe that closes the breaker
//! - **Prometheus metrics** and **health endpoints**
//!
//! ## Example
//!
//! ```ignore
//! use task_worker::{TaskProcessor, WorkerConfig, WorkerPool, WorkerTask};
//!
//! #[derive(Clone, Debug)]
//! struct MyTask { id: Uuid }
//!
//! impl WorkerTask for MyTask {
//!     fn task_id(&self) -> String { self.id.to_string() }
//! }
//!
//! let pool = WorkerPool::new(MyProcessor::new(), WorkerConfig::new("my-tasks"));
//! pool.start();
//! pool.submit(MyTask { id }).await?;
//! pool.stop().await;
//! ```

mod config;
mod error;
mod health;
pub mod metrics;
mod monitor;
mod queue;
mod resilience;
mod worker;

// Re-export main types
pub use config::WorkerConfig;
pub use error::{ErrorCategory, WorkerError};
pub use health::{HealthState, PoolStatusSource, health_router};
pub use metrics::{WorkerMetrics, init_metrics, render_metrics};
pub use monitor::{HealthMonitor, MonitorCheck};
pub use queue::{TaskQueue, TaskReceiver};
pub use resilience::{CircuitBreaker, CircuitSnapshot, CircuitState, FailureOutcome};
pub use worker::{PoolStatus, TaskProcessor, WorkerPool, WorkerTask};
