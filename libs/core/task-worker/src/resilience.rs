//! Circuit breaker that parks tasks while a downstream service is unavailable.
//!
//! ## States
//!
//! ```text
//! ┌─────────┐  failed probes >= threshold  ┌────────┐
//! │ CLOSED  │ ───────────────────────────> │  OPEN  │ ── submit parks tasks
//! └─────────┘                              └────────┘
//!      ^                                        │
//!      │   reset timeout elapsed AND            │
//!      │   health monitor probe succeeded       │
//!      └────────────────────────────────────────┘
//!               (pending tasks drained)
//! ```
//!
//! There is no half-open state. Only the health monitor closes the breaker,
//! and closing hands back every parked task in one batch.
//!
//! All state lives behind one `std::sync::Mutex`. Every method takes the lock
//! for a short critical section and releases it before returning, so the lock
//! is never held across an `.await`.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Tasks flow to the workers.
    Closed,
    /// Tasks are parked until the downstream service recovers.
    Open,
}

/// Result of recording a failed probe.
#[derive(Debug)]
pub enum FailureOutcome<T> {
    /// The breaker is open and now owns the task.
    Parked {
        /// `true` when this failure tripped the breaker.
        opened: bool,
    },
    /// The breaker is still closed; the caller keeps the task.
    BelowThreshold(T),
}

/// Point-in-time view of the breaker, for status endpoints and logs.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub pending_tasks: usize,
    /// Time since the last recorded failure while open
    #[serde(with = "duration_secs")]
    pub open_for: Option<Duration>,
}

struct BreakerState<T> {
    is_open: bool,
    consecutive_failures: u32,
    last_failure_time: Option<Instant>,
    pending_tasks: Vec<T>,
}

/// Thread-safe circuit breaker owning the tasks parked while it is open.
pub struct CircuitBreaker<T> {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerState<T>>,
}

impl<T> CircuitBreaker<T> {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: Mutex::new(BreakerState {
                is_open: false,
                consecutive_failures: 0,
                last_failure_time: None,
                pending_tasks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState<T>> {
        // Critical sections only assign fields, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current state.
    pub fn state(&self) -> CircuitState {
        if self.lock().is_open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open
    }

    /// Consecutive failed probes since the last reset.
    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Number of parked tasks.
    pub fn pending_count(&self) -> usize {
        self.lock().pending_tasks.len()
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Park the task if the breaker is open, otherwise hand it back.
    ///
    /// The open check and the push happen under one lock acquisition, so a
    /// task can never be parked on a breaker that has already drained.
    pub fn park_if_open(&self, task: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.is_open {
            state.pending_tasks.push(task);
            Ok(())
        } else {
            Err(task)
        }
    }

    /// Record a failed probe for `task`.
    ///
    /// Increments the failure count and refreshes the last failure time. If
    /// the breaker is open afterwards the task is parked; otherwise it is
    /// returned to the caller.
    pub fn record_failure(&self, task: T) -> FailureOutcome<T> {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_time = Some(Instant::now());

        let mut opened = false;
        if !state.is_open && state.consecutive_failures >= self.failure_threshold {
            state.is_open = true;
            opened = true;
            warn!(
                breaker = %self.name,
                consecutive_failures = state.consecutive_failures,
                reset_timeout_secs = self.reset_timeout.as_secs(),
                "Circuit breaker OPENED"
            );
        }

        if state.is_open {
            state.pending_tasks.push(task);
            FailureOutcome::Parked { opened }
        } else {
            FailureOutcome::BelowThreshold(task)
        }
    }

    /// Record a successful task.
    ///
    /// Resets the failure count while closed. An open breaker is left alone:
    /// only the health monitor closes it.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if !state.is_open {
            state.consecutive_failures = 0;
        }
    }

    /// Whether the breaker is open and the reset timeout has elapsed since the
    /// last failure.
    pub fn reset_due(&self) -> bool {
        let state = self.lock();
        state.is_open
            && state
                .last_failure_time
                .is_none_or(|at| at.elapsed() >= self.reset_timeout)
    }

    /// Close the breaker and take every parked task.
    ///
    /// Closing an already closed breaker returns an empty batch.
    pub fn close(&self) -> Vec<T> {
        let mut state = self.lock();
        if !state.is_open {
            return Vec::new();
        }

        state.is_open = false;
        state.consecutive_failures = 0;
        let drained = std::mem::take(&mut state.pending_tasks);
        info!(
            breaker = %self.name,
            drained = drained.len(),
            "Circuit breaker CLOSED (recovered)"
        );
        drained
    }

    /// Keep a task that could not be requeued, whatever the state.
    ///
    /// While open it is drained with the other parked tasks on close. While
    /// closed it waits for [`take_held`](Self::take_held).
    pub fn hold(&self, task: T) {
        self.lock().pending_tasks.push(task);
    }

    /// Take the tasks held while the breaker is closed.
    ///
    /// Returns an empty batch while open: those tasks belong to the next close.
    pub fn take_held(&self) -> Vec<T> {
        let mut state = self.lock();
        if state.is_open {
            return Vec::new();
        }
        std::mem::take(&mut state.pending_tasks)
    }

    /// Take a consistent snapshot of the breaker.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        CircuitSnapshot {
            state: if state.is_open {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
            consecutive_failures: state.consecutive_failures,
            failure_threshold: self.failure_threshold,
            pending_tasks: state.pending_tasks.len(),
            open_for: state
                .last_failure_time
                .filter(|_| state.is_open)
                .map(|at| at.elapsed()),
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }
}
