//! Worker error types and error categorization
//!
//! Categories drive metric labels and log fields. None of them triggers a
//! retry: a task runs once, and only remote unavailability sends it back to
//! the queue or the breaker's pending list.

use std::time::Duration;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Category of a worker error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// Queue full or closed
    Saturation,
    /// Remote dependency failed its health probe
    Unavailable,
    /// Lookups, storage, anything outside the remote call itself
    Infrastructure,
    /// The remote call ran and reported failure
    Business,
    /// Task exceeded its time budget
    Timeout,
}

/// Errors surfaced by the queue, the pool and task processors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Queue stayed full for the whole enqueue timeout
    #[error("queue is full, retry later")]
    QueueFull,

    /// Queue receiver is gone
    #[error("queue is closed")]
    QueueClosed,

    /// Remote dependency unavailable
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Task processing failed
    #[error("processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// Task exceeded the configured timeout
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
}

impl WorkerError {
    /// Create an infrastructure processing error
    pub fn infrastructure(message: impl Into<String>) -> Self {
        WorkerError::Processing {
            message: message.into(),
            category: ErrorCategory::Infrastructure,
        }
    }

    /// Create a business processing error
    pub fn business(message: impl Into<String>) -> Self {
        WorkerError::Processing {
            message: message.into(),
            category: ErrorCategory::Business,
        }
    }

    /// Create an unavailability error
    pub fn unavailable(message: impl Into<String>) -> Self {
        WorkerError::Unavailable(message.into())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::QueueFull | WorkerError::QueueClosed => ErrorCategory::Saturation,
            WorkerError::Unavailable(_) => ErrorCategory::Unavailable,
            WorkerError::Processing { category, .. } => *category,
            WorkerError::Timeout(_) => ErrorCategory::Timeout,
        }
    }

    /// Whether the caller should back off and try again later
    pub fn is_saturation(&self) -> bool {
        self.category() == ErrorCategory::Saturation
    }
}
