use task_worker::{ErrorCategory, WorkerError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Delegation service unavailable: {0}")]
    Unavailable(String),

    #[error("Redemption failed: {0}")]
    Redemption(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Queue(#[from] WorkerError),
}

pub type RedemptionResult<T> = Result<T, RedemptionError>;

impl RedemptionError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        RedemptionError::NotFound { entity, id }
    }
}

/// Implement From for sea_orm::DbErr
impl From<sea_orm::DbErr> for RedemptionError {
    fn from(err: sea_orm::DbErr) -> Self {
        RedemptionError::Database(err.to_string())
    }
}

impl From<RedemptionError> for WorkerError {
    fn from(err: RedemptionError) -> Self {
        let message = err.to_string();
        match err {
            RedemptionError::Queue(inner) => inner,
            RedemptionError::Unavailable(reason) => WorkerError::Unavailable(reason),
            RedemptionError::Redemption(_) => WorkerError::Processing {
                message,
                category: ErrorCategory::Business,
            },
            RedemptionError::NotFound { .. }
            | RedemptionError::Database(_)
            | RedemptionError::InvalidData(_) => WorkerError::Processing {
                message,
                category: ErrorCategory::Infrastructure,
            },
        }
    }
}
