//! Scheduler error types

use thiserror::Error;
use tidewater_domain::AgentError;

/// Scheduler lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// The worker task is gone and no longer accepts jobs
    #[error("Scheduler queue closed")]
    QueueClosed,

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for AgentError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                AgentError::InvalidInput(err.to_string())
            }
            SchedulerError::QueueClosed | SchedulerError::TaskJoinFailed(_) => {
                AgentError::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
