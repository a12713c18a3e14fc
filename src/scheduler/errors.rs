//! Scheduler errors

use thiserror::Error;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("invalid backup schedule {expression:?}: {message}")]
    InvalidSchedule { expression: String, message: String },

    #[error("backup schedule {expression:?} has no next run: {message}")]
    NoNextRun { expression: String, message: String },
}
