use std::convert::Infallible;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{ScheduleId, TaskId};

/// Errors returned synchronously to callers of the scheduler API.
///
/// Execution-time failures never surface here; they travel through
/// [`TaskError`] to the task's completion channel and the history ledger.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid priority '{0}': expected one of high, medium, low")]
    InvalidPriority(String),

    #[error("invalid task options: {0}")]
    InvalidOptions(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate handler for task kind={0}")]
    DuplicateHandler(String),

    #[error("missing handlers for task kinds: {0:?}")]
    MissingHandlers(Vec<String>),

    #[error("recurring schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),

    #[error("task {0} was dropped before reaching a terminal outcome")]
    TaskDropped(TaskId),

    #[error("scheduler is shut down")]
    ShutDown,

    #[error("no Tokio runtime available to drive the scheduler")]
    NoRuntime,
}

// Lets `Priority` itself go through the same `TryInto<Priority>` admission path as strings.
impl From<Infallible> for SchedulerError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Why a single attempt of a task did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Raised by the task body.
    #[error("{0}")]
    Handler(String),

    /// Synthesized by the scheduler when the attempt outlives its timeout.
    #[error("task timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// No handler is registered for the task's kind.
    #[error("no handler registered for task kind={0}")]
    UnknownKind(String),
}

impl TaskError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Retrying an unknown kind cannot succeed, so it is terminal on the first attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TaskError::UnknownKind(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}
