//! Task state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a Task Record.
///
/// State transitions:
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> RetryScheduled -> Queued (loop until max_attempts)
/// - Queued -> Running -> Failed (max_attempts reached or error not retryable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in a priority queue.
    Queued,

    /// In the in-flight set.
    Running,

    /// Waiting out the retry delay; in no priority queue.
    RetryScheduled,

    /// Terminal success.
    Succeeded,

    /// Terminal failure.
    Failed,
}

impl TaskState {
    /// Eligible for dispatch.
    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Queued)
    }
}
