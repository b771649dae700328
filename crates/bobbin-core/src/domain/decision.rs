//! Decision model: what happens to a task after a failed attempt.

use std::time::Duration;

use crate::error::TaskError;
use crate::queue::{RetryPolicy, TaskRecord};

/// The next action for a task whose attempt failed or timed out.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Put the task back on its priority queue after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up: the failure is terminal.
    MarkFailed { reason: String },
}

/// Attempt-based retry logic.
///
/// - Retry while `attempts < max_attempts` and the error is retryable
/// - Mark failed otherwise
///
/// Pure: it reads the record and returns a decision; the dispatcher applies it.
#[derive(Debug, Clone)]
pub struct RetryDecider {
    retry_policy: RetryPolicy,
}

impl RetryDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn decide<K>(&self, task: &TaskRecord<K>, error: &TaskError) -> Decision {
        if !error.is_retryable() {
            return Decision::MarkFailed {
                reason: format!("Not retryable: {error}"),
            };
        }
        if task.attempts >= task.max_attempts {
            Decision::MarkFailed {
                reason: format!(
                    "Max attempts reached: {}/{}",
                    task.attempts, task.max_attempts
                ),
            }
        } else {
            let delay = self.retry_policy.next_delay(task.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "Retry attempt {}/{} after {:?}",
                    task.attempts + 1,
                    task.max_attempts,
                    delay
                ),
            }
        }
    }
}
