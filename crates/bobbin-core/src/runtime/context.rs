//! Per-attempt context handed to a handler.

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::domain::TaskId;
use crate::error::TaskError;

/// Terminal result delivered to a task's completion observer.
pub type TaskResult = Result<serde_json::Value, TaskError>;

/// One progress report from a running handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub task_id: TaskId,
    pub attempt: u32,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

/// Side channels available to a handler during one attempt.
///
/// - `report_progress` feeds the task's progress stream (multi-shot)
/// - `timed_out` resolves once the scheduler has given up on this attempt;
///   handlers should stop meaningful work then. Nothing is preempted.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    attempt: u32,
    progress: Option<mpsc::UnboundedSender<Progress>>,
    deadline: watch::Receiver<bool>,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        attempt: u32,
        progress: Option<mpsc::UnboundedSender<Progress>>,
        deadline: watch::Receiver<bool>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            progress,
            deadline,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// 1-indexed attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Report progress. Silently dropped if nobody is listening.
    pub fn report_progress(&self, percent: u8, message: impl Into<String>) {
        let Some(progress) = &self.progress else {
            return;
        };
        let report = Progress {
            task_id: self.task_id,
            attempt: self.attempt,
            percent: percent.min(100),
            message: message.into(),
        };
        // receiver dropped: the submitter stopped caring
        let _ = progress.send(report);
    }

    pub fn is_timed_out(&self) -> bool {
        *self.deadline.borrow()
    }

    /// Resolves when the scheduler times this attempt out.
    ///
    /// Never resolves if the attempt finishes first.
    pub async fn timed_out(&self) {
        let mut deadline = self.deadline.clone();
        let fired = deadline.wait_for(|fired| *fired).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}
