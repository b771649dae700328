//! Observer handle returned by `submit_with_handle`.

use tokio::sync::{mpsc, oneshot};

use crate::domain::TaskId;
use crate::error::SchedulerError;
use crate::runtime::{Progress, TaskResult};

/// Completion future plus progress stream of one task.
///
/// Dropping the handle detaches it; the task still runs.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    completion: oneshot::Receiver<TaskResult>,
    progress: mpsc::UnboundedReceiver<Progress>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        completion: oneshot::Receiver<TaskResult>,
        progress: mpsc::UnboundedReceiver<Progress>,
    ) -> Self {
        Self {
            id,
            completion,
            progress,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Wait for the terminal outcome.
    ///
    /// The outer error means the task never reached one: it was dropped by
    /// `clear_queues` or shutdown while still pending.
    pub async fn wait(self) -> Result<TaskResult, SchedulerError> {
        self.completion
            .await
            .map_err(|_| SchedulerError::TaskDropped(self.id))
    }

    /// Next progress report; `None` once the task is finished and every
    /// report has been read.
    pub async fn next_progress(&mut self) -> Option<Progress> {
        self.progress.recv().await
    }
}
