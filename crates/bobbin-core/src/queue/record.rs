//! Task record: identity + execution state of one unit of work.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::TaskState;
use crate::domain::{Priority, ScheduleId, TaskId};
use crate::error::TaskError;
use crate::runtime::{Progress, TaskResult};

/// Channels attached at admission. Each is optional: plain `submit` attaches none.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    pub(crate) completion: Option<oneshot::Sender<TaskResult>>,
    pub(crate) progress: Option<mpsc::UnboundedSender<Progress>>,
}

/// One admitted unit of work.
///
/// Design:
/// - The record itself moves between the queue set, the delayed-retry queue
///   and the in-flight map, so it can only ever be in one of them.
/// - All state transitions happen here.
#[derive(Debug)]
pub struct TaskRecord<K> {
    pub id: TaskId,
    pub kind: K,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub state: TaskState,

    /// Set when a recurring schedule admitted this record.
    pub schedule_id: Option<ScheduleId>,

    /// Attempts so far, including the current one while Running.
    pub attempts: u32,
    pub max_attempts: u32,

    /// Ceiling for a single attempt.
    pub timeout: Duration,

    pub last_error: Option<TaskError>,

    /// When the delayed retry becomes due (RetryScheduled only).
    pub next_run_at: Option<Instant>,

    pub created_at: DateTime<Utc>,

    /// Start of the current (or most recent) attempt.
    pub started_at: Option<Instant>,

    pub(crate) observers: Observers,
}

impl<K> TaskRecord<K> {
    pub fn new(
        id: TaskId,
        kind: K,
        payload: serde_json::Value,
        priority: Priority,
        max_attempts: u32,
        timeout: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            payload,
            priority,
            state: TaskState::Queued,
            schedule_id: None,
            attempts: 0,
            max_attempts,
            timeout,
            last_error: None,
            next_run_at: None,
            created_at,
            started_at: None,
            observers: Observers::default(),
        }
    }

    pub(crate) fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    pub(crate) fn with_schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    /// Mark as running (increment attempts, restart the attempt clock).
    pub fn start_attempt(&mut self, now: Instant) {
        self.state = TaskState::Running;
        self.attempts += 1;
        self.started_at = Some(now);
    }

    /// Park in the delayed-retry queue until `next_run_at`.
    pub fn schedule_retry(&mut self, next_run_at: Instant, error: TaskError) {
        self.state = TaskState::RetryScheduled;
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
    }

    /// Move from RetryScheduled back to Queued.
    pub fn requeue(&mut self) {
        self.state = TaskState::Queued;
        self.next_run_at = None;
    }

    pub fn mark_succeeded(&mut self) {
        self.state = TaskState::Succeeded;
    }

    pub fn mark_failed(&mut self, error: TaskError) {
        self.state = TaskState::Failed;
        self.last_error = Some(error);
    }

    /// Wall time spent in the current attempt.
    pub fn processing_time(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }

    pub(crate) fn progress_sender(&self) -> Option<mpsc::UnboundedSender<Progress>> {
        self.observers.progress.clone()
    }

    pub(crate) fn take_completion(&mut self) -> Option<oneshot::Sender<TaskResult>> {
        self.observers.completion.take()
    }
}
