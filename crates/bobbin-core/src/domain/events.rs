//! Events - スケジューラのライフサイクルイベント
//!
//! `Scheduler::subscribe()` で broadcast receiver を取得できる。
//! UI 側はこれを購読して終端結果を通知に使う。

use std::time::Duration;

use serde::Serialize;

use super::ids::{ScheduleId, TaskId};
use super::priority::Priority;
use crate::ledger::HistoryEntry;

/// Something that happened inside the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent<K> {
    /// A task was accepted into a priority queue.
    Admitted {
        task_id: TaskId,
        kind: K,
        priority: Priority,
        schedule_id: Option<ScheduleId>,
    },

    /// An attempt began executing.
    Started {
        task_id: TaskId,
        kind: K,
        attempt: u32,
    },

    /// An attempt failed and the task will be requeued after `delay`.
    RetryScheduled {
        task_id: TaskId,
        kind: K,
        attempt: u32,
        #[serde(with = "crate::config::duration_serde::duration")]
        delay: Duration,
        error: String,
    },

    /// Terminal success.
    Succeeded(HistoryEntry<K>),

    /// Terminal failure.
    Failed(HistoryEntry<K>),

    /// Pending work was dropped by `clear_queues` or shutdown.
    QueuesCleared { dropped: usize },
}

impl<K> SchedulerEvent<K> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerEvent::Succeeded(_) | SchedulerEvent::Failed(_))
    }
}
