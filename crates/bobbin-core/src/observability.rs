//! Read-only views of scheduler state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::duration_serde;
use crate::domain::{Priority, ScheduleId};
use crate::ledger::{HistoryEntry, Statistics};
use crate::queue::QueueDepths;

/// Consistent point-in-time view, taken under the state lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSnapshot<K> {
    pub stats: Statistics,
    pub queue_depths: QueueDepths,
    /// Failed attempts waiting out their retry delay.
    pub delayed_retries: usize,
    pub in_flight: usize,
    pub active_schedules: usize,
    /// Newest first.
    pub recent_history: Vec<HistoryEntry<K>>,
}

impl<K> SchedulerSnapshot<K> {
    /// Nothing queued, delayed or running.
    pub fn is_idle(&self) -> bool {
        self.queue_depths.total() == 0 && self.delayed_retries == 0 && self.in_flight == 0
    }
}

/// One active recurring schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleInfo<K> {
    pub id: ScheduleId,
    pub kind: K,
    pub priority: Priority,
    #[serde(with = "duration_serde::duration")]
    pub interval: Duration,
    /// Wall-clock time of the most recent firing.
    pub last_run: Option<DateTime<Utc>>,
    /// Time until the next firing.
    #[serde(with = "duration_serde::duration")]
    pub next_run_in: Duration,
    /// Admissions so far.
    pub fired: u64,
}
