//! Recurring schedules.
//!
//! Each schedule owns a timer task that admits one task per elapsed interval
//! through the normal admission path. The timer holds only a `Weak` reference
//! to the scheduler, so it never keeps a dropped scheduler alive.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::{Priority, ScheduleId, TaskKind};
use crate::observability::ScheduleInfo;

use super::Inner;

/// Where each firing gets its payload from.
#[derive(Clone)]
pub enum PayloadSource {
    /// The same payload every time.
    Fixed(serde_json::Value),
    /// Built fresh on every firing.
    Generated(Arc<dyn Fn() -> serde_json::Value + Send + Sync>),
}

impl PayloadSource {
    pub fn produce(&self) -> serde_json::Value {
        match self {
            PayloadSource::Fixed(payload) => payload.clone(),
            PayloadSource::Generated(factory) => factory(),
        }
    }
}

impl fmt::Debug for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSource::Fixed(payload) => f.debug_tuple("Fixed").field(payload).finish(),
            PayloadSource::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// Recurring task definition. Present in the schedule table only while active.
pub(crate) struct Schedule<K> {
    pub(crate) id: ScheduleId,
    pub(crate) kind: K,
    pub(crate) priority: Priority,
    pub(crate) interval: Duration,
    pub(crate) source: PayloadSource,
    pub(crate) last_run: Option<DateTime<Utc>>,
    pub(crate) next_run: Instant,
    pub(crate) fired: u64,
    pub(crate) timer: JoinHandle<()>,
}

impl<K: Copy> Schedule<K> {
    pub(crate) fn record_firing(&mut self, at: DateTime<Utc>, now: Instant) {
        self.fired += 1;
        self.last_run = Some(at);
        self.next_run = now + self.interval;
    }

    pub(crate) fn info(&self, now: Instant) -> ScheduleInfo<K> {
        ScheduleInfo {
            id: self.id,
            kind: self.kind,
            priority: self.priority,
            interval: self.interval,
            last_run: self.last_run,
            next_run_in: self.next_run.saturating_duration_since(now),
            fired: self.fired,
        }
    }
}

// Removing a schedule from the table stops its timer.
impl<K> Drop for Schedule<K> {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Timer loop for one schedule. The first firing is one interval after registration.
pub(crate) async fn run_timer<K: TaskKind>(
    inner: Weak<Inner<K>>,
    id: ScheduleId,
    start: Instant,
    interval: Duration,
) {
    let mut ticker = time::interval_at(start + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.fire_schedule(id) {
            Ok(task_id) => debug!(schedule_id = %id, task_id = %task_id, "schedule fired"),
            Err(err) => {
                debug!(schedule_id = %id, error = %err, "schedule timer stopped");
                break;
            }
        }
    }
}
