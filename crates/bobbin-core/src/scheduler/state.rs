//! Mutable scheduler state. Lives behind one `std::sync::Mutex`.

use std::collections::HashMap;

use crate::domain::{ScheduleId, TaskId};
use crate::ledger::Ledger;
use crate::observability::SchedulerSnapshot;
use crate::queue::{DelayedQueue, PriorityQueueSet, TaskRecord};

use super::recurring::Schedule;

pub(crate) struct SchedulerState<K> {
    pub(crate) queues: PriorityQueueSet<TaskRecord<K>>,
    pub(crate) delayed: DelayedQueue<TaskRecord<K>>,
    pub(crate) in_flight: HashMap<TaskId, TaskRecord<K>>,
    pub(crate) ledger: Ledger<K>,
    pub(crate) schedules: HashMap<ScheduleId, Schedule<K>>,
    /// Set by shutdown; admission is rejected from then on.
    pub(crate) closed: bool,
}

impl<K: Clone> SchedulerState<K> {
    pub(crate) fn new(history_capacity: usize) -> Self {
        Self {
            queues: PriorityQueueSet::new(),
            delayed: DelayedQueue::new(),
            in_flight: HashMap::new(),
            ledger: Ledger::new(history_capacity),
            schedules: HashMap::new(),
            closed: false,
        }
    }

    pub(crate) fn snapshot(&self, history_limit: usize) -> SchedulerSnapshot<K> {
        SchedulerSnapshot {
            stats: self.ledger.stats(),
            queue_depths: self.queues.depths(),
            delayed_retries: self.delayed.len(),
            in_flight: self.in_flight.len(),
            active_schedules: self.schedules.len(),
            recent_history: self.ledger.recent(history_limit),
        }
    }

    /// Remove every queued and delayed record; in-flight work is untouched.
    pub(crate) fn drain_pending(&mut self) -> Vec<TaskRecord<K>> {
        let mut dropped = self.queues.drain();
        dropped.extend(self.delayed.drain());
        dropped
    }

    /// Remove every schedule, returning them so their timers can be stopped.
    pub(crate) fn take_schedules(&mut self) -> Vec<Schedule<K>> {
        self.schedules.drain().map(|(_, schedule)| schedule).collect()
    }
}
