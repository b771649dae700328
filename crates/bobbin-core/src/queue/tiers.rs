//! Priority queue set: one FIFO per tier.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

/// Pending items split by tier.
///
/// FIFO within a tier; `pop_next` always drains high before medium before low.
/// There is no aging, so a steady stream of high work starves the lower tiers.
#[derive(Debug)]
pub struct PriorityQueueSet<T> {
    tiers: [VecDeque<T>; 3],
}

/// Point-in-time depth of each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

impl<T> PriorityQueueSet<T> {
    pub fn new() -> Self {
        Self {
            tiers: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
        }
    }

    /// Append to the tail of the tier.
    pub fn push(&mut self, priority: Priority, item: T) {
        self.tiers[priority.index()].push_back(item);
    }

    /// Pop the head of the highest non-empty tier.
    pub fn pop_next(&mut self) -> Option<(Priority, T)> {
        Priority::ALL.into_iter().find_map(|priority| {
            self.tiers[priority.index()]
                .pop_front()
                .map(|item| (priority, item))
        })
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            high: self.tiers[Priority::High.index()].len(),
            medium: self.tiers[Priority::Medium.index()].len(),
            low: self.tiers[Priority::Low.index()].len(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    /// Remove everything, returning the dropped items in dispatch order.
    pub fn drain(&mut self) -> Vec<T> {
        self.tiers
            .iter_mut()
            .flat_map(|tier| tier.drain(..))
            .collect()
    }
}

impl<T> Default for PriorityQueueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
