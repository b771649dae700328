//! Delayed-retry queue: items waiting out their retry delay.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

/// Heap entry. Ordered so `BinaryHeap` pops the earliest deadline first;
/// `seq` keeps entries with the same deadline in insertion order.
#[derive(Debug)]
struct DelayedEntry<T> {
    due: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for DelayedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for DelayedEntry<T> {}

impl<T> PartialOrd for DelayedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for DelayedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering: earlier times have higher priority
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of items keyed by the instant they become due.
#[derive(Debug)]
pub struct DelayedQueue<T> {
    heap: BinaryHeap<DelayedEntry<T>>,
    next_seq: u64,
}

impl<T> DelayedQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, due: Instant, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(DelayedEntry { due, seq, item });
    }

    /// Remove and return every item due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|entry| entry.due <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.item);
            }
        }
        due
    }

    /// Earliest deadline, used by the dispatcher as its next wake-up.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn drain(&mut self) -> Vec<T> {
        self.heap.drain().map(|entry| entry.item).collect()
    }
}

impl<T> Default for DelayedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pops_only_due_items_in_deadline_order() {
        let base = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push(base + Duration::from_millis(30), "c");
        queue.push(base + Duration::from_millis(10), "a");
        queue.push(base + Duration::from_millis(20), "b");

        assert_eq!(queue.next_due(), Some(base + Duration::from_millis(10)));
        assert!(queue.pop_due(base).is_empty());

        assert_eq!(queue.pop_due(base + Duration::from_millis(20)), vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(base + Duration::from_millis(30)));
    }

    #[test]
    fn same_deadline_keeps_insertion_order() {
        let due = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push(due, 1);
        queue.push(due, 2);
        queue.push(due, 3);

        assert_eq!(queue.pop_due(due), vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn drain_empties_queue() {
        let mut queue = DelayedQueue::new();
        queue.push(Instant::now() + Duration::from_secs(60), "later");
        assert_eq!(queue.drain(), vec!["later"]);
        assert!(queue.is_empty());
    }
}
