//! History & statistics ledger.
//!
//! Appended to on every terminal outcome. History is a ring buffer; counters
//! and the running average are updated in O(1) per outcome and never rebuilt
//! from history.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::duration_serde;
use crate::domain::{Priority, TaskId};

/// Longest result summary kept in a history entry.
const SUMMARY_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// Immutable record of one terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry<K> {
    pub id: TaskId,
    pub kind: K,
    pub priority: Priority,
    pub status: TaskStatus,
    pub attempts: u32,
    #[serde(with = "duration_serde::duration")]
    pub processing_time: Duration,
    /// Truncated JSON of the result on success, the error message on failure.
    pub result_summary: String,
    pub completed_at: DateTime<Utc>,
}

/// Summarize a handler result for the history ledger.
pub(crate) fn summarize(value: &serde_json::Value) -> String {
    let rendered = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate(rendered)
}

pub(crate) fn truncate(mut text: String) -> String {
    if let Some((cut, _)) = text.char_indices().nth(SUMMARY_MAX_CHARS) {
        text.truncate(cut);
        text.push('…');
    }
    text
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub tasks_processed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    #[serde(with = "duration_serde::duration")]
    pub average_processing_time: Duration,
}

impl Statistics {
    fn record(&mut self, status: TaskStatus, processing_time: Duration) {
        self.tasks_processed += 1;
        match status {
            TaskStatus::Success => self.tasks_succeeded += 1,
            TaskStatus::Failed => self.tasks_failed += 1,
        }
        // incremental mean: avg += (x - avg) / n
        let n = self.tasks_processed as f64;
        let avg = self.average_processing_time.as_secs_f64();
        let next = avg + (processing_time.as_secs_f64() - avg) / n;
        self.average_processing_time = Duration::try_from_secs_f64(next).unwrap_or_default();
    }
}

/// Bounded history plus counters.
#[derive(Debug)]
pub struct Ledger<K> {
    capacity: usize,
    entries: VecDeque<HistoryEntry<K>>,
    stats: Statistics,
}

impl<K: Clone> Ledger<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            stats: Statistics::default(),
        }
    }

    /// Record a terminal outcome, evicting the oldest entry when full.
    pub fn record(&mut self, entry: HistoryEntry<K>) {
        self.stats.record(entry.status, entry.processing_time);
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn stats(&self) -> Statistics {
        self.stats
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry<K>> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn find(&self, id: TaskId) -> Option<HistoryEntry<K>> {
        self.entries.iter().rev().find(|entry| entry.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
