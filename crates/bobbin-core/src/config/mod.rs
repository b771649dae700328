//! Scheduler configuration.
//!
//! Every field has a default, so a partial document (or none at all) is a
//! valid configuration. Durations accept `humantime` strings.

pub mod duration_serde;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum simultaneous executions.
    pub concurrency_limit: usize,

    /// Per-attempt timeout when the submitter does not override it.
    #[serde(with = "duration_serde::duration")]
    pub default_timeout: Duration,

    /// Attempt ceiling when the submitter does not override it.
    pub default_max_attempts: u32,

    /// Delay before the first retry.
    #[serde(with = "duration_serde::duration")]
    pub retry_delay: Duration,

    /// Upper bound on how long the dispatcher sleeps without a wake-up.
    #[serde(with = "duration_serde::duration")]
    pub scheduling_tick_interval: Duration,

    /// Growth factor applied to `retry_delay` per failed attempt. 1.0 keeps it fixed.
    pub retry_backoff_multiplier: f64,

    /// History entries retained (oldest evicted first).
    pub history_capacity: usize,

    /// History entries included in a snapshot.
    pub snapshot_history_limit: usize,

    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            default_timeout: Duration::from_secs(30),
            default_max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            scheduling_tick_interval: Duration::from_millis(100),
            retry_backoff_multiplier: 1.0,
            history_capacity: 100,
            snapshot_history_limit: 10,
            event_buffer: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrency_limit == 0 {
            return Err(invalid("concurrency_limit must be at least 1"));
        }
        if self.default_timeout.is_zero() {
            return Err(invalid("default_timeout must be non-zero"));
        }
        if self.default_max_attempts == 0 {
            return Err(invalid("default_max_attempts must be at least 1"));
        }
        if self.scheduling_tick_interval.is_zero() {
            return Err(invalid("scheduling_tick_interval must be non-zero"));
        }
        if !self.retry_backoff_multiplier.is_finite() || self.retry_backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "retry_backoff_multiplier must be a finite number >= 1.0, got {}",
                self.retry_backoff_multiplier
            )));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.retry_delay, self.retry_backoff_multiplier)
    }
}

fn invalid(reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidConfig(reason.into())
}
