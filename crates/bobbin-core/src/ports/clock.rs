//! Clock port - 壁時計の抽象化
//!
//! 経過時間の計測は `tokio::time::Instant` を使う。ここで扱うのは
//! 履歴に残す時刻（created_at, completed_at）と ULID の timestamp 部分だけ。

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Supplies wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

impl Clock for Arc<dyn Clock> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
