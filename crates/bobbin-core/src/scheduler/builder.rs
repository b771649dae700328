//! SchedulerBuilder - 起動時のワイヤリングと検証
//!
//! # Fail-fast 設計
//! - 同じ kind への二重登録は `handler()` の時点でエラー
//! - `expect_kinds()` で期待する kind を宣言すると、`build()` で登録漏れを検出
//! - 設定値の検証も `build()` で行う

use std::future::Future;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::domain::TaskKind;
use crate::error::{SchedulerError, TaskError};
use crate::ports::{Clock, SystemClock};
use crate::runtime::{HandlerRegistry, TaskContext, TaskHandler, handler_fn};

use super::{Inner, Scheduler};

/// Builds a [`Scheduler`].
///
/// # 使用例
/// ```ignore
/// let scheduler = Scheduler::builder(config)
///     .handler(Job::FilterContent, FilterHandler::new())?
///     .handler_fn(Job::SyncNotes, |payload, _ctx| async move { Ok(payload) })?
///     .expect_kinds([Job::FilterContent, Job::SyncNotes])
///     .build()?;
/// ```
pub struct SchedulerBuilder<K: TaskKind> {
    config: SchedulerConfig,
    registry: HandlerRegistry<K>,
    expected_kinds: Option<Vec<K>>,
    clock: Arc<dyn Clock>,
}

impl<K: TaskKind> SchedulerBuilder<K> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::new(),
            expected_kinds: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Register the handler for `kind`.
    pub fn handler<H>(mut self, kind: K, handler: H) -> Result<Self, SchedulerError>
    where
        H: TaskHandler + 'static,
    {
        self.registry.register(kind, Arc::new(handler))?;
        Ok(self)
    }

    /// Register an async closure as the handler for `kind`.
    pub fn handler_fn<F, Fut>(self, kind: K, f: F) -> Result<Self, SchedulerError>
    where
        F: Fn(serde_json::Value, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send + 'static,
    {
        self.handler(kind, handler_fn(f))
    }

    /// Kinds that must have a handler by the time `build()` runs.
    pub fn expect_kinds(mut self, kinds: impl IntoIterator<Item = K>) -> Self {
        self.expected_kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Wall clock for history timestamps and id generation.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate and start the dispatcher on the current Tokio runtime.
    ///
    /// # 検証
    /// - 設定値 (`SchedulerConfig::validate`)
    /// - `expect_kinds()` の kind が全て登録済みか
    pub fn build(self) -> Result<Scheduler<K>, SchedulerError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_kinds {
            let missing: Vec<String> = expected
                .iter()
                .filter(|kind| !self.registry.contains(kind))
                .map(ToString::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(SchedulerError::MissingHandlers(missing));
            }
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let inner = Inner::new(self.config, self.registry, self.clock, runtime);
        Ok(Scheduler::start(inner))
    }
}
