//! Scheduler - 優先度キュー + 同時実行数制限 + リトライ/タイムアウト
//!
//! 構成:
//! - `SchedulerState` を 1 つの `std::sync::Mutex` で守る。ロックは await を跨がない。
//! - dispatcher ループが空きスロットに最優先のタスクを詰める (dispatcher.rs)
//! - handler は 1 試行ごとに独立した Tokio task で走る
//! - recurring schedule はそれぞれタイマー task を持ち、通常の admission を呼ぶ
//!
//! Admission / snapshot / clear_queues は同期 API。handler の完了を待たない。

mod builder;
mod dispatcher;
mod handle;
mod recurring;
mod state;


pub use builder::SchedulerBuilder;
pub use handle::TaskHandle;
pub use recurring::PayloadSource;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{SchedulerConfig, duration_serde};
use crate::domain::{Priority, RetryDecider, ScheduleId, SchedulerEvent, TaskId, TaskKind};
use crate::error::SchedulerError;
use crate::ledger::HistoryEntry;
use crate::observability::{ScheduleInfo, SchedulerSnapshot};
use crate::ports::{Clock, IdGenerator, UlidGenerator};
use crate::queue::{Observers, TaskRecord};
use crate::runtime::HandlerRegistry;

use recurring::Schedule;
use state::SchedulerState;

/// Per-task overrides of the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitOptions {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default, with = "duration_serde::option_duration")]
    pub timeout: Option<Duration>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn resolve(self, config: &SchedulerConfig) -> Result<(u32, Duration), SchedulerError> {
        let max_attempts = self.max_attempts.unwrap_or(config.default_max_attempts);
        let timeout = self.timeout.unwrap_or(config.default_timeout);
        if max_attempts == 0 {
            return Err(SchedulerError::InvalidOptions(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(SchedulerError::InvalidOptions(
                "timeout must be non-zero".to_string(),
            ));
        }
        Ok((max_attempts, timeout))
    }
}

/// Everything needed to put one record on a queue.
struct Admission<K> {
    kind: K,
    payload: serde_json::Value,
    priority: Priority,
    max_attempts: u32,
    timeout: Duration,
    observers: Observers,
    schedule_id: Option<ScheduleId>,
}

/// State shared by the public handle, the dispatcher loop, running attempts
/// and schedule timers.
pub(crate) struct Inner<K: TaskKind> {
    config: SchedulerConfig,
    registry: HandlerRegistry<K>,
    state: Mutex<SchedulerState<K>>,
    /// Wakes the dispatcher: admission, freed slot, retry parked.
    wake: Notify,
    clock: Arc<dyn Clock>,
    ids: UlidGenerator<Arc<dyn Clock>>,
    events: broadcast::Sender<SchedulerEvent<K>>,
    decider: RetryDecider,
    shutdown: watch::Sender<bool>,
    /// Runtime the scheduler was built on; schedule timers are spawned here.
    runtime: tokio::runtime::Handle,
}

impl<K: TaskKind> Inner<K> {
    fn new(
        config: SchedulerConfig,
        registry: HandlerRegistry<K>,
        clock: Arc<dyn Clock>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer);
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            state: Mutex::new(SchedulerState::new(config.history_capacity)),
            wake: Notify::new(),
            ids: UlidGenerator::new(Arc::clone(&clock)),
            clock,
            events,
            decider: RetryDecider::new(config.retry_policy()),
            shutdown,
            runtime,
            config,
        }
    }

    /// Every critical section leaves the state consistent, so a poisoned
    /// lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, SchedulerState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent<K>) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn admit(&self, admission: Admission<K>) -> Result<TaskId, SchedulerError> {
        let id = self.ids.generate_task_id();
        let mut record = TaskRecord::new(
            id,
            admission.kind,
            admission.payload,
            admission.priority,
            admission.max_attempts,
            admission.timeout,
            self.clock.now(),
        )
        .with_observers(admission.observers);

        {
            let mut state = self.lock();
            if state.closed {
                return Err(SchedulerError::ShutDown);
            }
            if let Some(schedule_id) = admission.schedule_id {
                // checked under the same lock as the push: no firing after cancel
                let schedule = state
                    .schedules
                    .get_mut(&schedule_id)
                    .ok_or(SchedulerError::ScheduleNotFound(schedule_id))?;
                schedule.record_firing(record.created_at, Instant::now());
                record = record.with_schedule(schedule_id);
            }
            state.queues.push(admission.priority, record);
        }

        debug!(
            task_id = %id,
            kind = %admission.kind,
            priority = %admission.priority,
            "task admitted"
        );
        self.emit(SchedulerEvent::Admitted {
            task_id: id,
            kind: admission.kind,
            priority: admission.priority,
            schedule_id: admission.schedule_id,
        });
        self.wake.notify_one();
        Ok(id)
    }

    fn defaults(&self) -> (u32, Duration) {
        (self.config.default_max_attempts, self.config.default_timeout)
    }

    /// Admit one task on behalf of a schedule.
    fn fire_schedule(&self, id: ScheduleId) -> Result<TaskId, SchedulerError> {
        let (kind, priority, source) = {
            let state = self.lock();
            let schedule = state
                .schedules
                .get(&id)
                .ok_or(SchedulerError::ScheduleNotFound(id))?;
            (schedule.kind, schedule.priority, schedule.source.clone())
        };
        // user code: run it outside the lock
        let payload = source.produce();
        let (max_attempts, timeout) = self.defaults();
        self.admit(Admission {
            kind,
            payload,
            priority,
            max_attempts,
            timeout,
            observers: Observers::default(),
            schedule_id: Some(id),
        })
    }

    /// Synchronous part of shutdown. Returns false if already closed.
    fn close(&self) -> bool {
        let (schedules, pending) = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            (state.take_schedules(), state.drain_pending())
        };
        let cancelled = schedules.len();
        let dropped = pending.len();
        // dropping a schedule aborts its timer; a dropped record closes its completion channel
        drop(schedules);
        drop(pending);
        // receivers may already be gone
        let _ = self.shutdown.send(true);
        if dropped > 0 {
            self.emit(SchedulerEvent::QueuesCleared { dropped });
        }
        info!(
            cancelled_schedules = cancelled,
            dropped_tasks = dropped,
            "scheduler closed"
        );
        true
    }
}

/// In-process background task scheduler.
///
/// # 使用例
/// ```ignore
/// let scheduler = Scheduler::builder(SchedulerConfig::default())
///     .handler_fn(Job::SyncNotes, |payload, _ctx| async move { Ok(payload) })?
///     .build()?;
///
/// let id = scheduler.submit(Job::SyncNotes, json!({"page": 1}), "high")?;
/// ```
///
/// Must be built inside a Tokio runtime. Dropping the scheduler stops the
/// dispatcher and every schedule; attempts already running finish on their own.
pub struct Scheduler<K: TaskKind> {
    inner: Arc<Inner<K>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<K: TaskKind> Scheduler<K> {
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder<K> {
        SchedulerBuilder::new(config)
    }

    fn start(inner: Inner<K>) -> Self {
        let inner = Arc::new(inner);
        let shutdown = inner.shutdown.subscribe();
        let dispatcher = inner.runtime.spawn(dispatcher::run(Arc::clone(&inner), shutdown));
        info!(
            concurrency_limit = inner.config.concurrency_limit,
            handlers = inner.registry.len(),
            "scheduler started"
        );
        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Admit a task with the configured defaults.
    ///
    /// `priority` is a [`Priority`] or a string such as `"high"`; anything
    /// else is rejected with [`SchedulerError::InvalidPriority`] and nothing
    /// is enqueued.
    pub fn submit<P>(
        &self,
        kind: K,
        payload: serde_json::Value,
        priority: P,
    ) -> Result<TaskId, SchedulerError>
    where
        P: TryInto<Priority>,
        SchedulerError: From<P::Error>,
    {
        self.submit_with(kind, payload, priority, SubmitOptions::default())
    }

    pub fn submit_with<P>(
        &self,
        kind: K,
        payload: serde_json::Value,
        priority: P,
        options: SubmitOptions,
    ) -> Result<TaskId, SchedulerError>
    where
        P: TryInto<Priority>,
        SchedulerError: From<P::Error>,
    {
        let priority = priority.try_into()?;
        let (max_attempts, timeout) = options.resolve(&self.inner.config)?;
        self.inner.admit(Admission {
            kind,
            payload,
            priority,
            max_attempts,
            timeout,
            observers: Observers::default(),
            schedule_id: None,
        })
    }

    /// Admit a task and observe it: completion and progress.
    pub fn submit_with_handle<P>(
        &self,
        kind: K,
        payload: serde_json::Value,
        priority: P,
        options: SubmitOptions,
    ) -> Result<TaskHandle, SchedulerError>
    where
        P: TryInto<Priority>,
        SchedulerError: From<P::Error>,
    {
        let priority = priority.try_into()?;
        let (max_attempts, timeout) = options.resolve(&self.inner.config)?;
        let (completion_tx, completion_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        let id = self.inner.admit(Admission {
            kind,
            payload,
            priority,
            max_attempts,
            timeout,
            observers: Observers {
                completion: Some(completion_tx),
                progress: Some(progress_tx),
            },
            schedule_id: None,
        })?;
        Ok(TaskHandle::new(id, completion_rx, progress_rx))
    }

    /// Admit `payload` every `interval`, starting one interval from now.
    pub fn register_recurring<P>(
        &self,
        kind: K,
        payload: serde_json::Value,
        interval: Duration,
        priority: P,
    ) -> Result<ScheduleId, SchedulerError>
    where
        P: TryInto<Priority>,
        SchedulerError: From<P::Error>,
    {
        let priority = priority.try_into()?;
        self.add_schedule(kind, PayloadSource::Fixed(payload), interval, priority)
    }

    /// Like [`register_recurring`](Self::register_recurring), but builds a
    /// fresh payload on every firing.
    pub fn register_recurring_with<P, F>(
        &self,
        kind: K,
        interval: Duration,
        priority: P,
        factory: F,
    ) -> Result<ScheduleId, SchedulerError>
    where
        P: TryInto<Priority>,
        SchedulerError: From<P::Error>,
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        let priority = priority.try_into()?;
        self.add_schedule(
            kind,
            PayloadSource::Generated(Arc::new(factory)),
            interval,
            priority,
        )
    }

    fn add_schedule(
        &self,
        kind: K,
        source: PayloadSource,
        interval: Duration,
        priority: Priority,
    ) -> Result<ScheduleId, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidOptions(
                "recurring interval must be non-zero".to_string(),
            ));
        }
        let id = self.inner.ids.generate_schedule_id();
        let start = Instant::now();

        let mut state = self.inner.lock();
        if state.closed {
            return Err(SchedulerError::ShutDown);
        }
        // spawned under the lock so the first firing always finds its entry
        let timer = self.inner.runtime.spawn(recurring::run_timer(
            Arc::downgrade(&self.inner),
            id,
            start,
            interval,
        ));
        state.schedules.insert(
            id,
            Schedule {
                id,
                kind,
                priority,
                interval,
                source,
                last_run: None,
                next_run: start + interval,
                fired: 0,
                timer,
            },
        );
        drop(state);

        info!(schedule_id = %id, kind = %kind, interval = ?interval, "recurring schedule registered");
        Ok(id)
    }

    /// Stop future firings. Tasks already admitted are unaffected.
    pub fn cancel_recurring(&self, id: ScheduleId) -> Result<(), SchedulerError> {
        let removed = self.inner.lock().schedules.remove(&id);
        match removed {
            Some(schedule) => {
                info!(schedule_id = %id, fired = schedule.fired, "recurring schedule cancelled");
                Ok(())
            }
            None => Err(SchedulerError::ScheduleNotFound(id)),
        }
    }

    /// Active schedules, earliest next firing first.
    pub fn recurring_schedules(&self) -> Vec<ScheduleInfo<K>> {
        let now = Instant::now();
        let mut infos: Vec<_> = self
            .inner
            .lock()
            .schedules
            .values()
            .map(|schedule| schedule.info(now))
            .collect();
        infos.sort_by_key(|info| info.next_run_in);
        infos
    }

    pub fn snapshot(&self) -> SchedulerSnapshot<K> {
        self.inner
            .lock()
            .snapshot(self.inner.config.snapshot_history_limit)
    }

    /// The `limit` most recent history entries, newest first.
    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry<K>> {
        self.inner.lock().ledger.recent(limit)
    }

    /// A retained history entry, if it has not been evicted yet.
    pub fn history_entry(&self, id: TaskId) -> Option<HistoryEntry<K>> {
        self.inner.lock().ledger.find(id)
    }

    /// Drop every queued and delayed-retry task. Returns how many were dropped.
    ///
    /// Dropped tasks leave no history; their handles resolve with
    /// [`SchedulerError::TaskDropped`].
    pub fn clear_queues(&self) -> usize {
        let dropped = self.inner.lock().drain_pending();
        let count = dropped.len();
        // dropping the records closes their completion channels
        drop(dropped);
        info!(dropped = count, "queues cleared");
        self.inner.emit(SchedulerEvent::QueuesCleared { dropped: count });
        count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent<K>> {
        self.inner.events.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().closed
    }

    /// Reject further admissions, cancel every schedule, drop queued and
    /// delayed-retry tasks and stop the dispatcher.
    ///
    /// Running attempts keep going and are still recorded; a failure after
    /// shutdown is final. Handles of dropped tasks resolve with
    /// [`SchedulerError::TaskDropped`].
    pub async fn shutdown(&self) {
        self.inner.close();
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher {
            // a panicked dispatcher has nothing left to wait for
            let _ = dispatcher.await;
        }
    }
}

impl<K: TaskKind> Drop for Scheduler<K> {
    fn drop(&mut self) {
        self.inner.close();
    }
}
