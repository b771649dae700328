//! Dispatcher: fills free slots and applies attempt outcomes.
//!
//! Wake-ups come from `Inner::wake` (admission, freed slot, parked retry),
//! the earliest retry deadline, and `scheduling_tick_interval` as a fallback.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinError;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::domain::{Decision, Priority, SchedulerEvent, TaskId, TaskKind};
use crate::error::TaskError;
use crate::ledger::{self, HistoryEntry, TaskStatus};
use crate::queue::TaskRecord;
use crate::runtime::{Progress, TaskContext, TaskResult};

use super::Inner;

/// Fallback when a retry delay would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub(crate) async fn run<K: TaskKind>(inner: Arc<Inner<K>>, mut shutdown: watch::Receiver<bool>) {
    let tick = inner.config.scheduling_tick_interval;
    debug!(tick = ?tick, "dispatcher loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next_due = dispatch_ready(&inner);

        let mut wake_at = Instant::now() + tick;
        if let Some(due) = next_due {
            wake_at = wake_at.min(due);
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = inner.wake.notified() => {}
            _ = time::sleep_until(wake_at) => {}
        }
    }

    debug!("dispatcher loop stopped");
}

/// What a spawned attempt needs; copied out of the record under the lock.
struct Launch<K> {
    task_id: TaskId,
    kind: K,
    priority: Priority,
    payload: serde_json::Value,
    attempt: u32,
    timeout: Duration,
    progress: Option<mpsc::UnboundedSender<Progress>>,
}

/// Promote due retries, then start queued work while slots are free.
/// Returns the earliest pending retry deadline.
fn dispatch_ready<K: TaskKind>(inner: &Arc<Inner<K>>) -> Option<Instant> {
    let limit = inner.config.concurrency_limit;
    let mut launches = Vec::new();

    let next_due = {
        let mut state = inner.lock();
        let now = Instant::now();

        for mut record in state.delayed.pop_due(now) {
            record.requeue();
            debug!(task_id = %record.id, attempts = record.attempts, "retry requeued");
            state.queues.push(record.priority, record);
        }

        while state.in_flight.len() < limit {
            let Some((_, mut record)) = state.queues.pop_next() else {
                break;
            };
            debug_assert!(record.state.is_runnable(), "dispatching {:?}", record.state);
            record.start_attempt(now);
            launches.push(Launch {
                task_id: record.id,
                kind: record.kind,
                priority: record.priority,
                payload: record.payload.clone(),
                attempt: record.attempts,
                timeout: record.timeout,
                progress: record.progress_sender(),
            });
            state.in_flight.insert(record.id, record);
        }

        state.delayed.next_due()
    };

    for launch in launches {
        debug!(
            task_id = %launch.task_id,
            kind = %launch.kind,
            priority = %launch.priority,
            attempt = launch.attempt,
            "dispatching task"
        );
        inner.emit(SchedulerEvent::Started {
            task_id: launch.task_id,
            kind: launch.kind,
            attempt: launch.attempt,
        });
        tokio::spawn(execute(Arc::clone(inner), launch));
    }

    next_due
}

/// Run one attempt: handler vs. timeout. Exactly one of them ends it.
async fn execute<K: TaskKind>(inner: Arc<Inner<K>>, launch: Launch<K>) {
    let Launch {
        task_id,
        kind,
        payload,
        attempt,
        timeout,
        progress,
        ..
    } = launch;

    let outcome = match inner.registry.get(&kind) {
        None => Err(TaskError::UnknownKind(kind.to_string())),
        Some(handler) => {
            let started = Instant::now();
            let (deadline_tx, deadline_rx) = watch::channel(false);
            let ctx = TaskContext::new(task_id, attempt, progress, deadline_rx);

            // own task: a panic surfaces as a JoinError instead of killing the dispatcher
            let mut attempt_task = tokio::spawn(async move { handler.handle(payload, ctx).await });

            tokio::select! {
                joined = &mut attempt_task => joined.unwrap_or_else(|err| Err(join_failure(err))),
                _ = time::sleep(timeout) => {
                    // cooperative: the handler sees ctx.timed_out() and the task is left detached
                    let _ = deadline_tx.send(true);
                    Err(TaskError::Timeout { elapsed: started.elapsed() })
                }
            }
        }
    };

    inner.complete(task_id, outcome);
}

fn join_failure(err: JoinError) -> TaskError {
    match err.try_into_panic() {
        Ok(panic) => TaskError::handler(format!("handler panicked: {}", panic_message(&*panic))),
        Err(err) => TaskError::handler(format!("handler task failed: {err}")),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// Side effects of a completed attempt, performed after the lock is released.
enum Settled<K> {
    Succeeded {
        entry: HistoryEntry<K>,
        completion: Option<oneshot::Sender<TaskResult>>,
        value: serde_json::Value,
    },
    Retrying {
        task_id: TaskId,
        kind: K,
        attempt: u32,
        delay: Duration,
        error: TaskError,
        reason: String,
    },
    Failed {
        entry: HistoryEntry<K>,
        completion: Option<oneshot::Sender<TaskResult>>,
        error: TaskError,
        reason: String,
    },
}

impl<K: TaskKind> Inner<K> {
    /// Apply the outcome of one attempt: ledger, retry, or terminal failure.
    pub(crate) fn complete(&self, task_id: TaskId, outcome: TaskResult) {
        let now = Instant::now();

        let settled = {
            let mut state = self.lock();
            let Some(mut record) = state.in_flight.remove(&task_id) else {
                warn!(task_id = %task_id, "completed task was not in flight");
                return;
            };
            let processing_time = record.processing_time(now);

            match outcome {
                Ok(value) => {
                    record.mark_succeeded();
                    let entry = HistoryEntry {
                        id: record.id,
                        kind: record.kind,
                        priority: record.priority,
                        status: TaskStatus::Success,
                        attempts: record.attempts,
                        processing_time,
                        result_summary: ledger::summarize(&value),
                        completed_at: self.clock.now(),
                    };
                    state.ledger.record(entry.clone());
                    Settled::Succeeded {
                        entry,
                        completion: record.take_completion(),
                        value,
                    }
                }
                Err(error) => match self.decide(&record, &error, state.closed) {
                    Decision::Retry { delay, reason } => {
                        let due = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
                        let attempt = record.attempts;
                        record.schedule_retry(due, error.clone());
                        let kind = record.kind;
                        state.delayed.push(due, record);
                        Settled::Retrying {
                            task_id,
                            kind,
                            attempt,
                            delay,
                            error,
                            reason,
                        }
                    }
                    Decision::MarkFailed { reason } => {
                        record.mark_failed(error.clone());
                        let entry = HistoryEntry {
                            id: record.id,
                            kind: record.kind,
                            priority: record.priority,
                            status: TaskStatus::Failed,
                            attempts: record.attempts,
                            processing_time,
                            result_summary: ledger::truncate(error.to_string()),
                            completed_at: self.clock.now(),
                        };
                        state.ledger.record(entry.clone());
                        Settled::Failed {
                            entry,
                            completion: record.take_completion(),
                            error,
                            reason,
                        }
                    }
                },
            }
        };

        match settled {
            Settled::Succeeded {
                entry,
                completion,
                value,
            } => {
                info!(
                    task_id = %entry.id,
                    kind = %entry.kind,
                    attempts = entry.attempts,
                    processing_time = ?entry.processing_time,
                    "task succeeded"
                );
                deliver(entry.id, completion, Ok(value));
                self.emit(SchedulerEvent::Succeeded(entry));
            }
            Settled::Retrying {
                task_id,
                kind,
                attempt,
                delay,
                error,
                reason,
            } => {
                warn!(
                    task_id = %task_id,
                    kind = %kind,
                    attempt,
                    error = %error,
                    "{reason}"
                );
                self.emit(SchedulerEvent::RetryScheduled {
                    task_id,
                    kind,
                    attempt,
                    delay,
                    error: error.to_string(),
                });
            }
            Settled::Failed {
                entry,
                completion,
                error,
                reason,
            } => {
                if error.is_timeout() {
                    warn!(task_id = %entry.id, kind = %entry.kind, error = %error, "attempt timed out");
                }
                info!(
                    task_id = %entry.id,
                    kind = %entry.kind,
                    attempts = entry.attempts,
                    error = %error,
                    reason = %reason,
                    "task failed"
                );
                deliver(entry.id, completion, Err(error));
                self.emit(SchedulerEvent::Failed(entry));
            }
        }

        // a slot is free, and a retry may now be the earliest deadline
        self.wake.notify_one();
    }

    /// After shutdown nothing would ever promote a parked retry, so the
    /// failure is terminal.
    fn decide(&self, record: &TaskRecord<K>, error: &TaskError, closed: bool) -> Decision {
        match self.decider.decide(record, error) {
            Decision::Retry { .. } if closed => Decision::MarkFailed {
                reason: format!(
                    "Shut down after attempt {}/{}",
                    record.attempts, record.max_attempts
                ),
            },
            decision => decision,
        }
    }
}

fn deliver(task_id: TaskId, completion: Option<oneshot::Sender<TaskResult>>, result: TaskResult) {
    let Some(completion) = completion else {
        return;
    };
    if completion.send(result).is_err() {
        debug!(task_id = %task_id, "completion receiver dropped");
    }
}
