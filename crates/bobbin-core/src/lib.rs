//! bobbin-core
//!
//! In-process background task scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, priority, task kind, retry decision, events）
//! - **ports**: 差し替え可能な外部依存（Clock, IdGenerator）
//! - **queue**: TaskRecord, 優先度キュー, delayed-retry キュー, RetryPolicy
//! - **runtime**: handler の契約（TaskHandler, TaskContext）と HandlerRegistry
//! - **ledger**: 完了履歴（リングバッファ）と統計
//! - **observability**: snapshot / schedule の読み取り専用ビュー
//! - **config**: SchedulerConfig（humantime 形式の duration）
//! - **scheduler**: Scheduler 本体、builder、dispatcher、recurring schedule
//! - **error**: SchedulerError（同期 API）と TaskError（試行の失敗）

pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use domain::{Priority, ScheduleId, SchedulerEvent, TaskId, TaskKind};
pub use error::{SchedulerError, TaskError};
pub use ledger::{HistoryEntry, Statistics, TaskStatus};
pub use observability::{ScheduleInfo, SchedulerSnapshot};
pub use runtime::{Progress, TaskContext, TaskHandler, TaskResult, handler_fn};
pub use scheduler::{PayloadSource, Scheduler, SchedulerBuilder, SubmitOptions, TaskHandle};
