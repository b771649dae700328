//! Domain model (ids, priorities, task kinds, retry decisions, events).

pub mod decision;
pub mod events;
pub mod ids;
pub mod kind;
pub mod priority;

pub use decision::{Decision, RetryDecider};
pub use events::SchedulerEvent;
pub use ids::{ScheduleId, TaskId};
pub use kind::TaskKind;
pub use priority::Priority;
