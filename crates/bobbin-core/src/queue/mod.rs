//! Queue module: task records, the priority queue set, the delayed-retry
//! queue, and retry timing.

mod delayed;
mod record;
mod retry;
mod state;
mod tiers;

pub use delayed::DelayedQueue;
pub use record::TaskRecord;
pub(crate) use record::Observers;
pub use retry::RetryPolicy;
pub use state::TaskState;
pub use tiers::{PriorityQueueSet, QueueDepths};
