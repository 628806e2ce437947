//! Task records and the in-memory store that owns them.

mod store;
mod types;

pub use store::{CancelTarget, StoreCounts, TaskStore, Transition};
pub use types::{Task, TaskId, TaskStatus};
