//! Transcoding job scheduler.
//!
//! Tasks are submitted against a registry of format plugins, admitted in
//! submission order while capacity remains, and executed with bounded retry.
//! Each execution attempt produces one [`Call`](crate::callback::Call) for
//! the installed callback sink.

mod config;
mod error;
mod executor;
mod runner;
mod types;

use once_cell::sync::Lazy;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use runner::Scheduler;
pub use types::{SchedulerStatus, TaskProgress};

static GLOBAL: Lazy<Scheduler> = Lazy::new(|| Scheduler::new(SchedulerConfig::default()));

/// Process-wide scheduler built from the default configuration.
///
/// Created on first use. Embedders that need their own limits should build
/// a [`Scheduler`] instead.
pub fn global() -> &'static Scheduler {
    &GLOBAL
}
