//! Testing utilities and mock implementations.
//!
//! This module provides mock plugins and sinks so the scheduler can be
//! exercised end to end without an encoder on the machine.
//!
//! # Example
//!
//! ```rust,ignore
//! use transcode_core::testing::fixtures;
//!
//! let (scheduler, plugin, sink) = fixtures::scheduler_with_mock(Default::default());
//! scheduler.start();
//!
//! let task = scheduler.add_task("clip.flv", "clip.mp4", Default::default())?;
//! sink.wait_for_calls(1).await;
//! ```

mod mock_plugin;
mod recording_sink;

pub use mock_plugin::{MockOutcome, MockPlugin};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{MockPlugin, RecordingSink};
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::task::{Task, TaskStatus};

    /// A scheduler with a mock plugin bound to `.flv` and a recording sink.
    pub fn scheduler_with_mock(config: SchedulerConfig) -> (Scheduler, MockPlugin, RecordingSink) {
        let scheduler = Scheduler::new(config);
        let plugin = MockPlugin::new("flv");
        let sink = RecordingSink::new();

        scheduler.register_plugin(".flv", Arc::new(plugin.clone()));
        scheduler.set_callback(Arc::new(sink.clone()));
        (scheduler, plugin, sink)
    }

    /// Poll until the task reaches `status`, or 5 seconds pass.
    pub async fn wait_for_status(
        scheduler: &Scheduler,
        id: &str,
        status: TaskStatus,
    ) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if let Ok(task) = scheduler.get_task(id) {
                if task.status == status {
                    return Some(task);
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    /// Poll until no task holds a running slot, or 5 seconds pass.
    pub async fn wait_until_idle(scheduler: &Scheduler) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            let status = scheduler.status();
            if status.current_running == 0 && status.pending == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}
