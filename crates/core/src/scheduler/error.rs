//! Error types for scheduler operations.

use thiserror::Error;

use crate::callback::ErrorKind;
use crate::plugin::PluginError;
use crate::task::TaskId;

/// Errors returned synchronously by the scheduler API.
///
/// Execution outcomes never surface here; they travel through task status
/// and the callback sink.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Input or output path has no usable extension.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No plugin registered for the input format.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Unknown task identifier.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// The plugin did not accept a cancel request; the task keeps running.
    #[error("Failed to cancel task {task_id}: {source}")]
    CancelFailed {
        task_id: TaskId,
        #[source]
        source: PluginError,
    },

    /// A plugin query failed.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

impl SchedulerError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Maps the error onto the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::CancelFailed { .. } | Self::Plugin(_) => ErrorKind::ExecutionError,
        }
    }
}
