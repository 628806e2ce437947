//! Error types for the plugin module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::{STATUS_CANCELLED, STATUS_FAILED, STATUS_TIMEOUT};

/// Errors a transcoding plugin can report.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The encoder binary could not be found.
    #[error("Executable not found at path: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The encoder ran but did not produce a usable result.
    #[error("Execution failed: {reason}")]
    ExecutionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The encoder exceeded its time budget.
    #[error("Execution timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// No execution is in flight for the given task.
    #[error("No running execution for task: {task_id}")]
    NotRunning { task_id: String },

    /// The plugin refused or failed to cancel an execution.
    #[error("Cancel failed: {reason}")]
    CancelFailed { reason: String },

    /// I/O error while driving the encoder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The execution was cancelled before it finished.
    #[error("Execution cancelled")]
    Cancelled,
}

impl PluginError {
    /// Creates an execution failed error with optional stderr output.
    pub fn execution_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a cancel failed error.
    pub fn cancel_failed(reason: impl Into<String>) -> Self {
        Self::CancelFailed {
            reason: reason.into(),
        }
    }

    /// Status code reported in result records when a plugin returns this error.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Timeout { .. } => STATUS_TIMEOUT,
            Self::Cancelled => STATUS_CANCELLED,
            _ => STATUS_FAILED,
        }
    }

    /// Captured encoder stderr, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
