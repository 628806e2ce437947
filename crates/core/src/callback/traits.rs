//! Callback sink trait and its error type.

use async_trait::async_trait;
use thiserror::Error;

use super::types::Call;

/// Errors a callback sink can report. Never affects task status.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The receiving side is gone.
    #[error("Callback channel closed")]
    Closed,

    /// The sink refused the record.
    #[error("Callback rejected: {reason}")]
    Rejected { reason: String },

    /// The sink did not answer in time.
    #[error("Callback timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The sink panicked while handling the record.
    #[error("Callback sink panicked: {reason}")]
    Panicked { reason: String },
}

impl CallbackError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Consumer of per-attempt result records.
#[async_trait]
pub trait CallbackSink: Send + Sync {
    /// Returns the name of this sink implementation.
    fn name(&self) -> &str;

    /// Delivers one record. Called once per execution attempt.
    async fn deliver(&self, call: Call) -> Result<(), CallbackError>;
}
