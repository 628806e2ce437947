//! Sink that writes result records to the tracing log.

use async_trait::async_trait;
use tracing::{info, warn};

use super::traits::{CallbackError, CallbackSink};
use super::types::Call;

/// Default sink: logs every record and never fails.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CallbackSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, call: Call) -> Result<(), CallbackError> {
        if call.is_success() {
            info!(
                task_id = %call.task.id,
                attempt = call.attempt,
                status = %call.task.status,
                "Transcode attempt succeeded"
            );
        } else {
            warn!(
                task_id = %call.task.id,
                attempt = call.attempt,
                code = call.code,
                kind = ?call.kind,
                is_final = call.is_final,
                "Transcode attempt failed: {}",
                call.message.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}
