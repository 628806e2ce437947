//! Result records delivered to callback sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::plugin::{TranscodeMessage, STATUS_INTERNAL, STATUS_OK};
use crate::task::Task;

/// Error taxonomy shared by the synchronous API and result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or unparsable extension on the input or output path.
    InvalidInput,
    /// No plugin registered for the input format.
    UnsupportedFormat,
    /// Unknown task identifier.
    NotFound,
    /// The plugin reported a failure.
    ExecutionError,
    /// The executor faulted.
    InternalError,
    /// The callback sink failed.
    CallbackError,
    /// The attempt was cut short by a cancel request.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ExecutionError => "execution_error",
            ErrorKind::InternalError => "internal_error",
            ErrorKind::CallbackError => "callback_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one execution attempt.
///
/// Built once by the executor and handed to the sink exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct Call {
    /// Plugin status code (`STATUS_OK` on success).
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether this attempt decided the task's terminal status.
    #[serde(rename = "final")]
    pub is_final: bool,
    /// Task snapshot taken when the attempt finished.
    pub task: Task,
    /// Free-form plugin output.
    pub output: TranscodeMessage,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn new(
        code: i32,
        kind: Option<ErrorKind>,
        message: Option<String>,
        attempt: u32,
        is_final: bool,
        task: Task,
        output: TranscodeMessage,
    ) -> Self {
        Self {
            code,
            kind,
            message,
            attempt,
            is_final,
            task,
            output,
            created_at: Utc::now(),
        }
    }

    /// Record for an attempt that faulted inside the executor.
    pub fn internal_error(task: Task, attempt: u32, reason: impl Into<String>) -> Self {
        Self::new(
            STATUS_INTERNAL,
            Some(ErrorKind::InternalError),
            Some(reason.into()),
            attempt,
            true,
            task,
            TranscodeMessage::default(),
        )
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_OK && self.kind.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::TranscodeParams;
    use crate::testing::MockPlugin;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn task() -> Task {
        Task::new(
            PathBuf::from("a.flv"),
            PathBuf::from("a.mp4"),
            TranscodeParams::new(),
            ".flv".to_string(),
            Arc::new(MockPlugin::new("flv")),
        )
    }

    #[test]
    fn test_call_serialization() {
        let call = Call::new(
            STATUS_OK,
            None,
            None,
            1,
            true,
            task(),
            TranscodeMessage::with_output("done"),
        );

        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["final"], true);
        assert_eq!(json["output"]["output"], "done");
        assert!(json.get("kind").is_none());
        assert!(call.is_success());
    }

    #[test]
    fn test_internal_error_call() {
        let call = Call::internal_error(task(), 2, "plugin panicked");
        assert_eq!(call.code, STATUS_INTERNAL);
        assert_eq!(call.kind, Some(ErrorKind::InternalError));
        assert_eq!(call.attempt, 2);
        assert!(!call.is_success());

        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["kind"], "internal_error");
    }
}
