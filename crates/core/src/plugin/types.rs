//! Types shared between the scheduler and transcoding plugins.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Status code of a successful execution.
pub const STATUS_OK: i32 = 0;
/// Generic execution failure.
pub const STATUS_FAILED: i32 = 1;
/// The encoder exceeded its time budget.
pub const STATUS_TIMEOUT: i32 = 2;
/// The execution was cancelled.
pub const STATUS_CANCELLED: i32 = 3;
/// The executor itself faulted (panic inside the plugin call).
pub const STATUS_INTERNAL: i32 = 4;

/// A single execution parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

/// Execution parameters, e.g. `{"-b:v": 1200000, "-r": 30}`.
///
/// Ordered so encoder command lines are deterministic.
pub type TranscodeParams = BTreeMap<String, ParamValue>;

/// One execution request handed to a plugin.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Task the execution belongs to. Plugins key cancel/process on it.
    pub task_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: TranscodeParams,
}

/// Free-form output of one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscodeMessage {
    /// Encoder output on success (summary, log tail).
    #[serde(default)]
    pub output: String,
    /// Encoder diagnostics on failure.
    #[serde(default)]
    pub error: String,
    /// Plugin-specific extra fields.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
}

impl TranscodeMessage {
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }
}

/// What a plugin reports when an execution ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    /// `STATUS_OK` on success, anything else is a failure.
    pub code: i32,
    pub message: TranscodeMessage,
}

impl ExecOutcome {
    pub fn success(message: TranscodeMessage) -> Self {
        Self {
            code: STATUS_OK,
            message,
        }
    }

    pub fn failure(code: i32, message: TranscodeMessage) -> Self {
        Self { code, message }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_OK
    }
}
