//! Trait definitions for the plugin module.

use async_trait::async_trait;
use std::collections::HashMap;

use super::error::PluginError;
use super::types::{ExecOutcome, TranscodeJob};

/// A format-specific transcoding plugin.
///
/// One instance is shared by every task of its format, so `cancel` and
/// `process` are keyed by task id.
#[async_trait]
pub trait TranscodePlugin: Send + Sync {
    /// Returns the format label this plugin handles (e.g. "flv").
    fn kind(&self) -> &str;

    /// Runs one execution to completion.
    ///
    /// May take arbitrarily long. An `Ok` outcome with a non-zero code is a
    /// failed execution, not an error of the plugin itself.
    async fn exec(&self, job: &TranscodeJob) -> Result<ExecOutcome, PluginError>;

    /// Asks the plugin to stop the execution of `task_id`.
    ///
    /// Cooperative: returning `Ok` means the request was accepted and the
    /// in-flight `exec` will return shortly.
    async fn cancel(&self, task_id: &str) -> Result<(), PluginError>;

    /// Reports plugin-specific progress for the execution of `task_id`.
    async fn process(
        &self,
        task_id: &str,
    ) -> Result<HashMap<String, serde_json::Value>, PluginError>;
}
