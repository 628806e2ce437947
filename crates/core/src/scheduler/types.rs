//! Types for the scheduler module.

use serde::Serialize;
use std::collections::HashMap;

use crate::task::Task;

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the dispatch loop is running.
    pub running: bool,
    pub max_running: usize,
    /// Tasks currently holding a capacity slot.
    pub current_running: usize,
    pub total_tasks: usize,
    pub pending: usize,
    /// Tasks whose status is Running.
    pub running_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Registered format keys.
    pub formats: Vec<String>,
}

/// Progress of one task, as reported by `Scheduler::process`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskProgress {
    pub task: Task,
    /// Plugin status mapping; only present while the task is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<HashMap<String, serde_json::Value>>,
}
