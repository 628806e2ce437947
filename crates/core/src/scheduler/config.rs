//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of tasks executing at once.
    #[serde(default = "default_max_running")]
    pub max_running: usize,

    /// Maximum execution attempts per task (1 = no retry).
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Linear backoff between attempts: attempt `n` waits `n * retry_backoff_ms`.
    /// 0 retries immediately.
    #[serde(default)]
    pub retry_backoff_ms: u64,

    /// Upper bound on a single callback delivery (milliseconds).
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_ms: u64,
}

fn default_max_running() -> usize {
    1
}

fn default_retry_limit() -> u32 {
    1
}

fn default_callback_timeout() -> u64 {
    30_000 // 30 seconds
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_running: default_max_running(),
            retry_limit: default_retry_limit(),
            retry_backoff_ms: 0,
            callback_timeout_ms: default_callback_timeout(),
        }
    }
}

impl SchedulerConfig {
    /// Sets the maximum number of concurrently running tasks.
    pub fn with_max_running(mut self, max: usize) -> Self {
        self.max_running = max;
        self
    }

    /// Sets the maximum attempts per task.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Sets the linear retry backoff step.
    pub fn with_retry_backoff(mut self, backoff_ms: u64) -> Self {
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// Sets the callback delivery timeout.
    pub fn with_callback_timeout(mut self, timeout_ms: u64) -> Self {
        self.callback_timeout_ms = timeout_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_running, 1);
        assert_eq!(config.retry_limit, 1);
        assert_eq!(config.retry_backoff_ms, 0);
        assert_eq!(config.callback_timeout_ms, 30_000);
    }

    #[test]
    fn test_config_builder() {
        let config = SchedulerConfig::default()
            .with_max_running(4)
            .with_retry_limit(3)
            .with_retry_backoff(250)
            .with_callback_timeout(1000);

        assert_eq!(config.max_running, 4);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.callback_timeout_ms, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SchedulerConfig = toml::from_str("max_running = 8").unwrap();
        assert_eq!(config.max_running, 8);
        assert_eq!(config.retry_limit, 1);
    }
}
