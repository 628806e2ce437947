//! Mock transcoding plugin for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

use crate::plugin::{ExecOutcome, PluginError, TranscodeJob, TranscodeMessage, TranscodePlugin};

/// Scripted result of one `exec` call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Exit with `STATUS_OK`.
    Success,
    /// Exit with the given non-zero code.
    Code(i32),
    /// Return `PluginError::ExecutionFailed` with the given reason.
    Error(String),
    /// Panic with the given message.
    Panic(String),
}

#[derive(Default)]
struct InFlight {
    /// Wake-up signal per executing task.
    signals: HashMap<String, Arc<Notify>>,
    /// Tasks with a cancel request not yet observed by `exec`.
    cancelled: HashSet<String>,
}

/// Mock implementation of the TranscodePlugin trait.
///
/// Provides controllable behavior for testing:
/// - Record every exec and cancel request
/// - Script outcomes per call (success, exit code, error, panic)
/// - Hold executions until released or cancelled
/// - Track the peak number of concurrent executions
///
/// # Example
///
/// ```rust,ignore
/// use transcode_core::testing::{MockOutcome, MockPlugin};
///
/// let plugin = MockPlugin::new("flv");
/// plugin.push_outcome(MockOutcome::Code(1)).await;
/// plugin.set_blocking(true);
///
/// // ... submit tasks ...
///
/// plugin.wait_for_execs(1).await;
/// plugin.release(&task.id);
/// ```
#[derive(Clone)]
pub struct MockPlugin {
    kind: String,
    /// Recorded exec requests.
    execs: Arc<RwLock<Vec<TranscodeJob>>>,
    /// Recorded cancel requests.
    cancels: Arc<RwLock<Vec<String>>>,
    /// Scripted outcomes, consumed front first. Empty means success.
    outcomes: Arc<RwLock<VecDeque<MockOutcome>>>,
    /// Simulated execution duration in milliseconds.
    exec_duration_ms: Arc<RwLock<u64>>,
    /// Hold executions until `release` or `cancel`.
    blocking: Arc<AtomicBool>,
    /// Refuse cancel requests.
    fail_cancel: Arc<AtomicBool>,
    in_flight: Arc<Mutex<InFlight>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Decrements the active count and forgets the in-flight entry, even on panic.
struct ActiveGuard<'a> {
    plugin: &'a MockPlugin,
    task_id: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.plugin.active.fetch_sub(1, Ordering::SeqCst);
        self.plugin.in_flight().signals.remove(&self.task_id);
    }
}

impl MockPlugin {
    /// Create a new mock plugin reporting `kind`.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            execs: Arc::new(RwLock::new(Vec::new())),
            cancels: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(VecDeque::new())),
            exec_duration_ms: Arc::new(RwLock::new(0)),
            blocking: Arc::new(AtomicBool::new(false)),
            fail_cancel: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(Mutex::new(InFlight::default())),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of a future exec call.
    pub async fn push_outcome(&self, outcome: MockOutcome) {
        self.outcomes.write().await.push_back(outcome);
    }

    /// Make every exec call produce `outcome` `times` times.
    pub async fn push_outcomes(&self, outcome: MockOutcome, times: usize) {
        let mut outcomes = self.outcomes.write().await;
        for _ in 0..times {
            outcomes.push_back(outcome.clone());
        }
    }

    /// Set the simulated execution duration.
    pub async fn set_exec_duration(&self, duration: Duration) {
        *self.exec_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Hold executions until released or cancelled.
    pub fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::SeqCst);
    }

    /// Make cancel requests fail.
    pub fn set_fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    /// Let a held execution finish with its scripted outcome.
    ///
    /// Returns `false` if no execution is in flight for the task.
    pub fn release(&self, task_id: &str) -> bool {
        match self.in_flight().signals.get(task_id) {
            Some(signal) => {
                signal.notify_one();
                true
            }
            None => false,
        }
    }

    /// Stop holding executions and release every one in flight.
    pub fn release_all(&self) {
        self.set_blocking(false);
        for signal in self.in_flight().signals.values() {
            signal.notify_one();
        }
    }

    /// Get all recorded exec requests.
    pub async fn recorded_execs(&self) -> Vec<TranscodeJob> {
        self.execs.read().await.clone()
    }

    /// Get the number of exec calls made.
    pub async fn exec_count(&self) -> usize {
        self.execs.read().await.len()
    }

    /// Get all recorded cancel requests.
    pub async fn recorded_cancels(&self) -> Vec<String> {
        self.cancels.read().await.clone()
    }

    /// Number of executions currently in progress.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent executions observed.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Whether an execution for `task_id` is in progress.
    pub fn is_executing(&self, task_id: &str) -> bool {
        self.in_flight().signals.contains_key(task_id)
    }

    /// Wait until at least `count` exec calls were made, or 5 seconds pass.
    pub async fn wait_for_execs(&self, count: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if self.exec_count().await >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn take_cancelled(&self, task_id: &str) -> bool {
        self.in_flight().cancelled.remove(task_id)
    }
}

#[async_trait]
impl TranscodePlugin for MockPlugin {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn exec(&self, job: &TranscodeJob) -> Result<ExecOutcome, PluginError> {
        let signal = Arc::new(Notify::new());
        let cancelled_early = {
            let mut in_flight = self.in_flight();
            let cancelled = in_flight.cancelled.remove(&job.task_id);
            if !cancelled {
                in_flight
                    .signals
                    .insert(job.task_id.clone(), Arc::clone(&signal));
            }
            cancelled
        };
        if cancelled_early {
            self.execs.write().await.push(job.clone());
            return Err(PluginError::Cancelled);
        }

        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let _guard = ActiveGuard {
            plugin: self,
            task_id: job.task_id.clone(),
        };

        self.execs.write().await.push(job.clone());
        let outcome = self
            .outcomes
            .write()
            .await
            .pop_front()
            .unwrap_or(MockOutcome::Success);

        let blocking = self.blocking.load(Ordering::SeqCst);
        let duration = Duration::from_millis(*self.exec_duration_ms.read().await);
        let hold = async {
            if blocking {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(duration).await
            }
        };
        tokio::select! {
            _ = signal.notified() => {}
            _ = hold => {}
        }

        if self.take_cancelled(&job.task_id) {
            return Err(PluginError::Cancelled);
        }

        match outcome {
            MockOutcome::Success => Ok(ExecOutcome::success(TranscodeMessage::with_output(
                format!("transcoded {}", job.output.display()),
            ))),
            MockOutcome::Code(code) => Ok(ExecOutcome::failure(
                code,
                TranscodeMessage::with_error(format!("mock exited with code {}", code)),
            )),
            MockOutcome::Error(reason) => Err(PluginError::execution_failed(reason, None)),
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }

    async fn cancel(&self, task_id: &str) -> Result<(), PluginError> {
        self.cancels.write().await.push(task_id.to_string());

        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(PluginError::cancel_failed("mock refused cancel"));
        }

        let mut in_flight = self.in_flight();
        in_flight.cancelled.insert(task_id.to_string());
        if let Some(signal) = in_flight.signals.get(task_id) {
            signal.notify_one();
        }
        Ok(())
    }

    async fn process(
        &self,
        task_id: &str,
    ) -> Result<HashMap<String, serde_json::Value>, PluginError> {
        if !self.is_executing(task_id) {
            return Err(PluginError::NotRunning {
                task_id: task_id.to_string(),
            });
        }

        let mut report = HashMap::new();
        report.insert("task_id".to_string(), serde_json::json!(task_id));
        report.insert("active".to_string(), serde_json::json!(self.active()));
        Ok(report)
    }
}
