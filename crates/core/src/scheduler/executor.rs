//! Per-task executor.
//!
//! Runs the bound plugin outside the store lock, retries failed attempts up
//! to the configured limit and reports every attempt to the callback sink.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::callback::{Call, CallbackError, ErrorKind};
use crate::metrics;
use crate::plugin::{PluginError, TranscodeMessage, STATUS_CANCELLED, STATUS_OK};
use crate::task::{Task, TaskId, TaskStatus, Transition};

use super::runner::Shared;

/// Result of one plugin invocation, flattened for the result record.
struct AttemptResult {
    code: i32,
    kind: Option<ErrorKind>,
    message: Option<String>,
    output: TranscodeMessage,
}

impl AttemptResult {
    fn from_exec(result: Result<crate::plugin::ExecOutcome, PluginError>) -> Self {
        match result {
            Ok(outcome) if outcome.is_success() => Self {
                code: STATUS_OK,
                kind: None,
                message: None,
                output: outcome.message,
            },
            Ok(outcome) => {
                let message = if outcome.message.error.is_empty() {
                    format!("plugin exited with code {}", outcome.code)
                } else {
                    outcome.message.error.clone()
                };
                Self {
                    code: outcome.code,
                    kind: Some(ErrorKind::ExecutionError),
                    message: Some(message),
                    output: outcome.message,
                }
            }
            Err(PluginError::Cancelled) => Self {
                code: STATUS_CANCELLED,
                kind: Some(ErrorKind::Cancelled),
                message: Some(PluginError::Cancelled.to_string()),
                output: TranscodeMessage::default(),
            },
            Err(e) => Self {
                code: e.status_code(),
                kind: Some(ErrorKind::ExecutionError),
                message: Some(e.to_string()),
                output: e
                    .stderr()
                    .map(TranscodeMessage::with_error)
                    .unwrap_or_default(),
            },
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            None => "success",
            Some(ErrorKind::Cancelled) => "cancelled",
            Some(_) => "failure",
        }
    }

    fn into_call(self, attempt: u32, is_final: bool, task: Task) -> Call {
        Call::new(
            self.code,
            self.kind,
            self.message,
            attempt,
            is_final,
            task,
            self.output,
        )
    }
}

/// Releases the task's running slot when the executor exits, unwinding
/// included.
struct SlotGuard {
    shared: Arc<Shared>,
    task_id: TaskId,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.shared.release_slot(&self.task_id);
    }
}

/// Executes one admitted task and releases its slot afterwards.
///
/// A panic anywhere in the attempt loop fails the task with an internal
/// error instead of tearing down the dispatcher.
pub(crate) async fn run(shared: Arc<Shared>, task: Task) {
    let task_id = task.id.clone();
    let _slot = SlotGuard {
        shared: Arc::clone(&shared),
        task_id: task_id.clone(),
    };

    let result = AssertUnwindSafe(execute(&shared, &task)).catch_unwind().await;
    if let Err(panic) = result {
        let reason = format!("executor panicked: {}", panic_message(panic.as_ref()));
        error!(task_id = %task_id, "{}", reason);
        metrics::ATTEMPTS_TOTAL.with_label_values(&["panic"]).inc();

        match shared
            .store
            .complete(&task_id, TaskStatus::Failed, Some(reason.clone()))
        {
            Transition::Applied(snapshot) => {
                metrics::TASKS_FINISHED
                    .with_label_values(&[TaskStatus::Failed.as_str()])
                    .inc();
                let attempt = snapshot.attempts;
                deliver(&shared, Call::internal_error(snapshot, attempt, reason)).await;
            }
            Transition::Rejected(snapshot) => {
                debug!(
                    task_id = %task_id,
                    status = %snapshot.status,
                    "Task already finished when executor panicked"
                );
            }
            Transition::Missing => {}
        }
    }
}

async fn execute(shared: &Shared, task: &Task) {
    let task_id = task.id.as_str();
    let plugin = Arc::clone(task.plugin());
    let job = task.job();
    let retry_limit = shared.config.retry_limit.max(1);

    loop {
        let Some(attempt) = shared.store.begin_attempt(task_id) else {
            debug!(task_id = %task_id, "Task no longer running, skipping attempt");
            return;
        };

        debug!(task_id = %task_id, attempt, plugin = %plugin.kind(), "Starting attempt");
        let started = Instant::now();
        let result = AttemptResult::from_exec(plugin.exec(&job).await);
        let elapsed = started.elapsed();

        let label = result.label();
        metrics::ATTEMPTS_TOTAL.with_label_values(&[label]).inc();
        metrics::EXECUTION_DURATION
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());

        match result.kind {
            None => {
                let transition = shared.store.complete(task_id, TaskStatus::Succeeded, None);
                if matches!(transition, Transition::Applied(_)) {
                    info!(
                        task_id = %task_id,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Task succeeded"
                    );
                }
                finish(shared, task, attempt, result, transition).await;
                return;
            }
            Some(ErrorKind::Cancelled) => {
                let transition = shared.store.complete(task_id, TaskStatus::Cancelled, None);
                if matches!(transition, Transition::Applied(_)) {
                    info!(task_id = %task_id, attempt, "Task cancelled during execution");
                }
                finish(shared, task, attempt, result, transition).await;
                return;
            }
            Some(_) => {
                let message = result.message.clone().unwrap_or_default();

                if attempt < retry_limit {
                    warn!(
                        task_id = %task_id,
                        attempt,
                        retry_limit,
                        "Attempt failed, retrying: {}",
                        message
                    );
                    let still_running = shared.store.record_failure(task_id, &message);
                    let snapshot = shared.store.get(task_id).unwrap_or_else(|| task.clone());
                    deliver(shared, result.into_call(attempt, false, snapshot)).await;
                    if !still_running {
                        return;
                    }

                    let backoff = shared.config.retry_backoff_ms * u64::from(attempt);
                    if backoff > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    continue;
                }

                let transition =
                    shared
                        .store
                        .complete(task_id, TaskStatus::Failed, Some(message.clone()));
                if matches!(transition, Transition::Applied(_)) {
                    warn!(task_id = %task_id, attempt, "Task failed: {}", message);
                }
                finish(shared, task, attempt, result, transition).await;
                return;
            }
        }
    }
}

/// Reports the last attempt according to how its terminal transition went.
async fn finish(
    shared: &Shared,
    task: &Task,
    attempt: u32,
    result: AttemptResult,
    transition: Transition,
) {
    match transition {
        Transition::Applied(snapshot) => {
            metrics::TASKS_FINISHED
                .with_label_values(&[snapshot.status.as_str()])
                .inc();
            deliver(shared, result.into_call(attempt, true, snapshot)).await;
        }
        // Someone else (cancel) decided the terminal status first
        Transition::Rejected(snapshot) => {
            debug!(
                task_id = %task.id,
                status = %snapshot.status,
                "Attempt finished after task reached a terminal status"
            );
            deliver(shared, result.into_call(attempt, false, snapshot)).await;
        }
        Transition::Missing => {
            debug!(task_id = %task.id, "Task pruned before its attempt finished");
        }
    }
}

/// Hands a result record to the sink, bounded by the callback timeout.
///
/// Failures are logged and counted; they never affect task status.
pub(crate) async fn deliver(shared: &Shared, call: Call) {
    let sink = shared.sink();
    let timeout_ms = shared.config.callback_timeout_ms;
    let task_id = call.task.id.clone();

    let delivery = AssertUnwindSafe(sink.deliver(call)).catch_unwind();
    let err = match tokio::time::timeout(Duration::from_millis(timeout_ms), delivery).await {
        Ok(Ok(Ok(()))) => return,
        Ok(Ok(Err(e))) => e,
        Ok(Err(panic)) => CallbackError::Panicked {
            reason: panic_message(panic.as_ref()),
        },
        Err(_) => CallbackError::Timeout { timeout_ms },
    };

    metrics::CALLBACK_FAILURES.inc();
    warn!(
        task_id = %task_id,
        sink = %sink.name(),
        kind = %ErrorKind::CallbackError,
        "Callback delivery failed: {}",
        err
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::ExecOutcome;

    #[test]
    fn test_attempt_result_mapping() {
        let ok = AttemptResult::from_exec(Ok(ExecOutcome::success(TranscodeMessage::with_output(
            "done",
        ))));
        assert_eq!(ok.code, STATUS_OK);
        assert!(ok.kind.is_none());
        assert_eq!(ok.label(), "success");

        let failed = AttemptResult::from_exec(Ok(ExecOutcome::failure(
            7,
            TranscodeMessage::default(),
        )));
        assert_eq!(failed.code, 7);
        assert_eq!(failed.kind, Some(ErrorKind::ExecutionError));
        assert_eq!(failed.message.as_deref(), Some("plugin exited with code 7"));

        let timeout = AttemptResult::from_exec(Err(PluginError::Timeout { timeout_secs: 5 }));
        assert_eq!(timeout.code, crate::plugin::STATUS_TIMEOUT);
        assert_eq!(timeout.label(), "failure");

        let cancelled = AttemptResult::from_exec(Err(PluginError::Cancelled));
        assert_eq!(cancelled.code, STATUS_CANCELLED);
        assert_eq!(cancelled.kind, Some(ErrorKind::Cancelled));
    }

    #[test]
    fn test_stderr_becomes_output_error() {
        let result = AttemptResult::from_exec(Err(PluginError::execution_failed(
            "exit 1",
            Some("bad codec".to_string()),
        )));
        assert_eq!(result.output.error, "bad codec");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
