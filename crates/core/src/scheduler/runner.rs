//! Scheduler implementation.
//!
//! A single dispatch loop admits pending tasks in submission order while
//! capacity remains and spawns one executor per admitted task. Submission,
//! completion, cancel and limit changes all wake the loop through a shared
//! [`Notify`]; wake-ups coalesce and every wake re-evaluates the queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::callback::{CallbackSink, LogSink};
use crate::metrics;
use crate::plugin::{format_key, PluginRegistry, TranscodeParams, TranscodePlugin};
use crate::task::{CancelTarget, Task, TaskStatus, TaskStore, Transition};

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::executor;
use super::types::{SchedulerStatus, TaskProgress};

/// State shared between the scheduler handle, the dispatch loop and executors.
pub(crate) struct Shared {
    pub(crate) config: SchedulerConfig,
    registry: RwLock<PluginRegistry>,
    pub(crate) store: TaskStore,
    sink: RwLock<Arc<dyn CallbackSink>>,
    signal: Notify,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl Shared {
    /// The currently installed callback sink.
    pub(crate) fn sink(&self) -> Arc<dyn CallbackSink> {
        Arc::clone(&self.sink.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wakes the dispatch loop.
    pub(crate) fn wake(&self) {
        self.signal.notify_one();
    }

    /// Frees the slot held by `task_id` and wakes the dispatcher.
    ///
    /// Safe to call more than once; only the first call frees the slot.
    pub(crate) fn release_slot(&self, task_id: &str) {
        if self.store.release(task_id) {
            metrics::TASKS_RUNNING.dec();
            debug!(task_id = %task_id, "Released running slot");
            self.wake();
        }
    }

    fn dispatch(self: &Arc<Self>) {
        for task in self.store.admit() {
            metrics::TASKS_RUNNING.inc();
            debug!(task_id = %task.id, format = %task.format, "Dispatching task");
            tokio::spawn(executor::run(Arc::clone(self), task));
        }
    }
}

/// Transcoding job scheduler.
///
/// Cheap to clone; clones share the same task store and dispatch loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Shared>,
}

impl Scheduler {
    /// Create a new scheduler. Nothing is dispatched until [`Scheduler::start`].
    pub fn new(config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let store = TaskStore::new(config.max_running);

        Self {
            inner: Arc::new(Shared {
                config,
                registry: RwLock::new(PluginRegistry::new()),
                store,
                sink: RwLock::new(Arc::new(LogSink::new())),
                signal: Notify::new(),
                running: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Binds `plugin` to `format`. Re-registering a format replaces the
    /// binding for later submissions; tasks already submitted keep theirs.
    pub fn register_plugin(&self, format: &str, plugin: Arc<dyn TranscodePlugin>) {
        info!(format = %format, plugin = %plugin.kind(), "Registering plugin");
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(format, plugin);
    }

    /// Registered format keys in first-registration order.
    pub fn formats(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .formats()
    }

    /// Changes the concurrency limit. Values below 1 are treated as 1.
    pub fn set_max_running(&self, max_running: usize) {
        info!(max_running, "Updating concurrency limit");
        self.inner.store.set_max_running(max_running);
        self.inner.wake();
    }

    /// Submits a new task.
    ///
    /// The plugin is resolved from the input extension and bound to the task
    /// for its whole lifetime. The store is left untouched on error.
    pub fn add_task(
        &self,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        params: TranscodeParams,
    ) -> Result<Task, SchedulerError> {
        let input = input.into();
        let output = output.into();

        let format = format_key(&input).ok_or_else(|| {
            SchedulerError::invalid_input(format!(
                "input has no file extension: {}",
                input.display()
            ))
        })?;
        if format_key(&output).is_none() {
            return Err(SchedulerError::invalid_input(format!(
                "output has no file extension: {}",
                output.display()
            )));
        }

        let plugin = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(&format)
            .ok_or_else(|| SchedulerError::UnsupportedFormat {
                format: format.clone(),
            })?;

        let task = self
            .inner
            .store
            .insert(Task::new(input, output, params, format, plugin));

        metrics::TASKS_SUBMITTED.inc();
        info!(
            task_id = %task.id,
            format = %task.format,
            input = %task.input.display(),
            "Task submitted"
        );
        self.inner.wake();
        Ok(task)
    }

    /// Start the dispatch loop. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!(
            max_running = self.inner.store.max_running(),
            retry_limit = self.inner.config.retry_limit,
            "Starting scheduler"
        );

        let shared = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Dispatch loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Dispatch loop received shutdown signal");
                        break;
                    }
                    _ = shared.signal.notified() => {
                        if !shared.running.load(Ordering::Relaxed) {
                            break;
                        }
                        shared.dispatch();
                    }
                }
            }
            info!("Dispatch loop stopped");
        });

        // Pick up anything submitted before start
        self.inner.wake();
    }

    /// Stop dispatching new tasks. Executors already running finish normally.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping scheduler");
        let _ = self.inner.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }

    /// A page of task snapshots in submission order, plus the total count.
    ///
    /// A negative `limit` returns everything from `skip` on.
    pub fn list_tasks(&self, limit: i64, skip: usize) -> (Vec<Task>, usize) {
        self.inner.store.list(limit, skip)
    }

    pub fn get_task(&self, id: &str) -> Result<Task, SchedulerError> {
        self.inner
            .store
            .get(id)
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    /// Cancels a task.
    ///
    /// Pending tasks are cancelled without touching the plugin. Running tasks
    /// are cancelled only if their plugin accepts the request. Cancelling a
    /// finished task is a no-op.
    pub async fn cancel(&self, id: &str) -> Result<(), SchedulerError> {
        let target = self
            .inner
            .store
            .begin_cancel(id)
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;

        match target {
            CancelTarget::WasPending(_) => {
                metrics::TASKS_FINISHED
                    .with_label_values(&[TaskStatus::Cancelled.as_str()])
                    .inc();
                info!(task_id = %id, "Cancelled pending task");
            }
            CancelTarget::Finished(task) => {
                debug!(
                    task_id = %id,
                    status = %task.status,
                    "Cancel ignored, task already finished"
                );
            }
            CancelTarget::Running(plugin) => {
                plugin
                    .cancel(id)
                    .await
                    .map_err(|source| SchedulerError::CancelFailed {
                        task_id: id.to_string(),
                        source,
                    })?;

                match self.inner.store.mark_cancelled(id) {
                    Transition::Applied(_) => {
                        metrics::TASKS_FINISHED
                            .with_label_values(&[TaskStatus::Cancelled.as_str()])
                            .inc();
                        info!(task_id = %id, "Cancelled running task");
                    }
                    Transition::Rejected(task) => {
                        debug!(
                            task_id = %id,
                            status = %task.status,
                            "Task finished before cancel took effect"
                        );
                    }
                    Transition::Missing => {}
                }
                self.inner.release_slot(id);
            }
        }

        Ok(())
    }

    /// Reports the progress of a task.
    ///
    /// The plugin is only queried while the task is running.
    pub async fn process(&self, id: &str) -> Result<TaskProgress, SchedulerError> {
        let task = self.get_task(id)?;
        if task.status != TaskStatus::Running {
            return Ok(TaskProgress { task, plugin: None });
        }

        let report = task.plugin().process(id).await?;
        Ok(TaskProgress {
            task,
            plugin: Some(report),
        })
    }

    /// Installs the sink that receives execution results.
    pub fn set_callback(&self, sink: Arc<dyn CallbackSink>) {
        info!(sink = %sink.name(), "Installing callback sink");
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub fn status(&self) -> SchedulerStatus {
        let counts = self.inner.store.counts();
        SchedulerStatus {
            running: self.is_running(),
            max_running: counts.max_running,
            current_running: counts.slots_in_use,
            total_tasks: counts.total,
            pending: counts.pending,
            running_tasks: counts.running,
            succeeded: counts.succeeded,
            failed: counts.failed,
            cancelled: counts.cancelled,
            formats: self.formats(),
        }
    }

    /// Evicts the oldest finished tasks so that at most `keep` remain.
    pub fn prune_finished(&self, keep: usize) -> usize {
        let removed = self.inner.store.prune_finished(keep);
        if removed > 0 {
            info!(removed, keep, "Pruned finished tasks");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;

    fn scheduler() -> Scheduler {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register_plugin(".flv", Arc::new(MockPlugin::new("flv")));
        scheduler
    }

    #[test]
    fn test_add_task_validation() {
        let scheduler = scheduler();

        let err = scheduler
            .add_task("input", "out.mp4", TranscodeParams::new())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInput { .. }));

        let err = scheduler
            .add_task("in.flv", "out", TranscodeParams::new())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInput { .. }));

        let err = scheduler
            .add_task("in.avi", "out.mp4", TranscodeParams::new())
            .unwrap_err();
        assert!(
            matches!(err, SchedulerError::UnsupportedFormat { ref format } if format == ".avi")
        );

        assert_eq!(scheduler.list_tasks(-1, 0).1, 0);
    }

    #[test]
    fn test_add_task_case_insensitive() {
        let scheduler = scheduler();
        let task = scheduler
            .add_task("IN.FLV", "out.mp4", TranscodeParams::new())
            .unwrap();

        assert_eq!(task.format, ".flv");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(scheduler.get_task(&task.id).unwrap().id, task.id);
    }

    #[test]
    fn test_add_task_dot_file_input() {
        let scheduler = scheduler();
        let task = scheduler
            .add_task("/videos/.flv", "out.mp4", TranscodeParams::new())
            .unwrap();

        assert_eq!(task.format, ".flv");
    }

    #[test]
    fn test_reregister_keeps_format_order() {
        let scheduler = scheduler();
        scheduler.register_plugin("mkv", Arc::new(MockPlugin::new("mkv")));
        scheduler.register_plugin(".flv", Arc::new(MockPlugin::new("flv-v2")));

        assert_eq!(scheduler.formats(), vec![".flv", ".mkv"]);
        let task = scheduler
            .add_task("a.flv", "a.mp4", TranscodeParams::new())
            .unwrap();
        assert_eq!(task.plugin().kind(), "flv-v2");
    }

    #[test]
    fn test_get_unknown_task() {
        let scheduler = scheduler();
        assert!(matches!(
            scheduler.get_task("nope"),
            Err(SchedulerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_pending_and_finished() {
        let scheduler = scheduler();
        let task = scheduler
            .add_task("a.flv", "a.mp4", TranscodeParams::new())
            .unwrap();

        scheduler.cancel(&task.id).await.unwrap();
        assert_eq!(
            scheduler.get_task(&task.id).unwrap().status,
            TaskStatus::Cancelled
        );

        // Idempotent
        scheduler.cancel(&task.id).await.unwrap();
        assert!(matches!(
            scheduler.cancel("missing").await,
            Err(SchedulerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_process_pending_task() {
        let scheduler = scheduler();
        let task = scheduler
            .add_task("a.flv", "a.mp4", TranscodeParams::new())
            .unwrap();

        let progress = scheduler.process(&task.id).await.unwrap();
        assert_eq!(progress.task.id, task.id);
        assert!(progress.plugin.is_none());
    }

    #[tokio::test]
    async fn test_start_stop() {
        let scheduler = scheduler();
        assert!(!scheduler.is_running());

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(!scheduler.status().running);
    }

    #[test]
    fn test_status_snapshot() {
        let scheduler = scheduler();
        scheduler
            .add_task("a.flv", "a.mp4", TranscodeParams::new())
            .unwrap();
        scheduler.set_max_running(3);

        let status = scheduler.status();
        assert_eq!(status.total_tasks, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.max_running, 3);
        assert_eq!(status.current_running, 0);
        assert_eq!(status.running_tasks, 0);
        assert_eq!(status.formats, vec![".flv"]);
    }
}
