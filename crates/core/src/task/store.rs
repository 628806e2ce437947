//! In-memory task store.
//!
//! Holds the task list, the FIFO queue of pending task ids and the running
//! counter behind a single mutex. Every read or write of that state goes
//! through this type, and the lock is never held across an `.await`.

use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::plugin::TranscodePlugin;

use super::types::{Task, TaskId, TaskStatus};

/// Result of a store-mediated status change.
#[derive(Debug)]
pub enum Transition {
    /// The change was applied; carries the updated snapshot.
    Applied(Task),
    /// The task was already in a state that forbids the change.
    Rejected(Task),
    /// The task is not in the store.
    Missing,
}

/// What a cancel request found.
pub enum CancelTarget {
    /// The task was pending and is now cancelled.
    WasPending(Task),
    /// The task is running; its plugin must be asked to stop.
    Running(Arc<dyn TranscodePlugin>),
    /// The task had already finished.
    Finished(Task),
}

/// Counts of tasks per status plus capacity figures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Tasks currently holding a capacity slot.
    pub slots_in_use: usize,
    pub max_running: usize,
}

struct StoreInner {
    /// Tasks in submission order.
    tasks: Vec<Task>,
    /// Task id -> position in `tasks`.
    index: HashMap<TaskId, usize>,
    /// Pending task ids in submission order. Cancelled entries are skipped lazily.
    pending: VecDeque<TaskId>,
    /// Tasks currently holding a capacity slot.
    holding: HashSet<TaskId>,
    /// Effective limit; never below `holding.len()`.
    max_running: usize,
    /// Limit requested by the caller.
    target_max: usize,
}

impl StoreInner {
    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        let idx = *self.index.get(id)?;
        self.tasks.get_mut(idx)
    }

    fn running(&self) -> usize {
        self.holding.len()
    }

    fn reindex(&mut self) {
        self.index = self
            .tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| (task.id.clone(), idx))
            .collect();
    }
}

/// Ordered task collection with a capacity-limited running set.
pub struct TaskStore {
    inner: Mutex<StoreInner>,
}

impl TaskStore {
    /// Creates an empty store admitting at most `max_running` tasks at once.
    pub fn new(max_running: usize) -> Self {
        let max_running = max_running.max(1);
        Self {
            inner: Mutex::new(StoreInner {
                tasks: Vec::new(),
                index: HashMap::new(),
                pending: VecDeque::new(),
                holding: HashSet::new(),
                max_running,
                target_max: max_running,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a new task and queues it for dispatch.
    pub fn insert(&self, task: Task) -> Task {
        let mut inner = self.lock();
        let snapshot = task.clone();
        let idx = inner.tasks.len();
        inner.index.insert(task.id.clone(), idx);
        inner.pending.push_back(task.id.clone());
        inner.tasks.push(task);
        snapshot
    }

    /// Admits pending tasks in submission order while capacity remains.
    ///
    /// Each admitted task is marked running and takes a slot in the same
    /// critical section as the capacity check.
    pub fn admit(&self) -> Vec<Task> {
        let mut inner = self.lock();
        let mut admitted = Vec::new();

        while inner.running() < inner.max_running {
            let Some(id) = inner.pending.pop_front() else {
                break;
            };
            let Some(task) = inner.get_mut(&id) else {
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            let snapshot = task.clone();
            inner.holding.insert(id);
            admitted.push(snapshot);
        }

        admitted
    }

    /// Starts a new execution attempt, returning its 1-based number.
    ///
    /// Returns `None` once the task is no longer running (e.g. cancelled).
    pub fn begin_attempt(&self, id: &str) -> Option<u32> {
        let mut inner = self.lock();
        let task = inner.get_mut(id)?;
        if task.status != TaskStatus::Running {
            return None;
        }
        task.attempts += 1;
        Some(task.attempts)
    }

    /// Records the message of a failed attempt.
    ///
    /// Returns whether the task is still running afterwards.
    pub fn record_failure(&self, id: &str, error: &str) -> bool {
        let mut inner = self.lock();
        match inner.get_mut(id) {
            Some(task) if task.status == TaskStatus::Running => {
                task.last_error = Some(error.to_string());
                true
            }
            _ => false,
        }
    }

    /// Moves a running task to a terminal status.
    pub fn complete(&self, id: &str, status: TaskStatus, error: Option<String>) -> Transition {
        let mut inner = self.lock();
        let Some(task) = inner.get_mut(id) else {
            return Transition::Missing;
        };
        if task.status != TaskStatus::Running || !task.status.can_transition_to(status) {
            return Transition::Rejected(task.clone());
        }
        task.status = status;
        task.finished_at = Some(Utc::now());
        if error.is_some() {
            task.last_error = error;
        }
        Transition::Applied(task.clone())
    }

    /// Resolves a cancel request under the lock.
    ///
    /// Pending tasks are cancelled on the spot. Running tasks are left
    /// untouched; the caller asks the plugin and then calls
    /// [`TaskStore::mark_cancelled`].
    pub fn begin_cancel(&self, id: &str) -> Option<CancelTarget> {
        let mut inner = self.lock();
        let task = inner.get_mut(id)?;
        match task.status {
            TaskStatus::Pending => {
                task.status = TaskStatus::Cancelled;
                task.finished_at = Some(Utc::now());
                Some(CancelTarget::WasPending(task.clone()))
            }
            TaskStatus::Running => Some(CancelTarget::Running(Arc::clone(task.plugin()))),
            _ => Some(CancelTarget::Finished(task.clone())),
        }
    }

    /// Marks a running task cancelled after its plugin accepted the request.
    pub fn mark_cancelled(&self, id: &str) -> Transition {
        self.complete(id, TaskStatus::Cancelled, None)
    }

    /// Releases the capacity slot held by `id`.
    ///
    /// Returns `true` only for the call that actually freed the slot, so a
    /// slot is released exactly once per admission.
    pub fn release(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if !inner.holding.remove(id) {
            return false;
        }
        inner.max_running = inner.target_max.max(inner.running());
        true
    }

    /// Changes the concurrency limit for future admissions.
    ///
    /// Lowering the limit below the number of in-flight tasks takes effect as
    /// they finish; the effective limit never drops under the running count.
    pub fn set_max_running(&self, max_running: usize) {
        let mut inner = self.lock();
        inner.target_max = max_running.max(1);
        inner.max_running = inner.target_max.max(inner.running());
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        let inner = self.lock();
        inner.index.get(id).map(|&idx| inner.tasks[idx].clone())
    }

    /// Returns a page of tasks in submission order and the total count.
    ///
    /// A negative `limit` returns everything from `skip` on.
    pub fn list(&self, limit: i64, skip: usize) -> (Vec<Task>, usize) {
        let inner = self.lock();
        let total = inner.tasks.len();
        let remaining = inner.tasks.iter().skip(skip);
        let page = if limit < 0 {
            remaining.cloned().collect()
        } else {
            remaining.take(limit as usize).cloned().collect()
        };
        (page, total)
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks currently holding a slot.
    pub fn running(&self) -> usize {
        self.lock().running()
    }

    pub fn max_running(&self) -> usize {
        self.lock().max_running
    }

    pub fn counts(&self) -> StoreCounts {
        let inner = self.lock();
        let mut counts = StoreCounts {
            total: inner.tasks.len(),
            slots_in_use: inner.running(),
            max_running: inner.max_running,
            ..Default::default()
        };
        for task in &inner.tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Evicts the oldest finished tasks so at most `keep` remain.
    ///
    /// Pending and running tasks are never evicted. Returns how many were
    /// removed.
    pub fn prune_finished(&self, keep: usize) -> usize {
        let mut inner = self.lock();
        let finished = inner
            .tasks
            .iter()
            .filter(|t| t.status.is_terminal())
            .count();
        let mut to_remove = finished.saturating_sub(keep);
        if to_remove == 0 {
            return 0;
        }

        let removed = to_remove;
        inner.tasks.retain(|task| {
            if to_remove > 0 && task.status.is_terminal() {
                to_remove -= 1;
                false
            } else {
                true
            }
        });
        inner.reindex();
        removed
    }
}
