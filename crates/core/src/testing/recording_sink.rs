//! Callback sink that records every delivered result for assertions.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::callback::{Call, CallbackError, CallbackSink};

/// Mock implementation of the CallbackSink trait.
///
/// Records calls even when configured to fail, so tests can check that a
/// delivery was attempted.
#[derive(Clone, Default)]
pub struct RecordingSink {
    calls: Arc<RwLock<Vec<Call>>>,
    fail: Arc<AtomicBool>,
    panic: Arc<AtomicBool>,
    delay_ms: Arc<RwLock<u64>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail after recording it.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every delivery panic after recording it.
    pub fn set_panic(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    /// Delay each delivery, e.g. to trip the callback timeout.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Get all recorded calls in delivery order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    /// Recorded calls for one task.
    pub async fn calls_for(&self, task_id: &str) -> Vec<Call> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.task.id == task_id)
            .cloned()
            .collect()
    }

    /// Wait until at least `count` calls were recorded, or 5 seconds pass.
    pub async fn wait_for_calls(&self, count: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if self.calls.read().await.len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl CallbackSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, call: Call) -> Result<(), CallbackError> {
        self.calls.write().await.push(call);

        let delay = *self.delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.panic.load(Ordering::SeqCst) {
            panic!("recording sink set to panic");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CallbackError::rejected("recording sink set to fail"));
        }
        Ok(())
    }
}
