use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{CallbackError, CallbackSink};
use super::types::Call;

/// Sink that forwards records into a bounded channel.
///
/// Cheaply cloneable. If the channel is full, delivery waits for room; the
/// executor's callback timeout bounds that wait.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Call>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Call>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver that drains it.
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<Call>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl CallbackSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn deliver(&self, call: Call) -> Result<(), CallbackError> {
        self.tx.send(call).await.map_err(|_| CallbackError::Closed)
    }
}
