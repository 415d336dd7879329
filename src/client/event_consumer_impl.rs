use crate::client::{EventConsumer, EventHandler, HandleOutcome};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

/// Drains notification frames pushed by the dispatcher into an in-process
/// queue. Delivery is at-least-once and unordered; the handler absorbs that.
pub struct ChannelEventConsumer {
    receiver: Mutex<Option<Receiver<Vec<u8>>>>,
    cancellation_token: CancellationToken,
}

impl ChannelEventConsumer {
    pub fn new(receiver: Receiver<Vec<u8>>, cancellation_token: CancellationToken) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            cancellation_token,
        }
    }

    async fn dispatch(handler: &dyn EventHandler, payload: &[u8]) {
        match handler.handle(payload).await {
            Ok(HandleOutcome::Commit) => {}
            Ok(HandleOutcome::SkipCommit) => {
                tracing::debug!(bytes = payload.len(), "notification skipped");
            }
            Err(e) => {
                tracing::error!(error = ?e, "notification handler error");
            }
        }
    }
}

#[async_trait::async_trait]
impl EventConsumer for ChannelEventConsumer {
    async fn run(&self, handler: Arc<dyn EventHandler>) -> anyhow::Result<()> {
        let mut receiver = self
            .receiver
            .lock()
            .map_err(|e| anyhow!("consumer lock poisoned: {e}"))?
            .take()
            .ok_or_else(|| anyhow!("notification consumer already started"))?;

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("notification consumer shutting down...");
                    break;
                }
                msg = receiver.recv() => msg,
            };

            let Some(payload) = result else {
                tracing::info!("notification queue closed");
                return Ok(());
            };
            Self::dispatch(handler.as_ref(), &payload).await;
        }

        // frames already queued before shutdown are still applied
        receiver.close();
        while let Ok(payload) = receiver.try_recv() {
            Self::dispatch(handler.as_ref(), &payload).await;
        }

        Ok(())
    }
}
