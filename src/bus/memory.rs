//! In-process message bus.
//!
//! Each subscription owns an unbounded flume channel drained by one
//! background task, so handlers for a topic run strictly in publication
//! order — which also satisfies the per-execution ordering the coordinator
//! requires. Publishing fans out to every subscription of the topic.
//!
//! Acknowledgement is implicit: there is no redelivery in-process, so a
//! handler error is logged and the message dropped.

use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::envelope::Envelope;
use super::traits::{BusError, EventHandler, MessageBus};

/// Flume-backed bus for tests and single-process deployments.
pub struct InMemoryBus {
    subscriptions: Mutex<FxHashMap<String, Vec<flume::Sender<Envelope>>>>,
    shutdown: CancellationToken,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(FxHashMap::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops every subscription task. Further publishes fail with
    /// [`BusError::Closed`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<(), BusError> {
        if self.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }
        let senders = {
            let mut guard = self.subscriptions.lock().expect("subscriptions poisoned");
            if let Some(senders) = guard.get_mut(topic) {
                // Prune subscriptions whose listener task has exited.
                senders.retain(|s| !s.is_disconnected());
                senders.clone()
            } else {
                Vec::new()
            }
        };
        if senders.is_empty() {
            tracing::debug!(topic, event_type = %envelope.event_type, "no subscribers for topic");
        }
        for sender in senders {
            let _ = sender.send(envelope.clone());
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError> {
        if self.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }
        let (tx, rx) = flume::unbounded::<Envelope>();
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .entry(topic.to_string())
            .or_default()
            .push(tx);

        let shutdown = self.shutdown.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = rx.recv_async() => match received {
                        Ok(envelope) => {
                            if let Err(error) = handler(envelope).await {
                                tracing::error!(topic, %error, "event handler failed; dropping message");
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        });
        Ok(())
    }
}
