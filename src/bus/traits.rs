//! The message-bus contract required by the coordinator.
//!
//! The coordinator needs only `publish` with at-least-once delivery and
//! `subscribe` with consumer-group semantics that serialize delivery per
//! execution. Concrete brokers (Redis Streams in production) live outside
//! this crate; [`crate::bus::InMemoryBus`] satisfies the contract in-process
//! for tests and embedders.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use miette::Diagnostic;
use thiserror::Error;

use super::envelope::Envelope;

/// Bus-level failure.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum BusError {
    #[error("bus is closed")]
    #[diagnostic(code(dagflow::bus::closed))]
    Closed,

    #[error("failed to publish to {topic}: {message}")]
    #[diagnostic(code(dagflow::bus::publish))]
    Publish { topic: String, message: String },

    #[error("failed to subscribe to {topic}: {message}")]
    #[diagnostic(code(dagflow::bus::subscribe))]
    Subscribe { topic: String, message: String },

    #[error("handler error: {0}")]
    #[diagnostic(code(dagflow::bus::handler))]
    Handler(String),
}

/// Boxed async handler invoked once per delivered envelope.
///
/// Returning `Ok` acknowledges the message. Returning `Err` asks the bus to
/// leave it unacknowledged so it may be redelivered, where the broker
/// supports that.
pub type EventHandler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<(), BusError>> + Send + Sync>;

/// Wraps an async closure into an [`EventHandler`].
pub fn handler_fn<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BusError>> + Send + 'static,
{
    Arc::new(move |envelope| Box::pin(f(envelope)))
}

/// Publish/subscribe contract the coordinator is written against.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes an envelope on a topic. At-least-once delivery is
    /// acceptable; the coordinator's state machine tolerates duplicates.
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<(), BusError>;

    /// Registers a handler for a topic. Implementations must invoke the
    /// handler for each message and must serialize invocations per
    /// execution id (delivering a whole topic to a single consumer
    /// satisfies this).
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError>;
}
