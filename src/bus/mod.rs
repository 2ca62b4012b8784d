//! Message-bus contract, wire envelopes, and topic conventions.
//!
//! The coordinator publishes work envelopes on the per-node-type work
//! topics, consumes completions from [`TOPIC_NODE_COMPLETED`], and emits
//! purely informational lifecycle events on [`TOPIC_GRAPH_EVENTS`].

mod envelope;
mod memory;
mod traits;

pub use envelope::{Envelope, EnvelopeError, NodeCompletion};
pub use memory::InMemoryBus;
pub use traits::{handler_fn, BusError, EventHandler, MessageBus};

/// Work dispatched to executor workers.
pub const TOPIC_EXECUTOR_WORK: &str = "executor.work";
/// Work dispatched to router workers.
pub const TOPIC_ROUTER_WORK: &str = "router.work";
/// Completions published by any worker.
pub const TOPIC_NODE_COMPLETED: &str = "node.completed";
/// Informational lifecycle events; never a control channel.
pub const TOPIC_GRAPH_EVENTS: &str = "graph.events";
