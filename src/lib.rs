//! ```text
//! Graph ──► Validator ──► ExecutionManager ──► MessageBus ──► workers
//!                          │        ▲                           │
//!                          │        └── node.completed ◄────────┘
//!                          │
//!                          ├─► StateStore (ExecutionRecord, TTL)
//!                          ├─► deadline supervisor (per execution)
//!                          └─► graph.events (informational)
//! ```
//!
//! dagflow is the execution coordinator for DAG agent pipelines: a control
//! plane that validates submitted graphs, persists execution state,
//! dispatches per-node work onto a shared message bus, and reacts to
//! completion events published by external worker services until each
//! execution reaches a terminal state (completed, failed, cancelled, or
//! timed out). It never executes node logic itself.
//!
//! The concrete broker and store are pluggable behind
//! [`bus::MessageBus`] and [`store::StateStore`]; in-memory implementations
//! of both ship in this crate for tests and single-process embedding.

pub mod bus;
pub mod config;
pub mod coordinator;
pub mod graph;
pub mod metrics;
pub mod state;
pub mod store;
pub mod types;
