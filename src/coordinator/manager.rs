//! The execution state machine.
//!
//! `ExecutionManager` owns the full lifecycle of every execution: it
//! validates submissions, persists the initial record, dispatches node work
//! onto the bus, reacts to completion events, enforces the per-execution
//! deadline, and drives records to a terminal state. It never executes node
//! logic itself — workers do that and report back on `node.completed`.
//!
//! Concurrency model: one long-lived subscription feeds the completion
//! handler; one supervisor task per active execution waits on the graph
//! deadline; all record mutations go through load-modify-save under a
//! per-execution async lock so a completion, a cancel, and a deadline firing
//! can never interleave on the same record. Terminal states are absorbing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::tracker::ExecutionTracker;
use crate::bus::{
    handler_fn, BusError, Envelope, MessageBus, NodeCompletion, TOPIC_GRAPH_EVENTS,
    TOPIC_NODE_COMPLETED,
};
use crate::config::CoordinatorConfig;
use crate::graph::{Graph, ValidationError, Validator};
use crate::metrics::{MetricsSink, NoopMetrics, SubmissionOutcome};
use crate::state::ExecutionRecord;
use crate::store::{StateStore, StoreError};
use crate::types::{EventType, ExecutionStatus};

/// Terminal error message written by the deadline supervisor.
pub const GRAPH_TIMEOUT_ERROR: &str = "execution timeout";

/// Failures surfaced by manager operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ManagerError {
    #[error("validation failed: {0}")]
    #[diagnostic(code(dagflow::manager::validation))]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(code(dagflow::manager::store))]
    Store(#[from] StoreError),

    #[error("execution not found: {execution_id}")]
    #[diagnostic(code(dagflow::manager::not_found))]
    NotFound { execution_id: String },

    #[error("execution {execution_id} already in terminal state: {status}")]
    #[diagnostic(code(dagflow::manager::already_terminal))]
    AlreadyTerminal {
        execution_id: String,
        status: ExecutionStatus,
    },

    #[error("node not found in execution {execution_id}: {node_id}")]
    #[diagnostic(code(dagflow::manager::node_not_found))]
    NodeNotFound {
        execution_id: String,
        node_id: String,
    },

    #[error(transparent)]
    #[diagnostic(code(dagflow::manager::bus))]
    Bus(#[from] BusError),

    #[error("failed to encode work envelope: {source}")]
    #[diagnostic(code(dagflow::manager::encode))]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Per-execution serialization locks for load-modify-save sequences.
///
/// Entries are dropped on terminal transitions; a late event recreates one
/// transiently, observes the terminal record, and drops it again.
#[derive(Default)]
struct ExecutionLocks {
    inner: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExecutionLocks {
    fn acquire(&self, execution_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inner = self.inner.lock().expect("locks poisoned");
        Arc::clone(
            inner
                .entry(execution_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release(&self, execution_id: &str) {
        self.inner.lock().expect("locks poisoned").remove(execution_id);
    }
}

/// Counts in-flight completion handlers so shutdown can drain them.
#[derive(Default)]
struct Inflight {
    count: AtomicUsize,
    notify: Notify,
}

impl Inflight {
    fn guard(self: &Arc<Self>) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            inner: Arc::clone(self),
        }
    }

    async fn drained(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct InflightGuard {
    inner: Arc<Inflight>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inner.count.fetch_sub(1, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

/// Coordinates graph execution by publishing work to workers and reacting to
/// their completion events.
pub struct ExecutionManager {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn StateStore>,
    metrics: Arc<dyn MetricsSink>,
    validator: Validator,
    config: CoordinatorConfig,
    tracker: ExecutionTracker,
    locks: ExecutionLocks,
    inflight: Arc<Inflight>,
    shutdown_scope: CancellationToken,
    // Handed to spawned supervisors and the subscription handler; a dropped
    // manager simply stops being upgradable instead of being kept alive by
    // its own background tasks.
    weak_self: Weak<ExecutionManager>,
}

impl ExecutionManager {
    /// A manager with a no-op metrics sink.
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn StateStore>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Self::with_metrics(bus, store, Arc::new(NoopMetrics), config)
    }

    #[must_use]
    pub fn with_metrics(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn StateStore>,
        metrics: Arc<dyn MetricsSink>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            bus,
            store,
            metrics,
            validator: Validator::new(),
            config,
            tracker: ExecutionTracker::new(),
            locks: ExecutionLocks::default(),
            inflight: Arc::new(Inflight::default()),
            shutdown_scope: CancellationToken::new(),
            weak_self: weak_self.clone(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Number of executions currently supervised by this process.
    #[must_use]
    pub fn active_executions(&self) -> usize {
        self.tracker.len()
    }

    #[must_use]
    pub fn is_tracking(&self, execution_id: &str) -> bool {
        self.tracker.contains(execution_id)
    }

    /// Subscribes to the completion topic and re-arms deadline supervisors
    /// for executions left non-terminal by a previous process.
    pub async fn start(&self) -> Result<(), ManagerError> {
        info!(
            consumer_group = %self.config.consumer_group,
            consumer_name = %self.config.consumer_name,
            "starting execution coordinator"
        );
        let weak = self.weak_self.clone();
        self.bus
            .subscribe(
                TOPIC_NODE_COMPLETED,
                handler_fn(move |envelope| {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(manager) => manager.handle_completion_message(envelope).await,
                            // Coordinator dropped: nothing left to advance.
                            None => Ok(()),
                        }
                    }
                }),
            )
            .await?;
        self.resume_supervision().await;
        info!("execution coordinator started, listening for node completion events");
        Ok(())
    }

    /// Validates and submits a graph for execution, returning the new
    /// execution id.
    ///
    /// Dispatch of the entry node is best-effort: once the record is
    /// persisted the submission is durable, and a failed dispatch leaves the
    /// record `Running` for the deadline supervisor to reap.
    #[instrument(skip_all, fields(graph_id = %graph.id), err)]
    pub async fn submit(
        &self,
        graph: Graph,
        inputs: FxHashMap<String, Value>,
    ) -> Result<String, ManagerError> {
        if let Err(error) = self.validator.validate(&graph) {
            self.metrics
                .record_graph_submitted(SubmissionOutcome::Rejected);
            return Err(ManagerError::Validation(error));
        }

        let execution_id = Uuid::new_v4().to_string();
        let mut record = ExecutionRecord::new(execution_id.clone(), graph, inputs);
        self.store.save(&record).await?;

        let mut data = FxHashMap::default();
        data.insert(
            "original_graph_id".to_string(),
            Value::String(record.graph.id.clone()),
        );
        self.publish_graph_event(&execution_id, EventType::GraphSubmitted, data)
            .await;

        self.register_supervision(
            &execution_id,
            record.submitted_at,
            self.config.graph_execution_timeout,
        );
        self.metrics
            .record_graph_submitted(SubmissionOutcome::Accepted);
        info!(
            %execution_id,
            entry_node = record.graph.entry().unwrap_or(""),
            "graph submitted"
        );

        let lock = self.locks.acquire(&execution_id);
        let _guard = lock.lock().await;
        match record.graph.entry().map(str::to_string) {
            Some(entry) => {
                if let Err(error) = self.dispatch(&mut record, &entry).await {
                    error!(
                        %execution_id,
                        node_id = %entry,
                        %error,
                        "failed to dispatch entry node; deadline supervisor will reap"
                    );
                }
            }
            None => warn!(
                %execution_id,
                "no entry node resolvable; deadline supervisor will reap"
            ),
        }

        Ok(execution_id)
    }

    /// Current record for an execution, read through to the store.
    pub async fn get_status(&self, execution_id: &str) -> Result<ExecutionRecord, ManagerError> {
        self.store
            .load(execution_id)
            .await
            .map_err(map_load_error)
    }

    /// Cancels a running execution.
    ///
    /// Cancellation is best-effort against in-flight worker messages: the
    /// coordinator stops advancing the graph and refuses future completion
    /// events, but does not interrupt a worker.
    #[instrument(skip(self), err)]
    pub async fn cancel(&self, execution_id: &str) -> Result<(), ManagerError> {
        let lock = self.locks.acquire(execution_id);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .load(execution_id)
            .await
            .map_err(map_load_error)?;
        if record.is_terminal() {
            return Err(ManagerError::AlreadyTerminal {
                execution_id: execution_id.to_string(),
                status: record.status,
            });
        }

        self.finish_execution(&mut record, ExecutionStatus::Cancelled, None)
            .await;
        info!(execution_id, "execution cancelled");
        Ok(())
    }

    /// Stops advancing executions: cancels the subscription scope and every
    /// per-execution deadline supervisor, then waits (bounded by the
    /// shutdown timeout) for in-flight completion handlers to drain.
    ///
    /// Records are not mutated — another instance can pick outstanding
    /// executions up by resubscribing and reading the durable state.
    pub async fn shutdown(&self) {
        info!("shutting down execution coordinator");
        self.shutdown_scope.cancel();
        self.tracker.cancel_all();
        if tokio::time::timeout(self.config.shutdown_timeout, self.inflight.drained())
            .await
            .is_err()
        {
            warn!("shutdown drain timed out with completion handlers still in flight");
        }
        info!("execution coordinator shut down");
    }

    /// Subscription entry point. Always acknowledges: every failure mode
    /// inside the handler is log-and-drop, so a poison message cannot wedge
    /// the completion topic with redeliveries.
    async fn handle_completion_message(&self, envelope: Envelope) -> Result<(), BusError> {
        if self.shutdown_scope.is_cancelled() {
            return Ok(());
        }
        let _guard = self.inflight.guard();
        self.on_node_completed(envelope).await;
        Ok(())
    }

    /// Applies one completion event: records the node outcome, then either
    /// terminates the execution or dispatches the selected successor.
    async fn on_node_completed(&self, envelope: Envelope) {
        let execution_id = envelope.execution_id.clone();
        let completion = match NodeCompletion::from_envelope(&envelope) {
            Ok(completion) => completion,
            Err(error) => {
                warn!(%execution_id, %error, "dropping malformed completion envelope");
                return;
            }
        };
        debug!(
            %execution_id,
            node_id = %completion.node_id,
            has_error = completion.error.is_some(),
            next_node = completion.next_node.as_deref().unwrap_or(""),
            "received node completion"
        );

        let lock = self.locks.acquire(&execution_id);
        let _guard = lock.lock().await;

        let mut record = match self.store.load(&execution_id).await {
            Ok(record) => record,
            Err(error) => {
                warn!(%execution_id, %error, "dropping completion for unknown execution");
                return;
            }
        };
        if record.is_terminal() {
            debug!(
                %execution_id,
                status = %record.status,
                "dropping completion for terminal execution"
            );
            return;
        }

        let failure = completion.error.clone();
        match record.node_state_mut(&completion.node_id) {
            Some(node_state) => {
                node_state.completed_at = Some(Utc::now());
                if let Some(message) = failure.clone() {
                    node_state.status = ExecutionStatus::Failed;
                    node_state.error = Some(message);
                } else {
                    node_state.status = ExecutionStatus::Completed;
                    node_state.output = completion.output.clone();
                }
            }
            None => {
                warn!(
                    %execution_id,
                    node_id = %completion.node_id,
                    "dropping completion for unknown node"
                );
                return;
            }
        }
        if let Err(error) = self.store.save(&record).await {
            error!(%execution_id, %error, "failed to save state after node completion");
        }

        if let Some(message) = failure {
            self.finish_execution(&mut record, ExecutionStatus::Failed, Some(message))
                .await;
            return;
        }

        // Router-provided successor wins over the graph's edges.
        let successor = completion.next_node.clone().or_else(|| {
            record
                .graph
                .find_next_node(&completion.node_id)
                .map(str::to_string)
        });
        match successor {
            None => {
                self.finish_execution(&mut record, ExecutionStatus::Completed, None)
                    .await;
            }
            Some(next) => {
                if let Err(error) = self.dispatch(&mut record, &next).await {
                    error!(
                        %execution_id,
                        node_id = %next,
                        %error,
                        "failed to dispatch successor node"
                    );
                }
            }
        }
    }

    /// Marks the target node `Running`, persists, and publishes its work
    /// envelope on the topic selected by the node type. `start` nodes are
    /// skipped through to their linear successor; `end` nodes complete the
    /// execution immediately.
    async fn dispatch(
        &self,
        record: &mut ExecutionRecord,
        node_id: &str,
    ) -> Result<(), ManagerError> {
        let mut current = node_id.to_string();
        loop {
            let node_type = match record.graph.node(&current) {
                Some(node) => node.node_type(),
                None => {
                    return Err(ManagerError::NodeNotFound {
                        execution_id: record.execution_id.clone(),
                        node_id: current,
                    })
                }
            };

            let now = Utc::now();
            match record.node_state_mut(&current) {
                Some(node_state) => {
                    node_state.status = ExecutionStatus::Running;
                    node_state.started_at = Some(now);
                }
                None => {
                    return Err(ManagerError::NodeNotFound {
                        execution_id: record.execution_id.clone(),
                        node_id: current,
                    })
                }
            }
            if record.started_at.is_none() {
                record.started_at = Some(now);
            }
            if let Err(error) = self.store.save(record).await {
                error!(
                    execution_id = %record.execution_id,
                    node_id = %current,
                    %error,
                    "failed to save state before dispatch"
                );
            }

            if let Some(topic) = node_type.work_topic() {
                let envelope = Envelope::work(
                    record,
                    &current,
                    node_type,
                    self.config.node_execution_timeout.as_secs(),
                )
                .map_err(|source| ManagerError::Encode { source })?;
                info!(
                    execution_id = %record.execution_id,
                    node_id = %current,
                    node_type = %node_type,
                    topic,
                    "publishing node work"
                );
                self.bus.publish(topic, envelope).await?;
                self.metrics.record_node_dispatched(node_type);

                let mut data = FxHashMap::default();
                data.insert("node_id".to_string(), Value::String(current.clone()));
                self.publish_graph_event(&record.execution_id, EventType::NodeStarted, data)
                    .await;
                return Ok(());
            }

            if node_type.is_end() {
                self.finish_execution(record, ExecutionStatus::Completed, None)
                    .await;
                return Ok(());
            }

            // Start node: fall through to its linear successor.
            match record.graph.find_next_node(&current).map(str::to_string) {
                Some(next) => current = next,
                None => {
                    warn!(
                        execution_id = %record.execution_id,
                        node_id = %current,
                        "start node has no successor; deadline supervisor will reap"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// The single terminal path for completion, failure, timeout, and
    /// cancellation: persists the terminal record, tears down supervision,
    /// emits the informational event, and records completion metrics.
    async fn finish_execution(
        &self,
        record: &mut ExecutionRecord,
        status: ExecutionStatus,
        error: Option<String>,
    ) {
        record.mark_terminal(status, error);
        if let Err(save_error) = self.store.save(record).await {
            error!(
                execution_id = %record.execution_id,
                %save_error,
                "failed to save terminal state"
            );
        }
        self.tracker.remove(&record.execution_id);
        self.locks.release(&record.execution_id);

        if let Some(event_type) = EventType::for_terminal(status) {
            let mut data = FxHashMap::default();
            if let Some(message) = record.error.clone() {
                data.insert("error".to_string(), Value::String(message));
            }
            self.publish_graph_event(&record.execution_id, event_type, data)
                .await;
        }

        let elapsed = Utc::now()
            .signed_duration_since(record.submitted_at)
            .to_std()
            .unwrap_or_default();
        self.metrics.record_graph_completed(status, elapsed);
        info!(
            execution_id = %record.execution_id,
            status = %status,
            "execution finished"
        );
    }

    /// Informational publications are best-effort; failures are logged and
    /// never affect the state machine.
    async fn publish_graph_event(
        &self,
        execution_id: &str,
        event_type: EventType,
        data: FxHashMap<String, Value>,
    ) {
        let envelope = Envelope::graph_event(execution_id, event_type, data);
        if let Err(error) = self.bus.publish(TOPIC_GRAPH_EVENTS, envelope).await {
            error!(
                execution_id,
                event_type = %event_type,
                %error,
                "failed to publish graph event"
            );
        }
    }

    /// Inserts the tracker entry and spawns the deadline supervisor task.
    fn register_supervision(
        &self,
        execution_id: &str,
        submitted_at: DateTime<Utc>,
        deadline: Duration,
    ) {
        let token = self.shutdown_scope.child_token();
        self.tracker.insert(execution_id, submitted_at, token.clone());

        let weak = self.weak_self.clone();
        let execution_id = execution_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    if let Some(manager) = weak.upgrade() {
                        manager.handle_deadline(&execution_id).await;
                    }
                }
            }
        });
    }

    /// Re-arms supervision for non-terminal records found in the store at
    /// startup, with deadlines computed from their original submission time.
    async fn resume_supervision(&self) {
        let execution_ids = match self.store.list().await {
            Ok(ids) => ids,
            Err(error) => {
                warn!(%error, "startup scan failed; stale executions will not be reaped");
                return;
            }
        };
        let mut resumed = 0usize;
        for execution_id in execution_ids {
            if self.tracker.contains(&execution_id) {
                continue;
            }
            let record = match self.store.load(&execution_id).await {
                Ok(record) => record,
                Err(_) => continue,
            };
            if record.is_terminal() {
                continue;
            }
            let elapsed = Utc::now()
                .signed_duration_since(record.submitted_at)
                .to_std()
                .unwrap_or_default();
            let remaining = self.config.graph_execution_timeout.saturating_sub(elapsed);
            self.register_supervision(&execution_id, record.submitted_at, remaining);
            resumed += 1;
        }
        if resumed > 0 {
            info!(resumed, "re-armed deadline supervision for existing executions");
        }
    }

    /// Deadline firing on a non-terminal record forces the timeout terminal
    /// state; a record already terminal just gets its supervision cleaned up.
    async fn handle_deadline(&self, execution_id: &str) {
        warn!(execution_id, "execution deadline elapsed");
        let lock = self.locks.acquire(execution_id);
        let _guard = lock.lock().await;

        let mut record = match self.store.load(execution_id).await {
            Ok(record) => record,
            Err(error) => {
                warn!(execution_id, %error, "failed to load state during timeout");
                self.tracker.remove(execution_id);
                self.locks.release(execution_id);
                return;
            }
        };
        if record.is_terminal() {
            self.tracker.remove(execution_id);
            self.locks.release(execution_id);
            return;
        }
        self.finish_execution(
            &mut record,
            ExecutionStatus::Failed,
            Some(GRAPH_TIMEOUT_ERROR.to_string()),
        )
        .await;
    }
}

fn map_load_error(error: StoreError) -> ManagerError {
    match error {
        StoreError::NotFound { execution_id } => ManagerError::NotFound { execution_id },
        other => ManagerError::Store(other),
    }
}
