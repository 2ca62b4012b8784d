use std::sync::Arc;
use std::time::Duration;

use dagflow::bus::{
    handler_fn, Envelope, InMemoryBus, NodeCompletion, TOPIC_EXECUTOR_WORK, TOPIC_GRAPH_EVENTS,
    TOPIC_NODE_COMPLETED, TOPIC_ROUTER_WORK,
};
use dagflow::config::CoordinatorConfig;
use dagflow::coordinator::ExecutionManager;
use dagflow::metrics::CountingMetrics;
use dagflow::state::ExecutionRecord;
use dagflow::store::{InMemoryStateStore, StateStore};
use dagflow::types::ExecutionStatus;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// A coordinator wired to in-memory collaborators, with capture channels on
/// every outbound topic.
pub struct TestHarness {
    pub manager: Arc<ExecutionManager>,
    pub bus: Arc<InMemoryBus>,
    pub store: Arc<InMemoryStateStore>,
    pub metrics: Arc<CountingMetrics>,
    pub executor_work: flume::Receiver<Envelope>,
    pub router_work: flume::Receiver<Envelope>,
    pub graph_events: flume::Receiver<Envelope>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(CoordinatorConfig::default()).await
    }

    pub async fn with_config(config: CoordinatorConfig) -> Self {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryStateStore::with_ttl(config.state_ttl));
        let metrics = Arc::new(CountingMetrics::new());
        let manager = ExecutionManager::with_metrics(
            bus.clone(),
            store.clone(),
            metrics.clone(),
            config,
        );
        manager.start().await.expect("manager start");

        let executor_work = capture(&bus, TOPIC_EXECUTOR_WORK).await;
        let router_work = capture(&bus, TOPIC_ROUTER_WORK).await;
        let graph_events = capture(&bus, TOPIC_GRAPH_EVENTS).await;

        Self {
            manager,
            bus,
            store,
            metrics,
            executor_work,
            router_work,
            graph_events,
        }
    }

    /// Publishes a worker completion on `node.completed`.
    pub async fn complete_node(&self, execution_id: &str, completion: NodeCompletion) {
        use dagflow::bus::MessageBus;
        self.bus
            .publish(TOPIC_NODE_COMPLETED, completion.into_envelope(execution_id))
            .await
            .expect("publish completion");
    }

    /// Polls the store until the record reaches `status` (or panics after a
    /// couple of seconds with the last observed record).
    pub async fn await_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
    ) -> ExecutionRecord {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        let mut last: Option<ExecutionRecord> = None;
        while tokio::time::Instant::now() < deadline {
            if let Ok(record) = self.store.load(execution_id).await {
                if record.status == status {
                    return record;
                }
                last = Some(record);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} never reached {status}; last record: {last:#?}");
    }

    /// Next envelope on a capture channel, with a hard timeout.
    pub async fn expect_envelope(&self, rx: &flume::Receiver<Envelope>) -> Envelope {
        tokio::time::timeout(RECV_TIMEOUT, rx.recv_async())
            .await
            .expect("timed out waiting for envelope")
            .expect("capture channel closed")
    }

    /// Asserts that no envelope arrives on the channel within a quiet period.
    pub async fn expect_silence(&self, rx: &flume::Receiver<Envelope>) {
        let received = tokio::time::timeout(QUIET_PERIOD, rx.recv_async()).await;
        if let Ok(Ok(envelope)) = received {
            panic!("expected no envelope, got {envelope:#?}");
        }
    }

    /// Drains whatever informational events have arrived so far.
    pub async fn drain_graph_events(&self) -> Vec<Envelope> {
        // Give in-flight fan-out tasks a moment to deliver.
        tokio::time::sleep(QUIET_PERIOD).await;
        self.graph_events.drain().collect()
    }
}

async fn capture(bus: &Arc<InMemoryBus>, topic: &str) -> flume::Receiver<Envelope> {
    use dagflow::bus::MessageBus;
    let (tx, rx) = flume::unbounded();
    bus.subscribe(
        topic,
        handler_fn(move |envelope| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(envelope);
                Ok(())
            }
        }),
    )
    .await
    .expect("subscribe capture");
    rx
}

/// The `node_id` a work envelope targets.
pub fn work_node_id(envelope: &Envelope) -> &str {
    envelope
        .data
        .get("node_id")
        .and_then(|v| v.as_str())
        .expect("work envelope missing node_id")
}
