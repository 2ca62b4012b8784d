use std::sync::Arc;
use std::time::Duration;

use dagflow::bus::{handler_fn, Envelope, InMemoryBus, MessageBus};
use dagflow::types::EventType;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};

fn numbered(execution_id: &str, n: u64) -> Envelope {
    let mut data = FxHashMap::default();
    data.insert("seq".to_string(), json!(n));
    Envelope::graph_event(execution_id, EventType::NodeStarted, data)
}

fn seq(envelope: &Envelope) -> u64 {
    envelope
        .data
        .get("seq")
        .and_then(Value::as_u64)
        .expect("seq field")
}

#[tokio::test]
async fn handlers_run_in_publication_order() {
    let bus = InMemoryBus::new();
    let (tx, rx) = flume::unbounded();
    bus.subscribe(
        "graph.events",
        handler_fn(move |envelope| {
            let tx = tx.clone();
            async move {
                // Hold the slot briefly so out-of-order delivery would show.
                tokio::time::sleep(Duration::from_millis(2)).await;
                let _ = tx.send(envelope);
                Ok(())
            }
        }),
    )
    .await
    .unwrap();

    for n in 0..20 {
        bus.publish("graph.events", numbered("exec-1", n))
            .await
            .unwrap();
    }

    for expected in 0..20 {
        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seq(&envelope), expected);
    }
}

#[tokio::test]
async fn every_subscription_of_a_topic_receives_each_message() {
    let bus = InMemoryBus::new();
    let (tx_a, rx_a) = flume::unbounded();
    let (tx_b, rx_b) = flume::unbounded();
    for tx in [tx_a, tx_b] {
        bus.subscribe(
            "graph.events",
            handler_fn(move |envelope| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(envelope);
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
    }

    bus.publish("graph.events", numbered("exec-1", 7))
        .await
        .unwrap();

    for rx in [rx_a, rx_b] {
        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seq(&envelope), 7);
    }
}

#[tokio::test]
async fn publish_to_a_topic_without_subscribers_is_not_an_error() {
    let bus = InMemoryBus::new();
    bus.publish("executor.work", numbered("exec-1", 0))
        .await
        .unwrap();
}

#[tokio::test]
async fn a_failing_handler_does_not_stop_the_subscription() {
    let bus = Arc::new(InMemoryBus::new());
    let (tx, rx) = flume::unbounded();
    bus.subscribe(
        "graph.events",
        handler_fn(move |envelope| {
            let tx = tx.clone();
            async move {
                if seq(&envelope) == 0 {
                    return Err(dagflow::bus::BusError::Handler("rejected".into()));
                }
                let _ = tx.send(envelope);
                Ok(())
            }
        }),
    )
    .await
    .unwrap();

    bus.publish("graph.events", numbered("exec-1", 0))
        .await
        .unwrap();
    bus.publish("graph.events", numbered("exec-1", 1))
        .await
        .unwrap();

    let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv_async())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seq(&envelope), 1);
}
