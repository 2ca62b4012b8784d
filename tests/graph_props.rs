#[macro_use]
extern crate proptest;

use dagflow::bus::InMemoryBus;
use dagflow::config::CoordinatorConfig;
use dagflow::coordinator::ExecutionManager;
use dagflow::graph::{Edge, Graph, GraphBuilder, Node, Validator};
use dagflow::store::{InMemoryStateStore, StateStore};
use dagflow::types::ExecutionStatus;
use proptest::collection::vec;
use proptest::prelude::*;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;

/// Node names: a letter followed by a short identifier tail, excluding the
/// fixed entry/exit names used by the pipeline generator.
fn node_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,12}")
        .unwrap()
        .prop_filter("exclude fixed endpoint names", |s| {
            s != "entry" && s != "exit"
        })
}

/// A linear pipeline: `entry(start) -> <executors...> -> exit(end)`.
fn linear_pipeline(names: &[String]) -> Graph {
    let mut builder = GraphBuilder::new("generated", "1.0")
        .add_node("entry", Node::start())
        .add_node("exit", Node::end())
        .entry_node("entry");
    let mut previous = "entry".to_string();
    for name in names {
        builder = builder
            .add_node(name.clone(), Node::executor(json!({"task": name})))
            .add_edge(previous.clone(), name.clone());
        previous = name.clone();
    }
    builder.add_edge(previous, "exit").build()
}

fn unique_names() -> impl Strategy<Value = Vec<String>> {
    vec(node_name_strategy(), 1..8).prop_map(|mut names| {
        names.sort();
        names.dedup();
        names
    })
}

fn block_on<F: std::future::Future<Output = ()>>(fut: F) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(fut);
}

proptest! {
    #[test]
    fn prop_generated_pipelines_are_admitted(names in unique_names()) {
        let graph = linear_pipeline(&names);
        prop_assert!(Validator::new().validate(&graph).is_ok());
    }

    /// First edge in `edges` order wins, regardless of how many outgoing
    /// edges a node has.
    #[test]
    fn prop_find_next_node_takes_the_first_matching_edge(
        names in unique_names(),
        edge_picks in vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 1..24),
    ) {
        let mut graph = linear_pipeline(&names);
        // Append arbitrary extra edges between existing executors.
        for (from_idx, to_idx) in edge_picks {
            let from = names[from_idx.index(names.len())].clone();
            let to = names[to_idx.index(names.len())].clone();
            graph.edges.push(Edge::new(from, to));
        }

        for name in &names {
            let expected = graph
                .edges
                .iter()
                .find(|e| &e.from == name)
                .map(|e| e.to.as_str());
            prop_assert_eq!(graph.find_next_node(name), expected);
        }
    }

    #[test]
    fn prop_dangling_edge_always_rejected(names in unique_names()) {
        let mut graph = linear_pipeline(&names);
        graph.edges.push(Edge::new(names[0].clone(), "ghost"));
        prop_assert!(Validator::new().validate(&graph).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Submitting a valid graph yields a fresh execution id whose record is
    /// `Running` with no node beyond `Running` yet.
    #[test]
    fn prop_submit_persists_a_running_record(names in unique_names()) {
        let graph = linear_pipeline(&names);
        block_on(async move {
            let store = Arc::new(InMemoryStateStore::new());
            let manager = ExecutionManager::new(
                Arc::new(InMemoryBus::new()),
                store.clone(),
                CoordinatorConfig::default(),
            );

            let first = manager
                .submit(graph.clone(), FxHashMap::default())
                .await
                .unwrap();
            let second = manager
                .submit(graph.clone(), FxHashMap::default())
                .await
                .unwrap();
            assert_ne!(first, second);

            let record = store.load(&first).await.unwrap();
            assert_eq!(record.status, ExecutionStatus::Running);
            assert_eq!(record.node_states.len(), graph.nodes.len());
            assert!(record.node_states.values().all(|ns| matches!(
                ns.status,
                ExecutionStatus::Pending | ExecutionStatus::Running
            )));
        });
    }

    /// Submitting an invalid graph writes nothing.
    #[test]
    fn prop_rejected_submissions_write_no_state(names in unique_names()) {
        let mut graph = linear_pipeline(&names);
        graph.version = String::new();
        block_on(async move {
            let store = Arc::new(InMemoryStateStore::new());
            let manager = ExecutionManager::new(
                Arc::new(InMemoryBus::new()),
                store.clone(),
                CoordinatorConfig::default(),
            );

            assert!(manager.submit(graph, FxHashMap::default()).await.is_err());
            assert!(store.list().await.unwrap().is_empty());
        });
    }
}
