//! Cooperative cancellation: pending nodes skip, running nodes stop at the
//! token, and the run still settles with a full summary.

mod common;
use common::*;

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wireflow::events::{MemorySink, RunEvent};
use wireflow::graphs::{Graph, Node};
use wireflow::runtimes::{Executor, ExecutorError, RunOptions, SkipReason};

fn slow_executor(delay_ms: u64) -> Executor {
    let mut bodies = basic_bodies();
    bodies.register("slow", SlowBody::millis(delay_ms));
    Executor::new(fixture_registry(), bodies)
}

fn slow_chain() -> Graph {
    Graph::builder()
        .node(Node::new("s", "slow"))
        .node(Node::new("up", "uppercase"))
        .edge("s", "text", "up", "input")
        .build()
}

#[tokio::test]
async fn test_cancel_skips_running_and_pending_nodes() {
    let executor = slow_executor(500);
    let plan = executor.compile(&slow_chain()).expect("chain compiles");

    let handle = executor
        .run(&plan, RunOptions::new())
        .await
        .expect("run starts");
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let summary = handle.join().await.expect("cancelled run still settles");
    assert!(summary.cancelled);
    assert_eq!(assert_skipped(&summary, "s"), SkipReason::Cancelled);
    assert_eq!(assert_skipped(&summary, "up"), SkipReason::Cancelled);
}

#[tokio::test]
async fn test_settled_nodes_survive_cancellation() {
    let executor = slow_executor(500);
    let graph = Graph::builder()
        .node(Node::new("lit", "literal").with_value("value", json!("hi")))
        .node(Node::new("s", "slow"))
        .node(Node::new("up", "uppercase"))
        .edge("lit", "text", "s", "input")
        .edge("s", "text", "up", "input")
        .build();
    let plan = executor.compile(&graph).expect("graph compiles");

    let handle = executor
        .run(&plan, RunOptions::new())
        .await
        .expect("run starts");
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let summary = handle.join().await.expect("cancelled run still settles");

    assert!(summary.cancelled);
    assert_succeeded(&summary, "lit");
    assert_eq!(assert_skipped(&summary, "s"), SkipReason::Cancelled);
    assert_eq!(assert_skipped(&summary, "up"), SkipReason::Cancelled);
}

#[tokio::test]
async fn test_external_token_cancels_the_run() {
    let executor = slow_executor(500);
    let plan = executor.compile(&slow_chain()).expect("chain compiles");

    let token = CancellationToken::new();
    let handle = executor
        .run(&plan, RunOptions::new().with_cancellation(token.clone()))
        .await
        .expect("run starts");
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let summary = handle.join().await.expect("cancelled run still settles");
    assert!(summary.cancelled);
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_run_still_delivers_run_complete() {
    let executor = slow_executor(500);
    let plan = executor.compile(&slow_chain()).expect("chain compiles");

    let sink = MemorySink::new();
    let handle = executor
        .run(&plan, RunOptions::new().with_sink(sink.clone()))
        .await
        .expect("run starts");
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    handle.join().await.expect("cancelled run still settles");

    let events = sink.snapshot();
    match events.last() {
        Some(RunEvent::RunComplete { summary, .. }) => assert!(summary.cancelled),
        other => panic!("expected RunComplete last, got {other:?}"),
    }
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RunEvent::NodeSkipped { .. })),
        "skips must be announced to sinks"
    );
}

#[tokio::test]
async fn test_abort_kills_the_run_without_a_summary() {
    let executor = slow_executor(500);
    let plan = executor.compile(&slow_chain()).expect("chain compiles");

    let handle = executor
        .run(&plan, RunOptions::new())
        .await
        .expect("run starts");
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort();

    match handle.join().await {
        Err(ExecutorError::Join(_)) => {}
        other => panic!("expected a join error after abort, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pre_cancelled_token_skips_everything() {
    let executor = slow_executor(500);
    let graph = Graph::builder()
        .node(Node::new("s1", "slow"))
        .node(Node::new("s2", "slow"))
        .build();
    let plan = executor.compile(&graph).expect("graph compiles");

    let token = CancellationToken::new();
    token.cancel();
    let summary = executor
        .invoke(&plan, RunOptions::new().with_cancellation(token))
        .await
        .expect("run settles immediately");

    assert!(summary.cancelled);
    assert_eq!(assert_skipped(&summary, "s1"), SkipReason::Cancelled);
    assert_eq!(assert_skipped(&summary, "s2"), SkipReason::Cancelled);
}
