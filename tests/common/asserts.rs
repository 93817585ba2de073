use serde_json::Value;
use wireflow::events::{MemorySink, RunEvent};
use wireflow::runtimes::{NodeState, RunSummary, SkipReason};

#[allow(dead_code)]
pub fn assert_succeeded(summary: &RunSummary, node: &str) {
    let report = summary.node(&node.into()).expect("node is in the summary");
    assert_eq!(
        report.state,
        NodeState::Succeeded,
        "expected {node} to succeed, got {report:?}"
    );
}

#[allow(dead_code)]
pub fn assert_failed(summary: &RunSummary, node: &str) -> String {
    let report = summary.node(&node.into()).expect("node is in the summary");
    assert_eq!(
        report.state,
        NodeState::Failed,
        "expected {node} to fail, got {report:?}"
    );
    report.error.clone().expect("failed node carries an error")
}

#[allow(dead_code)]
pub fn assert_skipped(summary: &RunSummary, node: &str) -> SkipReason {
    let report = summary.node(&node.into()).expect("node is in the summary");
    assert_eq!(
        report.state,
        NodeState::Skipped,
        "expected {node} to be skipped, got {report:?}"
    );
    report.skip.clone().expect("skipped node carries a reason")
}

/// All captured events concerning one node, in delivery order.
#[allow(dead_code)]
pub fn node_events(sink: &MemorySink, node: &str) -> Vec<RunEvent> {
    sink.snapshot()
        .into_iter()
        .filter(|e| e.node_id().is_some_and(|id| id.as_str() == node))
        .collect()
}

/// The node's `Final` value as captured by the sink.
#[allow(dead_code)]
pub fn final_value(sink: &MemorySink, node: &str) -> Value {
    node_events(sink, node)
        .into_iter()
        .find_map(|e| match e {
            RunEvent::Final { value, .. } => Some(value),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no Final event captured for {node}"))
}

/// The sink's captured chunk values for one node, in sequence order.
#[allow(dead_code)]
pub fn partial_chunks(sink: &MemorySink, node: &str) -> Vec<Value> {
    node_events(sink, node)
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::Partial { chunk, .. } => Some(chunk),
            _ => None,
        })
        .collect()
}
