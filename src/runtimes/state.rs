//! Per-run execution state: node lifecycle, skip bookkeeping, and the final
//! run summary.
//!
//! [`RunState`] is the scheduler's private ledger. Exactly one task mutates
//! it, so transitions need no locking; workers report outcomes back over a
//! channel and the scheduler applies them here. The public outcome of a run
//! is the [`RunSummary`] distilled from this ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::graphs::ExecutionPlan;
use crate::types::NodeId;

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle of one node within a run.
///
/// Forward-only: `Pending -> Ready -> Running` and then exactly one of the
/// three terminal states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting on upstream dependencies.
    #[default]
    Pending,
    /// All dependencies settled successfully; eligible for dispatch.
    Ready,
    /// A worker is executing the body.
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{label}")
    }
}

/// Why a node ended up [`NodeState::Skipped`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// `origin` failed, directly or somewhere upstream.
    DependencyFailed { origin: NodeId },
    /// The node sits on a conditional branch `origin` did not take.
    InactivePath { origin: NodeId },
    /// The run was cancelled before the node could start.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyFailed { origin } => write!(f, "dependency {origin} failed"),
            Self::InactivePath { origin } => write!(f, "inactive branch of {origin}"),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Final account of one node after the run settled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub state: NodeState,
    /// Failure message, present for failed nodes.
    pub error: Option<String>,
    /// Present for skipped nodes.
    pub skip: Option<SkipReason>,
    /// True when the result was served from the frozen-result cache.
    pub cached: bool,
    /// Wall-clock body time; absent for nodes that never ran.
    pub duration_ms: Option<u64>,
}

/// Outcome of a whole run, one report per planned node in plan order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True when the run was cut short by its cancellation token.
    pub cancelled: bool,
    pub nodes: Vec<NodeReport>,
}

impl RunSummary {
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeReport> {
        self.nodes.iter().find(|r| &r.node_id == id)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|r| r.state == NodeState::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|r| r.state == NodeState::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|r| r.state == NodeState::Skipped)
    }

    /// True when every planned node succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|r| r.state == NodeState::Succeeded)
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {} succeeded, {} failed, {} skipped in {}ms",
            self.run_id,
            self.succeeded().count(),
            self.failed().count(),
            self.skipped().count(),
            self.duration_ms()
        )
    }
}

// ============================================================================
// Scheduler Ledger
// ============================================================================

/// Mutable per-node record while the run is in flight.
#[derive(Debug, Default)]
pub(crate) struct NodeSlot {
    pub state: NodeState,
    pub error: Option<String>,
    pub skip: Option<SkipReason>,
    pub cached: bool,
    pub duration_ms: Option<u64>,
    /// The settled value, kept for downstream input resolution.
    pub value: Option<Value>,
    /// For conditional sources, the single output taken this run. `None`
    /// means the value is visible on every declared output.
    pub active_output: Option<String>,
}

impl NodeSlot {
    /// The node's value as seen through `output`, if that route is live.
    pub fn provides(&self, output: &str) -> Option<&Value> {
        if self.state != NodeState::Succeeded {
            return None;
        }
        match &self.active_output {
            Some(active) if active != output => None,
            _ => self.value.as_ref(),
        }
    }
}

/// The scheduler's ledger for one run over a fixed [`ExecutionPlan`].
///
/// Skips propagate uniformly: once a node fails, is cancelled, or lands on
/// an inactive branch, everything downstream of it settles as skipped with
/// the original node recorded as the origin.
#[derive(Debug)]
pub(crate) struct RunState {
    slots: Vec<NodeSlot>,
    /// Unsettled-dependency counts; a node becomes `Ready` at zero.
    remaining_deps: Vec<usize>,
}

impl RunState {
    pub fn new(plan: &ExecutionPlan) -> Self {
        let mut slots: Vec<NodeSlot> = Vec::with_capacity(plan.len());
        let mut remaining_deps = Vec::with_capacity(plan.len());
        for node in plan.nodes() {
            let mut slot = NodeSlot::default();
            if node.deps.is_empty() {
                slot.state = NodeState::Ready;
            }
            remaining_deps.push(node.deps.len());
            slots.push(slot);
        }
        Self {
            slots,
            remaining_deps,
        }
    }

    pub fn slot(&self, idx: usize) -> &NodeSlot {
        &self.slots[idx]
    }

    /// First `Ready` node in plan order, keeping dispatch deterministic.
    pub fn next_ready(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.state == NodeState::Ready)
    }

    pub fn mark_running(&mut self, idx: usize) {
        debug_assert_eq!(self.slots[idx].state, NodeState::Ready);
        self.slots[idx].state = NodeState::Running;
    }

    /// True once every node reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|s| s.state.is_terminal())
    }

    /// Settle `idx` as succeeded and ripple the consequences downstream.
    ///
    /// `active_output` is `Some` for conditional sources; every route under
    /// a different output name is dead for this run and its targets are
    /// skipped before any dependent is promoted to `Ready`.
    pub fn settle_success(
        &mut self,
        plan: &ExecutionPlan,
        idx: usize,
        value: Value,
        active_output: Option<String>,
        cached: bool,
        duration_ms: Option<u64>,
    ) {
        {
            let slot = &mut self.slots[idx];
            slot.state = NodeState::Succeeded;
            slot.value = Some(value);
            slot.active_output = active_output.clone();
            slot.cached = cached;
            slot.duration_ms = duration_ms;
        }

        if let Some(active) = &active_output {
            let origin = plan.node_at(idx).id.clone();
            let dead: Vec<usize> = plan
                .node_at(idx)
                .outgoing
                .iter()
                .filter(|(output, _)| *output != active)
                .flat_map(|(_, targets)| targets.iter().copied())
                .collect();
            for target in dead {
                self.skip_transitively(
                    plan,
                    target,
                    SkipReason::InactivePath {
                        origin: origin.clone(),
                    },
                );
            }
        }

        for &dep in &plan.node_at(idx).dependents {
            if self.slots[dep].state == NodeState::Pending {
                self.remaining_deps[dep] -= 1;
                if self.remaining_deps[dep] == 0 {
                    self.slots[dep].state = NodeState::Ready;
                }
            }
        }
    }

    /// Settle `idx` as failed and skip everything downstream of it.
    pub fn settle_failure(
        &mut self,
        plan: &ExecutionPlan,
        idx: usize,
        error: String,
        duration_ms: Option<u64>,
    ) {
        {
            let slot = &mut self.slots[idx];
            slot.state = NodeState::Failed;
            slot.error = Some(error);
            slot.duration_ms = duration_ms;
        }
        let origin = plan.node_at(idx).id.clone();
        for &dep in &plan.node_at(idx).dependents {
            self.skip_transitively(
                plan,
                dep,
                SkipReason::DependencyFailed {
                    origin: origin.clone(),
                },
            );
        }
    }

    /// Settle a single node as skipped without touching its dependents.
    pub fn skip(&mut self, idx: usize, reason: SkipReason) {
        let slot = &mut self.slots[idx];
        if slot.state.is_terminal() {
            return;
        }
        slot.state = NodeState::Skipped;
        slot.skip = Some(reason);
    }

    /// Skip `idx` and, recursively, every dependent that has not already
    /// settled. The original reason travels with the cascade so reports
    /// point at the root cause rather than the nearest neighbor.
    pub fn skip_transitively(&mut self, plan: &ExecutionPlan, idx: usize, reason: SkipReason) {
        if self.slots[idx].state.is_terminal() {
            return;
        }
        self.skip(idx, reason.clone());
        for &dep in &plan.node_at(idx).dependents {
            self.skip_transitively(plan, dep, reason.clone());
        }
    }

    /// Skip every node that has not started; running nodes settle on their
    /// own once they observe the cancellation token.
    pub fn cancel_pending(&mut self) {
        for slot in &mut self.slots {
            if !slot.state.is_terminal() && slot.state != NodeState::Running {
                slot.state = NodeState::Skipped;
                slot.skip = Some(SkipReason::Cancelled);
            }
        }
    }

    /// Distill the ledger into the run's public summary, in plan order.
    pub fn into_summary(
        self,
        plan: &ExecutionPlan,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> RunSummary {
        let nodes = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| NodeReport {
                node_id: plan.node_at(idx).id.clone(),
                state: slot.state,
                error: slot.error,
                skip: slot.skip,
                cached: slot.cached,
                duration_ms: slot.duration_ms,
            })
            .collect();
        RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            nodes,
        }
    }

    /// Resolve the value feeding `field` through one binding, if live.
    pub fn binding_value(&self, source: usize, source_output: &str) -> Option<&Value> {
        self.slots[source].provides(source_output)
    }
}

/// Compute the effective input map for one node about to run.
///
/// Layering: template defaults, then authored literals, then wired values.
/// Fan-in into a `list` field collapses to a JSON array in edge-declaration
/// order; on a non-list field the single live edge wins over any literal.
pub(crate) fn resolve_inputs(
    plan: &ExecutionPlan,
    state: &RunState,
    idx: usize,
) -> FxHashMap<String, Value> {
    let node = plan.node_at(idx);
    let mut values: FxHashMap<String, Value> = node.field_values.clone();

    // Template defaults fill fields the author never touched.
    for field in &node.template.fields {
        if let Some(default) = &field.value {
            values
                .entry(field.name.clone())
                .or_insert_with(|| default.clone());
        }
    }

    let mut wired: FxHashMap<&str, Vec<Value>> = FxHashMap::default();
    for binding in &node.inputs {
        if let Some(value) = state.binding_value(binding.source, &binding.source_output) {
            wired
                .entry(binding.field.as_str())
                .or_default()
                .push(value.clone());
        }
    }

    for (field, mut incoming) in wired {
        let is_list = node
            .template
            .field(field)
            .is_some_and(|f| f.list);
        let resolved = if is_list {
            Value::Array(incoming)
        } else {
            // Validation capped non-list fields at one edge.
            incoming.swap_remove(0)
        };
        values.insert(field.to_string(), resolved);
    }

    values
}
