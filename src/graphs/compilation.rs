//! Compilation of a validated graph into an executable plan.
//!
//! The [`ExecutionPlan`] is an arena: plan nodes live in a `Vec` sorted by
//! execution order, and every cross-reference (dependencies, dependents,
//! input bindings, outgoing routes) is an index into that `Vec`. Nothing
//! holds a pointer to anything else, so the scheduler can keep mutable state
//! alongside each slot without reference cycles.
//!
//! Ordering: Kahn's algorithm over the full edge set, with ties between
//! independent nodes broken by declaration order in the authored graph. The
//! result is deterministic for a given graph; the scheduler is still free to
//! run tied nodes concurrently. Conditional activation is ignored here on
//! purpose — it is a runtime property, so the plan is identical for every
//! routing outcome.
//!
//! A cycle anywhere in the edge set is fatal: [`CyclicGraphError`] reports
//! one offending cycle as a node-id sequence.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::model::Graph;
use super::validation::{validate, GraphValidationError, Violation, ViolationKind};
use crate::registry::TemplateRegistry;
use crate::templates::ComponentTemplate;
use crate::types::NodeId;

/// One resolved input connection: `field` is fed by `source`'s named output.
#[derive(Clone, Debug)]
pub struct InputBinding {
    pub field: String,
    /// Index of the producing node in the plan arena.
    pub source: usize,
    pub source_output: String,
}

/// One node of the compiled plan.
#[derive(Clone, Debug)]
pub struct PlanNode {
    pub id: NodeId,
    pub template: Arc<ComponentTemplate>,
    /// Authored literals, snapshotted from the graph.
    pub field_values: FxHashMap<String, Value>,
    pub frozen: bool,
    /// Execution-order position; equals this node's arena index.
    pub order: usize,
    /// Distinct upstream arena indices, in edge-declaration order.
    pub deps: Vec<usize>,
    /// Distinct downstream arena indices, in edge-declaration order.
    pub dependents: Vec<usize>,
    /// Every incoming connection, in edge-declaration order (this is the
    /// fan-in order for `list` fields).
    pub inputs: Vec<InputBinding>,
    /// Outgoing routes grouped by output name, each target list distinct and
    /// in edge-declaration order. Drives conditional branch pruning.
    pub outgoing: FxHashMap<String, Vec<usize>>,
}

/// The compiled, immutable execution plan.
#[derive(Clone, Debug, Default)]
pub struct ExecutionPlan {
    nodes: Vec<PlanNode>,
    index: FxHashMap<NodeId, usize>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Plan nodes in execution order.
    pub fn nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_at(&self, idx: usize) -> &PlanNode {
        &self.nodes[idx]
    }

    #[must_use]
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<&PlanNode> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// The sub-plan containing `target` and its transitive ancestors, with
    /// relative order preserved. `None` if the target is not in the plan.
    ///
    /// This is how callers run a graph "up to" one node without authoring a
    /// trimmed copy.
    #[must_use]
    pub fn restricted_to(&self, target: &NodeId) -> Option<ExecutionPlan> {
        let target_idx = self.index_of(target)?;

        let mut keep = vec![false; self.nodes.len()];
        let mut stack = vec![target_idx];
        while let Some(idx) = stack.pop() {
            if keep[idx] {
                continue;
            }
            keep[idx] = true;
            stack.extend(&self.nodes[idx].deps);
        }

        let mut remap: FxHashMap<usize, usize> = FxHashMap::default();
        for (old, kept) in keep.iter().enumerate() {
            if *kept {
                let new = remap.len();
                remap.insert(old, new);
            }
        }

        let mut nodes = Vec::with_capacity(remap.len());
        let mut index = FxHashMap::default();
        for (old, node) in self.nodes.iter().enumerate() {
            if !keep[old] {
                continue;
            }
            let mut node = node.clone();
            node.order = remap[&old];
            node.deps = node.deps.iter().map(|d| remap[d]).collect();
            node.dependents = node
                .dependents
                .iter()
                .filter(|d| keep[**d])
                .map(|d| remap[d])
                .collect();
            for binding in &mut node.inputs {
                binding.source = remap[&binding.source];
            }
            for targets in node.outgoing.values_mut() {
                targets.retain(|t| keep[*t]);
                for t in targets.iter_mut() {
                    *t = remap[t];
                }
            }
            node.outgoing.retain(|_, targets| !targets.is_empty());
            index.insert(node.id.clone(), node.order);
            nodes.push(node);
        }

        Some(ExecutionPlan { nodes, index })
    }
}

/// The full edge set contains a cycle; branching is supported, loops are not.
#[derive(Debug, Diagnostic)]
#[diagnostic(
    code(wireflow::graph::cycle),
    help("Remove one edge of the reported cycle; the engine supports branching, not loops.")
)]
pub struct CyclicGraphError {
    /// One offending cycle, in edge direction; the last node connects back
    /// to the first.
    pub cycle: Vec<NodeId>,
}

impl std::error::Error for CyclicGraphError {}

impl fmt::Display for CyclicGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph contains a cycle: ")?;
        for node in &self.cycle {
            write!(f, "{node} -> ")?;
        }
        match self.cycle.first() {
            Some(first) => write!(f, "{first}"),
            None => write!(f, "<empty>"),
        }
    }
}

/// Compilation failure: either validation violations or a cycle. No partial
/// plan is ever produced.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] GraphValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cycle(#[from] CyclicGraphError),
}

/// Validate and order the graph, producing an [`ExecutionPlan`].
pub fn compile(graph: &Graph, registry: &TemplateRegistry) -> Result<ExecutionPlan, CompileError> {
    validate(graph, registry)?;

    let n = graph.nodes.len();
    let decl_index: FxHashMap<&NodeId, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (&node.id, i))
        .collect();

    // Dependency pairs, deduplicated: two edges between the same nodes are a
    // single scheduling dependency.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    for edge in &graph.edges {
        let from = decl_index[&edge.source];
        let to = decl_index[&edge.target];
        if !children[from].contains(&to) {
            children[from].push(to);
            parents[to].push(from);
            in_degree[to] += 1;
        }
    }

    // Kahn's algorithm; the min-heap over declaration indices makes the
    // order deterministic (ties go to the earlier-declared node).
    let mut heap: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut topo: Vec<usize> = Vec::with_capacity(n);
    let mut remaining = in_degree.clone();
    while let Some(Reverse(idx)) = heap.pop() {
        topo.push(idx);
        for &child in &children[idx] {
            remaining[child] -= 1;
            if remaining[child] == 0 {
                heap.push(Reverse(child));
            }
        }
    }

    if topo.len() < n {
        let leftover: Vec<usize> = (0..n).filter(|i| remaining[*i] > 0).collect();
        let cycle = extract_cycle(graph, &parents, &leftover);
        tracing::debug!(cycle_len = cycle.len(), "compile rejected cyclic graph");
        return Err(CyclicGraphError { cycle }.into());
    }

    // Arena order = execution order; remap declaration indices accordingly.
    let mut order_of: Vec<usize> = vec![0; n];
    for (pos, decl) in topo.iter().enumerate() {
        order_of[*decl] = pos;
    }

    let mut nodes: Vec<PlanNode> = Vec::with_capacity(n);
    let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (pos, &decl) in topo.iter().enumerate() {
        let node = &graph.nodes[decl];
        let template = resolve_template(registry, node)?;

        let mut deps: Vec<usize> = Vec::new();
        let mut inputs: Vec<InputBinding> = Vec::new();
        for edge in graph.incoming(&node.id) {
            let source = order_of[decl_index[&edge.source]];
            if !deps.contains(&source) {
                deps.push(source);
            }
            inputs.push(InputBinding {
                field: edge.target_field.clone(),
                source,
                source_output: edge.source_output.clone(),
            });
        }

        let mut dependents: Vec<usize> = Vec::new();
        let mut outgoing: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for edge in graph.outgoing(&node.id) {
            let target = order_of[decl_index[&edge.target]];
            if !dependents.contains(&target) {
                dependents.push(target);
            }
            let routes = outgoing.entry(edge.source_output.clone()).or_default();
            if !routes.contains(&target) {
                routes.push(target);
            }
        }

        index.insert(node.id.clone(), pos);
        nodes.push(PlanNode {
            id: node.id.clone(),
            template,
            field_values: node.field_values.clone(),
            frozen: node.frozen,
            order: pos,
            deps,
            dependents,
            inputs,
            outgoing,
        });
    }

    tracing::debug!(nodes = nodes.len(), "compiled execution plan");
    Ok(ExecutionPlan { nodes, index })
}

// Validation already proved every template resolves; re-surface a violation
// rather than panicking if the registry changed under us.
fn resolve_template(
    registry: &TemplateRegistry,
    node: &super::model::Node,
) -> Result<Arc<ComponentTemplate>, CompileError> {
    registry.get(&node.template_id).cloned().ok_or_else(|| {
        GraphValidationError {
            violations: vec![Violation {
                kind: ViolationKind::UnknownTemplate,
                node: node.id.clone(),
                detail: format!("template {} is not registered", node.template_id),
            }],
        }
        .into()
    })
}

/// Walk parent links inside the leftover set until a node repeats; the
/// recorded path, reversed, is a forward-direction cycle. Every leftover
/// node has at least one leftover parent, so the walk cannot dead-end.
fn extract_cycle(graph: &Graph, parents: &[Vec<usize>], leftover: &[usize]) -> Vec<NodeId> {
    let in_leftover: Vec<bool> = {
        let mut flags = vec![false; graph.nodes.len()];
        for &i in leftover {
            flags[i] = true;
        }
        flags
    };

    let Some(&start) = leftover.first() else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut pos: FxHashMap<usize, usize> = FxHashMap::default();
    let mut current = start;
    loop {
        if let Some(&at) = pos.get(&current) {
            let mut cycle: Vec<NodeId> = path[at..]
                .iter()
                .map(|&i| graph.nodes[i].id.clone())
                .collect();
            cycle.reverse();
            return cycle;
        }
        pos.insert(current, path.len());
        path.push(current);
        let next = parents[current]
            .iter()
            .find(|p| in_leftover[**p])
            .copied();
        match next {
            Some(parent) => current = parent,
            // Unreachable for a true leftover set; bail with what we have.
            None => {
                return path.iter().map(|&i| graph.nodes[i].id.clone()).collect();
            }
        }
    }
}
