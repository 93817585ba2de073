//! Authored graph model: nodes, edges, and the fluent graph builder.
//!
//! A [`Graph`] is the engine's snapshot of what the authoring collaborator
//! wired together: node instances referencing registered templates, plus
//! directed edges between named ports. Declaration order of both vectors is
//! meaningful — it is the deterministic tie-break order used by the compiler
//! and the scheduler, and the fan-in order for `list` fields.
//!
//! The engine never mutates an authored graph. Validation and planning
//! borrow it; execution works on the compiled
//! [`ExecutionPlan`](crate::graphs::ExecutionPlan).
//!
//! # Examples
//!
//! ```rust
//! use wireflow::graphs::{Graph, Node};
//!
//! let graph = Graph::builder()
//!     .node(Node::new("n1", "literal").with_value("text", "hi".into()))
//!     .node(Node::new("n2", "uppercase"))
//!     .edge("n1", "value", "n2", "text")
//!     .build();
//!
//! assert_eq!(graph.nodes.len(), 2);
//! assert_eq!(graph.edges[0].source_output, "value");
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{NodeId, TemplateId};

/// A graph instance of a component template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within the graph.
    pub id: NodeId,
    pub template_id: TemplateId,
    /// Literal values for unconnected fields. A literal on a connected
    /// non-list field is ignored at resolution time (the edge wins).
    #[serde(default)]
    pub field_values: FxHashMap<String, Value>,
    /// Reuse the last successful result instead of recomputing when the
    /// resolved inputs are unchanged.
    #[serde(default)]
    pub frozen: bool,
    /// Excluded from deletion/clear operations in the authoring UI.
    /// Presentation concern, carried but never executed on.
    #[serde(default)]
    pub pinned: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, template_id: impl Into<TemplateId>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            field_values: FxHashMap::default(),
            frozen: false,
            pinned: false,
        }
    }

    /// Set a literal value for a field.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.field_values.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// A directed connection from a node's output to another node's field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub source_output: String,
    pub target: NodeId,
    pub target_field: String,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        source_output: impl Into<String>,
        target: impl Into<NodeId>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_output: source_output.into(),
            target: target.into(),
            target_field: target_field.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_output, self.target, self.target_field
        )
    }
}

/// The authored graph: node instances plus typed-port edges.
///
/// Serializable so callers can hand the engine an authored snapshot loaded
/// from JSON. Structural and type invariants are checked by
/// [`validate`](crate::graphs::validate), not on construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    #[must_use]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Edges targeting the given node, in declaration order.
    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| &e.target == id)
    }

    /// Edges leaving the given node, in declaration order.
    pub fn outgoing(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| &e.source == id)
    }
}

/// Fluent constructor for [`Graph`].
///
/// # Examples
///
/// ```rust
/// use wireflow::graphs::{Graph, Node, Edge};
///
/// let graph = Graph::builder()
///     .node(Node::new("a", "literal"))
///     .node(Node::new("b", "uppercase").frozen())
///     .edge("a", "value", "b", "text")
///     .build();
///
/// assert!(graph.node(&"b".into()).is_some_and(|n| n.frozen));
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect `source`'s named output to `target`'s named field.
    #[must_use]
    pub fn edge(
        mut self,
        source: impl Into<NodeId>,
        source_output: impl Into<String>,
        target: impl Into<NodeId>,
        target_field: impl Into<String>,
    ) -> Self {
        self.edges
            .push(Edge::new(source, source_output, target, target_field));
        self
    }

    /// Push a pre-built edge (useful when edges arrive from deserialized
    /// authoring data).
    #[must_use]
    pub fn push_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    #[must_use]
    pub fn build(self) -> Graph {
        Graph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}
