//! Structural and type validation of authored graphs.
//!
//! [`validate`] checks a [`Graph`] against a [`TemplateRegistry`] in five
//! stages, in order:
//!
//! 1. node ids are unique and every `template_id` resolves;
//! 2. every edge's endpoints exist and its port/field names are declared;
//! 3. type compatibility per edge (`produced_types ∩ input_types ≠ ∅`);
//! 4. cardinality — a non-`list` field takes at most one incoming edge
//!    (when it has one, any literal for that field is ignored at
//!    resolution time: the edge wins); `list` fields accept fan-in;
//! 5. every `required` field is satisfied by a literal (authored or
//!    template default) or at least one incoming edge.
//!
//! All violations found are reported together in stage order; validation is
//! purely structural and never executes anything. A node whose template
//! cannot be resolved is excluded from the later stages so one authoring
//! mistake does not cascade into noise.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt;

use super::model::Graph;
use crate::registry::TemplateRegistry;
use crate::types::NodeId;

/// Reason code for one validation violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    UnknownTemplate,
    UnknownPort,
    TypeMismatch,
    Cardinality,
    MissingRequired,
    DuplicateNode,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnknownTemplate => "unknown template",
            Self::UnknownPort => "unknown port",
            Self::TypeMismatch => "type mismatch",
            Self::Cardinality => "cardinality",
            Self::MissingRequired => "missing required",
            Self::DuplicateNode => "duplicate node",
        };
        write!(f, "{label}")
    }
}

/// One violation: the reason code, the offending node, and a human detail.
///
/// For edge violations `node` is the edge's target (the node whose input
/// contract is broken) and `detail` spells out the full connection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub node: NodeId,
    pub detail: String,
}

impl Violation {
    fn new(kind: ViolationKind, node: &NodeId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            node: node.clone(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.node, self.detail)
    }
}

/// Validation failed; the whole compile is rejected, nothing is partially
/// applied.
///
/// Display is multiline (one violation per line), so the Error/Display
/// impls are written out instead of derived.
#[derive(Debug, Diagnostic)]
#[diagnostic(
    code(wireflow::graph::validation),
    help("Fix every listed violation; validation re-checks the full graph each time.")
)]
pub struct GraphValidationError {
    pub violations: Vec<Violation>,
}

impl std::error::Error for GraphValidationError {}

impl GraphValidationError {
    /// The first violation in stage order.
    #[must_use]
    pub fn first(&self) -> &Violation {
        &self.violations[0]
    }
}

impl fmt::Display for GraphValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph validation failed ({} violation(s)):", self.violations.len())?;
        for v in &self.violations {
            writeln!(f, "  {v}")?;
        }
        Ok(())
    }
}

/// Check the graph's structural and type invariants against the registry.
pub fn validate(graph: &Graph, registry: &TemplateRegistry) -> Result<(), GraphValidationError> {
    let mut violations = Vec::new();

    // Stage 1: unique ids, resolvable templates. Nodes failing here are
    // excluded from the remaining stages.
    let mut seen: FxHashSet<&NodeId> = FxHashSet::default();
    let mut broken: FxHashSet<&NodeId> = FxHashSet::default();
    for node in &graph.nodes {
        if !seen.insert(&node.id) {
            violations.push(Violation::new(
                ViolationKind::DuplicateNode,
                &node.id,
                format!("node id {} declared more than once", node.id),
            ));
            broken.insert(&node.id);
            continue;
        }
        if !registry.contains(&node.template_id) {
            violations.push(Violation::new(
                ViolationKind::UnknownTemplate,
                &node.id,
                format!("template {} is not registered", node.template_id),
            ));
            broken.insert(&node.id);
        }
    }

    let resolved: FxHashMap<&NodeId, &crate::templates::ComponentTemplate> = graph
        .nodes
        .iter()
        .filter(|n| !broken.contains(&n.id))
        .filter_map(|n| registry.get(&n.template_id).map(|t| (&n.id, t.as_ref())))
        .collect();

    // Stages 2 and 3: per edge, in declaration order. An edge with an
    // unresolvable endpoint or port skips the type check.
    for edge in &graph.edges {
        let source = match resolved.get(&edge.source) {
            Some(t) => t,
            None => {
                violations.push(Violation::new(
                    ViolationKind::UnknownPort,
                    &edge.target,
                    format!("{edge}: source node {} does not resolve", edge.source),
                ));
                continue;
            }
        };
        let target = match resolved.get(&edge.target) {
            Some(t) => t,
            None => {
                violations.push(Violation::new(
                    ViolationKind::UnknownPort,
                    &edge.target,
                    format!("{edge}: target node {} does not resolve", edge.target),
                ));
                continue;
            }
        };

        let output = match source.output(&edge.source_output) {
            Some(o) => o,
            None => {
                violations.push(Violation::new(
                    ViolationKind::UnknownPort,
                    &edge.target,
                    format!(
                        "{edge}: template {} declares no output named {}",
                        source.id, edge.source_output
                    ),
                ));
                continue;
            }
        };
        let field = match target.field(&edge.target_field) {
            Some(fld) => fld,
            None => {
                violations.push(Violation::new(
                    ViolationKind::UnknownPort,
                    &edge.target,
                    format!(
                        "{edge}: template {} declares no field named {}",
                        target.id, edge.target_field
                    ),
                ));
                continue;
            }
        };

        if !output.can_feed(field) {
            let accepts = if field.connectable() {
                format!("accepts {:?}", field.input_types)
            } else {
                "accepts no connections".to_string()
            };
            violations.push(Violation::new(
                ViolationKind::TypeMismatch,
                &edge.target,
                format!("{edge}: produces {:?}, field {accepts}", output.produced_types),
            ));
        }
    }

    // Stage 4: cardinality on non-list fields.
    let mut fan_in: FxHashMap<(&NodeId, &str), usize> = FxHashMap::default();
    for edge in &graph.edges {
        *fan_in
            .entry((&edge.target, edge.target_field.as_str()))
            .or_insert(0) += 1;
    }
    for node in &graph.nodes {
        let Some(template) = resolved.get(&node.id) else {
            continue;
        };
        for field in &template.fields {
            let count = fan_in
                .get(&(&node.id, field.name.as_str()))
                .copied()
                .unwrap_or(0);
            if count > 1 && !field.list {
                violations.push(Violation::new(
                    ViolationKind::Cardinality,
                    &node.id,
                    format!(
                        "field {} is not a list but has {count} incoming edges",
                        field.name
                    ),
                ));
            }
        }
    }

    // Stage 5: required fields need a literal or an edge.
    for node in &graph.nodes {
        let Some(template) = resolved.get(&node.id) else {
            continue;
        };
        for field in &template.fields {
            if !field.required {
                continue;
            }
            let has_edge = fan_in
                .get(&(&node.id, field.name.as_str()))
                .is_some_and(|c| *c > 0);
            let has_literal =
                node.field_values.contains_key(&field.name) || field.value.is_some();
            if !has_edge && !has_literal {
                violations.push(Violation::new(
                    ViolationKind::MissingRequired,
                    &node.id,
                    format!("required field {} has no value and no incoming edge", field.name),
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(GraphValidationError { violations })
    }
}
