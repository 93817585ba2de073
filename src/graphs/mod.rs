//! Graph model, validation, and compilation into an execution plan.
//!
//! This module owns everything between "a caller wired some nodes together"
//! and "the scheduler has an ordered plan to walk": the authored
//! [`Graph`] snapshot, the staged structural/type [`validate`] pass, and
//! [`compile`], which orders the graph with Kahn's algorithm into an
//! [`ExecutionPlan`] arena.
//!
//! # Core Concepts
//!
//! - **Nodes**: instances of registered templates, with literal field values
//! - **Edges**: typed-port connections (`source.output -> target.field`)
//! - **Validation**: five ordered stages, all violations reported together
//! - **Compilation**: deterministic ordering, fatal cycle detection
//! - **Plan arena**: index-linked plan nodes, no reference cycles
//!
//! # Quick Start
//!
//! ```rust
//! use wireflow::graphs::{compile, Graph, Node};
//! use wireflow::registry::TemplateRegistry;
//! use wireflow::templates::{ComponentTemplate, FieldSpec, OutputSpec};
//!
//! let registry = TemplateRegistry::with_templates([
//!     ComponentTemplate::builder("literal", "Literal")
//!         .field(FieldSpec::new("text", "str").required())
//!         .output(OutputSpec::new("value", ["str"]))
//!         .build(),
//!     ComponentTemplate::builder("uppercase", "Uppercase")
//!         .field(FieldSpec::new("text", "str").input_types(["str"]).required())
//!         .output(OutputSpec::new("result", ["str"]))
//!         .build(),
//! ])
//! .unwrap();
//!
//! let graph = Graph::builder()
//!     .node(Node::new("n1", "literal").with_value("text", "hi".into()))
//!     .node(Node::new("n2", "uppercase"))
//!     .edge("n1", "value", "n2", "text")
//!     .build();
//!
//! let plan = compile(&graph, &registry).unwrap();
//! assert_eq!(plan.len(), 2);
//! assert!(plan.index_of(&"n1".into()) < plan.index_of(&"n2".into()));
//! ```

mod compilation;
mod model;
mod validation;


pub use compilation::{
    compile, CompileError, CyclicGraphError, ExecutionPlan, InputBinding, PlanNode,
};
pub use model::{Edge, Graph, GraphBuilder, Node};
pub use validation::{validate, GraphValidationError, Violation, ViolationKind};
