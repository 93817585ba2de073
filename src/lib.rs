//! # Wireflow: Typed Component-Graph Execution Engine
//!
//! Wireflow executes directed acyclic graphs of typed components. Components
//! are declared once as [`templates`](crate::templates) with named fields and
//! outputs, wired into a [`graph`](crate::graphs) whose edges connect output
//! ports to input fields, compiled into a deterministic
//! [`ExecutionPlan`](crate::graphs::ExecutionPlan), and run concurrently by
//! the [`Executor`](crate::runtimes::Executor).
//!
//! ## Core Concepts
//!
//! - **Templates**: Immutable blueprints describing fields, outputs, and the
//!   type tags that make connections valid
//! - **Graph**: Author-facing model of nodes and port-to-field edges, with
//!   structural validation before anything runs
//! - **Plan**: Validated, topologically ordered arena the scheduler executes
//! - **Bodies**: The async code behind each template, invoked with fully
//!   resolved inputs
//! - **Events**: Ordered per-node observations (partials, finals, failures,
//!   skips) delivered to sinks and a broadcast hub
//!
//! ## Quick Start
//!
//! ```
//! use async_trait::async_trait;
//! use serde_json::json;
//! use wireflow::component::{
//!     BodyContext, BodyOutput, BodyRegistry, ComponentBody, ComponentExecutionError,
//!     ResolvedInputs,
//! };
//! use wireflow::events::MemorySink;
//! use wireflow::graphs::{Graph, Node};
//! use wireflow::registry::TemplateRegistry;
//! use wireflow::runtimes::{Executor, RunOptions};
//! use wireflow::templates::{ComponentTemplate, FieldSpec, OutputSpec};
//!
//! struct Literal;
//!
//! #[async_trait]
//! impl ComponentBody for Literal {
//!     async fn invoke(
//!         &self,
//!         inputs: ResolvedInputs,
//!         _ctx: BodyContext,
//!     ) -> Result<BodyOutput, ComponentExecutionError> {
//!         Ok(BodyOutput::Value(inputs.require("value")?.clone()))
//!     }
//! }
//!
//! struct Uppercase;
//!
//! #[async_trait]
//! impl ComponentBody for Uppercase {
//!     async fn invoke(
//!         &self,
//!         inputs: ResolvedInputs,
//!         _ctx: BodyContext,
//!     ) -> Result<BodyOutput, ComponentExecutionError> {
//!         Ok(BodyOutput::Value(json!(inputs.get_str("input")?.to_uppercase())))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> miette::Result<()> {
//! let registry = TemplateRegistry::with_templates([
//!     ComponentTemplate::builder("literal", "Literal")
//!         .field(FieldSpec::new("value", "str").required())
//!         .output(OutputSpec::new("text", ["Text"]))
//!         .build(),
//!     ComponentTemplate::builder("uppercase", "Uppercase")
//!         .field(FieldSpec::new("input", "str").input_types(["Text"]).required())
//!         .output(OutputSpec::new("text", ["Text"]))
//!         .build(),
//! ])
//! .expect("unique template ids");
//!
//! let mut bodies = BodyRegistry::new();
//! bodies.register("literal", Literal);
//! bodies.register("uppercase", Uppercase);
//!
//! let graph = Graph::builder()
//!     .node(Node::new("hello", "literal").with_value("value", json!("hi")))
//!     .node(Node::new("shout", "uppercase"))
//!     .edge("hello", "text", "shout", "input")
//!     .build();
//!
//! let executor = Executor::new(registry, bodies);
//! let plan = executor.compile(&graph)?;
//!
//! let sink = MemorySink::new();
//! let summary = executor
//!     .invoke(&plan, RunOptions::new().with_sink(sink.clone()))
//!     .await?;
//!
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Identifier newtypes shared across the crate
//! - [`templates`] - Component blueprints: fields, outputs, routing
//! - [`registry`] - The immutable template catalog
//! - [`graphs`] - Graph model, validation, and plan compilation
//! - [`component`] - The executable body trait and its inputs/outputs
//! - [`runtimes`] - Executor, run state, caching, and run handles
//! - [`events`] - Run events, result sinks, and the broadcast hub
//! - [`telemetry`] - Event formatting and tracing setup

pub mod component;
pub mod events;
pub mod graphs;
pub mod registry;
pub mod runtimes;
pub mod telemetry;
pub mod templates;
pub mod types;
