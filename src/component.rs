//! Component execution surface: the [`ComponentBody`] trait, its inputs and
//! outputs, and the error taxonomy for a single node invocation.
//!
//! A template describes a component's ports; a body is the code behind them.
//! The executor resolves a node's inputs (literals plus upstream results),
//! hands them to the body with a [`BodyContext`], and interprets the returned
//! [`BodyOutput`]: a plain value, a routed value selecting one conditional
//! branch, or a stream of partial chunks.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::json;
//! use wireflow::component::{
//!     BodyContext, BodyOutput, ComponentBody, ComponentExecutionError, ResolvedInputs,
//! };
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
//!         let text = inputs.get_str("input")?;
//!         Ok(BodyOutput::Value(json!(text.to_uppercase())))
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::{NodeId, TemplateId};

// ============================================================================
// Core Trait
// ============================================================================

/// Executable behavior behind a component template.
///
/// Bodies are stateless: every invocation receives its full input set, and
/// anything worth keeping must travel out through the returned output. A
/// body registered for a conditional template must return
/// [`BodyOutput::Routed`]; any other template must not.
///
/// Long-running bodies should watch `ctx.cancellation` and bail out with
/// [`ComponentExecutionError::Cancelled`] when it fires.
#[async_trait]
pub trait ComponentBody: Send + Sync {
    /// Execute once with fully resolved inputs.
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Per-invocation context handed to a body.
#[derive(Clone, Debug)]
pub struct BodyContext {
    /// Identifier of the run this invocation belongs to.
    pub run_id: Uuid,
    /// Identifier of the node being executed.
    pub node_id: NodeId,
    /// Fires when the run is cancelled; in-flight bodies should stop at the
    /// next natural suspension point.
    pub cancellation: CancellationToken,
}

impl BodyContext {
    /// True once the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

// ============================================================================
// Resolved Inputs
// ============================================================================

/// A node's effective input set: authored literals overlaid with upstream
/// results, fan-in already collapsed into arrays.
///
/// Accessors come in two flavors: [`get`](Self::get) for optional fields and
/// the typed `get_*` family, which reports a missing field as
/// [`ComponentExecutionError::MissingInput`] and a wrong shape as
/// [`ComponentExecutionError::InvalidInput`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedInputs {
    values: FxHashMap<String, Value>,
}

impl ResolvedInputs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(values: FxHashMap<String, Value>) -> Self {
        Self { values }
    }

    /// Builder-style insert, mainly for tests and ad-hoc invocations.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw field map, used for cache-key hashing.
    #[must_use]
    pub fn as_map(&self) -> &FxHashMap<String, Value> {
        &self.values
    }

    /// The field's value, or `MissingInput` if absent.
    pub fn require(&self, field: &str) -> Result<&Value, ComponentExecutionError> {
        self.values
            .get(field)
            .ok_or_else(|| ComponentExecutionError::MissingInput {
                field: field.to_string(),
            })
    }

    pub fn get_str(&self, field: &str) -> Result<&str, ComponentExecutionError> {
        let value = self.require(field)?;
        value
            .as_str()
            .ok_or_else(|| invalid(field, "a string", value))
    }

    pub fn get_i64(&self, field: &str) -> Result<i64, ComponentExecutionError> {
        let value = self.require(field)?;
        value
            .as_i64()
            .ok_or_else(|| invalid(field, "an integer", value))
    }

    pub fn get_f64(&self, field: &str) -> Result<f64, ComponentExecutionError> {
        let value = self.require(field)?;
        value
            .as_f64()
            .ok_or_else(|| invalid(field, "a number", value))
    }

    pub fn get_bool(&self, field: &str) -> Result<bool, ComponentExecutionError> {
        let value = self.require(field)?;
        value
            .as_bool()
            .ok_or_else(|| invalid(field, "a boolean", value))
    }

    pub fn get_array(&self, field: &str) -> Result<&Vec<Value>, ComponentExecutionError> {
        let value = self.require(field)?;
        value
            .as_array()
            .ok_or_else(|| invalid(field, "an array", value))
    }
}

impl From<FxHashMap<String, Value>> for ResolvedInputs {
    fn from(values: FxHashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for ResolvedInputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn invalid(field: &str, expected: &str, got: &Value) -> ComponentExecutionError {
    ComponentExecutionError::InvalidInput {
        field: field.to_string(),
        message: format!("expected {expected}, got {}", json_type_name(got)),
    }
}

/// Human-readable JSON type name for error messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// One element of a streaming output.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    /// An incremental fragment, surfaced to sinks as a partial.
    Chunk(Value),
    /// The consolidated value; must be the last item of the stream.
    Final(Value),
}

/// A lazy, finite sequence of [`StreamItem`]s ending in a `Final`.
pub type BodyStream = BoxStream<'static, Result<StreamItem, ComponentExecutionError>>;

/// What a body invocation produced.
pub enum BodyOutput {
    /// A single value, published on the template's sole output.
    Value(Value),
    /// A value published on one named output, deactivating the template's
    /// other conditional branches for this run.
    Routed { output: String, value: Value },
    /// A chunked value, drained by the executor as it is produced.
    Stream(BodyStream),
}

impl BodyOutput {
    /// Wrap a routed value for a conditional template.
    #[must_use]
    pub fn routed(output: impl Into<String>, value: Value) -> Self {
        Self::Routed {
            output: output.into(),
            value,
        }
    }

    /// Box a stream of items into a [`BodyOutput::Stream`].
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamItem, ComponentExecutionError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }
}

impl From<Value> for BodyOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for BodyOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Routed { output, value } => f
                .debug_struct("Routed")
                .field("output", output)
                .field("value", value)
                .finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ============================================================================
// Body Registry
// ============================================================================

/// Maps template ids to their executable bodies.
///
/// Kept separate from [`TemplateRegistry`](crate::registry::TemplateRegistry)
/// so the declarative catalog can be shared with frontends that never
/// execute anything.
#[derive(Clone, Default)]
pub struct BodyRegistry {
    bodies: FxHashMap<TemplateId, Arc<dyn ComponentBody>>,
}

impl BodyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` for `template`, replacing any previous binding.
    pub fn register(
        &mut self,
        template: impl Into<TemplateId>,
        body: impl ComponentBody + 'static,
    ) {
        self.bodies.insert(template.into(), Arc::new(body));
    }

    /// Register an already shared body.
    pub fn register_arc(&mut self, template: impl Into<TemplateId>, body: Arc<dyn ComponentBody>) {
        self.bodies.insert(template.into(), body);
    }

    #[must_use]
    pub fn get(&self, template: &TemplateId) -> Option<Arc<dyn ComponentBody>> {
        self.bodies.get(template).cloned()
    }

    #[must_use]
    pub fn contains(&self, template: &TemplateId) -> bool {
        self.bodies.contains_key(template)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl fmt::Debug for BodyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.bodies.keys().map(TemplateId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("BodyRegistry").field("templates", &ids).finish()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during a single body invocation.
///
/// A node failing with any of these is isolated: the run keeps going and
/// only the failed node's dependents are skipped.
#[derive(Debug, Error, Diagnostic)]
pub enum ComponentExecutionError {
    /// A field the body needs was neither wired nor given a literal.
    #[error("missing input field: {field}")]
    #[diagnostic(
        code(wireflow::component::missing_input),
        help("Connect an edge into the field or set a literal value on the node.")
    )]
    MissingInput { field: String },

    /// A field was present but had the wrong shape.
    #[error("invalid input field {field}: {message}")]
    #[diagnostic(code(wireflow::component::invalid_input))]
    InvalidInput { field: String, message: String },

    /// The body itself failed.
    #[error("component failed: {message}")]
    #[diagnostic(code(wireflow::component::failed))]
    Failed { message: String },

    /// JSON serialization/deserialization error inside a body.
    #[error(transparent)]
    #[diagnostic(code(wireflow::component::serde_json))]
    Serde(#[from] serde_json::Error),

    /// A streaming body ended without emitting its `Final` item.
    #[error("stream ended without a final value")]
    #[diagnostic(
        code(wireflow::component::stream_truncated),
        help("A body stream must yield StreamItem::Final as its last item.")
    )]
    StreamTruncated,

    /// A body's output shape disagreed with its template's routing contract.
    #[error("route violation: {message}")]
    #[diagnostic(
        code(wireflow::component::route_violation),
        help("Conditional templates must return BodyOutput::Routed naming one declared output; others must not.")
    )]
    RouteViolation { message: String },

    /// The body observed cancellation and stopped early.
    #[error("execution cancelled")]
    #[diagnostic(code(wireflow::component::cancelled))]
    Cancelled,

    /// The body panicked; the panic was contained by the worker.
    #[error("component panicked: {message}")]
    #[diagnostic(code(wireflow::component::panicked))]
    Panicked { message: String },
}

impl ComponentExecutionError {
    /// Shorthand for a generic body failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Shorthand for a routing contract breach.
    #[must_use]
    pub fn route_violation(message: impl Into<String>) -> Self {
        Self::RouteViolation {
            message: message.into(),
        }
    }
}
