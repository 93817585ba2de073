//! Component templates: the immutable blueprints nodes are instantiated from.
//!
//! A [`ComponentTemplate`] describes one kind of component: its configurable
//! fields ([`FieldSpec`]), its declared outputs ([`OutputSpec`]), the type
//! tags those outputs may satisfy, and whether its outputs route
//! conditionally ([`Routing`]). Templates are loaded once at startup,
//! registered in a [`crate::registry::TemplateRegistry`], and shared
//! read-only for the life of the process.
//!
//! Connection compatibility is purely declarative: an output can feed a
//! field exactly when the output's `produced_types` intersect the field's
//! `input_types`. Nothing here executes; runtime behavior lives behind
//! [`crate::component::ComponentBody`].
//!
//! # Examples
//!
//! ```rust
//! use wireflow::templates::{ComponentTemplate, FieldSpec, OutputSpec};
//!
//! let uppercase = ComponentTemplate::builder("uppercase", "Uppercase")
//!     .field(
//!         FieldSpec::new("text", "str")
//!             .input_types(["str"])
//!             .required(),
//!     )
//!     .output(OutputSpec::new("result", ["str"]))
//!     .build();
//!
//! assert_eq!(uppercase.field_order(), vec!["text"]);
//! assert!(uppercase.field("text").is_some());
//! ```

use rustc_hash::FxHashMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::types::{TemplateId, TypeTag};

/// One configurable/connectable parameter of a component.
///
/// A field is satisfied either by a literal value (authored on the node, or
/// falling back to the template default) or by incoming edges. Fields with
/// an empty `input_types` set are not connectable at all and only ever carry
/// literals.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FieldSpec {
    /// Unique within the template.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Default literal, used when a node supplies no value and no edge.
    ///
    /// Never serialized for `password` fields.
    #[serde(default)]
    pub value: Option<Value>,
    /// Primitive tag for the literal form: `str`, `int`, `bool`, `float`, ...
    pub field_type: TypeTag,
    /// Output-type tags this field accepts from an incoming edge.
    /// Empty means the field is not connectable.
    #[serde(default)]
    pub input_types: Vec<TypeTag>,
    #[serde(default)]
    pub required: bool,
    /// Hidden unless the caller expands the advanced section.
    #[serde(default)]
    pub advanced: bool,
    /// Accepts a sequence of values/connections rather than one (fan-in).
    #[serde(default)]
    pub list: bool,
    /// The value must never be echoed back to callers.
    #[serde(default)]
    pub password: bool,
    /// Visibility is recomputed from [`VisibilityRule`]s when a governing
    /// field's value changes. Non-dynamic fields exist for the lifetime of
    /// any node of the template.
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub readonly: bool,
    /// Current visibility for non-dynamic fields.
    #[serde(default = "default_show")]
    pub show: bool,
}

fn default_show() -> bool {
    true
}

impl FieldSpec {
    /// Start a field with the given name and literal type tag.
    ///
    /// Defaults: visible, optional, not connectable, scalar, no default
    /// value, display name equal to the field name.
    pub fn new(name: impl Into<String>, field_type: impl Into<TypeTag>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            value: None,
            field_type: field_type.into(),
            input_types: Vec::new(),
            required: false,
            advanced: false,
            list: false,
            password: false,
            dynamic: false,
            readonly: false,
            show: true,
        }
    }

    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Declare which output-type tags may connect into this field.
    #[must_use]
    pub fn input_types<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeTag>,
    {
        self.input_types = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    #[must_use]
    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    #[must_use]
    pub fn password(mut self) -> Self {
        self.password = true;
        self
    }

    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.show = false;
        self
    }

    /// Whether an incoming edge may target this field at all.
    #[must_use]
    pub fn connectable(&self) -> bool {
        !self.input_types.is_empty()
    }

    /// Whether this field accepts the given output-type tag.
    #[must_use]
    pub fn accepts(&self, tag: &TypeTag) -> bool {
        self.input_types.contains(tag)
    }
}

// Password fields must never leak their default through serialization, so
// `value` is emitted as null whenever `password` is set.
impl Serialize for FieldSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FieldSpec", 12)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("display_name", &self.display_name)?;
        if self.password {
            s.serialize_field("value", &Option::<Value>::None)?;
        } else {
            s.serialize_field("value", &self.value)?;
        }
        s.serialize_field("field_type", &self.field_type)?;
        s.serialize_field("input_types", &self.input_types)?;
        s.serialize_field("required", &self.required)?;
        s.serialize_field("advanced", &self.advanced)?;
        s.serialize_field("list", &self.list)?;
        s.serialize_field("password", &self.password)?;
        s.serialize_field("dynamic", &self.dynamic)?;
        s.serialize_field("readonly", &self.readonly)?;
        s.serialize_field("show", &self.show)?;
        s.end()
    }
}

/// A declared output port: a name plus the type tags its values satisfy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub produced_types: Vec<TypeTag>,
}

impl OutputSpec {
    pub fn new<I, T>(name: impl Into<String>, produced_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeTag>,
    {
        Self {
            name: name.into(),
            produced_types: produced_types.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn produces(&self, tag: &TypeTag) -> bool {
        self.produced_types.contains(tag)
    }

    /// Connection compatibility: the declared sets must intersect.
    #[must_use]
    pub fn can_feed(&self, field: &FieldSpec) -> bool {
        self.produced_types.iter().any(|t| field.accepts(t))
    }
}

/// How a template's outputs activate at runtime.
///
/// `Static` templates deliver on every declared output. `Conditional`
/// templates activate exactly one output per execution, chosen by the
/// component body's own result; edges leaving the inactive outputs are not
/// traversed. Activation is a runtime tag, never a graph rewrite, so the
/// compiled plan is identical for every outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    #[default]
    Static,
    Conditional,
}

/// Data-driven visibility for `dynamic` fields.
///
/// The `field` is visible exactly when the governing field's current value
/// equals one of `equals`. Keeping the rule as data keeps the template
/// immutable: visibility is recomputed, never stored back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    /// The dynamic field this rule governs.
    pub field: String,
    /// The field whose value controls visibility.
    pub governed_by: String,
    /// Values of the governing field under which `field` is shown.
    pub equals: Vec<Value>,
}

/// Immutable blueprint for one kind of component.
///
/// Field declaration order is significant: it is the deterministic rendering
/// order and the iteration order everywhere fields are resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    pub id: TemplateId,
    pub display_name: String,
    /// Type tags this component's outputs may satisfy, in aggregate.
    #[serde(default)]
    pub base_classes: Vec<TypeTag>,
    /// Fields in declaration order. Names must be unique within a template.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Declared outputs in declaration order.
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub routing: Routing,
    /// Nodes of this template default to frozen (result reuse) when true.
    #[serde(default)]
    pub frozen_default: bool,
    /// The component may also be exposed as a callable tool. Orthogonal to
    /// graph execution; carried for callers, never consulted by the engine.
    #[serde(default)]
    pub tool_mode: bool,
    #[serde(default)]
    pub visibility_rules: Vec<VisibilityRule>,
}

impl ComponentTemplate {
    /// Start a template with the given id and display name.
    pub fn builder(id: impl Into<TemplateId>, display_name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder {
            template: ComponentTemplate {
                id: id.into(),
                display_name: display_name.into(),
                base_classes: Vec::new(),
                fields: Vec::new(),
                outputs: Vec::new(),
                routing: Routing::Static,
                frozen_default: false,
                tool_mode: false,
                visibility_rules: Vec::new(),
            },
        }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up an output by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Field names in declaration order.
    #[must_use]
    pub fn field_order(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The implicit output used when an edge omits the port name: defined
    /// only for single-output templates.
    #[must_use]
    pub fn default_output(&self) -> Option<&OutputSpec> {
        match self.outputs.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Whether this template routes conditionally (one active output per run).
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.routing == Routing::Conditional
    }

    /// Compute the currently visible field names, in declaration order.
    ///
    /// Pure: reads the template and the supplied values, mutates nothing.
    /// Non-dynamic fields follow their `show` flag. Dynamic fields follow
    /// their [`VisibilityRule`], consulting the governing field's current
    /// value and falling back to that field's template default; a dynamic
    /// field without a rule behaves like a non-dynamic one.
    #[must_use]
    pub fn visible_fields(&self, values: &FxHashMap<String, Value>) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| {
                if !f.dynamic {
                    return f.show;
                }
                match self.visibility_rules.iter().find(|r| r.field == f.name) {
                    Some(rule) => {
                        let governing = values
                            .get(&rule.governed_by)
                            .or_else(|| self.field(&rule.governed_by).and_then(|g| g.value.as_ref()));
                        governing.is_some_and(|v| rule.equals.contains(v))
                    }
                    None => f.show,
                }
            })
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Fluent constructor for [`ComponentTemplate`].
///
/// Consuming builder in the usual style: each method takes and returns
/// `self`, finish with [`build`](Self::build).
#[derive(Debug)]
pub struct TemplateBuilder {
    template: ComponentTemplate,
}

impl TemplateBuilder {
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.template.fields.push(field);
        self
    }

    #[must_use]
    pub fn output(mut self, output: OutputSpec) -> Self {
        self.template.outputs.push(output);
        self
    }

    #[must_use]
    pub fn base_classes<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeTag>,
    {
        self.template.base_classes = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Declare conditional routing: exactly one output active per run.
    #[must_use]
    pub fn conditional(mut self) -> Self {
        self.template.routing = Routing::Conditional;
        self
    }

    #[must_use]
    pub fn frozen_default(mut self) -> Self {
        self.template.frozen_default = true;
        self
    }

    #[must_use]
    pub fn tool_mode(mut self) -> Self {
        self.template.tool_mode = true;
        self
    }

    #[must_use]
    pub fn visibility_rule(mut self, rule: VisibilityRule) -> Self {
        self.template.visibility_rules.push(rule);
        self
    }

    #[must_use]
    pub fn build(self) -> ComponentTemplate {
        self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn llm_template() -> ComponentTemplate {
        ComponentTemplate::builder("llm", "Language Model")
            .field(
                FieldSpec::new("prompt", "str")
                    .input_types(["str", "Message"])
                    .required(),
            )
            .field(FieldSpec::new("api_key", "str").password().advanced())
            .field(FieldSpec::new("provider", "str").default_value(json!("openai")))
            .field(
                FieldSpec::new("organization", "str")
                    .dynamic()
                    .hidden(),
            )
            .output(OutputSpec::new("response", ["Message", "str"]))
            .visibility_rule(VisibilityRule {
                field: "organization".into(),
                governed_by: "provider".into(),
                equals: vec![json!("openai")],
            })
            .build()
    }

    #[test]
    fn compatibility_is_set_intersection() {
        let out = OutputSpec::new("response", ["Message"]);
        let field = FieldSpec::new("prompt", "str").input_types(["str", "Message"]);
        assert!(out.can_feed(&field));

        let disjoint = FieldSpec::new("count", "int").input_types(["int"]);
        assert!(!out.can_feed(&disjoint));

        let literal_only = FieldSpec::new("name", "str");
        assert!(!literal_only.connectable());
        assert!(!out.can_feed(&literal_only));
    }

    #[test]
    fn visible_fields_follows_governing_value() {
        let template = llm_template();

        // Default provider is openai, so the rule shows the dynamic field.
        let visible = template.visible_fields(&FxHashMap::default());
        assert!(visible.contains(&"organization"));

        let mut values = FxHashMap::default();
        values.insert("provider".to_string(), json!("anthropic"));
        let visible = template.visible_fields(&values);
        assert!(!visible.contains(&"organization"));
        // Non-dynamic fields are unaffected by value changes.
        assert!(visible.contains(&"prompt"));
    }

    #[test]
    fn visible_fields_preserves_declaration_order() {
        let template = llm_template();
        let visible = template.visible_fields(&FxHashMap::default());
        assert_eq!(visible, vec!["prompt", "api_key", "provider", "organization"]);
    }

    #[test]
    fn password_default_is_redacted_on_serialize() {
        let field = FieldSpec::new("api_key", "str")
            .password()
            .default_value(json!("s3cret"));
        let serialized = serde_json::to_value(&field).expect("field serializes");
        assert_eq!(serialized["value"], Value::Null);
        assert_eq!(serialized["password"], json!(true));

        // Round-tripping keeps the redaction: the secret is gone for good.
        let reparsed: FieldSpec =
            serde_json::from_value(serialized).expect("field deserializes");
        assert_eq!(reparsed.value, None);
    }

    #[test]
    fn default_output_requires_single_output() {
        let single = llm_template();
        assert_eq!(single.default_output().map(|o| o.name.as_str()), Some("response"));

        let router = ComponentTemplate::builder("router", "Router")
            .output(OutputSpec::new("left", ["str"]))
            .output(OutputSpec::new("right", ["str"]))
            .conditional()
            .build();
        assert!(router.default_output().is_none());
        assert!(router.is_conditional());
    }
}
