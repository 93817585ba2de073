//! Template catalog and graph factories shared across integration tests.

#![allow(dead_code)]

use serde_json::json;
use wireflow::component::BodyRegistry;
use wireflow::graphs::{Graph, Node};
use wireflow::registry::TemplateRegistry;
use wireflow::templates::{ComponentTemplate, FieldSpec, OutputSpec};
use wireflow::types::TypeTag;

use super::bodies::{ConcatBody, LiteralBody, RouterBody, UppercaseBody};

pub fn text() -> TypeTag {
    TypeTag::new("Text")
}

/// Every template the integration suites instantiate.
pub fn fixture_registry() -> TemplateRegistry {
    let templates = [
        ComponentTemplate::builder("literal", "Literal")
            .field(FieldSpec::new("value", "str").required())
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("uppercase", "Uppercase")
            .field(
                FieldSpec::new("input", "str")
                    .input_types([text()])
                    .required(),
            )
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("concat", "Concat")
            .field(
                FieldSpec::new("parts", "str")
                    .input_types([text()])
                    .list()
                    .required(),
            )
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("router", "Router")
            .field(
                FieldSpec::new("input", "str")
                    .input_types([text()])
                    .required(),
            )
            .field(FieldSpec::new("expects", "str").default_value(json!("")))
            .output(OutputSpec::new("then", [text()]))
            .output(OutputSpec::new("otherwise", [text()]))
            .conditional()
            .build(),
        ComponentTemplate::builder("streamer", "Streamer")
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("failing", "Failing")
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("panicking", "Panicking")
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("counting", "Counting")
            .field(FieldSpec::new("value", "str").required())
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("memoized", "Memoized Counting")
            .field(FieldSpec::new("value", "str").required())
            .output(OutputSpec::new("text", [text()]))
            .frozen_default()
            .build(),
        ComponentTemplate::builder("slow", "Slow")
            .field(FieldSpec::new("input", "str").input_types([text()]))
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("gauge", "Gauge")
            .output(OutputSpec::new("text", [text()]))
            .build(),
        ComponentTemplate::builder("barrier", "Barrier")
            .output(OutputSpec::new("text", [text()]))
            .build(),
    ];
    TemplateRegistry::with_templates(templates).expect("fixture templates are unique")
}

/// Bodies for the stateless data-path templates. Tests layer their stateful
/// bodies (counters, streams, delays) on top of a clone.
pub fn basic_bodies() -> BodyRegistry {
    let mut bodies = BodyRegistry::new();
    bodies.register("literal", LiteralBody);
    bodies.register("uppercase", UppercaseBody);
    bodies.register("concat", ConcatBody);
    bodies.register("router", RouterBody);
    bodies
}

/// `lit("hi") -> up`, the minimal end-to-end pipeline.
pub fn chain_graph() -> Graph {
    Graph::builder()
        .node(Node::new("lit", "literal").with_value("value", json!("hi")))
        .node(Node::new("up", "uppercase"))
        .edge("lit", "text", "up", "input")
        .build()
}

/// Two literals fanned into one `concat` list field, edges declared
/// `l1` first.
pub fn fan_in_graph() -> Graph {
    Graph::builder()
        .node(Node::new("l1", "literal").with_value("value", json!("hi")))
        .node(Node::new("l2", "literal").with_value("value", json!("ho")))
        .node(Node::new("cat", "concat"))
        .edge("l1", "text", "cat", "parts")
        .edge("l2", "text", "cat", "parts")
        .build()
}

/// A literal feeding a conditional router with one node on the `then`
/// branch and a two-node chain on the `otherwise` branch.
pub fn routed_graph(value: &str, expects: &str) -> Graph {
    Graph::builder()
        .node(Node::new("lit", "literal").with_value("value", json!(value)))
        .node(Node::new("r", "router").with_value("expects", json!(expects)))
        .node(Node::new("then_node", "uppercase"))
        .node(Node::new("other_node", "uppercase"))
        .node(Node::new("after_other", "uppercase"))
        .edge("lit", "text", "r", "input")
        .edge("r", "then", "then_node", "input")
        .edge("r", "otherwise", "other_node", "input")
        .edge("other_node", "text", "after_other", "input")
        .build()
}
