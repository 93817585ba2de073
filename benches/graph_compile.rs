//! Benchmarks for graph validation and compilation.
//!
//! Measures plan construction over the shapes that dominate real pipelines:
//! linear chains, wide fan-out, and layered DAGs with fan-in.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use wireflow::graphs::{Graph, Node, compile, validate};
use wireflow::registry::TemplateRegistry;
use wireflow::templates::{ComponentTemplate, FieldSpec, OutputSpec};
use wireflow::types::NodeId;

/// One pass-through template with a list input so any fan-in is legal.
fn bench_registry() -> TemplateRegistry {
    TemplateRegistry::with_templates([
        ComponentTemplate::builder("relay", "Relay")
            .field(FieldSpec::new("input", "str").input_types(["Text"]).list())
            .output(OutputSpec::new("text", ["Text"]))
            .build(),
    ])
    .expect("relay template registers")
}

/// Build a linear chain: n0 -> n1 -> ... -> n{count-1}.
fn build_linear_graph(count: usize) -> Graph {
    let mut builder = Graph::builder();
    for i in 0..count {
        builder = builder.node(Node::new(format!("n{i}"), "relay"));
    }
    for i in 1..count {
        builder = builder.edge(format!("n{}", i - 1), "text", format!("n{i}"), "input");
    }
    builder.build()
}

/// Build a fan-out graph: one source feeding `width` workers.
fn build_fanout_graph(width: usize) -> Graph {
    let mut builder = Graph::builder().node(Node::new("source", "relay"));
    for i in 0..width {
        builder = builder
            .node(Node::new(format!("worker_{i}"), "relay"))
            .edge("source", "text", format!("worker_{i}"), "input");
    }
    builder.build()
}

/// Build a layered DAG where every node feeds two nodes of the next layer,
/// so each interior node also has fan-in.
fn build_layered_graph(depth: usize, width: usize) -> Graph {
    let mut builder = Graph::builder();
    for layer in 0..depth {
        for i in 0..width {
            builder = builder.node(Node::new(format!("L{layer}_N{i}"), "relay"));
        }
    }
    for layer in 1..depth {
        for i in 0..width {
            let target = format!("L{layer}_N{i}");
            builder = builder
                .edge(
                    format!("L{}_N{i}", layer - 1),
                    "text",
                    target.clone(),
                    "input",
                )
                .edge(
                    format!("L{}_N{}", layer - 1, (i + 1) % width),
                    "text",
                    target,
                    "input",
                );
        }
    }
    builder.build()
}

fn bench_graph_compile(c: &mut Criterion) {
    let registry = bench_registry();
    let mut group = c.benchmark_group("graph_compile");

    for size in [10, 50, 100, 200] {
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &size| {
            b.iter(|| {
                let graph = build_linear_graph(size);
                compile(&graph, &registry).expect("compilation should succeed")
            });
        });
    }

    for width in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("fanout", width), &width, |b, &width| {
            b.iter(|| {
                let graph = build_fanout_graph(width);
                compile(&graph, &registry).expect("compilation should succeed")
            });
        });
    }

    for (depth, width) in [(5, 10), (10, 10), (5, 20)] {
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{depth}x{width}")),
            &(depth, width),
            |b, &(depth, width)| {
                b.iter(|| {
                    let graph = build_layered_graph(depth, width);
                    compile(&graph, &registry).expect("compilation should succeed")
                });
            },
        );
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let registry = bench_registry();
    let mut group = c.benchmark_group("graph_validate");

    for size in [10, 50, 100, 200] {
        let graph = build_linear_graph(size);
        group.bench_with_input(BenchmarkId::new("linear", size), &graph, |b, graph| {
            b.iter(|| validate(graph, &registry).expect("valid graph"));
        });
    }

    for (depth, width) in [(5, 10), (10, 10), (5, 20)] {
        let graph = build_layered_graph(depth, width);
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{depth}x{width}")),
            &graph,
            |b, graph| {
                b.iter(|| validate(graph, &registry).expect("valid graph"));
            },
        );
    }

    group.finish();
}

fn bench_plan_restriction(c: &mut Criterion) {
    let registry = bench_registry();
    let mut group = c.benchmark_group("plan_restriction");

    for (depth, width) in [(5, 10), (10, 10), (5, 20)] {
        let graph = build_layered_graph(depth, width);
        let plan = compile(&graph, &registry).expect("compilation should succeed");
        let target = NodeId::from(format!("L{}_N0", depth - 1));
        group.bench_with_input(
            BenchmarkId::new("deep_target", format!("{depth}x{width}")),
            &(plan, target),
            |b, (plan, target)| {
                b.iter(|| plan.restricted_to(target).expect("target is planned"));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_graph_compile,
    bench_validation,
    bench_plan_restriction,
);

criterion_main!(benches);
