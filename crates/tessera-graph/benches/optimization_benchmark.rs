// Performance benchmarks for the transpose rewrites
//
// Run with: cargo bench --package tessera-graph

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tessera_core::{DataType, Graph, UnaryKind};
use tessera_graph::{OptimizationLevel, OptimizationPass, Optimizer, TransposeRewritePass};
use tessera_providers::CpuRuntime;

// Graph creation helpers

fn create_transpose_chain(layers: usize) -> Graph {
    let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
    let mut x = graph.add_tensor(vec![64, 64], DataType::F32);

    for _ in 0..layers {
        let w = graph.add_tensor(vec![64, 64], DataType::F32);
        let t = graph.transpose(x, vec![1, 0]).unwrap();
        let xt = graph.output_of(t).unwrap();
        let mm = graph.matmul(xt, w, false, false).unwrap();
        let y = graph.output_of(mm).unwrap();
        let t1 = graph.transpose(y, vec![1, 0]).unwrap();
        let y1 = graph.output_of(t1).unwrap();
        let t2 = graph.transpose(y1, vec![1, 0]).unwrap();
        x = graph.output_of(t2).unwrap();
    }
    graph.unary(UnaryKind::Relu, x).unwrap();
    graph
}

fn create_plain_chain(size: usize) -> Graph {
    let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
    let mut x = graph.add_tensor(vec![64, 64], DataType::F32);
    for _ in 0..size {
        let op = graph.unary(UnaryKind::Gelu, x).unwrap();
        x = graph.output_of(op).unwrap();
    }
    graph
}

fn bench_transpose_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose_rewrite");

    for layers in [10, 50, 200].iter() {
        group.bench_with_input(
            BenchmarkId::new("fusible", layers),
            layers,
            |bencher, &layers| {
                bencher.iter_with_setup(
                    || create_transpose_chain(layers),
                    |mut graph| {
                        let pass = TransposeRewritePass::default();
                        black_box(pass.run(&mut graph).unwrap())
                    },
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("nothing_to_do", layers),
            layers,
            |bencher, &layers| {
                bencher.iter_with_setup(
                    || create_plain_chain(layers * 4),
                    |mut graph| {
                        let pass = TransposeRewritePass::default();
                        black_box(pass.run(&mut graph).unwrap())
                    },
                );
            },
        );
    }

    group.finish();
}

fn bench_optimization_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimization_levels");

    for level in [OptimizationLevel::O0, OptimizationLevel::O1].iter() {
        group.bench_with_input(
            BenchmarkId::new("level", format!("{:?}", level)),
            level,
            |bencher, &level| {
                let optimizer = Optimizer::new(level);
                bencher.iter_with_setup(
                    || create_transpose_chain(50),
                    |mut graph| black_box(optimizer.optimize(&mut graph).unwrap()),
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_transpose_rewrite, bench_optimization_levels);
criterion_main!(benches);
