//! Invalidation Benchmarks
//!
//! Measures propagation cost for wide fan-out and deep chains.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use depval_core::graph::DependencyRegistry;

fn fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for width in [16usize, 256, 4096] {
        let registry = DependencyRegistry::new();
        let source = registry.create();
        let dependents: Vec<_> = (0..width)
            .map(|_| {
                let dependent = registry.create();
                dependent.register_dependency(&source).unwrap();
                dependent
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| source.on_change());
        });
        black_box(dependents);
    }
    group.finish();
}

fn chain(c: &mut Criterion) {
    let registry = DependencyRegistry::new();
    let nodes: Vec<_> = (0..128).map(|_| registry.create()).collect();
    for pair in nodes.windows(2) {
        pair[1].register_dependency(&pair[0]).unwrap();
    }

    c.bench_function("chain_128", |b| b.iter(|| nodes[0].on_change()));
}

fn register(c: &mut Criterion) {
    c.bench_function("register_dependency", |b| {
        let registry = DependencyRegistry::new();
        let source = registry.create();
        b.iter(|| {
            let dependent = registry.create();
            dependent.register_dependency(&source).unwrap();
            registry.purge_expired();
        });
    });
}

criterion_group!(benches, fan_out, chain, register);
criterion_main!(benches);
