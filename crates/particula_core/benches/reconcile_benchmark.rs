//! # Reconcile Benchmark
//!
//! Cost of reconciling a registry against a manifest: the no-op case
//! (shape already matches) and a full restore from a checkpoint stream.
//!
//! Run with: cargo bench --package particula_core --bench reconcile_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use particula_core::{
    codec, HeadlessFactory, InstancerRegistry, Manifest, ManifestEntry, SyncEngine,
};

fn manifest(instancers: u32, count: usize) -> Manifest {
    (0..instancers)
        .map(|id| ManifestEntry::new(id, id % 4, count))
        .collect()
}

fn bench_noop_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_noop");

    for instancers in [16, 256, 1_024] {
        let target = manifest(instancers, 100);
        let mut engine = SyncEngine::default();
        let mut registry = InstancerRegistry::new();
        let mut factory = HeadlessFactory::new();
        engine.reconcile(&mut registry, &mut factory, &target).unwrap();

        group.bench_function(BenchmarkId::from_parameter(instancers), |b| {
            b.iter(|| black_box(engine.reconcile(&mut registry, &mut factory, &target)));
        });
    }

    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let mut engine = SyncEngine::default();
    let mut source = InstancerRegistry::new();
    let mut factory = HeadlessFactory::new();
    engine
        .reconcile(&mut source, &mut factory, &manifest(32, 2_000))
        .unwrap();
    let stream = codec::encode_registry(&source);

    c.bench_function("restore_32x2000_into_empty", |b| {
        b.iter(|| {
            let mut registry = InstancerRegistry::new();
            let mut factory = HeadlessFactory::new();
            black_box(engine.restore(&stream, &mut registry, &mut factory)).unwrap();
        });
    });
}

criterion_group!(benches, bench_noop_reconcile, bench_restore);
criterion_main!(benches);
