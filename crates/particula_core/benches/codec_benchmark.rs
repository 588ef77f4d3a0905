//! # Codec Benchmark
//!
//! Encode/decode throughput of the checkpoint layout.
//!
//! Run with: cargo bench --package particula_core --bench codec_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use particula_core::{codec, Frame, InstancerRegistry, ParticleBuffer};

#[allow(clippy::cast_precision_loss)]
fn make_buffer(id: u32, count: usize) -> ParticleBuffer {
    let positions: Vec<[f32; 3]> = (0..count).map(|i| [i as f32, 0.5, -(i as f32)]).collect();
    let mut buffer = ParticleBuffer::zeroed(id, 0, count);
    buffer.set_origin([1.0, 2.0, 3.0]);
    buffer.set_positions(&positions, Frame::Absolute).unwrap();
    buffer.set_velocities(&vec![[0.0, -9.8, 0.0]; count]).unwrap();
    buffer
}

fn bench_encode_instancer(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_instancer");

    for count in [1_000, 10_000, 100_000] {
        let buffer = make_buffer(0, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &buffer, |b, buffer| {
            b.iter(|| black_box(codec::encode_instancer(buffer)));
        });
    }

    group.finish();
}

fn bench_decode_into(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_instancer_into");

    for count in [1_000, 10_000, 100_000] {
        let stream = codec::encode_instancer(&make_buffer(0, count));
        let mut target = ParticleBuffer::zeroed(0, 0, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| black_box(codec::decode_instancer_into(&stream, &mut target)));
        });
    }

    group.finish();
}

fn bench_encode_registry(c: &mut Criterion) {
    let mut registry = InstancerRegistry::new();
    for id in 0..64 {
        registry.insert(make_buffer(id, 1_000), ()).unwrap();
    }

    c.bench_function("encode_registry_64x1000", |b| {
        b.iter(|| black_box(codec::encode_registry(&registry)));
    });
}

criterion_group!(
    benches,
    bench_encode_instancer,
    bench_decode_into,
    bench_encode_registry
);
criterion_main!(benches);
