//! Benchmarks for receive-side framing
//!
//! Measures the parse pass over a download-sized burst of history record
//! frames, delivered as one buffer and as BLE-notification-sized chunks,
//! plus resynchronisation cost over noisy input.
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use racebox_link::codec::{FrameScanner, StreamAssembler};
use racebox_link::test_utils::{PayloadBuilder, record_frame};
use std::hint::black_box;

/// Wire bytes for `count` consecutive history records
fn record_burst(count: u32) -> Vec<u8> {
    (0..count).flat_map(|i| record_frame(&PayloadBuilder::sample(i * 40).build())).collect()
}

fn bench_whole_buffer(c: &mut Criterion) {
    let wire = record_burst(1000);

    let mut group = c.benchmark_group("scan_whole_buffer");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let mut scanner = FrameScanner::new();
            scanner.extend(black_box(&wire));
            black_box(scanner.drain_frames())
        })
    });

    group.finish();
}

fn bench_chunked(c: &mut Criterion) {
    let wire = record_burst(1000);

    let mut group = c.benchmark_group("assemble_chunked");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    // Typical notification sizes: default ATT MTU payload, and a negotiated larger MTU
    for chunk_len in [20usize, 244] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_len), &chunk_len, |b, &n| {
            b.iter(|| {
                let mut assembler = StreamAssembler::new(64 * 1024);
                let mut frames = 0usize;
                for chunk in wire.chunks(n) {
                    frames += assembler.append(black_box(chunk)).frames.len();
                }
                black_box(frames)
            })
        });
    }

    group.finish();
}

fn bench_resync(c: &mut Criterion) {
    // Each record preceded by bogus sync markers with bad checksums
    let mut wire = Vec::new();
    for i in 0..200u32 {
        wire.extend_from_slice(&[0xB5, 0x62, 0xFF, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00]);
        wire.extend(record_frame(&PayloadBuilder::sample(i).build()));
    }

    let mut group = c.benchmark_group("resync");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("corrupt_acks_between_records", |b| {
        b.iter(|| {
            let mut scanner = FrameScanner::new();
            scanner.extend(black_box(&wire));
            black_box(scanner.drain_frames())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_whole_buffer, bench_chunked, bench_resync);
criterion_main!(benches);
