//! Benchmarks for artifact hashing
//!
//! Measures single-pass multi-algorithm digests over in-memory data and files.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diskforged_tools::digest::{digest_reader, CHUNK_SIZE};
use diskforged_tools::{compute_digests, HashAlgorithm};
use std::io::Cursor;

/// Roughly the size of a 40-track single-sided flux capture.
const CAPTURE_SIZE: usize = 4 * 1024 * 1024;

/// A 720K disk image.
const IMAGE_SIZE: usize = 737_280;

fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

fn bench_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest_algorithms");

    let data = payload(IMAGE_SIZE);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for alg in HashAlgorithm::DEFAULT_SET {
        group.bench_with_input(BenchmarkId::new("single", alg.name()), &alg, |b, alg| {
            b.iter(|| digest_reader(Cursor::new(black_box(&data)), &[*alg], CHUNK_SIZE));
        });
    }

    group.bench_function(BenchmarkId::new("all", "md5+sha1+sha256"), |b| {
        b.iter(|| {
            digest_reader(
                Cursor::new(black_box(&data)),
                &HashAlgorithm::DEFAULT_SET,
                CHUNK_SIZE,
            )
        });
    });

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest_chunk_size");

    let data = payload(CAPTURE_SIZE);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk in [4 * 1024, 64 * 1024, CHUNK_SIZE] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                digest_reader(
                    Cursor::new(black_box(&data)),
                    &HashAlgorithm::DEFAULT_SET,
                    chunk,
                )
            });
        });
    }

    group.finish();
}

fn bench_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest_file");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.scp");
    std::fs::write(&path, payload(CAPTURE_SIZE)).unwrap();

    group.throughput(Throughput::Bytes(CAPTURE_SIZE as u64));
    group.bench_function("capture", |b| {
        b.iter(|| compute_digests(black_box(&path), &HashAlgorithm::DEFAULT_SET));
    });

    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_chunk_sizes, bench_file);
criterion_main!(benches);
