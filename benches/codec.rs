//! Benchmarks for rbrotli compression and decompression throughput.
//!
//! Covers the main data shapes: incompressible, highly repetitive, and
//! text-like input across several sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rbrotli::{compress, decompress};

/// Generate random (incompressible) data
fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = 0x243F_6A88_85A3_08D3u64;
    for _ in 0..size {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.push((state & 0xFF) as u8);
    }
    data
}

/// Generate repetitive (highly compressible) data
fn generate_repetitive_data(size: usize) -> Vec<u8> {
    let pattern = b"ABCDABCDABCDABCD";
    pattern.iter().cycle().take(size).copied().collect()
}

/// Generate text-like data with phrase-level redundancy
fn generate_text_data(size: usize) -> Vec<u8> {
    let phrases: [&[u8]; 4] = [
        b"the quick brown fox ",
        b"jumps over the lazy dog ",
        b"pack my box with five dozen ",
        b"liquor jugs ",
    ];
    let mut data = Vec::with_capacity(size);
    let mut i = 0usize;
    while data.len() < size {
        let p = phrases[(i * 7 + i / 3) % phrases.len()];
        let chunk = (size - data.len()).min(p.len());
        data.extend_from_slice(&p[..chunk]);
        i += 1;
    }
    data
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");
    for size in [16 * 1024usize, 256 * 1024, 1024 * 1024] {
        for (name, data) in [
            ("random", generate_random_data(size)),
            ("repetitive", generate_repetitive_data(size)),
            ("text", generate_text_data(size)),
        ] {
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &data,
                |b, data| b.iter(|| compress(data)),
            );
        }
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");
    for size in [16 * 1024usize, 256 * 1024, 1024 * 1024] {
        for (name, data) in [
            ("random", generate_random_data(size)),
            ("repetitive", generate_repetitive_data(size)),
            ("text", generate_text_data(size)),
        ] {
            let stream = compress(&data);
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &stream,
                |b, stream| b.iter(|| decompress(stream).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
