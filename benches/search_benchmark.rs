//! Benchmarks for ipxdb build and search performance.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipxdb::{long2ip, IndexPolicy, Maker, Searcher, Segment};
use std::io::Write;

/// Build a synthetic database: `count` gapless segments cycling through a
/// handful of region strings.
fn generate_db(count: u32) -> Vec<u8> {
    let regions = [
        "CN|FJ|Fuzhou|Telecom",
        "CN|GD|Guangzhou|Unicom",
        "US|CA|MountainView|Google",
        "AU|0|0|0|0",
        "DE|BE|Berlin|Telekom",
    ];

    let mut maker = Maker::new(IndexPolicy::Vector, "bench.txt", "bench.xdb");
    let span = u32::MAX / count;
    for i in 0..count {
        let start = i * span;
        let end = if i == count - 1 {
            u32::MAX
        } else {
            start + span - 1
        };
        // adjacent segments cycle regions, so none merge away
        let region = regions[(i as usize) % regions.len()];
        maker.push_segment(Segment::new(start, end, region)).unwrap();
    }
    maker.write().unwrap()
}

fn query_ips(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| long2ip((i as u32).wrapping_mul(2_654_435_761)))
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in [1_000u32, 10_000, 50_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("segments", size), &size, |b, &size| {
            b.iter(|| black_box(generate_db(size)))
        });
    }

    group.finish();
}

fn bench_search_buffer(c: &mut Criterion) {
    let data = generate_db(50_000);
    let searcher = Searcher::with_buffer(data).unwrap();
    let ips = query_ips(1_000);

    let mut group = c.benchmark_group("search_buffer");
    group.throughput(Throughput::Elements(ips.len() as u64));

    group.bench_function("random_ips", |b| {
        b.iter(|| {
            for ip in &ips {
                black_box(searcher.search(ip).unwrap());
            }
        })
    });

    group.finish();
}

fn bench_search_file_modes(c: &mut Criterion) {
    let data = generate_db(50_000);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let file_only = Searcher::with_file_only(file.path()).unwrap();
    let vector = Searcher::with_vector_index(file.path()).unwrap();
    let mmap = Searcher::with_mmap(file.path()).unwrap();
    let ips = query_ips(200);

    let mut group = c.benchmark_group("search_file_modes");
    group.throughput(Throughput::Elements(ips.len() as u64));

    group.bench_function("file_only", |b| {
        b.iter(|| {
            for ip in &ips {
                black_box(file_only.search(ip).unwrap());
            }
        })
    });

    group.bench_function("vector_index", |b| {
        b.iter(|| {
            for ip in &ips {
                black_box(vector.search(ip).unwrap());
            }
        })
    });

    group.bench_function("mmap", |b| {
        b.iter(|| {
            for ip in &ips {
                black_box(mmap.search(ip).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_search_buffer,
    bench_search_file_modes,
);

criterion_main!(benches);
