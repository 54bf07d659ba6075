//! Benchmarks for table structure detection.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tabless::detect::{DetectOptions, analyze};
use tabless::store::PagedLineStore;

fn psql_table(rows: usize) -> PagedLineStore {
    let mut store = PagedLineStore::new();
    store.append("   id  |   name    | score ");
    store.append("-------+-----------+-------");
    for i in 0..rows {
        store.append(format!(" {i:>5} | user{:<5} | {:>5} ", i % 997, (i * 37) % 1000));
    }
    store.append(format!("({rows} rows)"));
    store
}

fn bench_detect_small(c: &mut Criterion) {
    c.bench_function("detect_100_rows", |b| {
        b.iter_batched(
            || psql_table(100),
            |mut store| analyze(black_box(&mut store), &DetectOptions::default()).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_detect_large(c: &mut Criterion) {
    c.bench_function("detect_50k_rows", |b| {
        b.iter_batched(
            || psql_table(50_000),
            |mut store| analyze(black_box(&mut store), &DetectOptions::default()).unwrap(),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_detect_small, bench_detect_large);
criterion_main!(benches);
