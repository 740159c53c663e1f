//! Criterion benchmarks for the batch statistics used by every detector.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cs_math::{mad, median, quantile, Moments};

fn synthetic(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i * 7919) % 1013) as f64 * 1.37).collect()
}

fn bench_quantile(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats/quantile");
    for n in [1_000usize, 10_000, 50_000] {
        let values = synthetic(n);
        group.bench_with_input(BenchmarkId::new("q75", n), &values, |b, v| {
            b.iter(|| black_box(quantile(black_box(v), 0.75)))
        });
    }
    group.finish();
}

fn bench_robust(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats/robust");
    let values = synthetic(10_000);
    group.bench_function("median_mad", |b| {
        b.iter(|| {
            let m = median(black_box(&values)).unwrap_or(0.0);
            black_box(mad(&values, m))
        })
    });
    group.bench_function("moments", |b| b.iter(|| black_box(Moments::of(black_box(&values)))));
    group.finish();
}

criterion_group!(benches, bench_quantile, bench_robust);
criterion_main!(benches);
