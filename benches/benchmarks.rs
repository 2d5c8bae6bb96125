//! Benchmarks for streamsketch algorithms
//!
//! Run with: cargo bench --features full

// Require all algorithm families for benchmarks
#[cfg(not(all(feature = "cardinality", feature = "frequency", feature = "quantiles")))]
compile_error!("Benchmarks require all features. Run: cargo bench --features full");

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use streamsketch::cardinality::{HyperLogLog, HyperLogLogPlusPlus};
use streamsketch::frequency::CountMinSketch;
use streamsketch::quantiles::TDigest;
use streamsketch::traits::{CardinalitySketch, QuantileSketch, Sketch};

// ============================================================================
// HyperLogLog Benchmarks
// ============================================================================

fn bench_hll(c: &mut Criterion) {
    let mut group = c.benchmark_group("hyperloglog");
    group.throughput(Throughput::Elements(1));

    for precision in [10, 12, 14, 16] {
        group.bench_function(format!("add_p{}", precision), |b| {
            let mut hll = HyperLogLog::new(precision).unwrap();
            let mut i = 0u64;
            b.iter(|| {
                hll.add(&i);
                i = i.wrapping_add(1);
            });
        });
    }

    group.bench_function("add_str", |b| {
        let mut hll = HyperLogLog::new(14).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            hll.add(&i.to_string());
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("estimate", |b| {
        let mut hll = HyperLogLog::new(14).unwrap();
        for i in 0..100_000u64 {
            hll.add(&i);
        }
        b.iter(|| black_box(hll.estimate()));
    });

    group.bench_function("merge", |b| {
        let mut hll1 = HyperLogLog::new(14).unwrap();
        let mut hll2 = HyperLogLog::new(14).unwrap();
        for i in 0..10_000u64 {
            hll1.add(&i);
            hll2.add(&(i + 10_000));
        }
        b.iter(|| black_box(hll1.merge(black_box(&hll2)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// HyperLogLog++ Benchmarks
// ============================================================================

fn bench_hll_plus(c: &mut Criterion) {
    let mut group = c.benchmark_group("hyperloglog_plus");
    group.throughput(Throughput::Elements(1));

    group.bench_function("add_sparse", |b| {
        let mut hll = HyperLogLogPlusPlus::new(14).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            // Cycle through a key space that stays under the sparse threshold
            hll.add(&(i % 10_000));
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("add_dense", |b| {
        let mut hll = HyperLogLogPlusPlus::new(14).unwrap();
        hll.densify();
        let mut i = 0u64;
        b.iter(|| {
            hll.add(&i);
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("estimate_sparse", |b| {
        let mut hll = HyperLogLogPlusPlus::new(14).unwrap();
        for i in 0..10_000u64 {
            hll.add(&i);
        }
        b.iter(|| black_box(hll.estimate()));
    });

    group.bench_function("merge_sparse", |b| {
        let mut hll1 = HyperLogLogPlusPlus::new(14).unwrap();
        let mut hll2 = HyperLogLogPlusPlus::new(14).unwrap();
        for i in 0..5_000u64 {
            hll1.add(&i);
            hll2.add(&(i + 5_000));
        }
        b.iter(|| black_box(hll1.merge(black_box(&hll2)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Count-Min Sketch Benchmarks
// ============================================================================

fn bench_cms(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_min_sketch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("add", |b| {
        let mut cms = CountMinSketch::new(0.001, 0.01).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            cms.add(&i, 1);
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("add_conservative", |b| {
        let mut cms = CountMinSketch::new(0.001, 0.01).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            cms.add_conservative(&i, 1);
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("estimate", |b| {
        let mut cms = CountMinSketch::new(0.001, 0.01).unwrap();
        for i in 0..100_000u64 {
            cms.add(&i, 1);
        }
        b.iter(|| black_box(cms.estimate(&12_345u64)));
    });

    group.bench_function("merge", |b| {
        let mut cms1 = CountMinSketch::new(0.001, 0.01).unwrap();
        let mut cms2 = CountMinSketch::new(0.001, 0.01).unwrap();
        for i in 0..10_000u64 {
            cms1.add(&i, 1);
            cms2.add(&(i + 10_000), 1);
        }
        b.iter(|| black_box(cms1.merge(black_box(&cms2)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// t-digest Benchmarks
// ============================================================================

fn bench_tdigest(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdigest");
    group.throughput(Throughput::Elements(1));

    for compression in [50, 100, 200] {
        group.bench_function(format!("add_c{}", compression), |b| {
            let mut td = TDigest::new(compression).unwrap();
            let mut i = 0u64;
            b.iter(|| {
                td.add((i as f64) * 0.001);
                i = i.wrapping_add(1);
            });
        });
    }

    group.bench_function("quantile", |b| {
        let mut td = TDigest::new(100).unwrap();
        for i in 0..100_000u64 {
            td.add(i as f64);
        }
        b.iter(|| black_box(td.quantile(0.99)));
    });

    group.bench_function("merge", |b| {
        let mut td1 = TDigest::new(100).unwrap();
        let mut td2 = TDigest::new(100).unwrap();
        for i in 0..10_000u64 {
            td1.add(i as f64);
            td2.add((i + 10_000) as f64);
        }
        b.iter(|| black_box(td1.merge(black_box(&td2)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_hll, bench_hll_plus, bench_cms, bench_tdigest);

criterion_main!(benches);
