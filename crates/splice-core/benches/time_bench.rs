//! Benchmarks for splice-core time operations.
//!
//! Run with: cargo bench -p splice-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use splice_core::{RationalTime, TimeRange, TimeRangeSet};

fn bench_rational_time_arithmetic(c: &mut Criterion) {
    let a = RationalTime::new(1001, 30);
    let b = RationalTime::new(500, 24);

    c.bench_function("rational_time_add", |bencher| {
        bencher.iter(|| black_box(a) + black_box(b));
    });

    c.bench_function("rational_time_add_sentinel", |bencher| {
        bencher.iter(|| black_box(RationalTime::UNBOUNDED_MAX) + black_box(b));
    });
}

fn bench_range_intersection(c: &mut Criterion) {
    let a = TimeRange::new(RationalTime::new(0, 1), RationalTime::new(10, 1));
    let b = TimeRange::new(RationalTime::new(5, 1), RationalTime::new(15, 1));

    c.bench_function("range_intersection", |bencher| {
        bencher.iter(|| black_box(a).intersection(black_box(b)));
    });
}

fn bench_range_set_churn(c: &mut Criterion) {
    // A ledger shaped like a clip being scrubbed: many small disjoint
    // invalidations, then coalescing sweeps.
    c.bench_function("range_set_insert_100_disjoint", |bencher| {
        bencher.iter(|| {
            let mut set = TimeRangeSet::new();
            for i in 0..100i64 {
                set.insert(TimeRange::new(
                    RationalTime::new(i * 2, 1),
                    RationalTime::new(i * 2 + 1, 1),
                ));
            }
            black_box(set)
        });
    });

    let mut populated = TimeRangeSet::new();
    for i in 0..100i64 {
        populated.insert(TimeRange::new(
            RationalTime::new(i * 2, 1),
            RationalTime::new(i * 2 + 1, 1),
        ));
    }

    c.bench_function("range_set_remove_middle", |bencher| {
        bencher.iter(|| {
            let mut set = populated.clone();
            set.remove(TimeRange::new(
                RationalTime::new(50, 1),
                RationalTime::new(150, 1),
            ));
            black_box(set)
        });
    });
}

criterion_group!(
    benches,
    bench_rational_time_arithmetic,
    bench_range_intersection,
    bench_range_set_churn,
);
criterion_main!(benches);
