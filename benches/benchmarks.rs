//! Benchmarks for branchstats
//!
//! Run with: cargo bench --features full

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use branchstats::distribution::{ReferenceAxis, TrimmedDistribution};
use branchstats::ensemble::{Branch, BranchCache, EnsembleAccumulator, EnsembleStore, EntityRef};
use branchstats::quantiles::{Interpolation, Selector, WeightedCdf};
use branchstats::statistics::WeightedMoments;
use branchstats::traits::FnProvider;

const ENTITIES: usize = 200;
const BRANCHES: u64 = 100;

/// Gutenberg-Richter-like rates over a branch-dependent magnitude window.
fn raw_branch(branch: u64, axis: &ReferenceAxis) -> Vec<Vec<f64>> {
    (0..ENTITIES)
        .map(|entity| {
            let lo = 50 + (entity + branch as usize) % 10;
            let hi = 70 + (entity * 7 + branch as usize) % 15;
            let mut raw = vec![0.0; axis.size()];
            for (bin, slot) in raw.iter_mut().enumerate().take(hi).skip(lo) {
                *slot = 10f64.powf(-(bin as f64) * 0.1) * (1.0 + branch as f64 * 0.01);
            }
            raw
        })
        .collect()
}

fn store() -> EnsembleStore {
    let axis = ReferenceAxis::magnitude_working_axis();
    let acc = EnsembleAccumulator::new(axis);
    for branch in 0..BRANCHES {
        acc.process(Branch::new(branch, 1.0 / BRANCHES as f64), &raw_branch(branch, &axis))
            .unwrap();
    }
    acc.finalize().unwrap()
}

// ============================================================================
// Trimming
// ============================================================================

fn bench_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("trimmed");
    let axis = ReferenceAxis::magnitude_working_axis();
    let raw = raw_branch(3, &axis).swap_remove(0);
    group.throughput(Throughput::Elements(raw.len() as u64));

    group.bench_function("trim", |b| {
        b.iter(|| black_box(TrimmedDistribution::trim(black_box(&raw))))
    });

    let trimmed = TrimmedDistribution::trim(&raw);
    group.bench_function("expand", |b| {
        b.iter(|| black_box(trimmed.expand(axis.size()).unwrap()))
    });

    group.finish();
}

// ============================================================================
// Accumulation
// ============================================================================

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    let axis = ReferenceAxis::magnitude_working_axis();
    let inputs: Vec<Vec<Vec<f64>>> = (0..BRANCHES).map(|b| raw_branch(b, &axis)).collect();
    group.throughput(Throughput::Elements(BRANCHES * ENTITIES as u64));

    group.bench_function("process_and_finalize", |b| {
        b.iter(|| {
            let acc = EnsembleAccumulator::new(axis);
            for (id, raw) in inputs.iter().enumerate() {
                acc.process(Branch::new(id as u64, 1.0), raw).unwrap();
            }
            black_box(acc.finalize().unwrap())
        })
    });

    let provider = FnProvider::new(ENTITIES, |branch: &u64, entity, axis: &ReferenceAxis| {
        Ok(raw_branch(*branch, axis).swap_remove(entity))
    });
    group.bench_function("process_cached_warm", |b| {
        let cache = BranchCache::new(axis);
        let warm = EnsembleAccumulator::new(axis);
        warm.process_cached(Branch::new(0, 1.0), &provider, &0, &0u64, &cache)
            .unwrap();
        b.iter_batched(
            || EnsembleAccumulator::new(axis),
            |acc| {
                acc.process_cached(Branch::new(0, 1.0), &provider, &0, &0u64, &cache)
                    .unwrap();
                black_box(acc)
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ============================================================================
// Fractile Queries
// ============================================================================

fn bench_fractiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("fractiles");
    let store = store();
    let quantiles = [0.025, 0.16, 0.5, 0.84, 0.975];

    for interpolation in [Interpolation::Linear, Interpolation::Step] {
        let engine = store.engine().with_interpolation(interpolation);
        group.bench_function(format!("entity_{:?}", interpolation), |b| {
            let selector = Selector::Entity(EntityRef::Index(17));
            b.iter(|| black_box(engine.fractiles(&selector, &quantiles, false).unwrap()))
        });
    }

    group.bench_function("all_cumulative", |b| {
        b.iter(|| {
            black_box(
                store
                    .fractiles(&Selector::All, &quantiles, true)
                    .unwrap(),
            )
        })
    });

    group.bench_function("summary_all", |b| {
        b.iter(|| black_box(store.engine().summary(&Selector::All, false).unwrap()))
    });

    group.finish();
}

// ============================================================================
// Per-bin primitives
// ============================================================================

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("per_bin");
    let samples: Vec<(f64, f64)> = (0..BRANCHES)
        .map(|i| (((i * 37) % 101) as f64 * 0.01, 1.0 + (i % 3) as f64))
        .collect();
    group.throughput(Throughput::Elements(samples.len() as u64));

    group.bench_function("weighted_cdf", |b| {
        b.iter(|| black_box(WeightedCdf::new(black_box(&samples)).unwrap()))
    });

    group.bench_function("weighted_moments", |b| {
        b.iter(|| black_box(samples.iter().copied().collect::<WeightedMoments>()))
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(
    benches,
    bench_trim,
    bench_accumulate,
    bench_fractiles,
    bench_primitives,
);

criterion_main!(benches);
