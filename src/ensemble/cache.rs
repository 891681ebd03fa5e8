//! Compute-once cache of trimmed branch distributions
//!
//! One expensive model evaluation often feeds several accumulators (branch
//! averages at different logic-tree levels, several ensembles over the same
//! branches). [`BranchCache`] guarantees each `(model, entity)` distribution
//! is computed at most once per process and handed to every caller after
//! that.
//!
//! # Thread Safety
//!
//! The map is sharded ([`DashMap`]); a shard lock is held only while the
//! per-key cell is fetched or inserted. The computation itself runs under the
//! key's [`OnceCell`], so callers racing on the same key block until the
//! first one finishes, while callers on other keys proceed.

use core::hash::Hash;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::trace;

use crate::distribution::{ReferenceAxis, TrimmedDistribution};

type Cell = Arc<OnceCell<Arc<TrimmedDistribution>>>;

/// Process-wide memo of `(model identity, entity) -> TrimmedDistribution`.
///
/// Distributions are trimmed against the working axis the cache was built
/// for; accumulators refuse a cache built for a different axis. There is no
/// eviction: ensemble construction is a bounded batch job.
///
/// # Example
///
/// ```
/// use branchstats::distribution::{ReferenceAxis, TrimmedDistribution};
/// use branchstats::ensemble::BranchCache;
///
/// let cache: BranchCache<&str> = BranchCache::new(ReferenceAxis::new(0.0, 1.0, 4).unwrap());
///
/// let first = cache
///     .get_or_compute(&"branch-a", 0, || {
///         Ok::<_, ()>(TrimmedDistribution::trim(&[0.0, 1.0, 2.0, 0.0]))
///     })
///     .unwrap();
/// let again = cache
///     .get_or_compute(&"branch-a", 0, || -> Result<_, ()> { unreachable!() })
///     .unwrap();
///
/// assert_eq!(first, again);
/// assert_eq!(cache.computations(), 1);
/// ```
pub struct BranchCache<K> {
    axis: ReferenceAxis,
    cells: DashMap<(K, usize), Cell>,
    computations: AtomicUsize,
}

impl<K> BranchCache<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache for distributions on `axis`.
    pub fn new(axis: ReferenceAxis) -> Self {
        Self {
            axis,
            cells: DashMap::new(),
            computations: AtomicUsize::new(0),
        }
    }

    /// Working axis the cached distributions are trimmed against.
    pub fn axis(&self) -> &ReferenceAxis {
        &self.axis
    }

    /// Return the cached distribution for `(model, entity)`, running
    /// `compute` if none exists yet.
    ///
    /// Concurrent callers for the same key wait for the single running
    /// computation and share its result. A failed computation is not cached:
    /// its error goes to that caller and the next caller tries again.
    pub fn get_or_compute<F, E>(
        &self,
        model: &K,
        entity: usize,
        compute: F,
    ) -> Result<Arc<TrimmedDistribution>, E>
    where
        F: FnOnce() -> Result<TrimmedDistribution, E>,
    {
        let cell = self.cell(model, entity);
        let value = cell.get_or_try_init(|| -> Result<Arc<TrimmedDistribution>, E> {
            let dist = compute()?;
            self.computations.fetch_add(1, Ordering::Relaxed);
            trace!(entity, bins = dist.len(), "computed branch distribution");
            Ok(Arc::new(dist))
        })?;
        Ok(Arc::clone(value))
    }

    /// Cached distribution for `(model, entity)`, without computing.
    pub fn get(&self, model: &K, entity: usize) -> Option<Arc<TrimmedDistribution>> {
        self.cells
            .get(&(model.clone(), entity))
            .and_then(|cell| cell.get().cloned())
    }

    /// Whether `(model, entity)` has been computed.
    pub fn contains(&self, model: &K, entity: usize) -> bool {
        self.get(model, entity).is_some()
    }

    /// Number of computed entries.
    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    /// Whether nothing has been computed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful computations so far. Equals [`len`](Self::len)
    /// unless a computation is in flight.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    fn cell(&self, model: &K, entity: usize) -> Cell {
        // shard lock released at the end of this statement
        Arc::clone(
            self.cells
                .entry((model.clone(), entity))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        )
    }
}

impl<K: Eq + Hash> core::fmt::Debug for BranchCache<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BranchCache")
            .field("axis", &self.axis)
            .field("keys", &self.cells.len())
            .field("computations", &self.computations.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn cache() -> BranchCache<u64> {
        BranchCache::new(ReferenceAxis::new(0.0, 1.0, 4).unwrap())
    }

    fn dist() -> TrimmedDistribution {
        TrimmedDistribution::trim(&[0.0, 2.0, 1.0, 0.0])
    }

    #[test]
    fn test_computes_once_per_key() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let got = cache
                .get_or_compute(&7, 0, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(dist())
                })
                .unwrap();
            assert_eq!(*got, dist());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.computations(), 1);
        assert!(cache.contains(&7, 0));
        assert!(!cache.contains(&7, 1));
        assert!(!cache.contains(&8, 0));
    }

    #[test]
    fn test_distinct_keys_compute_separately() {
        let cache = cache();
        for model in 0..3u64 {
            for entity in 0..2 {
                cache
                    .get_or_compute(&model, entity, || Ok::<_, ()>(dist()))
                    .unwrap();
            }
        }
        assert_eq!(cache.len(), 6);
        assert_eq!(cache.computations(), 6);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let cache = cache();
        let err = cache.get_or_compute(&1, 0, || Err::<TrimmedDistribution, _>("boom"));
        assert_eq!(err, Err("boom"));
        assert!(cache.is_empty());
        assert_eq!(cache.computations(), 0);

        let ok = cache.get_or_compute(&1, 0, || Ok::<_, &str>(dist()));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_same_key_computes_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let threads = 8;
        let barrier = Barrier::new(threads);

        let results: Vec<Arc<TrimmedDistribution>> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_compute(&42, 3, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                Ok::<_, ()>(dist())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.computations(), 1);
        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
        }
    }

    #[test]
    fn test_debug_reports_counts() {
        let cache = cache();
        cache.get_or_compute(&3, 1, || Ok::<_, ()>(dist())).unwrap();
        let shown = format!("{:?}", cache);
        assert!(shown.starts_with("BranchCache"), "{}", shown);
        assert!(shown.contains("keys: 1"), "{}", shown);
        assert!(shown.contains("computations: 1"), "{}", shown);
    }

    #[test]
    fn test_get_does_not_compute() {
        let cache = cache();
        assert!(cache.get(&5, 0).is_none());
        // probing must not leave a computed entry behind
        assert!(cache.is_empty());
    }
}
