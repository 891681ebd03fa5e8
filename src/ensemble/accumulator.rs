//! Incremental ensemble accumulation
//!
//! Branches arrive one at a time, possibly from many threads. Each branch's
//! raw per-entity distributions are trimmed against an oversized working axis
//! as they arrive, and the accumulator tracks the smallest and largest
//! populated bin across everything seen so far. [`finalize`] then cuts the
//! working axis down to exactly that window and re-expresses every stored
//! offset against it.
//!
//! # Thread Safety
//!
//! All `process*` methods take `&self`. Validation, provider calls and
//! trimming run without holding any lock; only the window update and the
//! append share one short critical section. [`finalize`] consumes the
//! accumulator, so it cannot run while a producer still holds a reference.
//!
//! [`finalize`]: EnsembleAccumulator::finalize

use core::hash::Hash;
use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::distribution::{validate_values, ReferenceAxis, TrimmedDistribution};
use crate::ensemble::{Branch, BranchCache, BranchId, EnsembleStore, EntityIndex};
use crate::error::{AccumulateError, DistributionError};
use crate::traits::DistributionProvider;

#[derive(Debug, Default)]
struct State {
    /// Entity count, fixed by the first committed branch.
    num_entities: Option<usize>,
    branches: Vec<(Branch, Vec<TrimmedDistribution>)>,
    seen: HashSet<BranchId>,
    /// Smallest non-zero working-axis bin seen so far.
    min_bin: Option<usize>,
    /// Largest non-zero working-axis bin seen so far.
    max_bin: Option<usize>,
}

/// Collects weighted branches of per-entity distributions and produces an
/// [`EnsembleStore`] on [`finalize`](Self::finalize).
///
/// # Example
///
/// ```
/// use branchstats::distribution::ReferenceAxis;
/// use branchstats::ensemble::{Branch, EnsembleAccumulator};
///
/// let acc = EnsembleAccumulator::new(ReferenceAxis::new(0.0, 1.0, 5).unwrap());
/// acc.process(Branch::new(1, 0.2), &[vec![0.0, 0.0, 3.0, 2.0, 0.0]]).unwrap();
/// acc.process(Branch::new(2, 0.3), &[vec![0.0, 0.0, 0.0, 4.0, 1.0]]).unwrap();
///
/// let store = acc.finalize().unwrap();
/// assert_eq!(store.axis().start(), 2.0);
/// assert_eq!(store.axis().size(), 3);
/// ```
#[derive(Debug)]
pub struct EnsembleAccumulator {
    working_axis: ReferenceAxis,
    entity_index: Option<EntityIndex>,
    state: Mutex<State>,
}

impl EnsembleAccumulator {
    /// Create an accumulator over `working_axis`.
    ///
    /// The working axis must be wide enough for every branch; it is cut down
    /// to the populated window on finalize.
    pub fn new(working_axis: ReferenceAxis) -> Self {
        Self {
            working_axis,
            entity_index: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Attach external entity ids. Every branch must then supply exactly
    /// `index.len()` entities, and the finalized store resolves
    /// [`EntityRef::Id`](crate::ensemble::EntityRef::Id) through it.
    pub fn with_entity_index(mut self, index: EntityIndex) -> Self {
        self.state.get_mut().num_entities = Some(index.len());
        self.entity_index = Some(index);
        self
    }

    /// The working axis raw distributions are expressed on.
    pub fn working_axis(&self) -> &ReferenceAxis {
        &self.working_axis
    }

    /// Attached entity ids, if any.
    pub fn entity_index(&self) -> Option<&EntityIndex> {
        self.entity_index.as_ref()
    }

    /// Branches committed so far.
    pub fn num_branches(&self) -> usize {
        self.state.lock().branches.len()
    }

    /// Entity count, once known.
    pub fn num_entities(&self) -> Option<usize> {
        self.state.lock().num_entities
    }

    /// Populated working-axis window `(first_bin, last_bin)` so far.
    pub fn bin_range(&self) -> Option<(usize, usize)> {
        let state = self.state.lock();
        state.min_bin.zip(state.max_bin)
    }

    /// Add one branch from raw dense distributions, one per entity, each
    /// with exactly `working_axis().size()` finite non-negative values.
    pub fn process<D>(&self, branch: Branch, raw: &[D]) -> Result<(), AccumulateError>
    where
        D: AsRef<[f64]>,
    {
        self.precheck(&branch, raw.len())?;
        let dists = raw
            .iter()
            .enumerate()
            .map(|(entity, values)| self.trim_raw(branch.id, entity, values.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.commit(branch, dists)
    }

    /// Add one branch whose distributions are already trimmed against the
    /// working axis.
    ///
    /// Windows must fit the working axis and hold finite non-negative
    /// values; [`TrimmedDistribution::trim`] does not check the latter.
    pub fn process_trimmed(
        &self,
        branch: Branch,
        dists: Vec<TrimmedDistribution>,
    ) -> Result<(), AccumulateError> {
        self.precheck(&branch, dists.len())?;
        for (entity, dist) in dists.iter().enumerate() {
            dist.check_fits(self.working_axis.size())?;
            validate_values(dist.values())
                .map_err(|err| invalid_value(branch.id, entity, dist.offset(), err))?;
        }
        self.commit(branch, dists)
    }

    /// Add one branch, computing every entity through `provider`.
    pub fn process_with<P>(
        &self,
        branch: Branch,
        provider: &P,
        model: &P::Model,
    ) -> Result<(), AccumulateError>
    where
        P: DistributionProvider + ?Sized,
    {
        let n = provider.num_entities(model);
        self.precheck(&branch, n)?;
        self.check_range(&branch, provider, model)?;
        let dists = (0..n)
            .map(|entity| self.compute_one(branch.id, entity, provider, model))
            .collect::<Result<Vec<_>, _>>()?;
        self.commit(branch, dists)
    }

    /// Like [`process_with`](Self::process_with), but each `(key, entity)`
    /// distribution is computed at most once across every accumulator
    /// sharing `cache`.
    pub fn process_cached<P, K>(
        &self,
        branch: Branch,
        provider: &P,
        model: &P::Model,
        key: &K,
        cache: &BranchCache<K>,
    ) -> Result<(), AccumulateError>
    where
        P: DistributionProvider + ?Sized,
        K: Eq + Hash + Clone,
    {
        if cache.axis() != &self.working_axis {
            return Err(AccumulateError::CacheAxisMismatch);
        }
        let n = provider.num_entities(model);
        self.precheck(&branch, n)?;
        self.check_range(&branch, provider, model)?;
        let dists = (0..n)
            .map(|entity| {
                cache
                    .get_or_compute(key, entity, || {
                        self.compute_one(branch.id, entity, provider, model)
                    })
                    .map(|dist| (*dist).clone())
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.commit(branch, dists)
    }

    /// Process many `(branch, model)` pairs in parallel.
    ///
    /// Stops at the first failure; branches committed before it stay in the
    /// accumulator.
    #[cfg(feature = "parallel")]
    #[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
    pub fn process_all<P>(
        &self,
        provider: &P,
        branches: &[(Branch, &P::Model)],
    ) -> Result<(), AccumulateError>
    where
        P: DistributionProvider + ?Sized,
        P::Model: Sync,
    {
        use rayon::prelude::*;

        branches
            .par_iter()
            .try_for_each(|(branch, model)| self.process_with(*branch, provider, *model))
    }

    /// Re-accumulate every branch of a finalized store.
    ///
    /// The store axis must share the working axis delta and start on a
    /// working bin. Weights of zero, valid in a store, are rejected here.
    pub fn absorb(&self, store: &EnsembleStore) -> Result<(), AccumulateError> {
        let shift = self
            .working_axis
            .aligned_offset(store.axis())
            .ok_or_else(|| AccumulateError::IncompatibleAxis {
                expected: self.working_axis.to_string(),
                found: store.axis().to_string(),
            })?;
        if let (Some(ours), Some(theirs)) = (&self.entity_index, store.entity_index()) {
            if ours != theirs {
                return Err(AccumulateError::IncompatibleEntities(
                    "entity ids differ from the accumulator's entity index".into(),
                ));
            }
        }

        for (b, (&id, &weight)) in store.branch_ids().iter().zip(store.weights()).enumerate() {
            let dists = store
                .branch_distributions(b)
                .unwrap_or_default()
                .iter()
                .map(|dist| dist.shifted(shift))
                .collect();
            self.process_trimmed(Branch { id, weight }, dists)?;
        }
        Ok(())
    }

    /// Cut the working axis down to the populated window and freeze the
    /// ensemble.
    ///
    /// Branches are ordered by ascending [`BranchId`] in the store,
    /// independent of processing order. Fails with
    /// [`AccumulateError::EmptyEnsemble`] when nothing non-zero was seen.
    pub fn finalize(self) -> Result<EnsembleStore, AccumulateError> {
        let State {
            num_entities,
            mut branches,
            min_bin,
            max_bin,
            ..
        } = self.state.into_inner();

        if branches.is_empty() {
            return Err(AccumulateError::EmptyEnsemble);
        }
        let (first, last) = match (min_bin, max_bin) {
            (Some(first), Some(last)) if first <= last => (first, last),
            _ => return Err(AccumulateError::EmptyEnsemble),
        };
        let axis = self.working_axis.window(first, last - first + 1)?;

        branches.sort_by_key(|(branch, _)| branch.id);

        let mut weights = Vec::with_capacity(branches.len());
        let mut ids = Vec::with_capacity(branches.len());
        let mut data = Vec::with_capacity(branches.len());
        for (branch, dists) in branches {
            let rebased = dists
                .iter()
                .map(|dist| dist.rebased(first))
                .collect::<Result<Vec<_>, _>>()?;
            weights.push(branch.weight);
            ids.push(branch.id);
            data.push(rebased);
        }

        let num_entities = num_entities.unwrap_or(0);
        info!(
            branches = data.len(),
            entities = num_entities,
            start = axis.start(),
            bins = axis.size(),
            "finalized ensemble"
        );

        Ok(EnsembleStore::from_validated(
            axis,
            weights,
            ids,
            data,
            num_entities,
            self.entity_index,
        ))
    }

    /// Cheap checks run before any computation.
    fn precheck(&self, branch: &Branch, n: usize) -> Result<(), AccumulateError> {
        if !branch.has_valid_weight() {
            return Err(AccumulateError::InvalidWeight {
                branch: branch.id,
                weight: branch.weight,
            });
        }
        let state = self.state.lock();
        if let Some(expected) = state.num_entities {
            if n != expected {
                return Err(AccumulateError::EntityCountMismatch { expected, found: n });
            }
        }
        if state.seen.contains(&branch.id) {
            return Err(AccumulateError::DuplicateBranch(branch.id));
        }
        Ok(())
    }

    fn check_range<P>(
        &self,
        branch: &Branch,
        provider: &P,
        model: &P::Model,
    ) -> Result<(), AccumulateError>
    where
        P: DistributionProvider + ?Sized,
    {
        let Some((min, max)) = provider.value_range(model) else {
            return Ok(());
        };
        let (lower, upper) = (self.working_axis.lower_edge(), self.working_axis.upper_edge());
        if min.is_nan() || max.is_nan() || min < lower || max > upper {
            return Err(AccumulateError::OutsideWorkingAxis {
                branch: branch.id,
                min,
                max,
                lower,
                upper,
            });
        }
        Ok(())
    }

    fn compute_one<P>(
        &self,
        branch: BranchId,
        entity: usize,
        provider: &P,
        model: &P::Model,
    ) -> Result<TrimmedDistribution, AccumulateError>
    where
        P: DistributionProvider + ?Sized,
    {
        let raw = provider
            .compute(model, entity, &self.working_axis)
            .map_err(|source| AccumulateError::Provider {
                branch,
                entity,
                source,
            })?;
        self.trim_raw(branch, entity, &raw)
    }

    fn trim_raw(
        &self,
        branch: BranchId,
        entity: usize,
        raw: &[f64],
    ) -> Result<TrimmedDistribution, AccumulateError> {
        if raw.len() != self.working_axis.size() {
            return Err(AccumulateError::BinCountMismatch {
                branch,
                entity,
                expected: self.working_axis.size(),
                found: raw.len(),
            });
        }
        validate_values(raw).map_err(|err| invalid_value(branch, entity, 0, err))?;
        Ok(TrimmedDistribution::trim(raw))
    }

    /// Window update and append, under the lock.
    fn commit(
        &self,
        branch: Branch,
        dists: Vec<TrimmedDistribution>,
    ) -> Result<(), AccumulateError> {
        let window = dists
            .iter()
            .filter_map(|dist| dist.first_bin().zip(dist.last_bin()))
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)));
        let n = dists.len();

        {
            let mut state = self.state.lock();
            // re-checked: another producer may have committed since precheck
            if let Some(expected) = state.num_entities {
                if n != expected {
                    return Err(AccumulateError::EntityCountMismatch { expected, found: n });
                }
            }
            if !state.seen.insert(branch.id) {
                return Err(AccumulateError::DuplicateBranch(branch.id));
            }
            state.num_entities = Some(n);
            if let Some((first, last)) = window {
                state.min_bin = Some(state.min_bin.map_or(first, |m| m.min(first)));
                state.max_bin = Some(state.max_bin.map_or(last, |m| m.max(last)));
            }
            state.branches.push((branch, dists));
        }

        match window {
            Some((first, last)) => debug!(
                branch = %branch.id,
                weight = branch.weight,
                entities = n,
                first_bin = first,
                last_bin = last,
                "processed branch"
            ),
            None => warn!(branch = %branch.id, entities = n, "branch has no non-zero values"),
        }
        Ok(())
    }
}

/// Attach branch and entity to a value error; `offset` maps window
/// positions back to working-axis bins.
fn invalid_value(
    branch: BranchId,
    entity: usize,
    offset: usize,
    err: DistributionError,
) -> AccumulateError {
    match err {
        DistributionError::InvalidValue { bin, value } => AccumulateError::InvalidValue {
            branch,
            entity,
            bin: offset.saturating_add(bin),
            value,
        },
        other => other.into(),
    }
}
