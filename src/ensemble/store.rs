//! Finalized, immutable ensemble
//!
//! An [`EnsembleStore`] is produced once by
//! [`EnsembleAccumulator::finalize`](crate::ensemble::EnsembleAccumulator::finalize)
//! (or rebuilt from [records](crate::ensemble::StoreRecords)) and is read-only
//! afterwards. It is `Send + Sync`; any number of threads may query it at
//! once without locking.

use std::collections::HashSet;

use crate::distribution::{Curve, ReferenceAxis, TrimmedDistribution};
use crate::ensemble::{BranchId, EntityIndex, EntityRef};
use crate::error::{QueryError, StoreError};
use crate::quantiles::{QuantileEngine, Selector};

/// Weighted branches of trimmed per-entity distributions on one shared axis.
///
/// Branch positions (`0..num_branches`) follow ascending [`BranchId`] for
/// stores built by the accumulator; entity positions follow the dense index
/// space (or the [`EntityIndex`] when one is attached).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "crate::ensemble::StoreRecords",
        into = "crate::ensemble::StoreRecords"
    )
)]
pub struct EnsembleStore {
    axis: ReferenceAxis,
    weights: Vec<f64>,
    branch_ids: Vec<BranchId>,
    /// `[branch][entity]`
    data: Vec<Vec<TrimmedDistribution>>,
    num_entities: usize,
    entity_index: Option<EntityIndex>,
}

impl EnsembleStore {
    /// Assemble a store from its parts, validating every invariant.
    ///
    /// Weights must be finite and non-negative; a store whose weights sum to
    /// zero can be built but every fractile query on it fails with
    /// [`QueryError::DegenerateEnsemble`].
    pub fn from_parts(
        axis: ReferenceAxis,
        weights: Vec<f64>,
        branch_ids: Vec<BranchId>,
        data: Vec<Vec<TrimmedDistribution>>,
        entity_index: Option<EntityIndex>,
    ) -> Result<Self, StoreError> {
        if data.is_empty() && weights.is_empty() && branch_ids.is_empty() {
            return Err(StoreError::NoBranches);
        }
        if weights.len() != data.len() || branch_ids.len() != data.len() {
            return Err(StoreError::BranchCountMismatch {
                weights: weights.len(),
                ids: branch_ids.len(),
                data: data.len(),
            });
        }

        let num_entities = match &entity_index {
            Some(index) => index.len(),
            None => data[0].len(),
        };

        let mut seen = HashSet::with_capacity(branch_ids.len());
        for (branch_index, ((row, &weight), &id)) in
            data.iter().zip(&weights).zip(&branch_ids).enumerate()
        {
            if !weight.is_finite() || weight < 0.0 {
                return Err(StoreError::InvalidWeight {
                    branch_index,
                    weight,
                });
            }
            if !seen.insert(id) {
                return Err(StoreError::DuplicateBranch(id));
            }
            if row.len() != num_entities {
                return Err(StoreError::EntityCountMismatch {
                    branch_index,
                    expected: num_entities,
                    found: row.len(),
                });
            }
            for (entity, dist) in row.iter().enumerate() {
                dist.check_fits(axis.size())
                    .map_err(|source| StoreError::Distribution {
                        branch_index,
                        entity,
                        source,
                    })?;
            }
        }

        Ok(Self::from_validated(
            axis,
            weights,
            branch_ids,
            data,
            num_entities,
            entity_index,
        ))
    }

    /// Accumulator path: parts are valid by construction.
    pub(crate) fn from_validated(
        axis: ReferenceAxis,
        weights: Vec<f64>,
        branch_ids: Vec<BranchId>,
        data: Vec<Vec<TrimmedDistribution>>,
        num_entities: usize,
        entity_index: Option<EntityIndex>,
    ) -> Self {
        debug_assert_eq!(weights.len(), data.len());
        debug_assert_eq!(branch_ids.len(), data.len());
        debug_assert!(data.iter().all(|row| row.len() == num_entities));
        Self {
            axis,
            weights,
            branch_ids,
            data,
            num_entities,
            entity_index,
        }
    }

    /// Shared axis of every stored distribution.
    pub fn axis(&self) -> &ReferenceAxis {
        &self.axis
    }

    /// Number of branches.
    pub fn num_branches(&self) -> usize {
        self.data.len()
    }

    /// Number of entities per branch.
    pub fn num_entities(&self) -> usize {
        self.num_entities
    }

    /// Branch weights in branch order (not normalized).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight of branch `branch`.
    pub fn weight(&self, branch: usize) -> Option<f64> {
        self.weights.get(branch).copied()
    }

    /// Sum of all branch weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Branch ids in branch order.
    pub fn branch_ids(&self) -> &[BranchId] {
        &self.branch_ids
    }

    /// Position of branch `id`.
    pub fn branch_position(&self, id: BranchId) -> Option<usize> {
        self.branch_ids.iter().position(|&b| b == id)
    }

    /// External entity ids, if the store was built with them.
    pub fn entity_index(&self) -> Option<&EntityIndex> {
        self.entity_index.as_ref()
    }

    /// Trimmed distribution of `entity` (dense index) in `branch`.
    pub fn distribution(&self, branch: usize, entity: usize) -> Option<&TrimmedDistribution> {
        self.data.get(branch).and_then(|row| row.get(entity))
    }

    /// Every entity distribution of `branch`.
    pub fn branch_distributions(&self, branch: usize) -> Option<&[TrimmedDistribution]> {
        self.data.get(branch).map(Vec::as_slice)
    }

    /// Dense index of an entity reference.
    pub fn resolve(&self, entity: EntityRef) -> Result<usize, QueryError> {
        let index = match entity {
            EntityRef::Index(i) if i < self.num_entities => Some(i),
            EntityRef::Index(_) => None,
            EntityRef::Id(id) => self
                .entity_index
                .as_ref()
                .and_then(|index| index.index_of(id)),
        };
        index.ok_or(QueryError::UnknownEntity(entity))
    }

    /// Zero-filled curve of one entity in one branch on the store axis.
    pub fn dense(&self, branch: usize, entity: EntityRef) -> Result<Curve, QueryError> {
        let entity = self.resolve(entity)?;
        let row = self
            .data
            .get(branch)
            .ok_or(QueryError::UnknownBranch(branch))?;
        let mut values = vec![0.0; self.axis.size()];
        row[entity].add_scaled_into(&mut values, 1.0);
        Ok(Curve::from_parts_unchecked(self.axis, values))
    }

    /// Query engine over this store with default (linear) interpolation.
    pub fn engine(&self) -> QuantileEngine<'_> {
        QuantileEngine::new(self)
    }

    /// Fractile curves of `selector`, one per quantile in request order.
    ///
    /// Shorthand for `self.engine().fractiles(..)`.
    pub fn fractiles(
        &self,
        selector: &Selector,
        quantiles: &[f64],
        cumulative: bool,
    ) -> Result<Vec<Curve>, QueryError> {
        self.engine().fractiles(selector, quantiles, cumulative)
    }

    /// Approximate heap footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        let dists: usize = self
            .data
            .iter()
            .flat_map(|row| row.iter())
            .map(TrimmedDistribution::size_bytes)
            .sum();
        let index = self
            .entity_index
            .as_ref()
            .map_or(0, |index| index.len() * 3 * core::mem::size_of::<u64>());
        core::mem::size_of::<Self>()
            + self.weights.len() * core::mem::size_of::<f64>()
            + self.branch_ids.len() * core::mem::size_of::<BranchId>()
            + self.data.len() * core::mem::size_of::<Vec<TrimmedDistribution>>()
            + dists
            + index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> ReferenceAxis {
        ReferenceAxis::new(5.0, 0.5, 4).unwrap()
    }

    fn td(offset: usize, values: &[f64]) -> TrimmedDistribution {
        TrimmedDistribution::from_parts(offset, values.to_vec()).unwrap()
    }

    fn store() -> EnsembleStore {
        EnsembleStore::from_parts(
            axis(),
            vec![0.4, 0.6],
            vec![BranchId(1), BranchId(2)],
            vec![
                vec![td(0, &[1.0, 2.0]), TrimmedDistribution::empty()],
                vec![td(1, &[3.0]), td(3, &[4.0])],
            ],
            Some(EntityIndex::new(vec![100, 200]).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let store = store();
        assert_eq!(store.num_branches(), 2);
        assert_eq!(store.num_entities(), 2);
        assert_eq!(store.weight(1), Some(0.6));
        assert_eq!(store.weight(2), None);
        assert!((store.total_weight() - 1.0).abs() < 1e-12);
        assert_eq!(store.branch_position(BranchId(2)), Some(1));
        assert_eq!(store.distribution(1, 1), Some(&td(3, &[4.0])));
        assert!(store.distribution(0, 1).unwrap().is_empty());
        assert!(store.size_bytes() > 0);
    }

    #[test]
    fn test_resolve() {
        let store = store();
        assert_eq!(store.resolve(EntityRef::Index(1)), Ok(1));
        assert_eq!(store.resolve(EntityRef::Id(200)), Ok(1));
        assert_eq!(
            store.resolve(EntityRef::Id(300)),
            Err(QueryError::UnknownEntity(EntityRef::Id(300)))
        );
        assert_eq!(
            store.resolve(EntityRef::Index(2)),
            Err(QueryError::UnknownEntity(EntityRef::Index(2)))
        );
    }

    #[test]
    fn test_dense() {
        let store = store();
        let curve = store.dense(0, EntityRef::Id(100)).unwrap();
        assert_eq!(curve.values(), &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(curve.x(1), 5.5);
        assert_eq!(
            store.dense(5, EntityRef::Index(0)),
            Err(QueryError::UnknownBranch(5))
        );
    }

    #[test]
    fn test_rejects_inconsistent_parts() {
        let err = EnsembleStore::from_parts(axis(), vec![], vec![], vec![], None);
        assert_eq!(err, Err(StoreError::NoBranches));

        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0],
            vec![BranchId(1), BranchId(2)],
            vec![vec![]],
            None,
        );
        assert!(matches!(err, Err(StoreError::BranchCountMismatch { .. })));

        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0, -0.5],
            vec![BranchId(1), BranchId(2)],
            vec![vec![], vec![]],
            None,
        );
        assert!(matches!(
            err,
            Err(StoreError::InvalidWeight { branch_index: 1, .. })
        ));

        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0, 1.0],
            vec![BranchId(3), BranchId(3)],
            vec![vec![], vec![]],
            None,
        );
        assert_eq!(err, Err(StoreError::DuplicateBranch(BranchId(3))));

        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0, 1.0],
            vec![BranchId(1), BranchId(2)],
            vec![vec![td(0, &[1.0])], vec![]],
            None,
        );
        assert!(matches!(
            err,
            Err(StoreError::EntityCountMismatch {
                branch_index: 1,
                expected: 1,
                found: 0
            })
        ));

        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0],
            vec![BranchId(1)],
            vec![vec![td(3, &[1.0, 1.0])]],
            None,
        );
        assert!(matches!(err, Err(StoreError::Distribution { entity: 0, .. })));
    }

    #[test]
    fn test_entity_index_sets_entity_count() {
        let err = EnsembleStore::from_parts(
            axis(),
            vec![1.0],
            vec![BranchId(1)],
            vec![vec![td(0, &[1.0])]],
            Some(EntityIndex::new(vec![1, 2]).unwrap()),
        );
        assert!(matches!(
            err,
            Err(StoreError::EntityCountMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }
}
