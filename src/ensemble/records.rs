//! Flat tabular form of an [`EnsembleStore`]
//!
//! [`StoreRecords`] is a header, one row per branch and one row per
//! `(branch, entity)` distribution: the shape a CSV writer, a database table
//! or a columnar file would want. No file format is implemented here; with
//! the `serde` feature the records (and the store itself, through them)
//! serialize with any serde backend.

use tracing::info;

use crate::distribution::{ReferenceAxis, TrimmedDistribution};
use crate::ensemble::{BranchId, EnsembleStore, EntityIndex};
use crate::error::StoreError;

/// Store-wide dimensions and axis.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreHeader {
    /// Number of branches.
    pub num_branches: usize,
    /// Number of entities per branch.
    pub num_entities: usize,
    /// First bin center of the store axis.
    pub start: f64,
    /// Bin width.
    pub delta: f64,
    /// Number of bins.
    pub size: usize,
}

/// One branch: its position, id and weight.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchRecord {
    /// Position in the store, `0..num_branches`.
    pub branch_index: usize,
    /// Branch identity.
    pub branch_id: BranchId,
    /// Branch weight.
    pub weight: f64,
}

/// One trimmed distribution. `values` is empty for an all-zero distribution.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionRecord {
    /// Branch position.
    pub branch_index: usize,
    /// External entity id, or the dense index when the store has no ids.
    pub entity_id: u64,
    /// First stored bin on the store axis.
    pub offset: usize,
    /// Stored window.
    pub values: Vec<f64>,
}

/// Complete flat export of a store.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreRecords {
    /// Dimensions and axis.
    pub header: StoreHeader,
    /// External entity ids in index order, if the store carries them.
    pub entity_ids: Option<Vec<u64>>,
    /// One row per branch.
    pub branches: Vec<BranchRecord>,
    /// One row per `(branch, entity)`.
    pub distributions: Vec<DistributionRecord>,
}

impl EnsembleStore {
    /// Export every branch and distribution as flat records.
    pub fn to_records(&self) -> StoreRecords {
        let axis = self.axis();
        let header = StoreHeader {
            num_branches: self.num_branches(),
            num_entities: self.num_entities(),
            start: axis.start(),
            delta: axis.delta(),
            size: axis.size(),
        };

        let branches = self
            .branch_ids()
            .iter()
            .zip(self.weights())
            .enumerate()
            .map(|(branch_index, (&branch_id, &weight))| BranchRecord {
                branch_index,
                branch_id,
                weight,
            })
            .collect();

        let index = self.entity_index();
        let mut distributions = Vec::with_capacity(self.num_branches() * self.num_entities());
        for branch_index in 0..self.num_branches() {
            for (entity, dist) in self
                .branch_distributions(branch_index)
                .unwrap_or_default()
                .iter()
                .enumerate()
            {
                let entity_id = index
                    .and_then(|index| index.id_of(entity))
                    .unwrap_or(entity as u64);
                distributions.push(DistributionRecord {
                    branch_index,
                    entity_id,
                    offset: dist.offset(),
                    values: dist.values().to_vec(),
                });
            }
        }

        StoreRecords {
            header,
            entity_ids: index.map(|index| index.ids().to_vec()),
            branches,
            distributions,
        }
    }

    /// Rebuild and validate a store from records.
    ///
    /// Records may come in any order; every `(branch, entity)` pair must be
    /// present exactly once.
    pub fn from_records(records: StoreRecords) -> Result<Self, StoreError> {
        let StoreRecords {
            header,
            entity_ids,
            branches,
            distributions,
        } = records;

        let axis = ReferenceAxis::new(header.start, header.delta, header.size)?;
        let entity_index = entity_ids.map(EntityIndex::new).transpose()?;
        if let Some(index) = &entity_index {
            if index.len() != header.num_entities {
                return Err(StoreError::HeaderMismatch(format!(
                    "header lists {} entities, id table has {}",
                    header.num_entities,
                    index.len()
                )));
            }
        }
        if branches.len() != header.num_branches {
            return Err(StoreError::HeaderMismatch(format!(
                "header lists {} branches, found {} branch records",
                header.num_branches,
                branches.len()
            )));
        }
        // bounds the grid allocation by the data actually supplied
        if header.num_branches.checked_mul(header.num_entities) != Some(distributions.len()) {
            return Err(StoreError::HeaderMismatch(format!(
                "header lists {} branches of {} entities, found {} distribution records",
                header.num_branches,
                header.num_entities,
                distributions.len()
            )));
        }

        let mut slots: Vec<Option<(BranchId, f64)>> = vec![None; header.num_branches];
        for record in &branches {
            let slot = slots
                .get_mut(record.branch_index)
                .ok_or(StoreError::BranchIndexOutOfRange(record.branch_index))?;
            if slot.replace((record.branch_id, record.weight)).is_some() {
                return Err(StoreError::HeaderMismatch(format!(
                    "branch {} listed twice",
                    record.branch_index
                )));
            }
        }

        let mut grid: Vec<Vec<Option<TrimmedDistribution>>> =
            vec![vec![None; header.num_entities]; header.num_branches];
        for record in distributions {
            let branch_index = record.branch_index;
            let row = grid
                .get_mut(branch_index)
                .ok_or(StoreError::BranchIndexOutOfRange(branch_index))?;
            let entity = match &entity_index {
                Some(index) => index.index_of(record.entity_id),
                None => usize::try_from(record.entity_id)
                    .ok()
                    .filter(|&e| e < header.num_entities),
            }
            .ok_or(StoreError::UnknownEntity(record.entity_id))?;

            let dist = if record.values.is_empty() {
                TrimmedDistribution::empty()
            } else {
                TrimmedDistribution::from_parts(record.offset, record.values).map_err(
                    |source| StoreError::Distribution {
                        branch_index,
                        entity,
                        source,
                    },
                )?
            };
            if row[entity].replace(dist).is_some() {
                return Err(StoreError::DuplicateRecord {
                    branch_index,
                    entity,
                });
            }
        }

        let mut weights = Vec::with_capacity(header.num_branches);
        let mut ids = Vec::with_capacity(header.num_branches);
        for (branch_index, slot) in slots.into_iter().enumerate() {
            // every position was filled: counts match and none repeated
            let (id, weight) = slot.ok_or(StoreError::BranchIndexOutOfRange(branch_index))?;
            ids.push(id);
            weights.push(weight);
        }
        let data = grid
            .into_iter()
            .enumerate()
            .map(|(branch_index, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(entity, dist)| {
                        dist.ok_or(StoreError::MissingRecord {
                            branch_index,
                            entity,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let store = Self::from_parts(axis, weights, ids, data, entity_index)?;
        info!(
            branches = store.num_branches(),
            entities = store.num_entities(),
            bins = store.axis().size(),
            "imported ensemble store"
        );
        Ok(store)
    }
}

impl TryFrom<StoreRecords> for EnsembleStore {
    type Error = StoreError;

    fn try_from(records: StoreRecords) -> Result<Self, Self::Error> {
        Self::from_records(records)
    }
}

impl From<EnsembleStore> for StoreRecords {
    fn from(store: EnsembleStore) -> Self {
        store.to_records()
    }
}
