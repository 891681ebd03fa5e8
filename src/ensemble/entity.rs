//! Entity addressing
//!
//! Distributions are stored in dense `0..num_entities` arrays. When the
//! natural identifiers are not contiguous (parent-section ids, region codes)
//! an [`EntityIndex`] maps them onto that index space and back.

use std::collections::HashMap;

use crate::error::EntityIndexError;

/// Reference to an entity, either by its dense index or its external id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityRef {
    /// Position in the dense entity arrays
    Index(usize),
    /// External id, resolved through the store's [`EntityIndex`]
    Id(u64),
}

impl core::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EntityRef::Index(i) => write!(f, "index {}", i),
            EntityRef::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// Immutable bijection between external entity ids and dense indices.
///
/// # Example
///
/// ```
/// use branchstats::ensemble::EntityIndex;
///
/// let index = EntityIndex::new(vec![1042, 7, 315]).unwrap();
/// assert_eq!(index.index_of(7), Some(1));
/// assert_eq!(index.id_of(2), Some(315));
/// assert_eq!(index.index_of(8), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<u64>", into = "Vec<u64>")
)]
pub struct EntityIndex {
    /// index -> id
    ids: Vec<u64>,
    /// id -> index
    lookup: HashMap<u64, usize>,
}

impl EntityIndex {
    /// Build the index; position in `ids` becomes the dense index.
    pub fn new(ids: Vec<u64>) -> Result<Self, EntityIndexError> {
        let mut lookup = HashMap::with_capacity(ids.len());
        for (index, &id) in ids.iter().enumerate() {
            if lookup.insert(id, index).is_some() {
                return Err(EntityIndexError::DuplicateId { id, index });
            }
        }
        Ok(Self { ids, lookup })
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index holds no entities.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dense index of external `id`.
    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// External id at dense `index`.
    pub fn id_of(&self, index: usize) -> Option<u64> {
        self.ids.get(index).copied()
    }

    /// External ids in index order.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// `(index, id)` pairs in index order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, u64)> + '_ {
        self.ids.iter().copied().enumerate()
    }
}

impl TryFrom<Vec<u64>> for EntityIndex {
    type Error = EntityIndexError;

    fn try_from(ids: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<EntityIndex> for Vec<u64> {
    fn from(index: EntityIndex) -> Self {
        index.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection() {
        let ids = vec![40, 12, 99, 3];
        let index = EntityIndex::new(ids.clone()).unwrap();
        assert_eq!(index.len(), 4);
        for (i, id) in index.iter() {
            assert_eq!(index.index_of(id), Some(i));
            assert_eq!(index.id_of(i), Some(id));
        }
        assert_eq!(index.ids(), ids.as_slice());
        assert_eq!(index.id_of(4), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        assert_eq!(
            EntityIndex::new(vec![5, 6, 5]),
            Err(EntityIndexError::DuplicateId { id: 5, index: 2 })
        );
    }

    #[test]
    fn test_empty() {
        let index = EntityIndex::new(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.index_of(0), None);
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::Index(3).to_string(), "index 3");
        assert_eq!(EntityRef::Id(1042).to_string(), "id 1042");
    }
}
