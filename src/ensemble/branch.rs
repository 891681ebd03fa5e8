//! Branch identity and weight

/// Opaque identity of one logic-tree branch.
///
/// Used to reject duplicate processing and to order branches
/// deterministically in a finalized store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchId(pub u64);

impl From<u64> for BranchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BranchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A weighted branch as supplied by the logic tree.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Branch {
    /// Branch identity
    pub id: BranchId,
    /// Branch weight; must be finite and positive when processed
    pub weight: f64,
}

impl Branch {
    /// Create a branch.
    pub fn new(id: impl Into<BranchId>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }

    pub(crate) fn has_valid_weight(&self) -> bool {
        self.weight.is_finite() && self.weight > 0.0
    }
}
