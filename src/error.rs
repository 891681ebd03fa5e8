//! Error types for ensemble accumulation, storage, and fractile queries.
//!
//! Each family of operations has its own enum so callers can tell a
//! configuration bug (entity-count drift, a bad weight) apart from an ensemble
//! that simply holds no usable data, and both apart from a malformed query.
//! The umbrella [`Error`] converts from all of them for callers that only
//! want to bubble failures up with `?`.

use crate::ensemble::{BranchId, EntityRef};

/// Result alias over the umbrella [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Invalid [`ReferenceAxis`](crate::distribution::ReferenceAxis) parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AxisError {
    /// Start value is NaN or infinite.
    #[error("axis start must be finite, got {0}")]
    NonFiniteStart(f64),

    /// Bin width is not finite and strictly positive.
    #[error("axis delta must be finite and positive, got {0}")]
    InvalidDelta(f64),

    /// Zero-length axis.
    #[error("axis must have at least one bin")]
    Empty,

    /// A sub-window does not fit inside its parent axis.
    #[error("window of {size} bins at {first} exceeds axis of {axis_size} bins")]
    WindowOutOfRange {
        /// First bin of the requested window.
        first: usize,
        /// Requested window length.
        size: usize,
        /// Length of the parent axis.
        axis_size: usize,
    },
}

/// Invalid contents for a [`TrimmedDistribution`](crate::distribution::TrimmedDistribution).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    /// A value is negative, NaN, or infinite.
    #[error("value at bin {bin} must be finite and non-negative, got {value}")]
    InvalidValue {
        /// Bin (relative to the supplied array) holding the bad value.
        bin: usize,
        /// The offending value.
        value: f64,
    },

    /// The stored window starts or ends with a zero.
    #[error("trimmed values must not start or end with zero")]
    Untrimmed,

    /// The window runs past the end of the axis it is stored against.
    #[error("window of {len} values at offset {offset} exceeds axis of {axis_size} bins")]
    OutOfAxis {
        /// First bin of the window.
        offset: usize,
        /// Number of stored values.
        len: usize,
        /// Length of the axis.
        axis_size: usize,
    },

    /// Re-expressing the offset against a later-starting origin would make it negative.
    #[error("cannot rebase offset {offset} onto origin bin {origin}")]
    NegativeOffset {
        /// Current offset.
        offset: usize,
        /// Requested new origin.
        origin: usize,
    },
}

/// Invalid construction of an [`EntityIndex`](crate::ensemble::EntityIndex).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityIndexError {
    /// The same external id appears twice.
    #[error("duplicate entity id {id} at index {index}")]
    DuplicateId {
        /// Repeated external id.
        id: u64,
        /// Position of the second occurrence.
        index: usize,
    },
}

/// Failure reported by a [`DistributionProvider`](crate::traits::DistributionProvider).
///
/// Retrying is the provider's business; the accumulator surfaces the error as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    /// Create a provider error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised while accumulating branches or finalizing the ensemble.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccumulateError {
    /// A branch supplied a different number of entities than the first one.
    #[error("entity count mismatch: expected {expected}, found {found}")]
    EntityCountMismatch {
        /// Count captured from the first branch (or the entity index).
        expected: usize,
        /// Count supplied by the offending branch.
        found: usize,
    },

    /// Branch weight is not finite and strictly positive.
    #[error("branch {branch} has invalid weight {weight}")]
    InvalidWeight {
        /// Offending branch.
        branch: BranchId,
        /// Supplied weight.
        weight: f64,
    },

    /// The same branch id was processed twice.
    #[error("branch {0} was already processed")]
    DuplicateBranch(BranchId),

    /// A raw distribution does not have one value per working-axis bin.
    #[error("entity {entity} of branch {branch} has {found} bins, working axis has {expected}")]
    BinCountMismatch {
        /// Offending branch.
        branch: BranchId,
        /// Offending entity.
        entity: usize,
        /// Working axis size.
        expected: usize,
        /// Supplied length.
        found: usize,
    },

    /// A raw value is negative or non-finite.
    #[error("entity {entity} of branch {branch} has invalid value {value} at bin {bin}")]
    InvalidValue {
        /// Offending branch.
        branch: BranchId,
        /// Offending entity.
        entity: usize,
        /// Working-axis bin of the value.
        bin: usize,
        /// The value.
        value: f64,
    },

    /// The model's value range falls outside the working axis edges.
    #[error("branch {branch} spans [{min}, {max}], outside working range [{lower}, {upper}]")]
    OutsideWorkingAxis {
        /// Offending branch.
        branch: BranchId,
        /// Smallest value reported by the provider.
        min: f64,
        /// Largest value reported by the provider.
        max: f64,
        /// Lower edge of the working axis.
        lower: f64,
        /// Upper edge of the working axis.
        upper: f64,
    },

    /// A [`BranchCache`](crate::ensemble::BranchCache) was built for another working axis.
    #[error("branch cache axis does not match the accumulator working axis")]
    CacheAxisMismatch,

    /// A finalized store cannot be laid onto the working axis.
    #[error("incompatible axis: expected {expected}, found {found}")]
    IncompatibleAxis {
        /// Description of the working axis.
        expected: String,
        /// Description of the incoming axis.
        found: String,
    },

    /// A finalized store's entities do not match the accumulator's entity index.
    #[error("incompatible entities: {0}")]
    IncompatibleEntities(String),

    /// The raw-distribution provider failed.
    #[error("provider failed for entity {entity} of branch {branch}: {source}")]
    Provider {
        /// Branch being processed.
        branch: BranchId,
        /// Entity being computed.
        entity: usize,
        /// Provider failure.
        source: ProviderError,
    },

    /// Finalize found no branches or only all-zero distributions.
    #[error("ensemble holds no non-zero data")]
    EmptyEnsemble,

    /// A stored window could not be re-expressed on the final axis.
    #[error(transparent)]
    Distribution(#[from] DistributionError),

    /// The final axis could not be built.
    #[error(transparent)]
    Axis(#[from] AxisError),
}

/// Errors raised while assembling an [`EnsembleStore`](crate::ensemble::EnsembleStore)
/// from parts or records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store would hold no branches.
    #[error("store must hold at least one branch")]
    NoBranches,

    /// Weights, branch ids and per-branch data disagree in length.
    #[error("branch count mismatch: {weights} weights, {ids} ids, {data} data rows")]
    BranchCountMismatch {
        /// Number of weights.
        weights: usize,
        /// Number of branch ids.
        ids: usize,
        /// Number of per-branch rows.
        data: usize,
    },

    /// A branch carries a different number of entities.
    #[error("branch {branch_index} has {found} entities, expected {expected}")]
    EntityCountMismatch {
        /// Offending branch position.
        branch_index: usize,
        /// Expected entity count.
        expected: usize,
        /// Actual entity count.
        found: usize,
    },

    /// A weight is negative or non-finite.
    #[error("branch {branch_index} has invalid weight {weight}")]
    InvalidWeight {
        /// Offending branch position.
        branch_index: usize,
        /// Supplied weight.
        weight: f64,
    },

    /// Two branches share an id.
    #[error("duplicate branch id {0}")]
    DuplicateBranch(BranchId),

    /// A stored distribution violates its invariants.
    #[error("distribution for entity {entity} of branch {branch_index} is invalid: {source}")]
    Distribution {
        /// Offending branch position.
        branch_index: usize,
        /// Offending entity index.
        entity: usize,
        /// Underlying violation.
        source: DistributionError,
    },

    /// A record references a branch position outside the header.
    #[error("record references branch {0} outside the header")]
    BranchIndexOutOfRange(usize),

    /// A record references an entity the store does not know.
    #[error("record references unknown entity {0}")]
    UnknownEntity(u64),

    /// Two records describe the same (branch, entity).
    #[error("duplicate record for entity {entity} of branch {branch_index}")]
    DuplicateRecord {
        /// Branch position.
        branch_index: usize,
        /// Entity index.
        entity: usize,
    },

    /// A (branch, entity) pair has no record.
    #[error("missing record for entity {entity} of branch {branch_index}")]
    MissingRecord {
        /// Branch position.
        branch_index: usize,
        /// Entity index.
        entity: usize,
    },

    /// The header disagrees with the records.
    #[error("header mismatch: {0}")]
    HeaderMismatch(String),

    /// Invalid axis in the header.
    #[error(transparent)]
    Axis(#[from] AxisError),

    /// Invalid entity id table.
    #[error(transparent)]
    EntityIndex(#[from] EntityIndexError),
}

/// Errors raised by fractile and summary queries. Queries never mutate the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// Requested quantile is outside `[0, 1]` or NaN.
    #[error("quantile must be within [0, 1], got {0}")]
    InvalidQuantile(f64),

    /// The selector references an entity the store does not hold.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityRef),

    /// Total branch weight is zero, so the CDF cannot be normalized.
    #[error("ensemble total weight {total_weight} cannot be normalized")]
    DegenerateEnsemble {
        /// Sum of branch weights.
        total_weight: f64,
    },

    /// Branch position outside the store.
    #[error("unknown branch index {0}")]
    UnknownBranch(usize),

    /// The selector names no entities.
    #[error("selector names no entities")]
    EmptySelector,

    /// A combined selector carries a negative or non-finite entity weight.
    #[error("entity {entity} has invalid selector weight {weight}")]
    InvalidEntityWeight {
        /// Offending entity.
        entity: EntityRef,
        /// Supplied weight.
        weight: f64,
    },
}

/// Umbrella error for callers that do not need to match on the family.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// See [`AxisError`].
    #[error(transparent)]
    Axis(#[from] AxisError),
    /// See [`DistributionError`].
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    /// See [`EntityIndexError`].
    #[error(transparent)]
    EntityIndex(#[from] EntityIndexError),
    /// See [`AccumulateError`].
    #[error(transparent)]
    Accumulate(#[from] AccumulateError),
    /// See [`StoreError`].
    #[error(transparent)]
    Store(#[from] StoreError),
    /// See [`QueryError`].
    #[error(transparent)]
    Query(#[from] QueryError),
}
