//! Collaborator traits
//!
//! The physics that turns one branch's model into per-entity distributions
//! lives outside this crate. It plugs in through [`DistributionProvider`];
//! one provider per distribution flavor (nucleation, participation,
//! parent-section, regional) drives the same generic accumulator.

use core::marker::PhantomData;

use crate::distribution::ReferenceAxis;
use crate::error::ProviderError;

/// Computes raw per-entity distributions for a branch model.
///
/// Implementations must be pure: the same model and entity always yield the
/// same values. [`BranchCache`](crate::ensemble::BranchCache) relies on this
/// to share one computation between accumulators.
pub trait DistributionProvider: Sync {
    /// The branch model (a solved fault system, a gridded source model, ...)
    type Model: ?Sized;

    /// Number of entities the model produces distributions for.
    fn num_entities(&self, model: &Self::Model) -> usize;

    /// Raw distribution of `entity` on `axis`: exactly `axis.size()`
    /// finite, non-negative values.
    fn compute(
        &self,
        model: &Self::Model,
        entity: usize,
        axis: &ReferenceAxis,
    ) -> Result<Vec<f64>, ProviderError>;

    /// Smallest and largest value the model can populate (for example its
    /// minimum and maximum rupture magnitude), if known. Accumulators reject
    /// models reaching past the working axis edges.
    fn value_range(&self, _model: &Self::Model) -> Option<(f64, f64)> {
        None
    }
}

/// [`DistributionProvider`] backed by a closure and a fixed entity count.
///
/// # Example
///
/// ```
/// use branchstats::distribution::ReferenceAxis;
/// use branchstats::traits::{DistributionProvider, FnProvider};
///
/// // model = a scale factor applied to a flat distribution
/// let provider = FnProvider::new(3, |scale: &f64, entity, axis: &ReferenceAxis| {
///     Ok(vec![*scale * (entity + 1) as f64; axis.size()])
/// });
///
/// let axis = ReferenceAxis::new(0.0, 1.0, 4).unwrap();
/// assert_eq!(provider.num_entities(&2.0), 3);
/// assert_eq!(provider.compute(&2.0, 1, &axis).unwrap(), vec![4.0; 4]);
/// ```
pub struct FnProvider<M: ?Sized, F> {
    num_entities: usize,
    compute: F,
    _model: PhantomData<fn(&M)>,
}

impl<M, F> FnProvider<M, F>
where
    M: ?Sized,
    F: Fn(&M, usize, &ReferenceAxis) -> Result<Vec<f64>, ProviderError> + Sync,
{
    /// Wrap `compute`, reporting `num_entities` for every model.
    pub fn new(num_entities: usize, compute: F) -> Self {
        Self {
            num_entities,
            compute,
            _model: PhantomData,
        }
    }
}

impl<M, F> DistributionProvider for FnProvider<M, F>
where
    M: ?Sized,
    F: Fn(&M, usize, &ReferenceAxis) -> Result<Vec<f64>, ProviderError> + Sync,
{
    type Model = M;

    fn num_entities(&self, _model: &M) -> usize {
        self.num_entities
    }

    fn compute(
        &self,
        model: &M,
        entity: usize,
        axis: &ReferenceAxis,
    ) -> Result<Vec<f64>, ProviderError> {
        (self.compute)(model, entity, axis)
    }
}
