//! Fractile, mean and spread curves over an ensemble store
//!
//! Every query first resolves its selector to one dense curve per branch,
//! then evaluates each axis bin independently across branches. With the
//! `parallel` feature the per-bin evaluation runs on the rayon pool.

use crate::distribution::{reverse_cumulate, Curve, ReferenceAxis};
use crate::ensemble::{EnsembleStore, EntityRef};
use crate::error::QueryError;
use crate::quantiles::empirical::check_quantile;
use crate::quantiles::{Interpolation, WeightedCdf};
use crate::statistics::WeightedMoments;

/// Which entities a query covers.
///
/// Combined selectors sum the selected entities within each branch before
/// any statistic is taken: the median of a sum, not the sum of medians.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selector {
    /// A single entity.
    Entity(EntityRef),
    /// Several entities, each with weight 1.
    Set(Vec<EntityRef>),
    /// Several entities with explicit non-negative weights.
    Weighted(Vec<(EntityRef, f64)>),
    /// Every entity in the store.
    All,
}

impl From<EntityRef> for Selector {
    fn from(entity: EntityRef) -> Self {
        Selector::Entity(entity)
    }
}

/// A fractile query as a value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantileRequest {
    /// Entities to evaluate.
    pub selector: Selector,
    /// Probabilities in `[0, 1]`; one curve is returned per entry.
    pub quantiles: Vec<f64>,
    /// Evaluate reverse-cumulative curves instead of incremental ones.
    pub cumulative: bool,
}

impl QuantileRequest {
    /// Incremental request for `quantiles` of `selector`.
    pub fn new(selector: impl Into<Selector>, quantiles: impl Into<Vec<f64>>) -> Self {
        Self {
            selector: selector.into(),
            quantiles: quantiles.into(),
            cumulative: false,
        }
    }

    /// Switch between incremental and cumulative evaluation.
    pub fn cumulative(mut self, cumulative: bool) -> Self {
        self.cumulative = cumulative;
        self
    }
}

/// Weighted statistics of one bin across branches.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinSummary {
    /// Weighted mean.
    pub mean: f64,
    /// Weighted population standard deviation.
    pub std_dev: f64,
    /// Smallest branch value (positive-weight branches only).
    pub min: f64,
    /// Largest branch value (positive-weight branches only).
    pub max: f64,
}

/// Read-only query front end over an [`EnsembleStore`].
///
/// The engine holds no state besides the interpolation mode; every call
/// borrows the store immutably, so one engine (or many) can serve queries
/// from any number of threads.
///
/// # Example
///
/// ```
/// use branchstats::distribution::ReferenceAxis;
/// use branchstats::ensemble::{Branch, EnsembleAccumulator, EntityRef};
/// use branchstats::quantiles::{Interpolation, QuantileEngine, Selector};
///
/// let acc = EnsembleAccumulator::new(ReferenceAxis::new(0.0, 1.0, 5).unwrap());
/// acc.process(Branch::new(1, 0.2), &[[0.0, 0.0, 3.0, 2.0, 0.0]]).unwrap();
/// acc.process(Branch::new(2, 0.3), &[[0.0, 0.0, 0.0, 4.0, 1.0]]).unwrap();
/// acc.process(Branch::new(3, 0.5), &[[0.0, 0.0, 2.0, 2.0, 2.0]]).unwrap();
/// let store = acc.finalize().unwrap();
///
/// let selector = Selector::Entity(EntityRef::Index(0));
/// let step = QuantileEngine::new(&store)
///     .with_interpolation(Interpolation::Step)
///     .fractiles(&selector, &[0.5], false)
///     .unwrap();
/// assert_eq!(step[0].y(0), 2.0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct QuantileEngine<'a> {
    store: &'a EnsembleStore,
    interpolation: Interpolation,
}

impl<'a> QuantileEngine<'a> {
    /// Engine over `store` with [`Interpolation::Linear`].
    pub fn new(store: &'a EnsembleStore) -> Self {
        Self {
            store,
            interpolation: Interpolation::default(),
        }
    }

    /// Use `interpolation` for fractile queries.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Current interpolation mode.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// The queried store.
    pub fn store(&self) -> &'a EnsembleStore {
        self.store
    }

    /// Axis query results are reported on: the store axis, or its
    /// half-bin-shifted variant for cumulative curves.
    pub fn result_axis(&self, cumulative: bool) -> ReferenceAxis {
        if cumulative {
            self.store.axis().cumulative_offset()
        } else {
            *self.store.axis()
        }
    }

    /// One fractile curve per entry of `quantiles`, in the same order.
    pub fn fractiles(
        &self,
        selector: &Selector,
        quantiles: &[f64],
        cumulative: bool,
    ) -> Result<Vec<Curve>, QueryError> {
        for &q in quantiles {
            check_quantile(q)?;
        }
        self.check_total_weight()?;
        let rows = self.resolve_rows(selector, cumulative)?;
        let weights = self.store.weights();

        let per_bin = self.per_bin(|bin| {
            let mut samples: Vec<(f64, f64)> = rows
                .iter()
                .zip(weights)
                .map(|(row, &w)| (row[bin], w))
                .collect();
            let cdf = WeightedCdf::from_buffer(&mut samples)?;
            Ok(quantiles
                .iter()
                .map(|&q| cdf.quantile_unchecked(q, self.interpolation))
                .collect::<Vec<f64>>())
        })?;

        let axis = self.result_axis(cumulative);
        Ok((0..quantiles.len())
            .map(|i| {
                let values = per_bin.iter().map(|bin| bin[i]).collect();
                Curve::from_parts_unchecked(axis, values)
            })
            .collect())
    }

    /// Single fractile curve.
    pub fn fractile(
        &self,
        selector: &Selector,
        quantile: f64,
        cumulative: bool,
    ) -> Result<Curve, QueryError> {
        let mut curves = self.fractiles(selector, &[quantile], cumulative)?;
        Ok(curves.pop().unwrap_or_else(|| Curve::zeros(self.result_axis(cumulative))))
    }

    /// Execute a [`QuantileRequest`].
    pub fn request(&self, request: &QuantileRequest) -> Result<Vec<Curve>, QueryError> {
        self.fractiles(&request.selector, &request.quantiles, request.cumulative)
    }

    /// The resolved curve of every branch, in branch order.
    pub fn branch_curves(
        &self,
        selector: &Selector,
        cumulative: bool,
    ) -> Result<Vec<Curve>, QueryError> {
        let axis = self.result_axis(cumulative);
        Ok(self
            .resolve_rows(selector, cumulative)?
            .into_iter()
            .map(|row| Curve::from_parts_unchecked(axis, row))
            .collect())
    }

    /// Branch-weighted mean curve.
    pub fn mean(&self, selector: &Selector, cumulative: bool) -> Result<Curve, QueryError> {
        let summary = self.summary(selector, cumulative)?;
        Ok(Curve::from_parts_unchecked(
            self.result_axis(cumulative),
            summary.iter().map(|s| s.mean).collect(),
        ))
    }

    /// Per-bin weighted mean, standard deviation and range across branches.
    pub fn summary(
        &self,
        selector: &Selector,
        cumulative: bool,
    ) -> Result<Vec<BinSummary>, QueryError> {
        self.check_total_weight()?;
        let rows = self.resolve_rows(selector, cumulative)?;
        let weights = self.store.weights();

        self.per_bin(|bin| {
            let stats: WeightedMoments = rows
                .iter()
                .zip(weights)
                .map(|(row, &w)| (row[bin], w))
                .collect();
            Ok(BinSummary {
                mean: stats.mean(),
                std_dev: stats.std_dev(),
                min: stats.min().unwrap_or(0.0),
                max: stats.max().unwrap_or(0.0),
            })
        })
    }

    fn check_total_weight(&self) -> Result<(), QueryError> {
        let total_weight = self.store.total_weight();
        if total_weight.is_finite() && total_weight > 0.0 {
            Ok(())
        } else {
            Err(QueryError::DegenerateEnsemble { total_weight })
        }
    }

    /// Selector as `(dense entity index, weight)` pairs.
    fn resolve_selector(&self, selector: &Selector) -> Result<Vec<(usize, f64)>, QueryError> {
        let store = self.store;
        let resolved = match selector {
            Selector::Entity(entity) => vec![(store.resolve(*entity)?, 1.0)],
            Selector::Set(entities) => entities
                .iter()
                .map(|&entity| Ok((store.resolve(entity)?, 1.0)))
                .collect::<Result<Vec<_>, QueryError>>()?,
            Selector::Weighted(entities) => entities
                .iter()
                .map(|&(entity, weight)| {
                    if !(weight.is_finite() && weight >= 0.0) {
                        return Err(QueryError::InvalidEntityWeight { entity, weight });
                    }
                    Ok((store.resolve(entity)?, weight))
                })
                .collect::<Result<Vec<_>, QueryError>>()?,
            Selector::All => (0..store.num_entities()).map(|e| (e, 1.0)).collect(),
        };
        if resolved.is_empty() {
            return Err(QueryError::EmptySelector);
        }
        Ok(resolved)
    }

    /// One dense row per branch on the store axis, summed over the
    /// selection and optionally reverse-cumulated.
    fn resolve_rows(
        &self,
        selector: &Selector,
        cumulative: bool,
    ) -> Result<Vec<Vec<f64>>, QueryError> {
        let entities = self.resolve_selector(selector)?;
        let size = self.store.axis().size();
        Ok((0..self.store.num_branches())
            .map(|branch| {
                let mut row = vec![0.0; size];
                for &(entity, weight) in &entities {
                    if let Some(dist) = self.store.distribution(branch, entity) {
                        dist.add_scaled_into(&mut row, weight);
                    }
                }
                if cumulative {
                    reverse_cumulate(&mut row);
                }
                row
            })
            .collect())
    }

    #[cfg(not(feature = "parallel"))]
    fn per_bin<T, F>(&self, eval: F) -> Result<Vec<T>, QueryError>
    where
        F: Fn(usize) -> Result<T, QueryError>,
    {
        (0..self.store.axis().size()).map(eval).collect()
    }

    #[cfg(feature = "parallel")]
    fn per_bin<T, F>(&self, eval: F) -> Result<Vec<T>, QueryError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, QueryError> + Sync + Send,
    {
        use rayon::prelude::*;

        (0..self.store.axis().size())
            .into_par_iter()
            .map(eval)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::TrimmedDistribution;
    use crate::ensemble::{Branch, BranchId, EnsembleAccumulator, EntityIndex};
    use approx::assert_relative_eq;

    /// Three branches, one entity, final axis (2, 1, 3).
    fn scenario() -> EnsembleStore {
        let acc = EnsembleAccumulator::new(ReferenceAxis::new(0.0, 1.0, 5).unwrap());
        acc.process(Branch::new(1, 0.2), &[[0.0, 0.0, 3.0, 2.0, 0.0]])
            .unwrap();
        acc.process(Branch::new(2, 0.3), &[[0.0, 0.0, 0.0, 4.0, 1.0]])
            .unwrap();
        acc.process(Branch::new(3, 0.5), &[[0.0, 0.0, 2.0, 2.0, 2.0]])
            .unwrap();
        acc.finalize().unwrap()
    }

    /// Two branches, three entities with ids.
    fn multi() -> EnsembleStore {
        let acc = EnsembleAccumulator::new(ReferenceAxis::new(0.0, 1.0, 3).unwrap())
            .with_entity_index(EntityIndex::new(vec![10, 20, 30]).unwrap());
        acc.process(
            Branch::new(1, 1.0),
            &[[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 1.0, 1.0]],
        )
        .unwrap();
        acc.process(
            Branch::new(2, 3.0),
            &[[3.0, 0.0, 0.0], [0.0, 0.0, 4.0], [0.0, 0.0, 0.0]],
        )
        .unwrap();
        acc.finalize().unwrap()
    }

    fn entity(i: usize) -> Selector {
        Selector::Entity(EntityRef::Index(i))
    }

    #[test]
    fn test_scenario_median() {
        let store = scenario();
        let linear = store.fractiles(&entity(0), &[0.5], false).unwrap();
        assert_relative_eq!(linear[0].y(0), 0.8, epsilon = 1e-12);
        assert_eq!(linear[0].x(0), 2.0);

        let step = QuantileEngine::new(&store)
            .with_interpolation(Interpolation::Step)
            .fractiles(&entity(0), &[0.5], false)
            .unwrap();
        assert_eq!(step[0].y(0), 2.0);
        assert_eq!(step[0].y(1), 2.0);
    }

    #[test]
    fn test_extremes_are_bin_min_and_max() {
        let store = scenario();
        let curves = store.fractiles(&entity(0), &[0.0, 1.0], false).unwrap();
        assert_eq!(curves[0].values(), &[0.0, 2.0, 0.0]);
        assert_eq!(curves[1].values(), &[3.0, 4.0, 2.0]);
    }

    #[test]
    fn test_request_order_preserved() {
        let store = scenario();
        let request = QuantileRequest::new(EntityRef::Index(0), vec![1.0, 0.0, 0.5]);
        let curves = store.engine().request(&request).unwrap();
        assert_eq!(curves.len(), 3);
        assert_eq!(curves[0].y(1), 4.0);
        assert_eq!(curves[1].y(1), 2.0);
    }

    #[test]
    fn test_cumulative_axis_and_values() {
        let store = scenario();
        let engine = store.engine();
        let rows = engine.branch_curves(&entity(0), true).unwrap();
        assert_eq!(rows[0].values(), &[5.0, 2.0, 0.0]);
        assert_eq!(rows[0].x(0), 1.5);

        let max = engine.fractile(&entity(0), 1.0, true).unwrap();
        assert_eq!(max.axis().start(), 1.5);
        assert_eq!(max.values(), &[6.0, 5.0, 2.0]);
    }

    #[test]
    fn test_set_sums_before_quantiles() {
        let store = multi();
        let selector = Selector::Set(vec![EntityRef::Id(10), EntityRef::Id(20)]);
        let rows = store.engine().branch_curves(&selector, false).unwrap();
        assert_eq!(rows[0].values(), &[1.0, 2.0, 0.0]);
        assert_eq!(rows[1].values(), &[3.0, 0.0, 4.0]);

        let max = store.fractiles(&selector, &[1.0], false).unwrap();
        assert_eq!(max[0].values(), &[3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_weighted_and_all_selectors() {
        let store = multi();
        let weighted = Selector::Weighted(vec![(EntityRef::Index(0), 0.5), (EntityRef::Index(2), 2.0)]);
        let rows = store.engine().branch_curves(&weighted, false).unwrap();
        assert_eq!(rows[0].values(), &[2.5, 2.0, 2.0]);
        assert_eq!(rows[1].values(), &[1.5, 0.0, 0.0]);

        let all = store.engine().branch_curves(&Selector::All, false).unwrap();
        assert_eq!(all[1].values(), &[3.0, 0.0, 4.0]);
    }

    #[test]
    fn test_mean_and_summary() {
        let store = multi();
        let engine = store.engine();
        let mean = engine.mean(&Selector::Entity(EntityRef::Id(10)), false).unwrap();
        // (1 * 1 + 3 * 3) / 4
        assert_relative_eq!(mean.y(0), 2.5, epsilon = 1e-12);

        let summary = engine.summary(&Selector::Entity(EntityRef::Id(10)), false).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!((summary[0].min, summary[0].max), (1.0, 3.0));
        // sqrt((1 * 1.5^2 + 3 * 0.5^2) / 4)
        assert_relative_eq!(summary[0].std_dev, 0.75f64.sqrt(), epsilon = 1e-12);
        assert_eq!(summary[1].std_dev, 0.0);
    }

    #[test]
    fn test_query_errors() {
        let store = multi();
        let engine = store.engine();
        assert_eq!(
            engine.fractiles(&entity(0), &[0.5, 1.2], false),
            Err(QueryError::InvalidQuantile(1.2))
        );
        assert_eq!(
            engine.fractiles(&Selector::Entity(EntityRef::Id(99)), &[0.5], false),
            Err(QueryError::UnknownEntity(EntityRef::Id(99)))
        );
        assert_eq!(
            engine.fractiles(&entity(3), &[0.5], false),
            Err(QueryError::UnknownEntity(EntityRef::Index(3)))
        );
        assert_eq!(
            engine.fractiles(&Selector::Set(vec![]), &[0.5], false),
            Err(QueryError::EmptySelector)
        );
        assert!(matches!(
            engine.fractiles(
                &Selector::Weighted(vec![(EntityRef::Index(0), -1.0)]),
                &[0.5],
                false
            ),
            Err(QueryError::InvalidEntityWeight { .. })
        ));
    }

    #[test]
    fn test_zero_total_weight() {
        let axis = ReferenceAxis::new(0.0, 1.0, 2).unwrap();
        let store = EnsembleStore::from_parts(
            axis,
            vec![0.0, 0.0],
            vec![BranchId(1), BranchId(2)],
            vec![
                vec![TrimmedDistribution::trim(&[1.0, 0.0])],
                vec![TrimmedDistribution::trim(&[0.0, 2.0])],
            ],
            None,
        )
        .unwrap();
        assert_eq!(
            store.fractiles(&entity(0), &[0.5], false),
            Err(QueryError::DegenerateEnsemble { total_weight: 0.0 })
        );
        assert!(store.engine().summary(&entity(0), false).is_err());
    }

    #[test]
    fn test_zero_weight_branch_ignored() {
        let axis = ReferenceAxis::new(0.0, 1.0, 1).unwrap();
        let store = EnsembleStore::from_parts(
            axis,
            vec![1.0, 0.0],
            vec![BranchId(1), BranchId(2)],
            vec![
                vec![TrimmedDistribution::trim(&[1.0])],
                vec![TrimmedDistribution::trim(&[9.0])],
            ],
            None,
        )
        .unwrap();
        let max = store.fractiles(&entity(0), &[1.0], false).unwrap();
        assert_eq!(max[0].y(0), 1.0);
    }
}
