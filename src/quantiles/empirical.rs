//! Weighted empirical distribution at a single axis bin

use crate::error::QueryError;

/// How a fractile is read off the weighted empirical CDF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interpolation {
    /// Interpolate linearly between the two values whose cumulative
    /// probabilities bracket the quantile.
    #[default]
    Linear,
    /// Smallest value whose cumulative probability reaches the quantile.
    Step,
}

/// Normalized cumulative distribution of weighted samples.
///
/// Samples are sorted by value (ties keep their input order), identical
/// values are merged by summing their weights, zero-weight samples are
/// dropped and the cumulative weights are normalized so the last one is 1.
///
/// # Example
///
/// ```
/// use branchstats::quantiles::{Interpolation, WeightedCdf};
///
/// let cdf = WeightedCdf::new(&[(3.0, 0.2), (0.0, 0.3), (2.0, 0.5)]).unwrap();
/// assert_eq!(cdf.values(), &[0.0, 2.0, 3.0]);
///
/// assert_eq!(cdf.quantile(0.5, Interpolation::Step).unwrap(), 2.0);
/// assert!((cdf.quantile(0.5, Interpolation::Linear).unwrap() - 0.8).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedCdf {
    /// Distinct values, ascending
    values: Vec<f64>,
    /// Normalized cumulative probability at each value
    cumulative: Vec<f64>,
}

impl WeightedCdf {
    /// Build from `(value, weight)` samples.
    ///
    /// Fails with [`QueryError::DegenerateEnsemble`] when the weights do not
    /// add up to a finite positive total. Negative weights count as zero.
    pub fn new(samples: &[(f64, f64)]) -> Result<Self, QueryError> {
        let mut sorted = samples.to_vec();
        Self::from_buffer(&mut sorted)
    }

    /// Like [`new`](Self::new), sorting `samples` in place.
    pub fn from_buffer(samples: &mut [(f64, f64)]) -> Result<Self, QueryError> {
        // stable: equal values keep branch order
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut values: Vec<f64> = Vec::with_capacity(samples.len());
        let mut weights: Vec<f64> = Vec::with_capacity(samples.len());
        for &(value, weight) in samples.iter() {
            let weight = weight.max(0.0);
            match values.last() {
                Some(&last) if last == value => {
                    if let Some(w) = weights.last_mut() {
                        *w += weight;
                    }
                }
                _ => {
                    values.push(value);
                    weights.push(weight);
                }
            }
        }

        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(QueryError::DegenerateEnsemble {
                total_weight: total,
            });
        }

        let mut kept_values = Vec::with_capacity(values.len());
        let mut cumulative = Vec::with_capacity(values.len());
        let mut running = 0.0;
        for (value, weight) in values.into_iter().zip(weights) {
            if weight == 0.0 {
                continue;
            }
            running += weight;
            kept_values.push(value);
            cumulative.push(running / total);
        }

        Ok(Self {
            values: kept_values,
            cumulative,
        })
    }

    /// Distinct sample values, ascending.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Normalized cumulative probability at each value; the last is 1.
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: construction fails without positive weight.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest value.
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Largest value.
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Cumulative probability of the smallest value.
    pub fn min_probability(&self) -> f64 {
        self.cumulative.first().copied().unwrap_or(1.0)
    }

    /// Fractile at probability `q`.
    pub fn quantile(&self, q: f64, interpolation: Interpolation) -> Result<f64, QueryError> {
        check_quantile(q)?;
        Ok(self.quantile_unchecked(q, interpolation))
    }

    /// Interpolated median.
    pub fn median(&self) -> f64 {
        self.quantile_unchecked(0.5, Interpolation::Linear)
    }

    /// Weighted mean of the samples.
    pub fn mean(&self) -> f64 {
        let mut previous = 0.0;
        let mut sum = 0.0;
        for (&x, &c) in self.values.iter().zip(&self.cumulative) {
            sum += x * (c - previous);
            previous = c;
        }
        sum
    }

    /// `q` must already be within `[0, 1]`.
    pub(crate) fn quantile_unchecked(&self, q: f64, interpolation: Interpolation) -> f64 {
        match interpolation {
            Interpolation::Linear => self.linear(q),
            Interpolation::Step => self.step(q),
        }
    }

    fn linear(&self, q: f64) -> f64 {
        // normalized weight sums land a few ulps off the q they stand for
        // (0.3 / (0.3 + 0.1) < 0.75); single precision reads those as the minimum
        if q as f32 <= self.min_probability() as f32 {
            return self.min();
        }
        if q == 1.0 {
            return self.max();
        }
        // cumulative[0] < q here, so k >= 1
        match self.cumulative.iter().position(|&c| c >= q) {
            Some(k) if k > 0 => {
                let (c0, c1) = (self.cumulative[k - 1], self.cumulative[k]);
                let (x0, x1) = (self.values[k - 1], self.values[k]);
                if c1 > c0 {
                    x0 + (q - c0) / (c1 - c0) * (x1 - x0)
                } else {
                    x1
                }
            }
            Some(k) => self.values[k],
            None => self.max(),
        }
    }

    fn step(&self, q: f64) -> f64 {
        match self.cumulative.iter().position(|&c| c >= q) {
            Some(k) => self.values[k],
            None => self.max(),
        }
    }
}

/// Fail unless `q` lies in `[0, 1]`.
pub(crate) fn check_quantile(q: f64) -> Result<(), QueryError> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(QueryError::InvalidQuantile(q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario() -> WeightedCdf {
        WeightedCdf::new(&[(3.0, 0.2), (0.0, 0.3), (2.0, 0.5)]).unwrap()
    }

    #[test]
    fn test_sorted_and_normalized() {
        let cdf = scenario();
        assert_eq!(cdf.values(), &[0.0, 2.0, 3.0]);
        assert_relative_eq!(cdf.cumulative()[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(cdf.cumulative()[1], 0.8, epsilon = 1e-12);
        assert_relative_eq!(cdf.cumulative()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_median_step_and_linear() {
        let cdf = scenario();
        assert_eq!(cdf.quantile(0.5, Interpolation::Step).unwrap(), 2.0);
        assert_relative_eq!(
            cdf.quantile(0.5, Interpolation::Linear).unwrap(),
            0.8,
            epsilon = 1e-12
        );
        assert_relative_eq!(cdf.median(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_extremes() {
        let cdf = scenario();
        for mode in [Interpolation::Linear, Interpolation::Step] {
            assert_eq!(cdf.quantile(0.0, mode).unwrap(), 0.0);
            assert_eq!(cdf.quantile(1.0, mode).unwrap(), 3.0);
        }
        // at or below the first cumulative probability: minimum
        assert_eq!(cdf.quantile(0.3, Interpolation::Linear).unwrap(), 0.0);
    }

    #[test]
    fn test_rounded_first_probability_reads_minimum() {
        let cdf = WeightedCdf::new(&[(2.0, 0.3), (5.0, 0.1)]).unwrap();
        assert!(cdf.min_probability() < 0.75);
        assert_relative_eq!(cdf.min_probability(), 0.75, epsilon = 1e-12);
        assert_eq!(cdf.quantile(0.75, Interpolation::Linear).unwrap(), 2.0);
        assert!(cdf.quantile(0.76, Interpolation::Linear).unwrap() > 2.0);
    }

    #[test]
    fn test_identical_values_merge() {
        let cdf = WeightedCdf::new(&[(1.0, 0.25), (2.0, 0.25), (1.0, 0.5)]).unwrap();
        assert_eq!(cdf.values(), &[1.0, 2.0]);
        assert_relative_eq!(cdf.cumulative()[0], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_weights_dropped() {
        let cdf = WeightedCdf::new(&[(5.0, 0.0), (1.0, 1.0), (2.0, 1.0)]).unwrap();
        assert_eq!(cdf.values(), &[1.0, 2.0]);
        assert_eq!(cdf.max(), 2.0);
    }

    #[test]
    fn test_single_value() {
        let cdf = WeightedCdf::new(&[(4.0, 0.3), (4.0, 0.7)]).unwrap();
        assert_eq!(cdf.len(), 1);
        for q in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(cdf.quantile(q, Interpolation::Linear).unwrap(), 4.0);
            assert_eq!(cdf.quantile(q, Interpolation::Step).unwrap(), 4.0);
        }
    }

    #[test]
    fn test_degenerate_weights() {
        assert!(matches!(
            WeightedCdf::new(&[(1.0, 0.0), (2.0, 0.0)]),
            Err(QueryError::DegenerateEnsemble { .. })
        ));
        assert!(matches!(
            WeightedCdf::new(&[]),
            Err(QueryError::DegenerateEnsemble { .. })
        ));
    }

    #[test]
    fn test_invalid_quantile() {
        let cdf = scenario();
        assert_eq!(
            cdf.quantile(1.5, Interpolation::Linear),
            Err(QueryError::InvalidQuantile(1.5))
        );
        assert!(matches!(
            cdf.quantile(f64::NAN, Interpolation::Step),
            Err(QueryError::InvalidQuantile(_))
        ));
        assert!(cdf.quantile(-0.01, Interpolation::Step).is_err());
    }

    #[test]
    fn test_mean() {
        assert_relative_eq!(scenario().mean(), 1.6, epsilon = 1e-12);
    }
}
