//! Weighted running statistics (mean, variance, min, max)
//!
//! Weighted generalization of Welford's online algorithm (West, 1979).
//! Supports merging, so per-chunk statistics computed on different threads
//! can be combined.

/// Weighted running mean, variance and range.
///
/// Weights act as frequency weights: adding a value with weight 2 is the
/// same as adding it twice with weight 1. The variance is the population
/// variance `sum(w * (x - mean)^2) / sum(w)`, which is what a branch-weighted
/// ensemble wants: the weights are the probabilities of the branches, not a
/// sample size.
///
/// # Example
///
/// ```
/// use branchstats::statistics::WeightedMoments;
///
/// let mut stats = WeightedMoments::new();
/// stats.add(1.0, 0.2);
/// stats.add(3.0, 0.8);
///
/// assert!((stats.mean() - 2.6).abs() < 1e-12);
/// assert!((stats.variance() - 0.64).abs() < 1e-12);
/// assert_eq!(stats.min(), Some(1.0));
/// assert_eq!(stats.max(), Some(3.0));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedMoments {
    /// Number of values with positive weight
    count: u64,
    /// Sum of weights
    weight_sum: f64,
    /// Running weighted mean
    mean: f64,
    /// Weighted sum of squared differences from the mean
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for WeightedMoments {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedMoments {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            weight_sum: 0.0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add `value` with `weight`.
    ///
    /// NaN values and weights that are not finite and positive are ignored.
    pub fn add(&mut self, value: f64, weight: f64) {
        if value.is_nan() || !(weight.is_finite() && weight > 0.0) {
            return;
        }

        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        self.weight_sum += weight;
        let delta = value - self.mean;
        self.mean += delta * weight / self.weight_sum;
        self.m2 += weight * delta * (value - self.mean);
    }

    /// Number of values added with positive weight.
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Whether nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sum of weights.
    pub fn total_weight(&self) -> f64 {
        self.weight_sum
    }

    /// Weighted mean, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Weighted population variance, 0 when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            // rounding can leave a tiny negative residue
            (self.m2 / self.weight_sum).max(0.0)
        }
    }

    /// Weighted population standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Smallest value added.
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest value added.
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Combine with statistics gathered elsewhere (Chan et al. pairwise update).
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let total = self.weight_sum + other.weight_sum;
        let delta = other.mean - self.mean;
        self.mean += delta * other.weight_sum / total;
        self.m2 += other.m2 + delta * delta * self.weight_sum * other.weight_sum / total;
        self.weight_sum = total;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Reset to empty.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Extend<(f64, f64)> for WeightedMoments {
    fn extend<I: IntoIterator<Item = (f64, f64)>>(&mut self, iter: I) {
        for (value, weight) in iter {
            self.add(value, weight);
        }
    }
}

impl FromIterator<(f64, f64)> for WeightedMoments {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.extend(iter);
        stats
    }
}
