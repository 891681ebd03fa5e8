//! Dense curves on a reference axis
//!
//! Fractile and summary queries hand their results back as [`Curve`]s: one
//! y value per axis bin, paired with the axis x values.

use crate::distribution::ReferenceAxis;
use crate::error::DistributionError;

/// Dense y values over a [`ReferenceAxis`].
///
/// Incremental curves live on the store axis (x = bin center); cumulative
/// curves live on its [`cumulative_offset`](ReferenceAxis::cumulative_offset)
/// variant (x = bin lower edge).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Curve {
    axis: ReferenceAxis,
    values: Vec<f64>,
}

impl Curve {
    /// Pair `values` with `axis`; the lengths must agree.
    pub fn new(axis: ReferenceAxis, values: Vec<f64>) -> Result<Self, DistributionError> {
        if values.len() != axis.size() {
            return Err(DistributionError::OutOfAxis {
                offset: 0,
                len: values.len(),
                axis_size: axis.size(),
            });
        }
        Ok(Self { axis, values })
    }

    /// All-zero curve over `axis`.
    pub fn zeros(axis: ReferenceAxis) -> Self {
        let values = vec![0.0; axis.size()];
        Self { axis, values }
    }

    pub(crate) fn from_parts_unchecked(axis: ReferenceAxis, values: Vec<f64>) -> Self {
        debug_assert_eq!(axis.size(), values.len());
        Self { axis, values }
    }

    /// The x axis.
    pub fn axis(&self) -> &ReferenceAxis {
        &self.axis
    }

    /// The y values, one per bin.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the curve, returning its y values.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; axes hold at least one bin.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// x value of point `i`.
    pub fn x(&self, i: usize) -> f64 {
        self.axis.value(i)
    }

    /// y value of point `i`.
    pub fn y(&self, i: usize) -> f64 {
        self.values[i]
    }

    /// `(x, y)` pairs in axis order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (f64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, &y)| (self.axis.value(i), y))
    }

    /// Sum of all y values.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Reverse-cumulative form: point `i` holds the sum of points `i..`,
    /// placed on the half-bin-shifted axis.
    pub fn to_cumulative(&self) -> Curve {
        let mut values = self.values.clone();
        reverse_cumulate(&mut values);
        Curve {
            axis: self.axis.cumulative_offset(),
            values,
        }
    }
}

/// In place, replace `values[i]` with `values[i..].sum()`.
pub fn reverse_cumulate(values: &mut [f64]) {
    let mut running = 0.0;
    for v in values.iter_mut().rev() {
        running += *v;
        *v = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(size: usize) -> ReferenceAxis {
        ReferenceAxis::new(5.05, 0.1, size).unwrap()
    }

    #[test]
    fn test_new_checks_length() {
        assert!(Curve::new(axis(3), vec![1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            Curve::new(axis(3), vec![1.0]),
            Err(DistributionError::OutOfAxis {
                offset: 0,
                len: 1,
                axis_size: 3
            })
        );
    }

    #[test]
    fn test_reverse_cumulate() {
        let mut values = [1.0, 0.0, 2.0, 3.0];
        reverse_cumulate(&mut values);
        assert_eq!(values, [6.0, 5.0, 5.0, 3.0]);

        let mut empty: [f64; 0] = [];
        reverse_cumulate(&mut empty);
    }

    #[test]
    fn test_to_cumulative_shifts_axis() {
        let curve = Curve::new(axis(3), vec![1.0, 2.0, 4.0]).unwrap();
        let cml = curve.to_cumulative();
        assert_eq!(cml.values(), &[7.0, 6.0, 4.0]);
        assert!((cml.x(0) - 5.0).abs() < 1e-12);
        assert!((cml.axis().delta() - 0.1).abs() < 1e-15);
        assert_eq!(curve.sum(), cml.y(0));
    }

    #[test]
    fn test_iter_pairs() {
        let curve = Curve::new(ReferenceAxis::new(0.0, 2.0, 3).unwrap(), vec![1.0, 2.0, 3.0])
            .unwrap();
        let pairs: Vec<(f64, f64)> = curve.iter().collect();
        assert_eq!(pairs, vec![(0.0, 1.0), (2.0, 2.0), (4.0, 3.0)]);
        assert_eq!(curve.len(), 3);
        assert!(!curve.is_empty());
        assert_eq!(Curve::zeros(axis(2)).into_values(), vec![0.0, 0.0]);
    }
}
