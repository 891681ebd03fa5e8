//! Evenly spaced reference axis
//!
//! Every distribution in an ensemble is expressed against one shared axis:
//! bin `i` is centered on `start + i * delta` and covers the half-open
//! interval `[center - delta/2, center + delta/2)`.

use crate::error::AxisError;

/// Relative tolerance (in units of `delta`) used when deciding whether two
/// axes share bin boundaries.
const ALIGNMENT_TOLERANCE: f64 = 1e-6;

/// Immutable evenly spaced axis defined by its first bin center, bin width
/// and bin count.
///
/// # Example
///
/// ```
/// use branchstats::distribution::ReferenceAxis;
///
/// let axis = ReferenceAxis::new(5.05, 0.1, 30).unwrap();
/// assert_eq!(axis.bin(5.25), 2);
/// assert!((axis.value(2) - 5.25).abs() < 1e-12);
/// // out-of-range values clamp to the edge bins
/// assert_eq!(axis.bin(100.0), 29);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "AxisParts"))]
pub struct ReferenceAxis {
    start: f64,
    delta: f64,
    size: usize,
}

impl ReferenceAxis {
    /// Create an axis from its first bin center, bin width and bin count.
    ///
    /// Fails if `start` is not finite, `delta` is not finite and positive,
    /// or `size` is zero.
    pub fn new(start: f64, delta: f64, size: usize) -> Result<Self, AxisError> {
        if !start.is_finite() {
            return Err(AxisError::NonFiniteStart(start));
        }
        if !(delta.is_finite() && delta > 0.0) {
            return Err(AxisError::InvalidDelta(delta));
        }
        if size == 0 {
            return Err(AxisError::Empty);
        }
        Ok(Self { start, delta, size })
    }

    /// Oversized magnitude axis wide enough for any realistic rupture:
    /// bin centers M0.05 through M11.95 in steps of 0.1.
    ///
    /// Accumulators built on this axis shrink it to the populated window on
    /// finalize.
    pub fn magnitude_working_axis() -> Self {
        Self {
            start: 0.05,
            delta: 0.1,
            size: 120,
        }
    }

    /// Center of the first bin.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Bin width.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of bins.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Center of bin `index`. Indices past the end extrapolate linearly.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.start + index as f64 * self.delta
    }

    /// Center of the last bin.
    pub fn max_value(&self) -> f64 {
        self.value(self.size - 1)
    }

    /// Lower edge of the first bin.
    pub fn lower_edge(&self) -> f64 {
        self.start - 0.5 * self.delta
    }

    /// Upper edge of the last bin.
    pub fn upper_edge(&self) -> f64 {
        self.max_value() + 0.5 * self.delta
    }

    /// Bin index for `value`: `round((value - start) / delta)`, clamped to
    /// `[0, size)`.
    #[inline]
    pub fn bin(&self, value: f64) -> usize {
        let raw = ((value - self.start) / self.delta).round();
        if raw.is_nan() || raw <= 0.0 {
            0
        } else if raw >= (self.size - 1) as f64 {
            self.size - 1
        } else {
            raw as usize
        }
    }

    /// Bin index for `value`, or `None` when the value falls outside the
    /// axis edges.
    pub fn checked_bin(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.lower_edge() || value >= self.upper_edge() {
            return None;
        }
        Some(self.bin(value))
    }

    /// Whether `value` lies within `[lower_edge, upper_edge]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_edge() && value <= self.upper_edge()
    }

    /// Sub-axis of `size` bins whose first bin is bin `first` of this axis.
    pub fn window(&self, first: usize, size: usize) -> Result<Self, AxisError> {
        if size == 0 {
            return Err(AxisError::Empty);
        }
        match first.checked_add(size) {
            Some(end) if end <= self.size => Self::new(self.value(first), self.delta, size),
            _ => Err(AxisError::WindowOutOfRange {
                first,
                size,
                axis_size: self.size,
            }),
        }
    }

    /// The same bins shifted down by half a bin, so each x value is the lower
    /// edge of its bin. Reverse-cumulative curves live on this axis: bin `i`
    /// holds everything at or above its x value.
    pub fn cumulative_offset(&self) -> Self {
        Self {
            start: self.lower_edge(),
            delta: self.delta,
            size: self.size,
        }
    }

    /// Offset of `other`'s first bin within this axis, if `other` has the
    /// same bin width, starts on one of this axis's bin centers and fits
    /// entirely inside it.
    pub fn aligned_offset(&self, other: &ReferenceAxis) -> Option<usize> {
        let tolerance = ALIGNMENT_TOLERANCE * self.delta;
        if (self.delta - other.delta).abs() > tolerance {
            return None;
        }
        let steps = (other.start - self.start) / self.delta;
        let rounded = steps.round();
        if rounded < 0.0 || (steps - rounded).abs() * self.delta > tolerance {
            return None;
        }
        let offset = rounded as usize;
        match offset.checked_add(other.size) {
            Some(end) if end <= self.size => Some(offset),
            _ => None,
        }
    }

    /// Iterator over the bin centers.
    pub fn values(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        (0..self.size).map(move |i| self.value(i))
    }
}

impl core::fmt::Display for ReferenceAxis {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "axis(start={}, delta={}, size={})",
            self.start, self.delta, self.size
        )
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct AxisParts {
    start: f64,
    delta: f64,
    size: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<AxisParts> for ReferenceAxis {
    type Error = AxisError;

    fn try_from(parts: AxisParts) -> Result<Self, Self::Error> {
        Self::new(parts.start, parts.delta, parts.size)
    }
}
