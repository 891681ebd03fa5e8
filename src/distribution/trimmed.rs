//! Trimmed (offset-encoded) distribution storage
//!
//! Most per-entity distributions are non-zero over a narrow band of the axis.
//! Storing only that band plus the index of its first bin keeps ensembles of
//! thousands of branches by thousands of entities small.

use std::sync::Arc;

use crate::error::DistributionError;

/// One entity's distribution for one branch, stored as the contiguous window
/// between its first and last non-zero bin.
///
/// The values are held in a shared slice, so cloning a distribution (or
/// re-expressing it against another axis origin) never copies them.
///
/// # Example
///
/// ```
/// use branchstats::distribution::TrimmedDistribution;
///
/// let dense = [0.0, 0.0, 3.0, 0.0, 2.0, 0.0];
/// let trimmed = TrimmedDistribution::trim(&dense);
/// assert_eq!(trimmed.offset(), 2);
/// assert_eq!(trimmed.values(), &[3.0, 0.0, 2.0]);
/// assert_eq!(trimmed.expand(dense.len()).unwrap(), dense.to_vec());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "TrimmedParts", into = "TrimmedParts")
)]
pub struct TrimmedDistribution {
    /// Index of `values[0]` on the axis the distribution is stored against
    offset: usize,
    values: Arc<[f64]>,
}

impl Default for TrimmedDistribution {
    fn default() -> Self {
        Self::empty()
    }
}

impl TrimmedDistribution {
    /// A distribution that is zero everywhere.
    pub fn empty() -> Self {
        Self {
            offset: 0,
            values: Arc::from(Vec::new()),
        }
    }

    /// Trim a dense array to its non-zero window.
    ///
    /// Returns an empty distribution when every value is zero. Values are
    /// copied as is, so [`expand`](Self::expand) restores `dense` exactly
    /// only when every value is finite and non-negative; run
    /// [`validate_values`] first when they come from an untrusted source.
    pub fn trim(dense: &[f64]) -> Self {
        let first = dense.iter().position(|&v| v != 0.0);
        let last = dense.iter().rposition(|&v| v != 0.0);
        match (first, last) {
            (Some(first), Some(last)) => Self {
                offset: first,
                values: Arc::from(&dense[first..=last]),
            },
            _ => Self::empty(),
        }
    }

    /// Build a distribution from an already trimmed window.
    ///
    /// Values must be finite and non-negative, and must not start or end
    /// with zero. An empty `values` yields the empty distribution regardless
    /// of `offset`. A window reaching past `usize::MAX` fails with
    /// [`DistributionError::OutOfAxis`].
    pub fn from_parts(offset: usize, values: Vec<f64>) -> Result<Self, DistributionError> {
        if values.is_empty() {
            return Ok(Self::empty());
        }
        validate_values(&values)?;
        if values[0] == 0.0 || values[values.len() - 1] == 0.0 {
            return Err(DistributionError::Untrimmed);
        }
        if offset.checked_add(values.len()).is_none() {
            return Err(DistributionError::OutOfAxis {
                offset,
                len: values.len(),
                axis_size: usize::MAX,
            });
        }
        Ok(Self {
            offset,
            values: Arc::from(values),
        })
    }

    /// Index of the first stored value on the storage axis. Meaningless
    /// (always zero) for an empty distribution.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Stored values, first to last non-zero bin inclusive.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the distribution is zero everywhere.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First non-zero bin on the storage axis.
    pub fn first_bin(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.offset)
        }
    }

    /// Last non-zero bin on the storage axis.
    pub fn last_bin(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.end() - 1)
        }
    }

    /// One past the last stored bin (the offset for an empty distribution).
    /// Saturates at `usize::MAX`.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.values.len())
    }

    /// Value at `bin` of the storage axis, zero outside the window.
    #[inline]
    pub fn get(&self, bin: usize) -> f64 {
        bin.checked_sub(self.offset)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum over all bins.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Check that the window fits an axis of `axis_size` bins.
    pub fn check_fits(&self, axis_size: usize) -> Result<(), DistributionError> {
        if self.is_empty() {
            return Ok(());
        }
        match self.offset.checked_add(self.values.len()) {
            Some(end) if end <= axis_size => Ok(()),
            _ => Err(DistributionError::OutOfAxis {
                offset: self.offset,
                len: self.values.len(),
                axis_size,
            }),
        }
    }

    /// Expand back to a dense array of `size` bins, zero-filled outside the
    /// window.
    pub fn expand(&self, size: usize) -> Result<Vec<f64>, DistributionError> {
        self.check_fits(size)?;
        let mut dense = vec![0.0; size];
        self.add_scaled_into(&mut dense, 1.0);
        Ok(dense)
    }

    /// Add `scale * value` into `dense` for every stored bin. Bins past the
    /// end of `dense` are ignored.
    #[inline]
    pub fn add_scaled_into(&self, dense: &mut [f64], scale: f64) {
        for (slot, &v) in dense.iter_mut().skip(self.offset).zip(self.values.iter()) {
            if v > 0.0 {
                *slot += v * scale;
            }
        }
    }

    /// Re-express the window against an axis whose first bin is bin
    /// `origin` of the current storage axis.
    pub fn rebased(&self, origin: usize) -> Result<Self, DistributionError> {
        if self.is_empty() {
            return Ok(Self::empty());
        }
        let offset = self
            .offset
            .checked_sub(origin)
            .ok_or(DistributionError::NegativeOffset {
                offset: self.offset,
                origin,
            })?;
        Ok(Self {
            offset,
            values: Arc::clone(&self.values),
        })
    }

    /// Re-express the window against an axis starting `by` bins earlier.
    /// The offset saturates, so an overflowing shift fails
    /// [`check_fits`](Self::check_fits) on any axis.
    pub fn shifted(&self, by: usize) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        Self {
            offset: self.offset.saturating_add(by),
            values: Arc::clone(&self.values),
        }
    }

    /// Approximate heap plus inline footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.values.len() * core::mem::size_of::<f64>()
    }
}

/// Check that every value is finite and non-negative.
pub fn validate_values(values: &[f64]) -> Result<(), DistributionError> {
    match values
        .iter()
        .position(|v| !(v.is_finite() && *v >= 0.0))
    {
        Some(bin) => Err(DistributionError::InvalidValue {
            bin,
            value: values[bin],
        }),
        None => Ok(()),
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct TrimmedParts {
    offset: usize,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<TrimmedParts> for TrimmedDistribution {
    type Error = DistributionError;

    fn try_from(parts: TrimmedParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts.offset, parts.values)
    }
}

#[cfg(feature = "serde")]
impl From<TrimmedDistribution> for TrimmedParts {
    fn from(dist: TrimmedDistribution) -> Self {
        Self {
            offset: dist.offset,
            values: dist.values.to_vec(),
        }
    }
}
