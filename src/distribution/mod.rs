//! Distribution primitives
//!
//! The building blocks every ensemble shares:
//!
//! - [`ReferenceAxis`]: evenly spaced axis mapping bin indices to values
//! - [`TrimmedDistribution`]: one (branch, entity) distribution stored as its
//!   non-zero window plus an offset
//! - [`Curve`]: dense y values on an axis, as returned by queries
//!
//! # Example
//!
//! ```
//! use branchstats::distribution::{ReferenceAxis, TrimmedDistribution};
//!
//! let axis = ReferenceAxis::new(0.0, 1.0, 5).unwrap();
//! let dist = TrimmedDistribution::trim(&[0.0, 0.0, 3.0, 2.0, 0.0]);
//!
//! assert_eq!(dist.offset(), 2);
//! assert_eq!(dist.expand(axis.size()).unwrap(), vec![0.0, 0.0, 3.0, 2.0, 0.0]);
//! ```

mod axis;
mod curve;
mod trimmed;

pub use axis::ReferenceAxis;
pub use curve::{reverse_cumulate, Curve};
pub use trimmed::{validate_values, TrimmedDistribution};
