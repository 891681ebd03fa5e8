//! Weighted fractiles across an ensemble
//!
//! At every axis bin each branch contributes one value, weighted by its
//! branch weight. [`WeightedCdf`] turns those samples into a normalized
//! empirical CDF; [`QuantileEngine`] repeats that across the axis and returns
//! one [`Curve`](crate::distribution::Curve) per requested quantile.
//!
//! # Example
//!
//! ```
//! use branchstats::distribution::ReferenceAxis;
//! use branchstats::ensemble::{Branch, EnsembleAccumulator, EntityRef};
//! use branchstats::quantiles::Selector;
//!
//! let acc = EnsembleAccumulator::new(ReferenceAxis::new(0.0, 1.0, 3).unwrap());
//! acc.process(Branch::new(1, 0.5), &[[1.0, 2.0, 0.0]]).unwrap();
//! acc.process(Branch::new(2, 0.5), &[[3.0, 0.0, 1.0]]).unwrap();
//! let store = acc.finalize().unwrap();
//!
//! let curves = store
//!     .fractiles(&Selector::Entity(EntityRef::Index(0)), &[0.0, 0.5, 1.0], false)
//!     .unwrap();
//! assert_eq!(curves[0].values(), &[1.0, 0.0, 0.0]);
//! assert_eq!(curves[2].values(), &[3.0, 2.0, 1.0]);
//! ```

mod empirical;
mod engine;

pub use empirical::{Interpolation, WeightedCdf};
pub use engine::{BinSummary, QuantileEngine, QuantileRequest, Selector};
