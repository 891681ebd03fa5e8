//! # Branchstats
//!
//! Weighted logic-tree ensembles of per-entity distributions, stored
//! compactly and queried for fractiles.
//!
//! A logic tree yields many weighted realizations ("branches") of one model.
//! Each branch produces a distribution per entity (a fault section, a parent
//! section, a region) on a shared evenly spaced axis. Branchstats collects
//! those distributions as they are computed, keeps only their non-zero
//! windows, and answers weighted fractile, mean and spread queries for any
//! entity or group of entities.
//!
//! ## Features
//!
//! - **Trimmed Storage**: Each distribution keeps only its non-zero window
//! - **Concurrent Accumulation**: Branches may be processed from many threads
//! - **Minimal Axis**: The finalized store covers exactly the populated bins
//! - **Compute-Once Cache**: Shared model evaluations run once per process
//! - **Weighted Fractiles**: Linear or step interpolation of the weighted CDF
//! - **Combined Selectors**: Sum entities per branch, then take statistics
//!
//! ## Quick Start
//!
//! ```rust
//! use branchstats::prelude::*;
//!
//! let working = ReferenceAxis::new(0.0, 1.0, 5).unwrap();
//! let acc = EnsembleAccumulator::new(working);
//!
//! acc.process(Branch::new(1, 0.2), &[[0.0, 0.0, 3.0, 2.0, 0.0]]).unwrap();
//! acc.process(Branch::new(2, 0.3), &[[0.0, 0.0, 0.0, 4.0, 1.0]]).unwrap();
//! acc.process(Branch::new(3, 0.5), &[[0.0, 0.0, 2.0, 2.0, 2.0]]).unwrap();
//!
//! let store = acc.finalize().unwrap();
//! assert_eq!(store.axis().start(), 2.0);
//!
//! let median = store
//!     .fractiles(&Selector::Entity(EntityRef::Index(0)), &[0.5], false)
//!     .unwrap();
//! println!("median at M{}: {}", median[0].x(0), median[0].y(0));
//! ```
//!
//! ## Plugging In a Model
//!
//! Raw distributions come from a [`DistributionProvider`](traits::DistributionProvider).
//! Sharing a [`BranchCache`](ensemble::BranchCache) between accumulators makes
//! each `(model, entity)` evaluation run only once:
//!
//! ```rust
//! use branchstats::prelude::*;
//!
//! let provider = FnProvider::new(2, |rate: &f64, entity, axis: &ReferenceAxis| {
//!     let mut raw = vec![0.0; axis.size()];
//!     raw[entity + 1] = *rate;
//!     Ok(raw)
//! });
//! let working = ReferenceAxis::new(6.05, 0.1, 8).unwrap();
//! let cache = BranchCache::new(working);
//!
//! let acc = EnsembleAccumulator::new(working);
//! acc.process_cached(Branch::new(1, 0.5), &provider, &1e-3, &"low", &cache).unwrap();
//! acc.process_cached(Branch::new(2, 0.5), &provider, &4e-3, &"high", &cache).unwrap();
//! assert_eq!(cache.computations(), 4);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: rayon fan-out for branch processing and per-bin evaluation
//! - `serde`: Serialize/Deserialize for value types, records and stores
//! - `full`: Enable everything

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod distribution;
pub mod ensemble;
pub mod error;
pub mod quantiles;
pub mod statistics;
pub mod traits;

pub mod prelude {
    pub use crate::distribution::{Curve, ReferenceAxis, TrimmedDistribution};
    pub use crate::ensemble::{
        Branch, BranchCache, BranchId, EnsembleAccumulator, EnsembleStore, EntityIndex, EntityRef,
    };
    pub use crate::error::Error;
    pub use crate::quantiles::{Interpolation, QuantileEngine, QuantileRequest, Selector};
    pub use crate::traits::*;
}

pub use distribution::{Curve, ReferenceAxis, TrimmedDistribution};
pub use ensemble::{EnsembleAccumulator, EnsembleStore};
pub use error::{Error, Result};
pub use quantiles::QuantileEngine;
