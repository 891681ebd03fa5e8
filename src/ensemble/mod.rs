//! Building and storing weighted branch ensembles
//!
//! Each branch of a logic tree yields one distribution per entity. The
//! [`EnsembleAccumulator`] takes those branches one at a time (from any number
//! of threads), keeps them trimmed, and on finalize produces an immutable
//! [`EnsembleStore`] on the smallest axis window that holds every non-zero
//! bin.
//!
//! # Example
//!
//! ```
//! use branchstats::distribution::ReferenceAxis;
//! use branchstats::ensemble::{Branch, EnsembleAccumulator, EntityIndex, EntityRef};
//!
//! let acc = EnsembleAccumulator::new(ReferenceAxis::new(6.05, 0.1, 10).unwrap())
//!     .with_entity_index(EntityIndex::new(vec![1042, 77]).unwrap());
//!
//! let mut a = vec![vec![0.0; 10]; 2];
//! a[0][3] = 1e-3;
//! a[1][4] = 2e-3;
//! acc.process(Branch::new(1, 0.6), &a).unwrap();
//!
//! let mut b = vec![vec![0.0; 10]; 2];
//! b[0][5] = 4e-3;
//! acc.process(Branch::new(2, 0.4), &b).unwrap();
//!
//! let store = acc.finalize().unwrap();
//! assert_eq!(store.axis().size(), 3);
//! let curve = store.dense(1, EntityRef::Id(1042)).unwrap();
//! assert_eq!(curve.values(), &[0.0, 0.0, 4e-3]);
//! ```

mod accumulator;
mod branch;
mod cache;
mod entity;
mod records;
mod store;

pub use accumulator::EnsembleAccumulator;
pub use branch::{Branch, BranchId};
pub use cache::BranchCache;
pub use entity::{EntityIndex, EntityRef};
pub use records::{BranchRecord, DistributionRecord, StoreHeader, StoreRecords};
pub use store::EnsembleStore;
