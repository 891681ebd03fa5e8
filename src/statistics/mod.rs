//! Weighted summary statistics
//!
//! Branch-weighted moments used for ensemble mean and spread curves.
//!
//! # Example
//!
//! ```
//! use branchstats::statistics::WeightedMoments;
//!
//! let stats: WeightedMoments = [(1.0, 0.5), (2.0, 0.25), (4.0, 0.25)].into_iter().collect();
//!
//! println!("Mean: {}", stats.mean());
//! println!("Stddev: {}", stats.std_dev());
//! println!("Min: {:?}", stats.min());
//! println!("Max: {:?}", stats.max());
//! ```

mod moments;

pub use moments::WeightedMoments;
