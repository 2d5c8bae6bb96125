//! Frequency estimation algorithms
//!
//! This module provides sketches for estimating item frequencies in a data
//! stream.
//!
//! # Algorithms
//!
//! - [`CountMinSketch`]: Classic count-min sketch with optional conservative update
//!
//! # Example
//!
//! ```
//! use streamsketch::frequency::CountMinSketch;
//!
//! let mut cms = CountMinSketch::new(0.01, 0.001).unwrap(); // 1% error, 0.1% probability
//!
//! cms.add("item1", 5);
//! cms.add("item2", 3);
//!
//! let count = cms.estimate("item1");
//! assert!(count >= 5);
//! ```

mod count_min;

pub use count_min::{CountMinSketch, MAX_COUNTERS};

pub(crate) use count_min::dimensions_for;
