//! # Streamsketch
//!
//! Mergeable probabilistic sketches for stream analytics.
//!
//! Streamsketch answers approximate questions about data streams in bounded
//! memory: how many distinct items, how often an item occurred, and what the
//! value at a given percentile is.
//!
//! ## Features
//!
//! - **Cardinality Estimation**: Count distinct elements with HyperLogLog and HyperLogLog++
//! - **Frequency Estimation**: Track item frequencies with Count-Min Sketch
//! - **Quantile Estimation**: Compute percentiles with t-digest
//! - **Full Mergeability**: All sketches combine shards through `merge`
//! - **Error Bounds**: Formal guarantees on approximation accuracy
//!
//! ## Quick Start
//!
//! ```rust
//! use streamsketch::prelude::*;
//!
//! // Count distinct users
//! let mut hll = HyperLogLogPlusPlus::new(14).unwrap();
//! for user_id in ["alice", "bob", "charlie", "alice"] {
//!     hll.add(user_id);
//! }
//! assert_eq!(hll.count(), 3);
//!
//! // Track request counts per endpoint
//! let mut cms = CountMinSketch::new(0.01, 0.01).unwrap();
//! cms.add("/login", 3);
//! assert!(cms.estimate("/login") >= 3);
//!
//! // Latency percentiles
//! let mut digest = TDigest::new(100).unwrap();
//! for ms in 1..=100 {
//!     digest.add(ms as f64);
//! }
//! assert_eq!(digest.quantile(1.0), 100.0);
//! ```
//!
//! ## Distributed Computing
//!
//! All sketches implement the [`Sketch`](traits::Sketch) trait which includes
//! a `merge` operation, allowing sketches to be combined across distributed workers:
//!
//! ```rust
//! use streamsketch::cardinality::HyperLogLog;
//! use streamsketch::traits::{CardinalitySketch, Sketch};
//!
//! let mut worker1 = HyperLogLog::new(14).unwrap();
//! let mut worker2 = HyperLogLog::new(14).unwrap();
//!
//! // Each worker processes its partition
//! worker1.add("user_a");
//! worker2.add("user_b");
//!
//! // Merge results into a fresh sketch
//! let combined = worker1.merge(&worker2).unwrap();
//! assert_eq!(combined.count(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! Algorithm families (pick what you need):
//! - `cardinality` (default): HyperLogLog and HyperLogLog++ for distinct counting
//! - `frequency` (default): Count-Min Sketch
//! - `quantiles` (default): t-digest for percentiles
//! - `full`: Enable all algorithm families and serialization
//!
//! Platform features:
//! - `serde`: Enable serialization of sketches and configs
//!
//! ## Logging
//!
//! Rare state changes (the HyperLogLog++ sparse to dense transition, rejected
//! merges, t-digest compression passes) are reported through [`tracing`].
//! The crate never installs a subscriber.

#![cfg_attr(docsrs, feature(doc_cfg))]

// Core traits always available
pub mod config;
pub mod hash;
pub mod traits;

#[cfg(feature = "cardinality")]
#[cfg_attr(docsrs, doc(cfg(feature = "cardinality")))]
pub mod cardinality;

#[cfg(feature = "frequency")]
#[cfg_attr(docsrs, doc(cfg(feature = "frequency")))]
pub mod frequency;

#[cfg(feature = "quantiles")]
#[cfg_attr(docsrs, doc(cfg(feature = "quantiles")))]
pub mod quantiles;

pub mod prelude {
    //! Common imports: every sketch type and trait.
    pub use crate::traits::*;

    #[cfg(feature = "cardinality")]
    pub use crate::cardinality::{HyperLogLog, HyperLogLogPlusPlus};

    #[cfg(feature = "frequency")]
    pub use crate::frequency::CountMinSketch;

    #[cfg(feature = "quantiles")]
    pub use crate::quantiles::TDigest;
}

#[cfg(feature = "cardinality")]
pub use cardinality::{HyperLogLog, HyperLogLogPlusPlus};

#[cfg(feature = "frequency")]
pub use frequency::CountMinSketch;

#[cfg(feature = "quantiles")]
pub use quantiles::TDigest;

pub use traits::{ConfigError, MergeError};
