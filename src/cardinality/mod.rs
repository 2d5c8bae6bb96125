//! Cardinality (distinct count) estimation algorithms
//!
//! This module provides implementations of sketches for estimating the number
//! of distinct elements in a data stream.
//!
//! # Algorithms
//!
//! - [`HyperLogLog`]: The classic HLL algorithm with range corrections
//! - [`HyperLogLogPlusPlus`]: HLL with a sparse representation for small cardinalities
//!
//! # Example
//!
//! ```
//! use streamsketch::cardinality::HyperLogLog;
//! use streamsketch::traits::CardinalitySketch;
//!
//! let mut hll = HyperLogLog::new(14).unwrap(); // ~0.8% error
//!
//! for i in 0..10000 {
//!     hll.add(&i.to_string());
//! }
//!
//! let estimate = hll.count();
//! println!("estimated distinct count: {}", estimate);
//! ```

mod hyperloglog;
mod hyperloglog_plus;

pub use hyperloglog::{HyperLogLog, MAX_PRECISION, MIN_PRECISION};
pub use hyperloglog_plus::HyperLogLogPlusPlus;

pub(crate) use hyperloglog::validate_precision;

use crate::traits::ConfigError;

/// Compute the required precision for a target error rate
///
/// HLL error is approximately 1.04 / sqrt(2^p). The result is clamped to the
/// supported precision range.
pub fn precision_for_error(target_error: f64) -> Result<u8, ConfigError> {
    if !(target_error.is_finite() && target_error > 0.0) {
        return Err(ConfigError::InvalidTargetError(target_error));
    }

    // m = (1.04 / error)^2, p = log2(m)
    let m = (1.04 / target_error).powi(2);
    let p = m.log2().ceil().clamp(MIN_PRECISION as f64, MAX_PRECISION as f64);
    Ok(p as u8)
}

/// Compute the dense memory usage for a given precision
pub fn memory_for_precision(precision: u8) -> usize {
    1usize << precision
}

/// Compute the expected error for a given precision
pub fn error_for_precision(precision: u8) -> f64 {
    let m = (1usize << precision) as f64;
    1.04 / m.sqrt()
}
