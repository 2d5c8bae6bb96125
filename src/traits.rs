//! Core traits and error types shared by every sketch
//!
//! All sketches implement the base [`Sketch`] trait, with specialized traits
//! for each algorithm family (cardinality, frequency, quantiles).

use core::fmt::Debug;
use thiserror::Error;

/// Error returned when a sketch is built with malformed parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// HyperLogLog precision outside the supported range
    #[error("precision must be between {min} and {max}, got {precision}")]
    InvalidPrecision { precision: u8, min: u8, max: u8 },
    /// Target relative error is not a finite positive number
    #[error("target error must be finite and positive, got {0}")]
    InvalidTargetError(f64),
    /// Count-Min epsilon outside (0, 1), or too small for a bounded table
    #[error("epsilon must be in (0, 1) and give a bounded table width, got {0}")]
    InvalidEpsilon(f64),
    /// Count-Min delta outside (0, 1)
    #[error("delta must be in (0, 1), got {0}")]
    InvalidDelta(f64),
    /// Count-Min table with a zero dimension or too many counters
    #[error("width and depth must be positive with a bounded counter total, got {width}x{depth}")]
    InvalidDimensions { width: usize, depth: usize },
    /// t-digest compression of zero or above the supported maximum
    #[error("compression must be between 1 and 1048576, got {0}")]
    InvalidCompression(usize),
}

/// Error during sketch merge operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Sketches have incompatible configurations
    #[error("incompatible config: expected {expected}, found {found}")]
    IncompatibleConfig { expected: String, found: String },
    /// Sketches have the same shape but hash rows with different seeds
    #[error("hash seeds differ between sketches")]
    SeedMismatch,
}

impl MergeError {
    pub(crate) fn incompatible(kind: &'static str, expected: String, found: String) -> Self {
        tracing::debug!(sketch = kind, %expected, %found, "rejecting merge of incompatible sketches");
        MergeError::IncompatibleConfig { expected, found }
    }
}

/// Error bounds for a sketch estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBounds {
    /// Lower bound of the estimate
    pub lower: f64,
    /// Point estimate
    pub estimate: f64,
    /// Upper bound of the estimate
    pub upper: f64,
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence: f64,
}

impl ErrorBounds {
    /// Create new error bounds
    pub fn new(lower: f64, estimate: f64, upper: f64, confidence: f64) -> Self {
        Self {
            lower,
            estimate,
            upper,
            confidence,
        }
    }

    /// Check if a value falls within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Width of the confidence interval
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Relative width (width / estimate)
    pub fn relative_width(&self) -> f64 {
        if self.estimate == 0.0 {
            0.0
        } else {
            self.width() / self.estimate
        }
    }
}

/// Core trait for all streaming sketches
///
/// Merging has value semantics: [`Sketch::merge`] reads both inputs and
/// returns a fresh sketch. [`Sketch::merge_from`] is the in-place form used
/// when folding many shards into one accumulator.
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add a single occurrence of an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// Returns an error, leaving `self` untouched, if the sketches are incompatible.
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Combine two sketches into a new one without modifying either input
    fn merge(&self, other: &Self) -> Result<Self, MergeError> {
        let mut merged = self.clone();
        merged.merge_from(other)?;
        Ok(merged)
    }

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of update calls observed (including those absorbed through merges)
    fn updates(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.updates() == 0
    }
}

/// Cardinality (distinct count) estimation sketches
pub trait CardinalitySketch: Sketch {
    /// Estimate number of distinct items seen
    fn estimate(&self) -> f64;

    /// Estimated distinct count rounded to an integer
    fn count(&self) -> u64 {
        let estimate = self.estimate();
        if estimate.is_finite() && estimate > 0.0 {
            estimate.round() as u64
        } else {
            0
        }
    }

    /// Get error bounds at given confidence level (0.0 to 1.0)
    fn error_bounds(&self, confidence: f64) -> ErrorBounds {
        let estimate = self.estimate();
        let margin = z_score(confidence) * self.relative_error() * estimate;
        ErrorBounds::new(
            (estimate - margin).max(0.0),
            estimate,
            estimate + margin,
            confidence,
        )
    }

    /// Relative standard error (RSE) of the estimate
    ///
    /// RSE = standard_error / true_value ≈ 1.04 / sqrt(m) for HLL
    fn relative_error(&self) -> f64;

    /// Estimate with default 95% confidence bounds
    fn estimate_with_bounds(&self) -> ErrorBounds {
        self.error_bounds(0.95)
    }
}

/// Frequency estimation sketches
pub trait FrequencySketch: Sketch {
    /// Estimate frequency of an item
    fn estimate_frequency(&self, item: &Self::Item) -> u64;

    /// Check if frequency exceeds threshold
    fn exceeds_threshold(&self, item: &Self::Item, threshold: u64) -> bool {
        self.estimate_frequency(item) >= threshold
    }
}

/// Quantile estimation sketches
///
/// Queries never fail: an empty sketch answers `0.0`, and out-of-range
/// ranks are clamped to [0, 1].
pub trait QuantileSketch: Sketch {
    /// Get quantile value at given rank (0.0 to 1.0)
    ///
    /// rank=0.5 returns the median
    fn quantile(&self, rank: f64) -> f64;

    /// Get the value at percentile `p` (0 to 100)
    fn percentile(&self, p: f64) -> f64 {
        self.quantile(p / 100.0)
    }

    /// Get rank of a value (0.0 to 1.0)
    fn rank(&self, value: f64) -> f64;

    /// Get CDF value at given point
    fn cdf(&self, value: f64) -> f64 {
        self.rank(value)
    }

    /// Get minimum value seen
    fn min(&self) -> Option<f64>;

    /// Get maximum value seen
    fn max(&self) -> Option<f64>;

    /// Get median (50th percentile)
    fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// Get multiple quantiles at once
    fn quantiles(&self, ranks: &[f64]) -> Vec<f64> {
        ranks.iter().map(|&r| self.quantile(r)).collect()
    }
}

/// Two-sided z-score for a confidence level (approximate)
fn z_score(confidence: f64) -> f64 {
    match confidence {
        c if c >= 0.99 => 2.576,
        c if c >= 0.95 => 1.96,
        c if c >= 0.90 => 1.645,
        c if c >= 0.80 => 1.282,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_bounds() {
        let bounds = ErrorBounds::new(90.0, 100.0, 110.0, 0.95);

        assert!(bounds.contains(100.0));
        assert!(bounds.contains(90.0));
        assert!(bounds.contains(110.0));
        assert!(!bounds.contains(89.0));
        assert!(!bounds.contains(111.0));

        assert_eq!(bounds.width(), 20.0);
        assert!((bounds.relative_width() - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_z_score_ladder() {
        assert_eq!(z_score(0.999), 2.576);
        assert_eq!(z_score(0.95), 1.96);
        assert_eq!(z_score(0.5), 1.0);
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::InvalidPrecision {
            precision: 20,
            min: 4,
            max: 16,
        };
        assert_eq!(err.to_string(), "precision must be between 4 and 16, got 20");

        let err = MergeError::IncompatibleConfig {
            expected: "precision=12".into(),
            found: "precision=14".into(),
        };
        assert_eq!(
            err.to_string(),
            "incompatible config: expected precision=12, found precision=14"
        );
    }
}
