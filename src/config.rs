//! Declarative sketch configuration
//!
//! Each sketch family has a small config struct with sensible defaults.
//! [`SketchConfig`] bundles them so a service can read one document (for
//! example from JSON with the `serde` feature) and build every sketch it
//! needs. Missing fields fall back to their defaults.
//!
//! ```
//! use streamsketch::config::SketchConfig;
//! use streamsketch::traits::CardinalitySketch;
//!
//! let config = SketchConfig::default();
//! config.validate().unwrap();
//!
//! let mut distinct = config.build_cardinality().unwrap();
//! distinct.add("alice");
//! distinct.add("bob");
//! assert_eq!(distinct.count(), 2);
//! ```

use crate::traits::ConfigError;

#[cfg(feature = "cardinality")]
use crate::cardinality::{HyperLogLog, HyperLogLogPlusPlus};
#[cfg(feature = "cardinality")]
use crate::traits::{CardinalitySketch, MergeError, Sketch};
#[cfg(feature = "cardinality")]
use core::{fmt::Display, hash::Hash};

#[cfg(feature = "frequency")]
use crate::frequency::CountMinSketch;

#[cfg(feature = "quantiles")]
use crate::quantiles::TDigest;

/// Settings for distinct counting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CardinalityConfig {
    /// Register precision, 4 to 16
    pub precision: u8,
    /// Start in the exact sparse mode (HyperLogLog++) instead of plain HyperLogLog
    pub sparse: bool,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self {
            precision: 14,
            sparse: true,
        }
    }
}

#[cfg(feature = "cardinality")]
impl CardinalityConfig {
    /// Check the settings without building a sketch
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::cardinality::validate_precision(self.precision)
    }

    /// Build the configured estimator
    pub fn build(&self) -> Result<CardinalityEstimator, ConfigError> {
        if self.sparse {
            HyperLogLogPlusPlus::new(self.precision).map(CardinalityEstimator::Sparse)
        } else {
            HyperLogLog::new(self.precision).map(CardinalityEstimator::Dense)
        }
    }
}

/// A distinct counter chosen at runtime from a [`CardinalityConfig`]
#[cfg(feature = "cardinality")]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CardinalityEstimator {
    /// Plain HyperLogLog
    Dense(HyperLogLog),
    /// HyperLogLog++ with a sparse start
    Sparse(HyperLogLogPlusPlus),
}

#[cfg(feature = "cardinality")]
impl CardinalityEstimator {
    /// Add an item
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T) {
        match self {
            Self::Dense(hll) => hll.add(item),
            Self::Sparse(hll) => hll.add(item),
        }
    }

    /// Add an item through its `Display` rendering
    pub fn add_display<T: Display + ?Sized>(&mut self, item: &T) {
        match self {
            Self::Dense(hll) => hll.add_display(item),
            Self::Sparse(hll) => hll.add_display(item),
        }
    }

    /// Register precision of the underlying sketch
    pub fn precision(&self) -> u8 {
        match self {
            Self::Dense(hll) => hll.precision(),
            Self::Sparse(hll) => hll.precision(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "hyperloglog",
            Self::Sparse(_) => "hyperloglog++",
        }
    }
}

#[cfg(feature = "cardinality")]
impl Sketch for CardinalityEstimator {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        match self {
            Self::Dense(hll) => hll.update(item),
            Self::Sparse(hll) => hll.update(item),
        }
    }

    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => a.merge_from(b),
            (Self::Sparse(a), Self::Sparse(b)) => a.merge_from(b),
            (this, other) => Err(MergeError::incompatible(
                "cardinality",
                this.kind().to_string(),
                other.kind().to_string(),
            )),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Dense(hll) => hll.clear(),
            Self::Sparse(hll) => hll.clear(),
        }
    }

    fn size_bytes(&self) -> usize {
        match self {
            Self::Dense(hll) => hll.size_bytes(),
            Self::Sparse(hll) => hll.size_bytes(),
        }
    }

    fn updates(&self) -> u64 {
        match self {
            Self::Dense(hll) => hll.updates(),
            Self::Sparse(hll) => hll.updates(),
        }
    }
}

#[cfg(feature = "cardinality")]
impl CardinalitySketch for CardinalityEstimator {
    fn estimate(&self) -> f64 {
        match self {
            Self::Dense(hll) => hll.estimate(),
            Self::Sparse(hll) => hll.estimate(),
        }
    }

    fn relative_error(&self) -> f64 {
        match self {
            Self::Dense(hll) => hll.relative_error(),
            Self::Sparse(hll) => hll.relative_error(),
        }
    }
}

/// Settings for Count-Min frequency estimation
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrequencyConfig {
    /// Overcount bound as a fraction of the total count
    pub epsilon: f64,
    /// Probability of exceeding the bound
    pub delta: f64,
    /// Base seed for the row hashes; shards must agree on it to merge
    pub seed: u64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            delta: 0.01,
            seed: crate::hash::DEFAULT_SEED,
        }
    }
}

#[cfg(feature = "frequency")]
impl FrequencyConfig {
    /// Check the settings without building a sketch
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::frequency::dimensions_for(self.epsilon, self.delta).map(|_| ())
    }

    /// Build the configured sketch
    pub fn build(&self) -> Result<CountMinSketch, ConfigError> {
        CountMinSketch::with_seed(self.epsilon, self.delta, self.seed)
    }
}

/// Settings for t-digest quantile estimation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QuantileConfig {
    /// Maximum number of centroids after compression
    pub compression: usize,
}

impl Default for QuantileConfig {
    fn default() -> Self {
        Self { compression: 100 }
    }
}

#[cfg(feature = "quantiles")]
impl QuantileConfig {
    /// Check the settings without building a sketch
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::quantiles::validate_compression(self.compression)
    }

    /// Build the configured digest
    pub fn build(&self) -> Result<TDigest, ConfigError> {
        TDigest::new(self.compression)
    }
}

/// Settings for every sketch family, read as one document
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SketchConfig {
    /// Distinct counting
    pub cardinality: CardinalityConfig,
    /// Frequency estimation
    pub frequency: FrequencyConfig,
    /// Quantile estimation
    pub quantiles: QuantileConfig,
}

impl SketchConfig {
    /// Validate every section of enabled sketch families
    pub fn validate(&self) -> Result<(), ConfigError> {
        #[cfg(feature = "cardinality")]
        self.cardinality.validate()?;
        #[cfg(feature = "frequency")]
        self.frequency.validate()?;
        #[cfg(feature = "quantiles")]
        self.quantiles.validate()?;
        Ok(())
    }

    /// Build the distinct counter
    #[cfg(feature = "cardinality")]
    pub fn build_cardinality(&self) -> Result<CardinalityEstimator, ConfigError> {
        self.cardinality.build()
    }

    /// Build the frequency sketch
    #[cfg(feature = "frequency")]
    pub fn build_frequency(&self) -> Result<CountMinSketch, ConfigError> {
        self.frequency.build()
    }

    /// Build the quantile digest
    #[cfg(feature = "quantiles")]
    pub fn build_quantiles(&self) -> Result<TDigest, ConfigError> {
        self.quantiles.build()
    }
}
