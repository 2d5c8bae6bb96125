//! t-digest quantile estimator
//!
//! Implementation of the t-digest algorithm for streaming quantile estimation.
//! t-digest provides excellent accuracy at the extremes (p01, p99) while
//! being fully mergeable for distributed computation.
//!
//! # Performance Note
//!
//! This implementation uses interior mutability (`RefCell`) to lazily compress
//! the internal buffer on query. `quantile()` and `rank()` calls on `&self`
//! compress any buffered centroids in place rather than cloning the digest.
//!
//! # Thread Safety
//!
//! `TDigest` is `Send` but **not `Sync`** due to the internal `RefCell`.
//! For concurrent read access, wrap in `Arc<Mutex<_>>` or `Arc<RwLock<_>>`.

use crate::traits::{ConfigError, MergeError, QuantileSketch, Sketch};
use core::cell::RefCell;

/// Compression used by [`TDigest::default`]
pub const DEFAULT_COMPRESSION: usize = 100;

/// Stored plus buffered centroids allowed per unit of compression before a
/// compression pass runs.
const BUFFER_FACTOR: usize = 10;

/// Largest accepted compression parameter
pub const MAX_COMPRESSION: usize = 1 << 20;

/// A centroid in the t-digest
///
/// Centroids represent clusters of values with a mean and total weight.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Centroid {
    /// Mean value of the centroid
    pub mean: f64,
    /// Total weight of the values in the centroid
    pub weight: f64,
}

impl Centroid {
    /// Create a new centroid
    pub fn new(mean: f64, weight: f64) -> Self {
        Self { mean, weight }
    }

    /// Absorb another weighted point, updating the weighted mean
    pub fn add(&mut self, value: f64, weight: f64) {
        let new_weight = self.weight + weight;
        self.mean += (value - self.mean) * (weight / new_weight);
        self.weight = new_weight;
    }
}

/// Mutable interior data for the t-digest.
///
/// Separated from the outer struct so it can live in a `RefCell`
/// and be compressed on read without `&mut self`.
#[derive(Clone, Debug, Default)]
struct TDigestInner {
    /// Centroids, sorted by mean
    centroids: Vec<Centroid>,
    /// Singleton centroids not yet merged
    buffer: Vec<Centroid>,
}

impl TDigestInner {
    fn pending(&self) -> usize {
        self.centroids.len() + self.buffer.len()
    }

    /// Fold the buffer into the sorted centroid list.
    fn compress(&mut self, compression: usize) {
        if self.buffer.is_empty() {
            return;
        }

        let mut all = core::mem::take(&mut self.centroids);
        all.append(&mut self.buffer);
        let input = all.len();
        self.centroids = compress_centroids(all, compression);

        tracing::trace!(
            compression,
            input,
            output = self.centroids.len(),
            "compressed t-digest"
        );
    }
}

/// t-digest quantile sketch
///
/// The t-digest is a data structure for estimating quantiles of a distribution
/// from a stream of values. It provides:
///
/// - O(1) amortized time per insertion
/// - Accurate estimation especially at the tails (p01, p99)
/// - Full mergeability for distributed computation
/// - Bounded memory usage: at most `compression` centroids after compression
///
/// # Compression Parameter
///
/// The compression parameter controls the tradeoff between accuracy and memory:
/// - Higher compression = more centroids = better accuracy = more memory
/// - Typical values: 100-500
/// - Default: 100
///
/// Two digests merge only when their compression matches.
///
/// # Example
///
/// ```
/// use streamsketch::quantiles::TDigest;
/// use streamsketch::traits::QuantileSketch;
///
/// let mut digest = TDigest::new(100).unwrap();
///
/// // Add some values
/// for i in 1..=1000 {
///     digest.add(i as f64);
/// }
///
/// // Query quantiles
/// let p50 = digest.quantile(0.5);  // median
/// let p99 = digest.quantile(0.99); // 99th percentile
/// assert!(p50 < p99);
/// ```
#[derive(Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(try_from = "TDigestParts")
)]
pub struct TDigest {
    /// Compression parameter (higher = more accuracy, more memory)
    compression: usize,
    /// Interior mutable state: centroids + buffer
    inner: RefCell<TDigestInner>,
    /// Sum of all accepted weights
    total_weight: f64,
    /// Minimum value seen
    min: f64,
    /// Maximum value seen
    max: f64,
    /// Number of accepted add calls
    updates: u64,
}

impl Clone for TDigest {
    fn clone(&self) -> Self {
        Self {
            compression: self.compression,
            inner: RefCell::new(self.inner.borrow().clone()),
            total_weight: self.total_weight,
            min: self.min,
            max: self.max,
            updates: self.updates,
        }
    }
}

impl TDigest {
    /// Create a new t-digest with the given compression parameter
    ///
    /// # Arguments
    ///
    /// * `compression` - Controls accuracy vs memory tradeoff. Typical values: 100-500.
    ///
    /// Returns [`ConfigError::InvalidCompression`] for a compression of zero
    /// or above [`MAX_COMPRESSION`].
    pub fn new(compression: usize) -> Result<Self, ConfigError> {
        validate_compression(compression)?;

        Ok(Self {
            compression,
            inner: RefCell::new(TDigestInner {
                centroids: Vec::new(),
                buffer: Vec::new(),
            }),
            total_weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            updates: 0,
        })
    }

    /// Get the compression parameter
    pub fn compression(&self) -> usize {
        self.compression
    }

    /// Add a single value with weight 1
    ///
    /// NaN and infinite values are ignored to keep the digest usable.
    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1.0);
    }

    /// Add a value carrying the given weight
    ///
    /// Non-finite values and weights that are not finite and positive are
    /// ignored.
    pub fn add_weighted(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || !(weight.is_finite() && weight > 0.0) {
            return;
        }

        self.total_weight += weight;
        self.updates += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        // get_mut() bypasses RefCell runtime checks since we have &mut self
        let inner = self.inner.get_mut();
        inner.buffer.push(Centroid::new(value, weight));
        if inner.pending() > self.compression * BUFFER_FACTOR {
            inner.compress(self.compression);
        }
    }

    /// Force compression of the buffer into centroids
    pub fn compress(&mut self) {
        self.inner.get_mut().compress(self.compression);
    }

    /// Total weight of all values added
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Compressed centroids, sorted by mean
    pub fn centroids(&self) -> Vec<Centroid> {
        self.ensure_compressed();
        self.inner.borrow().centroids.clone()
    }

    /// Number of centroids after folding in any buffered values
    pub fn num_centroids(&self) -> usize {
        self.ensure_compressed();
        self.inner.borrow().centroids.len()
    }

    /// Ensure the buffer is compressed (for &self query methods).
    fn ensure_compressed(&self) {
        if self.inner.borrow().buffer.is_empty() {
            return;
        }
        self.inner.borrow_mut().compress(self.compression);
    }

    /// Quantile query using consistent midpoint interpolation.
    ///
    /// Each centroid represents a point mass at its mean. The cumulative
    /// distribution is modeled as a piecewise linear function passing through
    /// each centroid's midpoint (cumulative_weight_before + weight/2, mean).
    /// The curve is anchored at (0, min) and (total_weight, max).
    fn quantile_impl(&self, centroids: &[Centroid], q: f64) -> f64 {
        let total = self.total_weight;
        let target_rank = q * total;

        let mut prev_rank = 0.0_f64;
        let mut prev_mean = self.min;
        let mut cumulative = 0.0_f64;

        for centroid in centroids {
            let mid_rank = cumulative + centroid.weight / 2.0;

            if target_rank < mid_rank {
                let denom = mid_rank - prev_rank;
                if denom <= 0.0 {
                    return prev_mean;
                }
                let t = (target_rank - prev_rank) / denom;
                return prev_mean + t * (centroid.mean - prev_mean);
            }

            cumulative += centroid.weight;
            prev_rank = mid_rank;
            prev_mean = centroid.mean;
        }

        // target_rank is past the last centroid midpoint: interpolate to max
        let denom = total - prev_rank;
        if denom <= 0.0 {
            return self.max;
        }
        let t = (target_rank - prev_rank) / denom;
        prev_mean + t * (self.max - prev_mean)
    }

    /// Rank query on the same piecewise linear model as `quantile_impl`.
    fn rank_impl(&self, centroids: &[Centroid], value: f64) -> f64 {
        let total = self.total_weight;

        let mut prev_rank = 0.0_f64;
        let mut prev_mean = self.min;
        let mut cumulative = 0.0_f64;

        for centroid in centroids {
            let mid_rank = cumulative + centroid.weight / 2.0;

            if value < centroid.mean {
                let denom = centroid.mean - prev_mean;
                if denom <= 0.0 {
                    return prev_rank / total;
                }
                let t = (value - prev_mean) / denom;
                return (prev_rank + t * (mid_rank - prev_rank)) / total;
            }

            cumulative += centroid.weight;
            prev_rank = mid_rank;
            prev_mean = centroid.mean;
        }

        let denom = self.max - prev_mean;
        if denom <= 0.0 {
            return 1.0;
        }
        let t = (value - prev_mean) / denom;
        (prev_rank + t * (total - prev_rank)) / total
    }
}

pub(crate) fn validate_compression(compression: usize) -> Result<(), ConfigError> {
    if compression == 0 || compression > MAX_COMPRESSION {
        return Err(ConfigError::InvalidCompression(compression));
    }
    Ok(())
}

/// Merge a list of centroids under the arcsine scale function
///
/// Adjacent centroids are combined while the merged centroid spans at most
/// one unit of `k(q)`. The scale covers `compression / 2` units, so any two
/// neighbouring output centroids together span more than one unit and the
/// output holds at most `compression` centroids.
fn compress_centroids(mut centroids: Vec<Centroid>, compression: usize) -> Vec<Centroid> {
    if centroids.is_empty() {
        return centroids;
    }
    centroids.sort_by(|a, b| a.mean.total_cmp(&b.mean));

    let total_weight: f64 = centroids.iter().map(|c| c.weight).sum();
    let mut result = Vec::with_capacity(compression.min(centroids.len()));

    let mut iter = centroids.into_iter();
    let Some(mut current) = iter.next() else {
        return result;
    };
    let mut weight_so_far = 0.0_f64;

    for centroid in iter {
        let q0 = weight_so_far / total_weight;
        let q1 = (weight_so_far + current.weight + centroid.weight) / total_weight;

        if scale(q1, compression) - scale(q0, compression) <= 1.0 {
            current.add(centroid.mean, centroid.weight);
        } else {
            weight_so_far += current.weight;
            result.push(current);
            current = centroid;
        }
    }

    result.push(current);
    result
}

/// Arcsine scale function `k(q) = (C/2) * (asin(2q - 1) / π + 1/2)`.
///
/// The argument is clamped to [-1, 1] so float drift cannot produce NaN.
#[inline]
fn scale(q: f64, compression: usize) -> f64 {
    let x = (2.0 * q - 1.0).clamp(-1.0, 1.0);
    compression as f64 / 2.0 * (x.asin() / core::f64::consts::PI + 0.5)
}

impl Default for TDigest {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            inner: RefCell::new(TDigestInner::default()),
            total_weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            updates: 0,
        }
    }
}

impl Sketch for TDigest {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        self.add(*item);
    }

    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.compression != other.compression {
            return Err(MergeError::incompatible(
                "t-digest",
                format!("compression={}", self.compression),
                format!("compression={}", other.compression),
            ));
        }

        let self_inner = self.inner.get_mut();
        let other_inner = other.inner.borrow();

        let mut all = core::mem::take(&mut self_inner.centroids);
        all.append(&mut self_inner.buffer);
        all.extend_from_slice(&other_inner.centroids);
        all.extend_from_slice(&other_inner.buffer);
        self_inner.centroids = compress_centroids(all, self.compression);

        self.total_weight += other.total_weight;
        self.updates += other.updates;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);

        Ok(())
    }

    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.centroids.clear();
        inner.buffer.clear();
        self.total_weight = 0.0;
        self.updates = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn size_bytes(&self) -> usize {
        let inner = self.inner.borrow();
        core::mem::size_of::<Self>()
            + inner.centroids.capacity() * core::mem::size_of::<Centroid>()
            + inner.buffer.capacity() * core::mem::size_of::<Centroid>()
    }

    fn updates(&self) -> u64 {
        self.updates
    }
}

impl QuantileSketch for TDigest {
    fn quantile(&self, rank: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        if rank.is_nan() || rank <= 0.0 {
            return self.min;
        }
        if rank >= 1.0 {
            return self.max;
        }

        self.ensure_compressed();
        let inner = self.inner.borrow();
        self.quantile_impl(&inner.centroids, rank)
    }

    fn rank(&self, value: f64) -> f64 {
        if self.total_weight <= 0.0 || value.is_nan() {
            return 0.0;
        }
        // Check >= max before <= min so that when min == max (all values equal),
        // the CDF convention P(X ≤ x) = 1.0 holds.
        if value >= self.max {
            return 1.0;
        }
        if value <= self.min {
            return 0.0;
        }

        self.ensure_compressed();
        let inner = self.inner.borrow();
        self.rank_impl(&inner.centroids, value)
    }

    fn min(&self) -> Option<f64> {
        (self.total_weight > 0.0).then_some(self.min)
    }

    fn max(&self) -> Option<f64> {
        (self.total_weight > 0.0).then_some(self.max)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let inner = self.inner.borrow();
        let mut state = serializer.serialize_struct("TDigest", 7)?;
        state.serialize_field("compression", &self.compression)?;
        state.serialize_field("centroids", &inner.centroids)?;
        state.serialize_field("buffer", &inner.buffer)?;
        state.serialize_field("total_weight", &self.total_weight)?;
        state.serialize_field("min", &QuantileSketch::min(self))?;
        state.serialize_field("max", &QuantileSketch::max(self))?;
        state.serialize_field("updates", &self.updates)?;
        state.end()
    }
}

/// Wire form of a [`TDigest`]; min and max are absent while the digest is empty
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct TDigestParts {
    compression: usize,
    centroids: Vec<Centroid>,
    buffer: Vec<Centroid>,
    total_weight: f64,
    min: Option<f64>,
    max: Option<f64>,
    updates: u64,
}

#[cfg(feature = "serde")]
impl TryFrom<TDigestParts> for TDigest {
    type Error = String;

    fn try_from(parts: TDigestParts) -> Result<Self, Self::Error> {
        let mut digest = TDigest::new(parts.compression).map_err(|e| e.to_string())?;

        let all = parts.centroids.iter().chain(&parts.buffer);
        let malformed = |c: &&Centroid| {
            !c.mean.is_finite() || !c.weight.is_finite() || c.weight <= 0.0
        };
        if let Some(c) = all.clone().find(malformed) {
            return Err(format!(
                "malformed centroid (mean {}, weight {})",
                c.mean, c.weight
            ));
        }
        if parts.centroids.windows(2).any(|w| w[0].mean > w[1].mean) {
            return Err("compressed centroids are not sorted by mean".to_string());
        }

        let stored: f64 = all.map(|c| c.weight).sum();
        if !parts.total_weight.is_finite()
            || (parts.total_weight - stored).abs() > 1e-9 * stored.max(1.0)
        {
            return Err(format!(
                "total weight {} does not match centroid weight {}",
                parts.total_weight, stored
            ));
        }

        match (parts.min, parts.max) {
            (None, None) if stored == 0.0 => {}
            (Some(min), Some(max))
                if stored > 0.0 && min.is_finite() && max.is_finite() && min <= max =>
            {
                digest.min = min;
                digest.max = max;
            }
            (min, max) => {
                return Err(format!(
                    "min {:?} and max {:?} do not fit a digest of weight {}",
                    min, max, stored
                ));
            }
        }

        digest.inner = RefCell::new(TDigestInner {
            centroids: parts.centroids,
            buffer: parts.buffer,
        });
        digest.total_weight = parts.total_weight;
        digest.updates = parts.updates;
        Ok(digest)
    }
}

// ============================================================================
// Tests
// ============================================================================
