//! Count-Min Sketch frequency estimator
//!
//! The Count-Min Sketch is a probabilistic data structure for estimating
//! the frequency of elements in a data stream.

use crate::hash::{derive_seeds, hash_display, hash_item, DEFAULT_SEED};
use crate::traits::{ConfigError, FrequencySketch, MergeError, Sketch};
use core::fmt::Display;
use core::hash::Hash;

/// Largest table a sketch will allocate, in counters (1 GiB of `u64`)
pub const MAX_COUNTERS: usize = 1 << 27;

/// Count-Min Sketch for frequency estimation
///
/// The Count-Min Sketch provides frequency estimates with the following guarantees:
/// - Point query: `actual_count <= estimate <= actual_count + ε * N`
/// - Where ε = e/width and N is the total count
/// - Probability of exceeding the error bound: δ = e^-depth
///
/// Every row hashes with its own seed, derived from one base seed. Two
/// sketches can only be merged when they share both dimensions and seeds.
///
/// # Example
///
/// ```
/// use streamsketch::frequency::CountMinSketch;
///
/// // Create with 1% error rate and 0.1% failure probability
/// let mut cms = CountMinSketch::new(0.01, 0.001).unwrap();
///
/// // Add items
/// cms.add("apple", 5);
/// cms.add("banana", 3);
/// cms.add("apple", 2);
///
/// // Query frequency
/// assert!(cms.estimate("apple") >= 7);
/// assert!(cms.estimate("banana") >= 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "CountMinParts"))]
pub struct CountMinSketch {
    /// Width of each row
    width: usize,
    /// Number of rows (hash functions)
    depth: usize,
    /// Counter table
    table: Vec<Vec<u64>>,
    /// Total count of all items
    total_count: u64,
    /// Number of updates
    num_updates: u64,
    /// Seeds for hash functions
    seeds: Vec<u64>,
}

impl CountMinSketch {
    /// Create a new Count-Min Sketch with the given error parameters
    ///
    /// # Arguments
    ///
    /// * `epsilon` - Maximum overcount as a fraction of total (e.g., 0.01 for 1%)
    /// * `delta` - Probability of exceeding the error bound (e.g., 0.001 for 0.1%)
    ///
    /// Returns an error if epsilon or delta are not in (0, 1).
    pub fn new(epsilon: f64, delta: f64) -> Result<Self, ConfigError> {
        Self::with_seed(epsilon, delta, DEFAULT_SEED)
    }

    /// Like [`CountMinSketch::new`], with an explicit base seed for the row hashes
    pub fn with_seed(epsilon: f64, delta: f64, base_seed: u64) -> Result<Self, ConfigError> {
        let (width, depth) = dimensions_for(epsilon, delta)?;
        Self::with_dimensions_and_seed(width, depth, base_seed)
    }

    /// Create a Count-Min Sketch with specific dimensions
    ///
    /// # Arguments
    ///
    /// * `width` - Width of each row (larger = lower error)
    /// * `depth` - Number of rows (larger = lower failure probability)
    pub fn with_dimensions(width: usize, depth: usize) -> Result<Self, ConfigError> {
        Self::with_dimensions_and_seed(width, depth, DEFAULT_SEED)
    }

    /// Create a Count-Min Sketch with specific dimensions and base seed
    pub fn with_dimensions_and_seed(
        width: usize,
        depth: usize,
        base_seed: u64,
    ) -> Result<Self, ConfigError> {
        check_dimensions(width, depth)?;

        Ok(Self {
            width,
            depth,
            table: vec![vec![0u64; width]; depth],
            total_count: 0,
            num_updates: 0,
            seeds: derive_seeds(base_seed, depth),
        })
    }

    /// Get the width of the sketch
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the depth of the sketch
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Per-row hash seeds
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    /// Get the total count of all items
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Add count to an item
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T, count: u64) {
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(count);

        for row in 0..self.depth {
            let col = self.column(item, row);
            self.table[row][col] = self.table[row][col].saturating_add(count);
        }
    }

    /// Add count to an item through its `Display` rendering
    pub fn add_display<T: Display + ?Sized>(&mut self, item: &T, count: u64) {
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(count);

        for row in 0..self.depth {
            let col = self.display_column(item, row);
            self.table[row][col] = self.table[row][col].saturating_add(count);
        }
    }

    /// Add count using conservative update
    ///
    /// Conservative update improves accuracy by only incrementing counters
    /// up to the new estimated value. This reduces over-counting.
    pub fn add_conservative<T: Hash + ?Sized>(&mut self, item: &T, count: u64) {
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(count);

        // First pass: find current estimate (minimum)
        let new_val = self.estimate(item).saturating_add(count);

        // Second pass: set all counters to at least new_val
        for row in 0..self.depth {
            let col = self.column(item, row);
            if self.table[row][col] < new_val {
                self.table[row][col] = new_val;
            }
        }
    }

    /// Estimate the frequency of an item
    ///
    /// Never lower than the true frequency.
    pub fn estimate<T: Hash + ?Sized>(&self, item: &T) -> u64 {
        (0..self.depth)
            .map(|row| self.table[row][self.column(item, row)])
            .min()
            .unwrap_or(0)
    }

    /// Estimate the frequency of an item added through [`CountMinSketch::add_display`]
    pub fn estimate_display<T: Display + ?Sized>(&self, item: &T) -> u64 {
        (0..self.depth)
            .map(|row| self.table[row][self.display_column(item, row)])
            .min()
            .unwrap_or(0)
    }

    /// Theoretical error bound (epsilon * total_count)
    pub fn error_bound(&self) -> u64 {
        let epsilon = core::f64::consts::E / self.width as f64;
        (epsilon * self.total_count as f64) as u64
    }

    #[inline]
    fn column<T: Hash + ?Sized>(&self, item: &T, row: usize) -> usize {
        (hash_item(item, self.seeds[row]) % self.width as u64) as usize
    }

    #[inline]
    fn display_column<T: Display + ?Sized>(&self, item: &T, row: usize) -> usize {
        (hash_display(item, self.seeds[row]) % self.width as u64) as usize
    }
}

/// `(width, depth)` for an error bound and confidence
///
/// width = ceil(e / epsilon), depth = ceil(ln(1 / delta))
pub(crate) fn dimensions_for(epsilon: f64, delta: f64) -> Result<(usize, usize), ConfigError> {
    if !(epsilon > 0.0 && epsilon < 1.0) {
        return Err(ConfigError::InvalidEpsilon(epsilon));
    }
    if !(delta > 0.0 && delta < 1.0) {
        return Err(ConfigError::InvalidDelta(delta));
    }

    let width = (core::f64::consts::E / epsilon).ceil();
    if width > MAX_COUNTERS as f64 {
        return Err(ConfigError::InvalidEpsilon(epsilon));
    }
    let width = width as usize;
    let depth = ((1.0 / delta).ln().ceil() as usize).max(1);
    check_dimensions(width, depth)?;
    Ok((width, depth))
}

/// Reject empty tables and tables above [`MAX_COUNTERS`]
pub(crate) fn check_dimensions(width: usize, depth: usize) -> Result<(), ConfigError> {
    match width.checked_mul(depth) {
        Some(cells) if cells > 0 && cells <= MAX_COUNTERS => Ok(()),
        _ => Err(ConfigError::InvalidDimensions { width, depth }),
    }
}

impl Sketch for CountMinSketch {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        self.add(item, 1);
    }

    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.width != other.width || self.depth != other.depth {
            return Err(MergeError::incompatible(
                "count-min",
                format!("{}x{}", self.width, self.depth),
                format!("{}x{}", other.width, other.depth),
            ));
        }
        if self.seeds != other.seeds {
            tracing::debug!("rejecting count-min merge: hash seeds differ");
            return Err(MergeError::SeedMismatch);
        }

        for (ours, theirs) in self.table.iter_mut().zip(other.table.iter()) {
            for (a, &b) in ours.iter_mut().zip(theirs.iter()) {
                *a = a.saturating_add(b);
            }
        }

        self.total_count = self.total_count.saturating_add(other.total_count);
        self.num_updates += other.num_updates;

        Ok(())
    }

    fn clear(&mut self) {
        for row in &mut self.table {
            row.fill(0);
        }
        self.total_count = 0;
        self.num_updates = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.depth * self.width * core::mem::size_of::<u64>()
            + self.seeds.len() * core::mem::size_of::<u64>()
    }

    fn updates(&self) -> u64 {
        self.num_updates
    }
}

impl FrequencySketch for CountMinSketch {
    fn estimate_frequency(&self, item: &[u8]) -> u64 {
        self.estimate(item)
    }
}

/// Unchecked wire form; the table shape is validated before use
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct CountMinParts {
    width: usize,
    depth: usize,
    table: Vec<Vec<u64>>,
    total_count: u64,
    num_updates: u64,
    seeds: Vec<u64>,
}

#[cfg(feature = "serde")]
impl TryFrom<CountMinParts> for CountMinSketch {
    type Error = String;

    fn try_from(parts: CountMinParts) -> Result<Self, Self::Error> {
        if parts.seeds.len() != parts.depth
            || parts.table.len() != parts.depth
            || parts.table.iter().any(|row| row.len() != parts.width)
        {
            return Err(format!(
                "table does not match dimensions {}x{}",
                parts.width, parts.depth
            ));
        }
        check_dimensions(parts.width, parts.depth).map_err(|e| e.to_string())?;

        Ok(Self {
            width: parts.width,
            depth: parts.depth,
            table: parts.table,
            total_count: parts.total_count,
            num_updates: parts.num_updates,
            seeds: parts.seeds,
        })
    }
}
