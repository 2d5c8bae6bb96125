//! HyperLogLog cardinality estimator
//!
//! Implementation of the HyperLogLog algorithm with small-range (linear
//! counting) and large-range corrections.

use crate::hash::{hash_display, hash_item, DEFAULT_SEED};
use crate::traits::{CardinalitySketch, ConfigError, MergeError, Sketch};
use core::fmt::Display;
use core::hash::Hash;

/// Smallest supported precision
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision
pub const MAX_PRECISION: u8 = 16;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// HyperLogLog cardinality estimator
///
/// Estimates the number of distinct elements with configurable precision.
/// Memory usage is 2^precision bytes.
///
/// # Error Rate
///
/// The relative standard error is approximately 1.04 / sqrt(m) where m = 2^precision.
///
/// | Precision | Memory | Error |
/// |-----------|--------|-------|
/// | 4 | 16 B | ~26% |
/// | 10 | 1 KB | ~3.25% |
/// | 12 | 4 KB | ~1.63% |
/// | 14 | 16 KB | ~0.81% |
/// | 16 | 64 KB | ~0.41% |
///
/// # Example
///
/// ```
/// use streamsketch::cardinality::HyperLogLog;
/// use streamsketch::traits::CardinalitySketch;
///
/// let mut hll = HyperLogLog::new(12).unwrap();
///
/// for i in 0..10000 {
///     hll.add(&format!("user_{}", i));
/// }
///
/// let count = hll.count();
/// println!("Approximately {} distinct users", count);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HyperLogLog {
    /// Precision parameter (4-16)
    precision: u8,
    /// Registers (one byte per register)
    registers: Vec<u8>,
    /// Bias-correction constant for m = 2^precision
    alpha: f64,
    /// Number of add calls
    updates: u64,
}

impl HyperLogLog {
    /// Create a new HyperLogLog with the given precision
    ///
    /// Precision must be between 4 and 16 inclusive.
    /// Higher precision gives better accuracy but uses more memory.
    pub fn new(precision: u8) -> Result<Self, ConfigError> {
        validate_precision(precision)?;
        Ok(Self::with_valid_precision(precision))
    }

    /// Build an empty sketch for an already validated precision
    pub(crate) fn with_valid_precision(precision: u8) -> Self {
        let m = 1usize << precision;
        Self {
            precision,
            registers: vec![0u8; m],
            alpha: alpha_for(m),
            updates: 0,
        }
    }

    /// Create a HyperLogLog targeting a specific error rate
    ///
    /// The error rate is approximate and represents the relative standard error.
    pub fn with_error(target_error: f64) -> Result<Self, ConfigError> {
        Self::new(super::precision_for_error(target_error)?)
    }

    /// Get the precision parameter
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Get the number of registers (m = 2^precision)
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Register values, indexed by the low `precision` bits of the item hash
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Add an item through its `Hash` impl
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T) {
        self.add_hash(hash_item(item, DEFAULT_SEED));
    }

    /// Add an item through its `Display` rendering
    ///
    /// Useful for values without a `Hash` impl, such as floats.
    pub fn add_display<T: Display + ?Sized>(&mut self, item: &T) {
        self.add_hash(hash_display(item, DEFAULT_SEED));
    }

    /// Add a pre-computed 64-bit hash value
    pub fn add_hash(&mut self, hash: u64) {
        self.updates += 1;

        let (idx, rank) = index_and_rank(hash, self.precision);
        self.observe(idx, rank);
    }

    /// Raise a register to at least `rank`
    #[inline]
    pub(crate) fn observe(&mut self, idx: usize, rank: u8) {
        if rank > self.registers[idx] {
            self.registers[idx] = rank;
        }
    }

    pub(crate) fn record_updates(&mut self, updates: u64) {
        self.updates += updates;
    }

    /// Raw estimate using the normalized harmonic mean of 2^-register
    fn raw_estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| 2f64.powi(-(r as i32)))
            .sum();
        self.alpha * m * m / sum
    }

    /// Count registers with value 0
    fn count_zeros(&self) -> usize {
        self.registers.iter().filter(|&&r| r == 0).count()
    }

    /// Linear counting estimate for small cardinalities
    fn linear_counting(&self, zeros: usize) -> f64 {
        let m = self.registers.len() as f64;
        m * (m / zeros as f64).ln()
    }

    /// Apply the small- and large-range corrections to a raw estimate
    fn corrected(&self, raw: f64) -> f64 {
        let m = self.registers.len() as f64;

        if raw <= 2.5 * m {
            let zeros = self.count_zeros();
            if zeros > 0 {
                return self.linear_counting(zeros);
            }
            return raw;
        }

        // 32-bit hash-space saturation correction; past 2^32 the log is undefined.
        if raw > TWO_POW_32 / 30.0 && raw < TWO_POW_32 {
            return -TWO_POW_32 * (1.0 - raw / TWO_POW_32).ln();
        }

        raw
    }
}

/// Check a precision against the supported range
pub(crate) fn validate_precision(precision: u8) -> Result<(), ConfigError> {
    if (MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        Ok(())
    } else {
        Err(ConfigError::InvalidPrecision {
            precision,
            min: MIN_PRECISION,
            max: MAX_PRECISION,
        })
    }
}

/// Alpha constant for given m
fn alpha_for(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m as f64),
    }
}

/// Split a hash into (register index, rank)
///
/// The low `precision` bits pick the register. The rank is the number of
/// leading zeros in the remaining `64 - precision` bits plus one, so it lies
/// in `1..=64 - precision + 1`.
#[inline]
pub(crate) fn index_and_rank(hash: u64, precision: u8) -> (usize, u8) {
    let p = precision as u32;
    let idx = (hash & ((1u64 << p) - 1)) as usize;
    (idx, rank_of(hash >> p, 64 - p))
}

/// Leading zeros + 1 of `w` viewed as a `bits`-wide integer
#[inline]
pub(crate) fn rank_of(w: u64, bits: u32) -> u8 {
    if w == 0 {
        (bits + 1) as u8
    } else {
        (w.leading_zeros() - (64 - bits) + 1) as u8
    }
}

impl Sketch for HyperLogLog {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        self.add(item);
    }

    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.precision != other.precision {
            return Err(MergeError::incompatible(
                "hyperloglog",
                format!("precision={}", self.precision),
                format!("precision={}", other.precision),
            ));
        }

        // Take element-wise max
        for (a, &b) in self.registers.iter_mut().zip(other.registers.iter()) {
            *a = (*a).max(b);
        }

        self.updates += other.updates;
        Ok(())
    }

    fn clear(&mut self) {
        self.registers.fill(0);
        self.updates = 0;
    }

    fn size_bytes(&self) -> usize {
        self.registers.len() + core::mem::size_of::<Self>()
    }

    fn updates(&self) -> u64 {
        self.updates
    }
}

impl CardinalitySketch for HyperLogLog {
    fn estimate(&self) -> f64 {
        self.corrected(self.raw_estimate())
    }

    fn relative_error(&self) -> f64 {
        let m = self.registers.len() as f64;
        1.04 / m.sqrt()
    }
}

/// `&a + &b` is shorthand for `a.merge(&b)`
impl core::ops::Add<&HyperLogLog> for &HyperLogLog {
    type Output = Result<HyperLogLog, MergeError>;

    fn add(self, rhs: &HyperLogLog) -> Self::Output {
        self.merge(rhs)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for HyperLogLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("HyperLogLog", 3)?;
        state.serialize_field("precision", &self.precision)?;
        state.serialize_field("registers", &self.registers)?;
        state.serialize_field("updates", &self.updates)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for HyperLogLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(serde::Deserialize)]
        struct HllData {
            precision: u8,
            registers: Vec<u8>,
            updates: u64,
        }

        let data = HllData::deserialize(deserializer)?;
        let mut hll = HyperLogLog::new(data.precision).map_err(D::Error::custom)?;
        if data.registers.len() != hll.registers.len() {
            return Err(D::Error::custom(format!(
                "expected {} registers, found {}",
                hll.registers.len(),
                data.registers.len()
            )));
        }
        let max_rank = 64 - data.precision + 1;
        if data.registers.iter().any(|&r| r > max_rank) {
            return Err(D::Error::custom(format!("register value exceeds {}", max_rank)));
        }
        hll.registers = data.registers;
        hll.updates = data.updates;
        Ok(hll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut hll = HyperLogLog::new(12).unwrap();

        for i in 0..10000 {
            hll.add(&format!("item_{}", i));
        }

        let estimate = hll.estimate();
        // Should be within 10% of actual
        assert!(estimate > 9000.0 && estimate < 11000.0, "estimate={}", estimate);
    }

    #[test]
    fn test_empty() {
        let hll = HyperLogLog::new(12).unwrap();
        assert_eq!(hll.estimate(), 0.0);
        assert_eq!(hll.count(), 0);
    }

    #[test]
    fn test_duplicates() {
        let mut hll = HyperLogLog::new(12).unwrap();

        // Insert same item many times
        for _ in 0..10000 {
            hll.add("same_item");
        }

        assert_eq!(hll.count(), 1);
        assert_eq!(hll.updates(), 10000);
    }

    #[test]
    fn test_precision_out_of_range() {
        for precision in [0, 3, 17, 20] {
            assert_eq!(
                HyperLogLog::new(precision),
                Err(ConfigError::InvalidPrecision {
                    precision,
                    min: 4,
                    max: 16
                })
            );
        }
        assert!(HyperLogLog::new(4).is_ok());
        assert!(HyperLogLog::new(16).is_ok());
    }

    #[test]
    fn test_index_and_rank() {
        // Low bits select the register
        assert_eq!(index_and_rank(0b1011, 4).0, 0b1011);
        // Top bit of the remaining 60 bits set: no leading zeros
        assert_eq!(index_and_rank(1u64 << 63, 4), (0, 1));
        // Only the lowest remaining bit set: 59 leading zeros
        assert_eq!(index_and_rank(1u64 << 4, 4), (0, 60));
        // Nothing left: capped at 64 - p + 1
        assert_eq!(index_and_rank(0, 4), (0, 61));
        assert_eq!(index_and_rank(0xffff, 16), (0xffff, 49));
    }

    #[test]
    fn test_register_bounds() {
        let mut hll = HyperLogLog::new(4).unwrap();
        hll.add_hash(0);
        hll.add_hash(u64::MAX);
        for i in 0..1000u64 {
            hll.add(&i);
        }
        assert_eq!(hll.num_registers(), 16);
        assert!(hll.registers().iter().all(|&r| r <= 61));
        assert_eq!(hll.registers()[0], 61);
    }

    #[test]
    fn test_alpha() {
        assert_eq!(HyperLogLog::new(4).unwrap().alpha, 0.673);
        assert_eq!(HyperLogLog::new(5).unwrap().alpha, 0.697);
        assert_eq!(HyperLogLog::new(6).unwrap().alpha, 0.709);
        let a = HyperLogLog::new(10).unwrap().alpha;
        assert!((a - 0.7213 / (1.0 + 1.079 / 1024.0)).abs() < 1e-12);
    }

    #[test]
    fn test_merge() {
        let mut hll1 = HyperLogLog::new(12).unwrap();
        let mut hll2 = HyperLogLog::new(12).unwrap();

        for i in 0..5000 {
            hll1.add(&format!("a_{}", i));
        }
        for i in 0..5000 {
            hll2.add(&format!("b_{}", i));
        }

        let est1 = hll1.estimate();
        let est2 = hll2.estimate();

        let merged = hll1.merge(&hll2).unwrap();
        let merged_est = merged.estimate();

        // Inputs are untouched
        assert_eq!(hll1.estimate(), est1);
        assert_eq!(hll2.estimate(), est2);

        assert!(merged_est > est1);
        assert!(merged_est > est2);
        assert!(merged_est > 9000.0 && merged_est < 11000.0, "merged={}", merged_est);
        assert_eq!(merged.updates(), 10000);
    }

    #[test]
    fn test_merge_is_register_max() {
        let mut hll1 = HyperLogLog::new(8).unwrap();
        let mut hll2 = HyperLogLog::new(8).unwrap();
        for i in 0..300u32 {
            hll1.add(&i);
            hll2.add(&(i + 150));
        }

        let merged = hll1.merge(&hll2).unwrap();
        for ((&m, &a), &b) in merged
            .registers()
            .iter()
            .zip(hll1.registers())
            .zip(hll2.registers())
        {
            assert_eq!(m, a.max(b));
        }
    }

    #[test]
    fn test_add_operator() {
        let mut hll1 = HyperLogLog::new(10).unwrap();
        let mut hll2 = HyperLogLog::new(10).unwrap();
        hll1.add("x");
        hll2.add("y");

        let sum = (&hll1 + &hll2).unwrap();
        assert_eq!(sum, hll1.merge(&hll2).unwrap());
        assert_eq!(sum.count(), 2);

        let other = HyperLogLog::new(11).unwrap();
        assert!((&hll1 + &other).is_err());
    }

    #[test]
    fn test_merge_incompatible() {
        let mut hll1 = HyperLogLog::new(12).unwrap();
        let hll2 = HyperLogLog::new(14).unwrap();

        assert_eq!(
            hll1.merge_from(&hll2),
            Err(MergeError::IncompatibleConfig {
                expected: "precision=12".into(),
                found: "precision=14".into(),
            })
        );
    }

    #[test]
    fn test_precision() {
        let hll = HyperLogLog::new(14).unwrap();
        assert_eq!(hll.precision(), 14);
        assert_eq!(hll.num_registers(), 16384);
    }

    #[test]
    fn test_error_bounds() {
        let mut hll = HyperLogLog::new(14).unwrap();

        for i in 0..100000 {
            hll.add(&format!("item_{}", i));
        }

        let bounds = hll.error_bounds(0.95);
        assert!(bounds.lower < bounds.estimate);
        assert!(bounds.estimate < bounds.upper);
        assert!(bounds.lower < 110000.0);
        assert!(bounds.upper > 90000.0);

        let default_bounds = hll.estimate_with_bounds();
        assert_eq!(default_bounds.confidence, 0.95);
        assert_eq!(default_bounds.lower, bounds.lower);
        assert_eq!(default_bounds.upper, bounds.upper);
    }

    #[test]
    fn test_small_cardinalities() {
        let mut hll = HyperLogLog::new(12).unwrap();

        // Small number of items - linear counting should kick in
        for i in 0..100 {
            hll.add(&format!("item_{}", i));
        }

        let estimate = hll.estimate();
        assert!(estimate > 95.0 && estimate < 105.0, "estimate={}", estimate);
    }

    #[test]
    fn test_large_range_correction() {
        let hll = HyperLogLog::new(4).unwrap();
        let raw = TWO_POW_32 / 2.0;
        let corrected = hll.corrected(raw);
        assert!(corrected > raw);
        assert!((corrected - TWO_POW_32 * 2f64.ln()).abs() < 1.0);

        // Past the 32-bit space the raw estimate is kept as-is
        assert_eq!(hll.corrected(TWO_POW_32 * 2.0), TWO_POW_32 * 2.0);
    }

    #[test]
    fn test_display_items() {
        let mut hll = HyperLogLog::new(10).unwrap();
        for v in [0.5f64, 1.5, 2.5, 0.5] {
            hll.add_display(&v);
        }
        assert_eq!(hll.count(), 3);
    }

    #[test]
    fn test_clear() {
        let mut hll = HyperLogLog::new(12).unwrap();

        for i in 0..1000 {
            hll.add(&format!("item_{}", i));
        }

        assert!(hll.estimate() > 0.0);

        hll.clear();
        assert_eq!(hll.estimate(), 0.0);
        assert_eq!(hll.updates(), 0);
    }

    #[test]
    fn test_with_error() {
        let hll = HyperLogLog::with_error(0.01).unwrap(); // Target 1% error
        assert!(hll.precision() >= 13);
        assert!(HyperLogLog::with_error(0.0).is_err());
        assert!(HyperLogLog::with_error(f64::NAN).is_err());
    }
}
