//! HyperLogLog++ cardinality estimator with a sparse small-cardinality path
//!
//! Starts in sparse mode, holding a deduplicated set of packed
//! `(index, rank)` entries instead of `2^precision` registers. While sparse,
//! the count is exact. Once the set grows past `6 * m` entries it is decoded
//! into a dense [`HyperLogLog`] and the sketch never goes back.

use super::hyperloglog::{rank_of, validate_precision, HyperLogLog};
use crate::hash::{hash_display, hash_item, DEFAULT_SEED};
use crate::traits::{CardinalitySketch, ConfigError, MergeError, Sketch};
use core::fmt::Display;
use core::hash::Hash;
use std::collections::BTreeSet;

/// Index precision used for sparse entries
///
/// Higher than any dense precision, so two distinct items only share a
/// sparse entry if 31 hash-derived bits agree.
const SPARSE_PRECISION: u32 = 25;
/// Bits reserved for the rank inside a packed entry
const RANK_BITS: u32 = 6;
/// Rank of a sparse entry whose 39 high hash bits are all zero
const SPARSE_RANK_SATURATED: u8 = (64 - SPARSE_PRECISION + 1) as u8;

/// Register storage: sparse set first, dense registers after the switch
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Representation {
    Sparse { entries: BTreeSet<u32>, updates: u64 },
    Dense(HyperLogLog),
}

impl Representation {
    fn empty() -> Self {
        Representation::Sparse {
            entries: BTreeSet::new(),
            updates: 0,
        }
    }

    /// Consume the sparse state and produce the equivalent dense registers
    fn into_dense(self, precision: u8) -> Self {
        match self {
            Representation::Sparse { entries, updates } => {
                tracing::debug!(
                    precision,
                    entries = entries.len(),
                    threshold = sparse_threshold_for(precision),
                    "converting hyperloglog++ from sparse to dense"
                );
                let mut dense = HyperLogLog::with_valid_precision(precision);
                absorb_sparse(&mut dense, &entries, precision);
                dense.record_updates(updates);
                Representation::Dense(dense)
            }
            dense @ Representation::Dense(_) => dense,
        }
    }
}

/// HyperLogLog++ cardinality estimator
///
/// Same accuracy as [`HyperLogLog`] once dense, but exact and much smaller
/// for streams with few distinct items.
///
/// # Example
///
/// ```
/// use streamsketch::cardinality::HyperLogLogPlusPlus;
/// use streamsketch::traits::CardinalitySketch;
///
/// let mut hll = HyperLogLogPlusPlus::new(14).unwrap();
/// for user in ["alice", "bob", "carol", "alice"] {
///     hll.add(user);
/// }
///
/// assert!(hll.is_sparse());
/// assert_eq!(hll.count(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "HllPlusParts"))]
pub struct HyperLogLogPlusPlus {
    precision: u8,
    repr: Representation,
}

impl HyperLogLogPlusPlus {
    /// Create a new sketch in sparse mode
    ///
    /// Precision must be between 4 and 16 inclusive.
    pub fn new(precision: u8) -> Result<Self, ConfigError> {
        validate_precision(precision)?;
        Ok(Self {
            precision,
            repr: Representation::empty(),
        })
    }

    /// Create a sketch targeting a specific relative error once dense
    pub fn with_error(target_error: f64) -> Result<Self, ConfigError> {
        Self::new(super::precision_for_error(target_error)?)
    }

    /// Get the precision parameter
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Whether the sketch is still in the exact sparse regime
    pub fn is_sparse(&self) -> bool {
        matches!(self.repr, Representation::Sparse { .. })
    }

    /// Number of distinct sparse entries (zero once dense)
    pub fn sparse_len(&self) -> usize {
        match &self.repr {
            Representation::Sparse { entries, .. } => entries.len(),
            Representation::Dense(_) => 0,
        }
    }

    /// Entry count past which the sketch converts to dense registers
    pub fn sparse_threshold(&self) -> usize {
        sparse_threshold_for(self.precision)
    }

    /// Dense registers, if the sketch has converted
    pub fn registers(&self) -> Option<&[u8]> {
        match &self.repr {
            Representation::Sparse { .. } => None,
            Representation::Dense(hll) => Some(hll.registers()),
        }
    }

    /// Add an item through its `Hash` impl
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T) {
        self.add_hash(hash_item(item, DEFAULT_SEED));
    }

    /// Add an item through its `Display` rendering
    pub fn add_display<T: Display + ?Sized>(&mut self, item: &T) {
        self.add_hash(hash_display(item, DEFAULT_SEED));
    }

    /// Add a pre-computed 64-bit hash value
    pub fn add_hash(&mut self, hash: u64) {
        match &mut self.repr {
            Representation::Sparse { entries, updates } => {
                *updates += 1;
                entries.insert(encode_sparse(hash));
            }
            Representation::Dense(hll) => {
                hll.add_hash(hash);
                return;
            }
        }
        self.densify_if_needed();
    }

    /// Force the switch to dense registers
    pub fn densify(&mut self) {
        let repr = core::mem::replace(&mut self.repr, Representation::empty());
        self.repr = repr.into_dense(self.precision);
    }

    fn densify_if_needed(&mut self) {
        if self.sparse_len() > self.sparse_threshold() {
            self.densify();
        }
    }
}

fn sparse_threshold_for(precision: u8) -> usize {
    6 * (1usize << precision)
}

/// Pack a hash into a sparse entry: `(low 25 bits) << 6 | rank of the high 39 bits`
#[inline]
fn encode_sparse(hash: u64) -> u32 {
    let idx = (hash & ((1u64 << SPARSE_PRECISION) - 1)) as u32;
    let rank = rank_of(hash >> SPARSE_PRECISION, 64 - SPARSE_PRECISION);
    (idx << RANK_BITS) | rank as u32
}

/// Recover the `(index, rank)` pair dense registers would derive from the same hash
#[inline]
fn decode_sparse(entry: u32, precision: u8) -> (usize, u8) {
    let p = precision as u32;
    let idx = entry >> RANK_BITS;
    let rank = (entry & ((1 << RANK_BITS) - 1)) as u8;
    let register = (idx & ((1 << p) - 1)) as usize;

    if rank < SPARSE_RANK_SATURATED {
        return (register, rank);
    }

    // High bits were all zero; keep counting through the index bits above p.
    let rest = (idx >> p) as u64;
    (register, SPARSE_RANK_SATURATED - 1 + rank_of(rest, SPARSE_PRECISION - p))
}

fn absorb_sparse(dense: &mut HyperLogLog, entries: &BTreeSet<u32>, precision: u8) {
    for &entry in entries {
        let (idx, rank) = decode_sparse(entry, precision);
        dense.observe(idx, rank);
    }
}

impl Sketch for HyperLogLogPlusPlus {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        self.add(item);
    }

    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.precision != other.precision {
            return Err(MergeError::incompatible(
                "hyperloglog++",
                format!("precision={}", self.precision),
                format!("precision={}", other.precision),
            ));
        }

        let precision = self.precision;
        let promoted = match (&mut self.repr, &other.repr) {
            (
                Representation::Sparse { entries, updates },
                Representation::Sparse {
                    entries: theirs,
                    updates: their_updates,
                },
            ) => {
                entries.extend(theirs.iter().copied());
                *updates += *their_updates;
                None
            }
            (Representation::Sparse { entries, updates }, Representation::Dense(theirs)) => {
                let mut dense = theirs.clone();
                absorb_sparse(&mut dense, entries, precision);
                dense.record_updates(*updates);
                Some(dense)
            }
            (
                Representation::Dense(ours),
                Representation::Sparse {
                    entries: theirs,
                    updates: their_updates,
                },
            ) => {
                absorb_sparse(ours, theirs, precision);
                ours.record_updates(*their_updates);
                None
            }
            (Representation::Dense(ours), Representation::Dense(theirs)) => {
                ours.merge_from(theirs)?;
                None
            }
        };

        if let Some(dense) = promoted {
            self.repr = Representation::Dense(dense);
        }
        self.densify_if_needed();
        Ok(())
    }

    /// Reset all observations, keeping the current representation
    fn clear(&mut self) {
        match &mut self.repr {
            Representation::Sparse { entries, updates } => {
                entries.clear();
                *updates = 0;
            }
            Representation::Dense(hll) => hll.clear(),
        }
    }

    fn size_bytes(&self) -> usize {
        let payload = match &self.repr {
            Representation::Sparse { entries, .. } => entries.len() * core::mem::size_of::<u32>(),
            Representation::Dense(hll) => hll.size_bytes(),
        };
        core::mem::size_of::<Self>() + payload
    }

    fn updates(&self) -> u64 {
        match &self.repr {
            Representation::Sparse { updates, .. } => *updates,
            Representation::Dense(hll) => hll.updates(),
        }
    }
}

impl CardinalitySketch for HyperLogLogPlusPlus {
    fn estimate(&self) -> f64 {
        match &self.repr {
            Representation::Sparse { entries, .. } => entries.len() as f64,
            Representation::Dense(hll) => hll.estimate(),
        }
    }

    fn relative_error(&self) -> f64 {
        match &self.repr {
            Representation::Sparse { .. } => 0.0,
            Representation::Dense(hll) => hll.relative_error(),
        }
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct HllPlusParts {
    precision: u8,
    repr: Representation,
}

#[cfg(feature = "serde")]
impl TryFrom<HllPlusParts> for HyperLogLogPlusPlus {
    type Error = String;

    fn try_from(parts: HllPlusParts) -> Result<Self, Self::Error> {
        validate_precision(parts.precision).map_err(|e| e.to_string())?;
        match &parts.repr {
            Representation::Sparse { entries, .. } => {
                let bad = entries.iter().any(|&e| {
                    let rank = (e & ((1 << RANK_BITS) - 1)) as u8;
                    rank == 0 || rank > SPARSE_RANK_SATURATED || (e >> RANK_BITS) >> SPARSE_PRECISION != 0
                });
                if bad {
                    return Err("malformed sparse entry".to_string());
                }
            }
            Representation::Dense(hll) if hll.precision() != parts.precision => {
                return Err(format!(
                    "dense precision {} does not match {}",
                    hll.precision(),
                    parts.precision
                ));
            }
            Representation::Dense(_) => {}
        }
        let mut hll = Self {
            precision: parts.precision,
            repr: parts.repr,
        };
        // a sparse set above the threshold is only reachable by hand; settle it as add would
        hll.densify_if_needed();
        Ok(hll)
    }
}
