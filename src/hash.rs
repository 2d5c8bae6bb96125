//! Hash adapter shared by every sketch
//!
//! Maps arbitrary items to uniformly distributed 64-bit values using seeded
//! XXH3. Items are fed through their [`Hash`] impl, so any hashable value can
//! be added to a sketch. Values without a `Hash` impl (floats, for instance)
//! can go through [`hash_display`] or a stable representation such as
//! `f64::to_bits`.
//!
//! The hash of an item depends on its `Hash` impl: `"abc"` and `b"abc"` hash
//! differently. Pick one representation per stream.

use core::fmt::{self, Display, Write};
use core::hash::{Hash, Hasher};
use xxhash_rust::xxh3::{xxh3_64_with_seed, Xxh3};

/// Seed used by the HyperLogLog family.
///
/// Changing it invalidates every serialized register array.
pub const DEFAULT_SEED: u64 = 0x5ee7_c0de_d1ce_f00d;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Hash an item through its [`Hash`] impl with the given seed
#[inline]
pub fn hash_item<T: Hash + ?Sized>(item: &T, seed: u64) -> u64 {
    let mut hasher = Xxh3::with_seed(seed);
    item.hash(&mut hasher);
    hasher.finish()
}

/// Hash raw bytes with the given seed
#[inline]
pub fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(bytes, seed)
}

/// Hash the `Display` rendering of a value without allocating
///
/// Equal strings hash equally: `hash_display(&42, s) == hash_display("42", s)`.
pub fn hash_display<T: Display + ?Sized>(item: &T, seed: u64) -> u64 {
    let mut sink = DigestWriter(Xxh3::with_seed(seed));
    // DigestWriter never returns an error; only a Display impl that lies could.
    let _ = write!(sink, "{}", item);
    sink.0.digest()
}

/// Derive `n` distinct, well-mixed seeds from one base seed
///
/// Used to turn one hash primitive into a family of independent row hashes.
pub fn derive_seeds(base_seed: u64, n: usize) -> Vec<u64> {
    (0..n as u64)
        .map(|i| splitmix64(base_seed.wrapping_add(i.wrapping_mul(GOLDEN_GAMMA))))
        .collect()
}

/// splitmix64 finalizer (a bijection on u64)
#[inline]
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

struct DigestWriter(Xxh3);

impl Write for DigestWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.update(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(hash_item("alice", 7), hash_item("alice", 7));
        assert_eq!(hash_item(&42u64, 7), hash_item(&42u64, 7));
        assert_eq!(hash_bytes(b"alice", 7), hash_bytes(b"alice", 7));
    }

    #[test]
    fn test_seed_changes_hash() {
        assert_ne!(hash_item("alice", 1), hash_item("alice", 2));
        assert_ne!(hash_bytes(b"alice", 1), hash_bytes(b"alice", 2));
    }

    #[test]
    fn test_display_matches_string() {
        assert_eq!(hash_display(&42, 3), hash_display("42", 3));
        assert_eq!(hash_display(&1.5f64, 3), hash_display("1.5", 3));
        assert_eq!(hash_display("42", 3), hash_bytes(b"42", 3));
    }

    #[test]
    fn test_derived_seeds_distinct() {
        let seeds = derive_seeds(0, 64);
        let mut sorted = seeds.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 64);

        assert_eq!(derive_seeds(99, 8), derive_seeds(99, 8));
        assert_ne!(derive_seeds(1, 4), derive_seeds(2, 4));
    }

    #[test]
    fn test_bits_look_uniform() {
        // Every bit position should be set for roughly half of the inputs.
        let n = 4096u64;
        let mut ones = [0u32; 64];
        for i in 0..n {
            let h = hash_item(&i, DEFAULT_SEED);
            for (bit, count) in ones.iter_mut().enumerate() {
                *count += ((h >> bit) & 1) as u32;
            }
        }
        for (bit, &count) in ones.iter().enumerate() {
            let frac = count as f64 / n as f64;
            assert!(frac > 0.4 && frac < 0.6, "bit {} set in {:.3} of hashes", bit, frac);
        }
    }
}
