//! Seeded hash families for MinHash.
//!
//! Every function in the family hashes raw bytes with XXH3-64 keyed by a
//! per-function seed, then runs the result through a 64-bit finalizer. The
//! per-function seed is derived from the family seed and the function index
//! with a SplitMix64 step, so function `i` is fully determined by
//! `(seed, i)`.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Family seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x243F_6A88_85A3_08D3;

/// A family of independent 64-bit hash functions, one per signature slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFamily {
    seed: u64,
    keys: Vec<u64>,
}

impl HashFamily {
    /// Build `num_hashes` functions from `seed`.
    pub fn new(num_hashes: usize, seed: u64) -> Self {
        let keys = (0..num_hashes).map(|i| function_key(seed, i)).collect();
        Self { seed, keys }
    }

    /// Build `num_hashes` functions from [`DEFAULT_SEED`].
    pub fn with_default_seed(num_hashes: usize) -> Self {
        Self::new(num_hashes, DEFAULT_SEED)
    }

    /// Number of functions in the family (the signature length).
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Apply function `i` to `bytes`.
    ///
    /// Panics if `i >= self.len()`.
    #[inline]
    pub fn hash(&self, i: usize, bytes: &[u8]) -> u64 {
        fmix64(xxh3_64_with_seed(bytes, self.keys[i]))
    }
}

#[inline]
fn function_key(seed: u64, i: usize) -> u64 {
    let step = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    splitmix64(seed.wrapping_add(step))
}

#[inline]
pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}
