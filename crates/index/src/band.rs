//! Band hashing.
//!
//! A band is a contiguous slice of a signature. Its fingerprint is the SHA-1
//! digest of the slice values, each fed as 8 little-endian bytes in index
//! order, rendered as 40 lowercase hex characters. Fixed-width encoding keeps
//! distinct slices from ever sharing a digest input.

use std::ops::Range;

use sha1::{Digest, Sha1};

/// Fingerprint `signature[start..end]`.
///
/// Panics unless `start < end <= signature.len()`.
pub fn band_fingerprint(signature: &[u64], start: usize, end: usize) -> String {
    assert!(
        start < end && end <= signature.len(),
        "band range {start}..{end} out of bounds for signature of length {}",
        signature.len()
    );
    let mut hasher = Sha1::new();
    for value in &signature[start..end] {
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Band index and signature range of every band, in band order.
pub fn band_ranges(
    num_bands: usize,
    band_size: usize,
) -> impl Iterator<Item = (usize, Range<usize>)> {
    (0..num_bands).map(move |band| (band, band * band_size..(band + 1) * band_size))
}
