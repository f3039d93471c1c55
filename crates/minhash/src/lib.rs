//! # Ontomatch MinHash
//!
//! Leaf crate of the ontomatch similarity engine. It turns a set of shingles
//! into a fixed-length MinHash signature and estimates Jaccard similarity from
//! two signatures.
//!
//! ## Contract
//!
//! - Shingles are opaque strings. Tokenization policy lives in the caller or in
//!   the [`Shingler`] adapters shipped here.
//! - A [`HashFamily`] is a pure function of `(num_hashes, seed)`: two families
//!   built with the same parameters hash every input identically, in every
//!   process and on every machine.
//! - `signature[i]` is the minimum of hash function `i` over all shingles. An
//!   empty shingle set yields the all-sentinel signature (`u64::MAX` in every
//!   slot).
//!
//! ## Example Usage
//!
//! ```
//! use minhash::{compute_signature, jaccard_estimate, HashFamily};
//!
//! let family = HashFamily::new(128, 7);
//! let a = compute_signature(&["sal", "alt", "lte", "ted"], &family);
//! let b = compute_signature(&["sal", "alt", "lte", "ted"], &family);
//!
//! assert_eq!(a.len(), 128);
//! assert_eq!(jaccard_estimate(&a, &b).unwrap(), 1.0);
//! ```

mod error;
mod family;
mod shingles;
mod signature;

pub use crate::error::MinHashError;
pub use crate::family::{HashFamily, DEFAULT_SEED};
pub use crate::shingles::{NGramShingler, ShingleMode, Shingler};
pub use crate::signature::{
    compute_signature, compute_signature_parallel, exact_jaccard, jaccard_estimate, Signature,
    SENTINEL,
};
