//! # Ontomatch Index
//!
//! Locality-sensitive hashing index over MinHash signatures.
//!
//! Each inserted document contributes one signature to the signature store and
//! one bucket entry per band. A query computes its own signature, unions the
//! bucket members of every band into a candidate set and keeps the candidates
//! whose estimated Jaccard similarity reaches the caller's threshold.
//!
//! ## Backends
//!
//! Storage sits behind the [`BucketStore`] trait:
//! - [`InMemoryStore`], concurrent hash maps in this process (default);
//! - `RedisStore`, an external redis server (enabled via the `backend-redis`
//!   feature, on by default).
//!
//! ## Example Usage
//!
//! ```
//! use index::{IndexConfig, LshIndex};
//!
//! let index = LshIndex::new(IndexConfig::default()).unwrap();
//! index.insert(&["pap", "apr", "pri", "rik", "ika"], "paprika").unwrap();
//!
//! let hits = index.query(&["pap", "apr", "pri", "rik", "ika"], 0.9).unwrap();
//! assert!(hits.contains("paprika"));
//! ```

mod backend;
pub mod band;
mod query;

#[cfg(feature = "backend-redis")]
pub use backend::RedisStore;
pub use backend::{BackendConfig, BucketStore, DocSet, InMemoryStore, RedisConfig};
pub use query::QueryHit;

use band::{band_fingerprint, band_ranges};
use log::{debug, info};
use minhash::{
    compute_signature, compute_signature_parallel, HashFamily, MinHashError, Signature,
    DEFAULT_SEED,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Banding parameters, fixed for the lifetime of an index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LshConfig {
    /// Signature length.
    pub num_hashes: usize,
    /// Number of bands; must divide `num_hashes`.
    pub num_bands: usize,
    /// Hash family seed.
    pub seed: u64,
    /// Compute signature slots on the rayon pool.
    pub use_parallel: bool,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_hashes: 100,
            num_bands: 25,
            seed: DEFAULT_SEED,
            use_parallel: false,
        }
    }
}

impl LshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_hashes(mut self, num_hashes: usize) -> Self {
        self.num_hashes = num_hashes;
        self
    }

    pub fn with_num_bands(mut self, num_bands: usize) -> Self {
        self.num_bands = num_bands;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    /// Signature positions per band.
    pub fn band_size(&self) -> usize {
        if self.num_bands == 0 {
            0
        } else {
            self.num_hashes / self.num_bands
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.num_hashes == 0 {
            return Err(IndexError::InvalidConfig(
                "num_hashes must be greater than zero".into(),
            ));
        }
        if self.num_bands == 0 {
            return Err(IndexError::InvalidConfig(
                "num_bands must be greater than zero".into(),
            ));
        }
        if self.num_hashes % self.num_bands != 0 {
            return Err(IndexError::InvalidConfig(format!(
                "num_bands ({}) must evenly divide num_hashes ({})",
                self.num_bands, self.num_hashes
            )));
        }
        Ok(())
    }
}

/// Config for initializing the index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Banding parameters.
    pub lsh: LshConfig,
    /// Backend storage configuration (in-memory or redis).
    pub backend: BackendConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lsh(mut self, lsh: LshConfig) -> Self {
        self.lsh = lsh;
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }
}

/// Custom error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("signature dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },
    #[error("document not found: {doc_id}")]
    NotFound { doc_id: String },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("invalid index config: {0}")]
    InvalidConfig(String),
    #[error("document already indexed: {doc_id}")]
    DuplicateDocument { doc_id: String },
    #[error("band {band} out of range for {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },
}

impl From<MinHashError> for IndexError {
    fn from(e: MinHashError) -> Self {
        match e {
            MinHashError::DimensionMismatch { left, right } => {
                IndexError::DimensionMismatch { left, right }
            }
            MinHashError::InvalidConfig(msg) => IndexError::InvalidConfig(msg),
        }
    }
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Index structure
pub struct LshIndex {
    config: LshConfig,
    family: HashFamily,
    store: Box<dyn BucketStore>,
}

impl LshIndex {
    /// Validate `cfg` and build its backend.
    pub fn new(cfg: IndexConfig) -> Result<Self, IndexError> {
        cfg.lsh.validate()?;
        let store = cfg.backend.build(cfg.lsh.num_bands)?;
        Self::with_store(cfg.lsh, store)
    }

    /// Build an index over a caller-supplied store.
    ///
    /// A store that reports a fixed band count must match `config.num_bands`.
    pub fn with_store(config: LshConfig, store: Box<dyn BucketStore>) -> Result<Self, IndexError> {
        config.validate()?;
        if let Some(bands) = store.num_bands() {
            if bands != config.num_bands {
                return Err(IndexError::InvalidConfig(format!(
                    "store holds {bands} bands but num_bands is {}",
                    config.num_bands
                )));
            }
        }
        let family = HashFamily::new(config.num_hashes, config.seed);
        info!(
            "lsh_index_ready num_hashes={} num_bands={} band_size={} parallel={}",
            config.num_hashes,
            config.num_bands,
            config.band_size(),
            config.use_parallel
        );
        Ok(Self {
            config,
            family,
            store,
        })
    }

    pub fn config(&self) -> &LshConfig {
        &self.config
    }

    pub fn family(&self) -> &HashFamily {
        &self.family
    }

    pub fn store(&self) -> &dyn BucketStore {
        self.store.as_ref()
    }

    /// Signature of `shingles` under this index's hash family.
    pub fn signature<S: AsRef<str> + Sync>(&self, shingles: &[S]) -> Signature {
        if self.config.use_parallel {
            compute_signature_parallel(shingles, &self.family)
        } else {
            compute_signature(shingles, &self.family)
        }
    }

    /// Index `shingles` under `doc_id`.
    ///
    /// Buckets are written first and the signature last; the signature is the
    /// commit point. A failed bucket write leaves `doc_id` uncommitted (and
    /// invisible to queries), so the same call can simply be retried.
    ///
    /// Fails with [`IndexError::DuplicateDocument`] if `doc_id` already has a
    /// signature; in that case no bucket is touched. Of two racing inserts of
    /// one id exactly one commits.
    pub fn insert<S: AsRef<str> + Sync>(&self, shingles: &[S], doc_id: &str) -> Result<(), IndexError> {
        if self.store.has_signature(doc_id)? {
            return Err(IndexError::DuplicateDocument {
                doc_id: doc_id.to_string(),
            });
        }
        let signature = self.signature(shingles);
        for (band, range) in band_ranges(self.config.num_bands, self.config.band_size()) {
            let fingerprint = band_fingerprint(&signature, range.start, range.end);
            self.store.add_to_bucket(band, &fingerprint, doc_id)?;
        }
        if !self.store.try_put_signature(doc_id, &signature)? {
            return Err(IndexError::DuplicateDocument {
                doc_id: doc_id.to_string(),
            });
        }
        debug!("indexed {doc_id} ({} shingles)", shingles.len());
        Ok(())
    }

    /// Insert many documents on the rayon pool. The first error is returned.
    pub fn insert_batch<D, S>(&self, docs: &[(D, Vec<S>)]) -> Result<(), IndexError>
    where
        D: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        docs.par_iter()
            .try_for_each(|(doc_id, shingles)| self.insert(shingles, doc_id.as_ref()))?;
        self.store.flush()?;
        info!("indexed batch of {} documents", docs.len());
        Ok(())
    }

    /// Number of indexed documents.
    pub fn len(&self) -> Result<usize, IndexError> {
        self.store.num_documents()
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    pub fn flush(&self) -> Result<(), IndexError> {
        self.store.flush()
    }
}
