use crate::IndexError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use minhash::Signature;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Set of document identifiers held by a bucket or returned by a query.
pub type DocSet = hashbrown::HashSet<String>;

/// Storage for per-document signatures and per-band buckets.
///
/// Implementations must be safe to share across threads: the sharded matcher
/// queries one store from many workers while the build phase may still be
/// inserting.
pub trait BucketStore: Send + Sync {
    /// Store or overwrite the signature of `doc_id`.
    fn put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<(), IndexError>;
    /// Store the signature only if `doc_id` has none yet. Returns whether it stored.
    fn try_put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<bool, IndexError>;
    /// Fetch the signature of `doc_id`, failing with [`IndexError::NotFound`].
    fn get_signature(&self, doc_id: &str) -> Result<Signature, IndexError>;
    /// Whether `doc_id` has a stored signature.
    fn has_signature(&self, doc_id: &str) -> Result<bool, IndexError> {
        match self.get_signature(doc_id) {
            Ok(_) => Ok(true),
            Err(IndexError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
    /// Add `doc_id` to the bucket `(band, fingerprint)`. Idempotent.
    fn add_to_bucket(&self, band: usize, fingerprint: &str, doc_id: &str)
        -> Result<(), IndexError>;
    /// Members of the bucket `(band, fingerprint)`; empty if the bucket does not exist.
    fn members_of(&self, band: usize, fingerprint: &str) -> Result<DocSet, IndexError>;
    /// Number of documents with a stored signature.
    fn num_documents(&self) -> Result<usize, IndexError>;
    /// Number of bands this store holds, if it is fixed at construction.
    fn num_bands(&self) -> Option<usize> {
        None
    }
    /// Flush any buffered writes to the backend.
    fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Connection settings for the redis backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Prepended to every key so several indexes can share one database.
    pub key_prefix: String,
    /// Size of the round-robin connection pool.
    pub connections: usize,
    /// Retries after a transport failure before the error surfaces.
    pub max_retries: u32,
    /// Pause between retries.
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: "ontomatch:".to_string(),
            connections: 4,
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl RedisConfig {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Hash holding one field per signature position.
    pub fn signature_key(&self, doc_id: &str) -> String {
        format!("{}signatures:{doc_id}", self.key_prefix)
    }

    /// Set holding the members of one bucket.
    pub fn bucket_key(&self, band: usize, fingerprint: &str) -> String {
        format!("{}buckets:{band}:{fingerprint}", self.key_prefix)
    }

    /// Set of every document id with a stored signature.
    pub fn documents_key(&self) -> String {
        format!("{}documents", self.key_prefix)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use index::{BackendConfig, RedisConfig};
///
/// // In-memory (default)
/// let config = BackendConfig::in_memory();
///
/// // Redis
/// let config = BackendConfig::redis(RedisConfig::new("redis://127.0.0.1/"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Concurrent hash maps in this process.
    #[default]
    InMemory,
    /// External redis server.
    ///
    /// Requires the `backend-redis` feature (enabled by default).
    Redis(RedisConfig),
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redis(config: RedisConfig) -> Self {
        BackendConfig::Redis(config)
    }

    /// Build the store for an index with `num_bands` bands.
    pub fn build(&self, num_bands: usize) -> Result<Box<dyn BucketStore>, IndexError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryStore::new(num_bands))),
            BackendConfig::Redis(config) => {
                #[cfg(feature = "backend-redis")]
                {
                    Ok(Box::new(RedisStore::connect(config.clone())?))
                }
                #[cfg(not(feature = "backend-redis"))]
                {
                    let _ = config;
                    Err(IndexError::backend("redis backend disabled at compile time"))
                }
            }
        }
    }
}

/// In-process store: one concurrent map per band plus a signature map.
///
/// Writers to the same bucket serialize on the owning map shard only for the
/// duration of the append.
pub struct InMemoryStore {
    bands: Vec<DashMap<String, DocSet>>,
    signatures: DashMap<String, Signature>,
}

impl InMemoryStore {
    pub fn new(num_bands: usize) -> Self {
        Self {
            bands: (0..num_bands).map(|_| DashMap::new()).collect(),
            signatures: DashMap::new(),
        }
    }

    fn band(&self, band: usize) -> Result<&DashMap<String, DocSet>, IndexError> {
        self.bands.get(band).ok_or(IndexError::BandOutOfRange {
            band,
            bands: self.bands.len(),
        })
    }

    /// Number of non-empty buckets across all bands.
    pub fn num_buckets(&self) -> usize {
        self.bands.iter().map(DashMap::len).sum()
    }
}

impl BucketStore for InMemoryStore {
    fn put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<(), IndexError> {
        self.signatures
            .insert(doc_id.to_string(), signature.to_vec());
        Ok(())
    }

    fn try_put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<bool, IndexError> {
        match self.signatures.entry(doc_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(signature.to_vec());
                Ok(true)
            }
        }
    }

    fn get_signature(&self, doc_id: &str) -> Result<Signature, IndexError> {
        self.signatures
            .get(doc_id)
            .map(|sig| sig.value().clone())
            .ok_or_else(|| IndexError::NotFound {
                doc_id: doc_id.to_string(),
            })
    }

    fn has_signature(&self, doc_id: &str) -> Result<bool, IndexError> {
        Ok(self.signatures.contains_key(doc_id))
    }

    fn add_to_bucket(
        &self,
        band: usize,
        fingerprint: &str,
        doc_id: &str,
    ) -> Result<(), IndexError> {
        self.band(band)?
            .entry(fingerprint.to_string())
            .or_default()
            .insert(doc_id.to_string());
        Ok(())
    }

    fn members_of(&self, band: usize, fingerprint: &str) -> Result<DocSet, IndexError> {
        Ok(self
            .band(band)?
            .get(fingerprint)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default())
    }

    fn num_documents(&self) -> Result<usize, IndexError> {
        Ok(self.signatures.len())
    }

    fn num_bands(&self) -> Option<usize> {
        Some(self.bands.len())
    }
}

#[cfg(feature = "backend-redis")]
pub mod redis;

#[cfg(feature = "backend-redis")]
pub use self::redis::RedisStore;
