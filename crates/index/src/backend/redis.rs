use crate::backend::{BucketStore, DocSet, RedisConfig};
use crate::IndexError;
use ::redis::{Client, Connection, RedisError, Script};
use log::warn;
use minhash::Signature;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

/// Store backed by a redis server.
///
/// Signatures live in hashes (`{prefix}signatures:{doc}`, one field per
/// position) and buckets in sets (`{prefix}buckets:{band}:{fingerprint}`).
/// Stored ids are also tracked in `{prefix}documents` for counting.
/// Claiming an id writes its signature hash and its `documents` entry in one
/// server-side script, so a claim is never half applied.
/// A fixed pool of blocking connections is handed out round-robin; a
/// connection that hit a transport error is reopened before the retry.
pub struct RedisStore {
    client: Client,
    config: RedisConfig,
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    claim: Script,
}

/// KEYS: signature hash, documents set. ARGV: doc id, then position/value pairs.
const CLAIM_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV, 2))
redis.call('SADD', KEYS[2], ARGV[1])
return 1
";

impl RedisStore {
    /// Open `config.connections` connections to `config.url`.
    pub fn connect(config: RedisConfig) -> Result<Self, IndexError> {
        if config.connections == 0 {
            return Err(IndexError::InvalidConfig(
                "redis connection pool must hold at least one connection".into(),
            ));
        }
        let client = Client::open(config.url.as_str()).map_err(map_redis_error)?;
        let pool = (0..config.connections)
            .map(|_| client.get_connection().map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_redis_error)?;
        Ok(Self {
            client,
            config,
            pool,
            next: AtomicUsize::new(0),
            claim: Script::new(CLAIM_SCRIPT),
        })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Run `op` on the next pooled connection, retrying transport failures.
    fn with_connection<T, F>(&self, mut op: F) -> Result<T, IndexError>
    where
        F: FnMut(&mut Connection) -> Result<T, RedisError>,
    {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        let mut conn = self.pool[slot]
            .lock()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let mut attempt = 0;
        loop {
            match op(&mut *conn) {
                Ok(value) => return Ok(value),
                Err(err) if is_transport_error(&err) && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "redis transport error on connection {slot} (attempt {attempt}/{}): {err}",
                        self.config.max_retries
                    );
                    thread::sleep(self.config.retry_backoff);
                    if let Ok(fresh) = self.client.get_connection() {
                        *conn = fresh;
                    }
                }
                Err(err) => return Err(map_redis_error(err)),
            }
        }
    }

    fn write_signature(
        &self,
        conn: &mut Connection,
        doc_id: &str,
        signature: &[u64],
    ) -> Result<(), RedisError> {
        let mut hset = ::redis::cmd("HSET");
        hset.arg(self.config.signature_key(doc_id));
        for (position, value) in signature.iter().enumerate() {
            hset.arg(position).arg(*value);
        }
        ::redis::pipe()
            .atomic()
            .add_command(hset)
            .ignore()
            .cmd("SADD")
            .arg(self.config.documents_key())
            .arg(doc_id)
            .ignore()
            .query(conn)
    }
}

impl BucketStore for RedisStore {
    fn put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<(), IndexError> {
        if signature.is_empty() {
            return Err(IndexError::InvalidConfig(
                "cannot store an empty signature".into(),
            ));
        }
        self.with_connection(|conn| self.write_signature(conn, doc_id, signature))
    }

    fn try_put_signature(&self, doc_id: &str, signature: &[u64]) -> Result<bool, IndexError> {
        if signature.is_empty() {
            return Err(IndexError::InvalidConfig(
                "cannot store an empty signature".into(),
            ));
        }
        let mut invocation = self.claim.prepare_invoke();
        invocation
            .key(self.config.signature_key(doc_id))
            .key(self.config.documents_key())
            .arg(doc_id);
        for (position, value) in signature.iter().enumerate() {
            invocation.arg(position).arg(*value);
        }

        let mut attempts = 0;
        let claimed: i64 = self.with_connection(|conn| {
            attempts += 1;
            invocation.invoke(conn)
        })?;
        if claimed == 1 {
            return Ok(true);
        }
        // An earlier attempt may have run the script before its reply was lost.
        if attempts > 1 && self.get_signature(doc_id)? == signature {
            return Ok(true);
        }
        Ok(false)
    }

    fn has_signature(&self, doc_id: &str) -> Result<bool, IndexError> {
        let key = self.config.signature_key(doc_id);
        self.with_connection(|conn| ::redis::cmd("EXISTS").arg(&key).query(conn))
    }

    fn get_signature(&self, doc_id: &str) -> Result<Signature, IndexError> {
        let key = self.config.signature_key(doc_id);
        let fields: HashMap<String, u64> =
            self.with_connection(|conn| ::redis::cmd("HGETALL").arg(&key).query(conn))?;
        if fields.is_empty() {
            return Err(IndexError::NotFound {
                doc_id: doc_id.to_string(),
            });
        }
        decode_signature(doc_id, &fields)
    }

    fn add_to_bucket(
        &self,
        band: usize,
        fingerprint: &str,
        doc_id: &str,
    ) -> Result<(), IndexError> {
        let key = self.config.bucket_key(band, fingerprint);
        self.with_connection(|conn| ::redis::cmd("SADD").arg(&key).arg(doc_id).query(conn))
    }

    fn members_of(&self, band: usize, fingerprint: &str) -> Result<DocSet, IndexError> {
        let key = self.config.bucket_key(band, fingerprint);
        let members: Vec<String> =
            self.with_connection(|conn| ::redis::cmd("SMEMBERS").arg(&key).query(conn))?;
        Ok(members.into_iter().collect())
    }

    fn num_documents(&self) -> Result<usize, IndexError> {
        let key = self.config.documents_key();
        self.with_connection(|conn| ::redis::cmd("SCARD").arg(&key).query(conn))
    }
}

/// Rebuild a signature from its `position -> value` hash fields.
///
/// Every position in `0..fields.len()` must be present.
fn decode_signature(doc_id: &str, fields: &HashMap<String, u64>) -> Result<Signature, IndexError> {
    (0..fields.len())
        .map(|position| {
            fields.get(&position.to_string()).copied().ok_or_else(|| {
                IndexError::backend(format!(
                    "corrupt signature for {doc_id}: missing position {position}"
                ))
            })
        })
        .collect()
}

fn is_transport_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
}

fn map_redis_error(err: RedisError) -> IndexError {
    if is_transport_error(&err) {
        IndexError::BackendUnavailable(err.to_string())
    } else {
        IndexError::backend(err)
    }
}
