use std::time::Duration;

use hashbrown::HashMap;
use index::{DocSet, IndexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::PoolError;

/// Merged result of a run: lookup key → matched document ids.
pub type MatchMap = HashMap<String, DocSet>;

/// One lookup in a batch.
///
/// `aux[0]`, when present, is the literal text to match; otherwise the key is
/// matched. Any further auxiliary strings are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTask {
    pub key: String,
    #[serde(default)]
    pub aux: Vec<String>,
}

impl MatchTask {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            aux: Vec::new(),
        }
    }

    pub fn with_aux<S: Into<String>>(key: S, aux: Vec<String>) -> Self {
        Self {
            key: key.into(),
            aux,
        }
    }

    /// Text the task is matched on.
    pub fn text(&self) -> &str {
        self.aux.first().map(String::as_str).unwrap_or(&self.key)
    }
}

/// Similarity thresholds keyed by how many words the matched text has.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdPolicy {
    /// Applied to single-word text, where one differing n-gram moves the score a lot.
    pub single_token: f64,
    /// Applied to text with two or more words.
    pub multi_token: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            single_token: 0.9,
            multi_token: 0.5,
        }
    }
}

impl ThresholdPolicy {
    pub fn threshold_for(&self, text: &str) -> f64 {
        if text.split_whitespace().nth(1).is_some() {
            self.multi_token
        } else {
            self.single_token
        }
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        for (name, value) in [
            ("single_token", self.single_token),
            ("multi_token", self.multi_token),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} threshold must be between 0.0 and 1.0"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a sharded matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Number of contiguous chunks the batch is split into.
    pub shards: usize,
    pub thresholds: ThresholdPolicy,
    /// Emit a progress event every this many tasks per shard; 0 disables it.
    pub progress_every: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            thresholds: ThresholdPolicy::default(),
            progress_every: 0,
        }
    }
}

impl MatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdPolicy) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_progress_every(mut self, progress_every: usize) -> Self {
        self.progress_every = progress_every;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.shards == 0 {
            return Err(MatchError::InvalidConfig(
                "shards must be greater than zero".into(),
            ));
        }
        self.thresholds.validate()
    }
}

/// Per-shard statistics of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardReport {
    pub shard: usize,
    /// Tasks in the shard's chunk.
    pub tasks: usize,
    /// Tasks that matched at least one document.
    pub matched: usize,
    pub elapsed: Duration,
}

/// A shard that aborted. Its partial results are not part of the outcome.
#[derive(Debug, PartialEq)]
pub struct ShardFailure {
    pub shard: usize,
    pub error: MatchError,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matches: MatchMap,
    /// Reports of the shards that completed, in shard order.
    pub reports: Vec<ShardReport>,
    /// Shards that aborted, in shard order.
    pub failures: Vec<ShardFailure>,
}

impl MatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All-or-nothing view: the merged map, or the first shard failure.
    pub fn into_result(self) -> Result<MatchMap, MatchError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(MatchError::ShardFailed {
                shard: failure.shard,
                source: Box::new(failure.error),
            }),
            None => Ok(self.matches),
        }
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    /// Invalid configuration.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    /// Index read or search failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    /// Scheduling failed or a worker panicked.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    /// A shard aborted during a run.
    #[error("shard {shard} failed: {source}")]
    ShardFailed {
        shard: usize,
        source: Box<MatchError>,
    },
}
