//! Workspace umbrella crate for ontomatch.
//!
//! Ties the MinHash engine, the LSH index and the sharded matcher together:
//! build an [`Ontology`] from an [`OntomatchConfig`], load terms into it, then
//! match batches of phrases through a [`TaskPool`].

pub mod config;
pub mod logging;

pub use config::{ConfigLoadError, MatchYamlConfig, OntomatchConfig, ShingleYamlConfig};
pub use index::{
    BackendConfig, BucketStore, DocSet, IndexConfig, IndexError, InMemoryStore, LshConfig,
    LshIndex, QueryHit, RedisConfig,
};
pub use matcher::{
    MatchConfig, MatchError, MatchMap, MatchOutcome, MatchTask, PoolError, ShardFailure,
    ShardReport, ShardedMatcher, TaskPool, ThresholdPolicy, partition,
};
pub use minhash::{
    HashFamily, MinHashError, NGramShingler, ShingleMode, Shingler, Signature,
    compute_signature, exact_jaccard, jaccard_estimate,
};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashSet;
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, info};

/// Errors surfaced by the umbrella API.
#[derive(Debug, Error)]
pub enum OntomatchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("match error: {0}")]
    Match(#[from] MatchError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An ontology loaded into an LSH index, ready to match phrases against.
pub struct Ontology {
    index: Arc<LshIndex>,
    shingler: Arc<dyn Shingler>,
    match_cfg: MatchConfig,
}

impl Ontology {
    /// Build an empty ontology with the index, shingler and matcher settings of `cfg`.
    pub fn from_config(cfg: &OntomatchConfig) -> Result<Self, OntomatchError> {
        cfg.validate()?;
        let index = LshIndex::new(cfg.index_config())?;
        let shingler = cfg.shingler()?;
        Ok(Self::with_index(
            Arc::new(index),
            Arc::new(shingler),
            cfg.match_config(),
        ))
    }

    pub fn with_index(
        index: Arc<LshIndex>,
        shingler: Arc<dyn Shingler>,
        match_cfg: MatchConfig,
    ) -> Self {
        Self {
            index,
            shingler,
            match_cfg,
        }
    }

    pub fn index(&self) -> &Arc<LshIndex> {
        &self.index
    }

    /// Insert every distinct term. Returns how many were inserted.
    ///
    /// Terms already present in the index are an error
    /// ([`IndexError::DuplicateDocument`]); repeats within `terms` are skipped.
    pub fn add_terms<I, S>(&self, terms: I) -> Result<usize, OntomatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let span = tracing::span!(Level::INFO, "ontomatch.add_terms");
        let _guard = span.enter();
        let start = Instant::now();

        let mut seen = HashSet::new();
        let docs: Vec<(String, Vec<String>)> = terms
            .into_iter()
            .filter_map(|term| {
                let term = term.as_ref().to_string();
                if !seen.insert(term.clone()) {
                    return None;
                }
                let shingles = self.shingler.shingles(&term);
                Some((term, shingles))
            })
            .collect();
        self.index.insert_batch(&docs)?;

        info!(
            terms = docs.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "terms_indexed"
        );
        Ok(docs.len())
    }

    pub fn matcher(&self) -> Result<ShardedMatcher, OntomatchError> {
        Ok(ShardedMatcher::new(
            Arc::clone(&self.index),
            self.match_cfg.clone(),
            Arc::clone(&self.shingler),
        )?)
    }

    /// Match each phrase (used as its own key) on `pool`.
    pub fn match_phrases<I, S>(&self, pool: &TaskPool, phrases: I) -> Result<MatchOutcome, OntomatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks: Vec<MatchTask> = phrases.into_iter().map(MatchTask::new).collect();
        Ok(self.matcher()?.run_on(pool, tasks)?)
    }
}

/// Non-empty trimmed lines of a newline-delimited text file.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>, OntomatchError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Serialize)]
struct MatchLine<'a> {
    key: &'a str,
    matches: Vec<&'a str>,
}

/// One JSON object per key, sorted by key; matches within a key are sorted too.
pub fn render_matches(matches: &MatchMap) -> Result<Vec<String>, OntomatchError> {
    let mut keys: Vec<&String> = matches.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let mut hits: Vec<&str> = matches[key].iter().map(String::as_str).collect();
            hits.sort_unstable();
            Ok(serde_json::to_string(&MatchLine { key, matches: hits })?)
        })
        .collect()
}
