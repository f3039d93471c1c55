//! # Ontomatch Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` turns a batch of lookup keys (ingredient phrases, typically) into
//! sets of matching ontology terms by querying a shared [`index::LshIndex`]
//! from many workers at once.
//!
//! ## Core Types
//!
//! - [`TaskPool`]: fixed pool of named worker threads with per-job result
//!   handles and panic capture.
//! - [`MatchTask`]: one lookup key plus auxiliary strings; the first
//!   auxiliary string, when present, is the text that gets matched.
//! - [`MatchConfig`]: shard count, [`ThresholdPolicy`] and progress logging.
//! - [`ShardedMatcher`]: partitions a batch into contiguous chunks, runs one
//!   chunk per worker and merges per-worker results.
//! - [`MatchOutcome`]: merged key → matches map, per-shard reports and shard
//!   failures.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use index::{IndexConfig, LshIndex};
//! use minhash::{NGramShingler, Shingler};
//! use matcher::{MatchConfig, MatchTask, ShardedMatcher, TaskPool};
//!
//! let shingler = Arc::new(NGramShingler::default());
//! let index = LshIndex::new(IndexConfig::default()).unwrap();
//! for term in ["olive oil", "kosher salt"] {
//!     index.insert(&shingler.shingles(term), term).unwrap();
//! }
//!
//! let matcher = ShardedMatcher::new(
//!     Arc::new(index),
//!     MatchConfig::default().with_shards(2),
//!     shingler,
//! )
//! .unwrap();
//!
//! let pool = TaskPool::new(2).unwrap();
//! let tasks = vec![MatchTask::new("olive oil"), MatchTask::new("kosher salt")];
//! let matches = matcher.run_on(&pool, tasks).unwrap().into_result().unwrap();
//! assert!(matches["olive oil"].contains("olive oil"));
//! ```

pub mod engine;
pub mod pool;
pub mod types;

pub use crate::engine::{partition, ShardedMatcher};
pub use crate::pool::{PoolError, TaskHandle, TaskPool};
pub use crate::types::{
    MatchConfig, MatchError, MatchMap, MatchOutcome, MatchTask, ShardFailure, ShardReport,
    ThresholdPolicy,
};
