//! YAML configuration file support for ontomatch.
//!
//! One file describes the shingling policy, the LSH index (banding and
//! backend) and the sharded matcher. Every section is optional; missing keys
//! fall back to the library defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "food-ontology"
//!
//! shingle:
//!   n: 3
//!   mode: chars
//!
//! index:
//!   lsh:
//!     num_hashes: 100
//!     num_bands: 25
//!     seed: 42
//!     use_parallel: false
//!   backend:
//!     kind: redis
//!     url: "redis://127.0.0.1:6379/0"
//!     key_prefix: "foodon:"
//!     connections: 4
//!     max_retries: 3
//!     retry_backoff: 50
//!
//! matcher:
//!   shards: 8
//!   workers: 8
//!   progress_every: 1000
//!   thresholds:
//!     single_token: 0.9
//!     multi_token: 0.5
//! ```

use std::fs;
use std::path::Path;

use index::{BackendConfig, IndexConfig, LshConfig};
use matcher::{MatchConfig, ThresholdPolicy};
use minhash::{NGramShingler, ShingleMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OntomatchConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub shingle: ShingleYamlConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub matcher: MatchYamlConfig,
}

impl OntomatchConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: OntomatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.shingle.validate()?;
        self.index
            .lsh
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        if let BackendConfig::Redis(redis) = &self.index.backend {
            if redis.url.trim().is_empty() {
                return Err(ConfigLoadError::Validation(
                    "index.backend.url must not be empty".into(),
                ));
            }
            if redis.connections == 0 {
                return Err(ConfigLoadError::Validation(
                    "index.backend.connections must be greater than zero".into(),
                ));
            }
        }
        self.matcher.validate()
    }

    pub fn index_config(&self) -> IndexConfig {
        self.index.clone()
    }

    pub fn lsh_config(&self) -> &LshConfig {
        &self.index.lsh
    }

    pub fn match_config(&self) -> MatchConfig {
        self.matcher.to_match_config()
    }

    pub fn shingler(&self) -> Result<NGramShingler, ConfigLoadError> {
        NGramShingler::new(self.shingle.n, self.shingle.mode)
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))
    }
}

impl Default for OntomatchConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            shingle: ShingleYamlConfig::default(),
            index: IndexConfig::default(),
            matcher: MatchYamlConfig::default(),
        }
    }
}

/// Shingling YAML configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShingleYamlConfig {
    #[serde(default = "default_shingle_size")]
    pub n: usize,

    #[serde(default)]
    pub mode: ShingleMode,
}

impl ShingleYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.n == 0 {
            return Err(ConfigLoadError::Validation(
                "shingle.n must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ShingleYamlConfig {
    fn default() -> Self {
        Self {
            n: default_shingle_size(),
            mode: ShingleMode::default(),
        }
    }
}

/// Matcher YAML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchYamlConfig {
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Task pool size. Defaults to the shard count.
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub progress_every: usize,

    #[serde(default)]
    pub thresholds: ThresholdPolicy,
}

impl MatchYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.workers == Some(0) {
            return Err(ConfigLoadError::Validation(
                "matcher.workers must be greater than zero".into(),
            ));
        }
        self.to_match_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))
    }

    pub fn to_match_config(&self) -> MatchConfig {
        MatchConfig::default()
            .with_shards(self.shards)
            .with_thresholds(self.thresholds)
            .with_progress_every(self.progress_every)
    }

    pub fn pool_size(&self) -> usize {
        self.workers.unwrap_or(self.shards)
    }
}

impl Default for MatchYamlConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            workers: None,
            progress_every: 0,
            thresholds: ThresholdPolicy::default(),
        }
    }
}

fn default_shingle_size() -> usize {
    3
}

fn default_shards() -> usize {
    MatchConfig::default().shards
}
