//! Shingle producers.
//!
//! The engine treats shingles as opaque strings. These adapters cover the two
//! policies the ontology matcher uses: character n-grams and whitespace word
//! n-grams. Inputs shorter than `n` produce the whole input as one shingle.

use serde::{Deserialize, Serialize};

use crate::error::MinHashError;

/// Turns raw text into a list of shingles.
pub trait Shingler: Send + Sync {
    fn shingles(&self, text: &str) -> Vec<String>;
}

/// Unit a shingle is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShingleMode {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// Whitespace-delimited words, joined back with a single space.
    Words,
}

/// Sliding-window n-gram shingler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NGramShingler {
    n: usize,
    mode: ShingleMode,
}

impl NGramShingler {
    pub fn new(n: usize, mode: ShingleMode) -> Result<Self, MinHashError> {
        if n == 0 {
            return Err(MinHashError::InvalidConfig(
                "shingle size must be at least 1".into(),
            ));
        }
        Ok(Self { n, mode })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn mode(&self) -> ShingleMode {
        self.mode
    }

    fn char_shingles(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if chars.len() < self.n {
            return vec![text.to_string()];
        }
        chars
            .windows(self.n)
            .map(|window| window.iter().collect())
            .collect()
    }

    fn word_shingles(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        if words.len() < self.n {
            return vec![words.join(" ")];
        }
        words
            .windows(self.n)
            .map(|window| window.join(" "))
            .collect()
    }
}

impl Default for NGramShingler {
    /// Character trigrams.
    fn default() -> Self {
        Self {
            n: 3,
            mode: ShingleMode::Chars,
        }
    }
}

impl Shingler for NGramShingler {
    fn shingles(&self, text: &str) -> Vec<String> {
        match self.mode {
            ShingleMode::Chars => self.char_shingles(text),
            ShingleMode::Words => self.word_shingles(text),
        }
    }
}
