use thiserror::Error;

/// Errors raised by the MinHash layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinHashError {
    /// Two signatures of different lengths were compared.
    #[error("signature dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },
    /// A shingler or hash family was configured with invalid parameters.
    #[error("invalid minhash config: {0}")]
    InvalidConfig(String),
}
