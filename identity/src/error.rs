use thiserror::Error;

/// Errors returned by identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("identity: probe contains non-finite values")]
    NonFiniteProbe,

    #[error("identity: record {id} embedding contains non-finite values")]
    NonFiniteEmbedding { id: i64 },
}
