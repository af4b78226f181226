use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("directory: request failed: {0}")]
    Request(String),

    #[error("directory: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("directory: attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("directory: decode: {0}")]
    Decode(String),

    #[error("directory: malformed roster entry (id {id:?}): {reason}")]
    MalformedRecord { id: Option<i64>, reason: String },

    #[error("directory: record {id}: missing embedding")]
    MissingEmbedding { id: i64 },

    #[error("directory: record {id}: invalid embedding: {reason}")]
    InvalidEmbedding { id: i64, reason: String },

    #[error("directory: record {id}: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { id: i64, expected: usize, got: usize },

    #[error("directory: gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<DirectoryError>,
    },
}

impl DirectoryError {
    /// Returns true if a later attempt may succeed: transport failures,
    /// timeouts, throttling, and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Request(_) | DirectoryError::Timeout(_) => true,
            DirectoryError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true for per-record validation failures that should skip
    /// just that record.
    pub fn is_malformed_record(&self) -> bool {
        matches!(
            self,
            DirectoryError::MalformedRecord { .. }
                | DirectoryError::MissingEmbedding { .. }
                | DirectoryError::InvalidEmbedding { .. }
                | DirectoryError::DimensionMismatch { .. }
        )
    }
}
