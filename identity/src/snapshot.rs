use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::IdentityError;
use crate::matrix::EmbeddingMatrix;
use crate::record::IdentityRecord;

/// Immutable, self-consistent roster bundle active at a point in time.
///
/// `records[i]` corresponds to `matrix.row(i)` and `norms[i]`. A snapshot
/// is never mutated after construction; a refresh builds a new one.
#[derive(Clone)]
pub struct Snapshot {
    records: Vec<IdentityRecord>,
    matrix: EmbeddingMatrix,
    norms: Vec<f32>,
    captured_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// The placeholder served before any roster was installed.
    pub fn empty(dim: usize) -> Self {
        Self {
            records: Vec::new(),
            matrix: EmbeddingMatrix::empty(dim),
            norms: Vec::new(),
            captured_at: None,
        }
    }

    /// Stacks record embeddings into the matrix and precomputes row norms.
    ///
    /// Fails if any record has the wrong dimension or non-finite values;
    /// callers that want skip-and-continue semantics validate first.
    pub fn build(
        dim: usize,
        records: Vec<IdentityRecord>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, IdentityError> {
        for r in &records {
            if r.embedding.len() != dim {
                return Err(IdentityError::DimensionMismatch {
                    expected: dim,
                    got: r.embedding.len(),
                });
            }
            if r.embedding.iter().any(|v| !v.is_finite()) {
                return Err(IdentityError::NonFiniteEmbedding { id: r.id });
            }
        }
        let matrix = EmbeddingMatrix::from_rows(dim, records.iter().map(|r| r.embedding.as_slice()))?;
        let norms = matrix.row_norms();
        Ok(Self {
            records,
            matrix,
            norms,
            captured_at: Some(captured_at),
        })
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&IdentityRecord> {
        self.records.get(index)
    }

    pub fn matrix(&self) -> &EmbeddingMatrix {
        &self.matrix
    }

    pub fn norms(&self) -> &[f32] {
        &self.norms
    }

    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the roster was captured. `None` for the never-installed placeholder.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Age relative to `now`; [`Duration::MAX`] if never captured.
    /// A capture time in the future counts as zero age.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        match self.captured_at {
            Some(at) => (now - at).to_std().unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.records.len())
            .field("dim", &self.matrix.dim())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
