use crate::IdentityError;

/// Dense row-major `rows x dim` matrix of f32 embeddings.
///
/// Rows live in one contiguous buffer so a matrix-vector product walks
/// memory linearly.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl EmbeddingMatrix {
    /// Creates a matrix with zero rows.
    pub fn empty(dim: usize) -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            dim,
        }
    }

    /// Stacks rows into a matrix. Every row must have length `dim`.
    pub fn from_rows<'a, I>(dim: usize, rows: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut data = Vec::new();
        let mut n = 0usize;
        for row in rows {
            if row.len() != dim {
                return Err(IdentityError::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
            n += 1;
        }
        Ok(Self { data, rows: n, dim })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Returns row `i`. Panics if out of range.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterates rows in index order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics; a zero-dim matrix never has rows anyway.
        self.data.chunks_exact(self.dim.max(1))
    }

    /// L2 norm of every row.
    pub fn row_norms(&self) -> Vec<f32> {
        self.iter_rows().map(l2_norm).collect()
    }

    /// Computes `self * v`, one dot product per row.
    ///
    /// Uses f64 accumulation to keep 512-wide sums stable.
    pub fn mul_vec(&self, v: &[f32]) -> Result<Vec<f64>, IdentityError> {
        if v.len() != self.dim {
            return Err(IdentityError::DimensionMismatch {
                expected: self.dim,
                got: v.len(),
            });
        }
        Ok(self.iter_rows().map(|row| dot(row, v)).collect())
    }
}

/// Dot product with f64 accumulation. Slices must have equal length.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

/// Euclidean norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt() as f32
}
