use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::{Error, Result};

/// Row-major dense matrix of f32, one row per record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseMatrix {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl DenseMatrix {
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * dim {
            return Err(Error::InvalidShape {
                expected: rows * dim,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, dim })
    }

    #[inline]
    #[must_use]
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            data: vec![0.0; rows * dim],
            rows,
            dim,
        }
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    #[must_use]
    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.dim;
        &self.data[start..start + self.dim]
    }

    #[inline]
    pub fn row_mut(&mut self, idx: usize) -> &mut [f32] {
        let start = idx * self.dim;
        &mut self.data[start..start + self.dim]
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Scale every non-zero row to unit L2 norm
    pub fn normalize_rows(&mut self) {
        for idx in 0..self.rows {
            let row = self.row_mut(idx);
            let norm = crate::simd::dot_simd(row, row).sqrt();
            if norm > f32::EPSILON {
                let inv = 1.0 / norm;
                for x in row.iter_mut() {
                    *x *= inv;
                }
            }
        }
    }

    /// Squared L2 distance between two rows
    #[inline]
    pub fn squared_l2(&self, a: usize, b: usize) -> f32 {
        crate::simd::squared_l2_simd(self.row(a), self.row(b))
    }

    /// Row ranges of consecutive chunks of at most `chunk_size` rows
    #[must_use]
    pub fn chunk_ranges(&self, chunk_size: usize) -> Vec<Range<usize>> {
        let chunk_size = chunk_size.max(1);
        (0..self.rows)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(self.rows))
            .collect()
    }
}
