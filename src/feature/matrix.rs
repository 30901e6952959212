//! Binary type-membership matrix with sparse storage.

use crate::error::{OutlierError, Result};
use nalgebra::DMatrix;
use sprs::CsMat;

/// A binary entities × features matrix in CSR format.
///
/// Rows follow the ordered entity sequence; columns follow the retained-tag
/// order of the feature index map. Entry (i, j) is 1 when entity i carries
/// retained tag j.
#[derive(Debug, Clone)]
pub struct TypeMatrix {
    data: CsMat<u8>,
    tag_names: Vec<String>,
}

impl TypeMatrix {
    /// Create a matrix from sparse data and column names.
    pub fn new(data: CsMat<u8>, tag_names: Vec<String>) -> Result<Self> {
        if data.cols() != tag_names.len() {
            return Err(OutlierError::DimensionMismatch {
                expected: data.cols(),
                actual: tag_names.len(),
            });
        }
        Ok(Self { data, tag_names })
    }

    /// Number of entities (rows).
    pub fn n_entities(&self) -> usize {
        self.data.rows()
    }

    /// Number of retained features (columns).
    pub fn n_features(&self) -> usize {
        self.data.cols()
    }

    /// Retained tag names in column order.
    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    /// Underlying sparse data.
    pub fn data(&self) -> &CsMat<u8> {
        &self.data
    }

    /// Densify to an f64 matrix for mixture-model fitting.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.data.rows(), self.data.cols());
        for i in 0..self.data.rows() {
            if let Some(row) = self.data.outer_view(i) {
                for (j, &value) in row.iter() {
                    if value > 0 {
                        dense[(i, j)] = 1.0;
                    }
                }
            }
        }
        dense
    }
}
