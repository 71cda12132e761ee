//! Kernel matrix construction
//!
//! Builds the dense matrices the sparse Bayesian solver works on: the training
//! design matrix (Gram matrix with a leading bias column) and the
//! cross-kernel matrix between new rows and stored relevance vectors.

use crate::core::SparseVector;
use crate::kernel::Kernel;
use nalgebra::{DMatrix, DVector};

/// Training design matrix of shape n x (n + 1)
///
/// Column 0 is the constant bias basis; column `j + 1` holds the kernel
/// response of every training row against training row `j`.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: DMatrix<f64>,
    column_norms_sq: DVector<f64>,
}

impl DesignMatrix {
    /// Wrap a matrix whose first column is the bias basis
    pub fn from_matrix(matrix: DMatrix<f64>) -> Self {
        let column_norms_sq =
            DVector::from_iterator(matrix.ncols(), matrix.column_iter().map(|c| c.norm_squared()));
        Self {
            matrix,
            column_norms_sq,
        }
    }

    /// Underlying dense matrix
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Number of training rows
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of candidate bases (bias included)
    pub fn n_bases(&self) -> usize {
        self.matrix.ncols()
    }

    /// Squared Euclidean norm of every column
    pub fn column_norms_sq(&self) -> &DVector<f64> {
        &self.column_norms_sq
    }

    /// Columns selected by basis index, in the given order
    pub fn select_bases(&self, bases: &[usize]) -> DMatrix<f64> {
        self.matrix.select_columns(bases)
    }
}

/// Evaluates a kernel over sets of rows
pub struct KernelMatrixBuilder<'a> {
    kernel: &'a dyn Kernel,
}

impl<'a> KernelMatrixBuilder<'a> {
    pub fn new(kernel: &'a dyn Kernel) -> Self {
        Self { kernel }
    }

    /// Symmetric Gram matrix K[i, j] = k(x_i, x_j)
    ///
    /// Only the upper triangle is evaluated; the lower triangle is mirrored.
    pub fn gram(&self, rows: &[SparseVector]) -> DMatrix<f64> {
        let n = rows.len();
        let norms: Vec<f64> = rows.iter().map(SparseVector::norm_squared).collect();
        let mut gram = DMatrix::zeros(n, n);

        for i in 0..n {
            for j in i..n {
                let value = self
                    .kernel
                    .compute_with_norms(&rows[i], &rows[j], norms[i], norms[j]);
                gram[(i, j)] = value;
                gram[(j, i)] = value;
            }
        }

        gram
    }

    /// Gram matrix with a constant bias column prepended
    pub fn design_matrix(&self, rows: &[SparseVector]) -> DesignMatrix {
        let n = rows.len();
        let gram = self.gram(rows);
        let matrix = DMatrix::from_fn(n, n + 1, |i, j| if j == 0 { 1.0 } else { gram[(i, j - 1)] });
        DesignMatrix::from_matrix(matrix)
    }

    /// Cross-kernel matrix K[i, j] = k(x_i, y_j)
    pub fn cross(&self, xs: &[SparseVector], ys: &[SparseVector]) -> DMatrix<f64> {
        let x_norms: Vec<f64> = xs.iter().map(SparseVector::norm_squared).collect();
        let y_norms: Vec<f64> = ys.iter().map(SparseVector::norm_squared).collect();

        DMatrix::from_fn(xs.len(), ys.len(), |i, j| {
            self.kernel
                .compute_with_norms(&xs[i], &ys[j], x_norms[i], y_norms[j])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{LinearKernel, RBFKernel};
    use approx::assert_relative_eq;

    fn rows() -> Vec<SparseVector> {
        [0.0, 0.5, 2.0]
            .iter()
            .map(|&x| SparseVector::from_dense([x].iter()))
            .collect()
    }

    #[test]
    fn test_gram_is_symmetric() {
        let kernel = RBFKernel::new(1.0);
        let gram = KernelMatrixBuilder::new(&kernel).gram(&rows());

        assert_eq!(gram.shape(), (3, 3));
        assert_eq!(gram, gram.transpose());
        for i in 0..3 {
            assert_relative_eq!(gram[(i, i)], 1.0);
        }
        assert_relative_eq!(gram[(0, 2)], (-4.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_design_matrix_has_bias_column() {
        let kernel = LinearKernel::new();
        let design = KernelMatrixBuilder::new(&kernel).design_matrix(&rows());

        assert_eq!(design.n_samples(), 3);
        assert_eq!(design.n_bases(), 4);
        assert!(design.matrix().column(0).iter().all(|&v| v == 1.0));

        // Linear kernel on 1-d rows: x_i * x_j
        assert_eq!(design.matrix()[(1, 3)], 1.0);
        assert_eq!(design.matrix()[(2, 3)], 4.0);
        assert_eq!(design.column_norms_sq()[0], 3.0);
        assert_eq!(design.column_norms_sq()[3], 0.0 + 1.0 + 16.0);
    }

    #[test]
    fn test_design_matrix_is_deterministic() {
        let kernel = RBFKernel::new(0.7);
        let builder = KernelMatrixBuilder::new(&kernel);

        let first = builder.design_matrix(&rows());
        let second = builder.design_matrix(&rows());
        assert_eq!(first.matrix(), second.matrix());
    }

    #[test]
    fn test_select_bases() {
        let kernel = LinearKernel::new();
        let design = KernelMatrixBuilder::new(&kernel).design_matrix(&rows());

        let selected = design.select_bases(&[0, 3]);
        assert_eq!(selected.shape(), (3, 2));
        assert_eq!(selected.column(0), design.matrix().column(0));
        assert_eq!(selected.column(1), design.matrix().column(3));
    }

    #[test]
    fn test_cross_matches_gram() {
        let kernel = RBFKernel::new(0.3);
        let builder = KernelMatrixBuilder::new(&kernel);
        let data = rows();

        let gram = builder.gram(&data);
        let cross = builder.cross(&data, &data);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(gram[(i, j)], cross[(i, j)], epsilon = 1e-12);
            }
        }

        let partial = builder.cross(&data[..1], &data[1..]);
        assert_eq!(partial.shape(), (1, 2));
    }
}
