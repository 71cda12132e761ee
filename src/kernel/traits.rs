//! Kernel trait definition

use crate::core::SparseVector;

/// Kernel function trait
///
/// A kernel maps a pair of input rows to a similarity value. Relevance vector
/// regression does not require Mercer kernels, so any symmetric similarity
/// can be plugged in.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Optional: compute kernel value using precomputed squared norms
    /// This can be more efficient for some kernels (e.g., RBF)
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
