//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::SparseVector;
use crate::kernel::Kernel;

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The default kernel for relevance vector regression. Each training point
/// contributes a Gaussian bump centred on itself; gamma sets the bump width:
/// - High gamma: narrow bumps, many relevance vectors, risk of overfitting
/// - Low gamma: wide bumps, smoother fits, ill-conditioned design matrices
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    ///
    /// # Panics
    /// Panics if gamma is not positive
    pub fn new(gamma: f64) -> Self {
        assert!(gamma > 0.0, "Gamma must be positive, got: {}", gamma);
        Self { gamma }
    }

    /// Create RBF kernel with gamma = 1.0 / n_features
    pub fn with_auto_gamma(n_features: usize) -> Self {
        assert!(n_features > 0, "Number of features must be positive");
        Self::new(1.0 / n_features as f64)
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for RBFKernel {
    /// Default RBF kernel with gamma = 1.0
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (-self.gamma * x.squared_distance(y)).exp()
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y, clipped against cancellation
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * x.dot(y)).max(0.0);
        (-self.gamma * squared_distance).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rbf_kernel_creation() {
        assert_eq!(RBFKernel::new(0.5).gamma(), 0.5);
        assert_eq!(RBFKernel::with_auto_gamma(10).gamma(), 0.1);
        assert_eq!(RBFKernel::default().gamma(), 1.0);
    }

    #[test]
    #[should_panic(expected = "Gamma must be positive")]
    fn test_rbf_kernel_zero_gamma() {
        RBFKernel::new(0.0);
    }

    #[test]
    #[should_panic(expected = "Number of features must be positive")]
    fn test_rbf_kernel_zero_features() {
        RBFKernel::with_auto_gamma(0);
    }

    #[test]
    fn test_rbf_kernel_identical_vectors() {
        let kernel = RBFKernel::new(1.0);
        let x = SparseVector::new(vec![0, 1, 2], vec![1.0, 2.0, 3.0]);

        assert!((kernel.compute(&x, &x) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rbf_kernel_known_value() {
        let kernel = RBFKernel::new(0.5);
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![0], vec![3.0]);

        // ||x - y||² = 4
        let expected = (-0.5 * 4.0_f64).exp();
        assert!((kernel.compute(&x, &y) - expected).abs() < 1e-12);
        assert_eq!(kernel.compute(&x, &y), kernel.compute(&y, &x));
    }

    #[test]
    fn test_rbf_kernel_with_norms() {
        let kernel = RBFKernel::new(2.0);
        let x = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);
        let y = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);

        let direct = kernel.compute(&x, &y);
        let with_norms = kernel.compute_with_norms(&x, &y, x.norm_squared(), y.norm_squared());

        assert!((direct - with_norms).abs() < 1e-12);
    }

    #[test]
    fn test_rbf_kernel_decreases_with_distance() {
        let kernel = RBFKernel::new(1.0);
        let origin = SparseVector::new(vec![0], vec![0.0]);

        let values: Vec<f64> = [1.0, 2.0, 3.0]
            .iter()
            .map(|&d| kernel.compute(&origin, &SparseVector::new(vec![0], vec![d])))
            .collect();

        assert!(values[0] > values[1] && values[1] > values[2]);
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
