//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The sigmoid kernel is not positive semi-definite for every parameter
//! choice. The sparse Bayesian fit only needs the design matrix, so this is
//! not a problem for training, but badly scaled parameters saturate tanh and
//! give nearly constant basis functions.

use crate::core::SparseVector;
use crate::kernel::traits::Kernel;

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product (must be positive)
    pub gamma: f64,
    /// Bias/offset parameter (can be positive, negative, or zero)
    pub coef0: f64,
}

impl SigmoidKernel {
    /// Creates a new Sigmoid kernel with specified parameters
    ///
    /// # Panics
    /// Panics if gamma is not positive
    ///
    /// # Examples
    /// ```
    /// use rsrvm::kernel::SigmoidKernel;
    ///
    /// let kernel = SigmoidKernel::new(0.1, -1.0);
    /// assert_eq!(kernel.gamma, 0.1);
    /// assert_eq!(kernel.coef0, -1.0);
    /// ```
    pub fn new(gamma: f64, coef0: f64) -> Self {
        if gamma <= 0.0 {
            panic!("Gamma must be positive, got: {}", gamma);
        }
        Self { gamma, coef0 }
    }

    /// Whether the kernel argument stays out of the flat tails of tanh for
    /// inputs whose dot products lie in `[-max_dot, max_dot]`
    pub fn is_well_scaled(&self, max_dot: f64) -> bool {
        let reach = self.gamma * max_dot.abs() + self.coef0.abs();
        reach < 3.0
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (self.gamma * x.dot(y) + self.coef0).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_kernel_basic() {
        let kernel = SigmoidKernel::new(0.5, -1.0);
        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![2.0, 1.0]);

        // tanh(0.5 * 4 - 1) = tanh(1)
        assert_relative_eq!(kernel.compute(&x, &y), 1.0_f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_sigmoid_kernel_bounded() {
        let kernel = SigmoidKernel::new(10.0, 0.0);
        let x = SparseVector::new(vec![0], vec![100.0]);
        let y = SparseVector::new(vec![0], vec![-100.0]);

        let value = kernel.compute(&x, &y);
        assert!((-1.0..=1.0).contains(&value));
        assert_relative_eq!(value, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sigmoid_kernel_orthogonal_inputs() {
        let kernel = SigmoidKernel::new(1.0, 0.3);
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![1], vec![1.0]);

        assert_relative_eq!(kernel.compute(&x, &y), 0.3_f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_sigmoid_scaling_check() {
        assert!(SigmoidKernel::new(0.01, 0.0).is_well_scaled(10.0));
        assert!(!SigmoidKernel::new(1.0, 0.0).is_well_scaled(10.0));
    }

    #[test]
    #[should_panic(expected = "Gamma must be positive")]
    fn test_sigmoid_invalid_gamma() {
        SigmoidKernel::new(0.0, 1.0);
    }
}
