//! User-supplied kernel functions

use crate::core::SparseVector;
use crate::kernel::Kernel;
use std::fmt;
use std::sync::Arc;

type KernelFn = dyn Fn(&SparseVector, &SparseVector) -> f64 + Send + Sync;

/// Kernel backed by an arbitrary closure
///
/// The closure is shared, so cloning a `CustomKernel` (or a configuration that
/// holds one) is cheap and every clone evaluates the same function.
///
/// # Examples
/// ```
/// use rsrvm::kernel::{CustomKernel, Kernel};
/// use rsrvm::SparseVector;
///
/// let laplacian = CustomKernel::new("laplacian", |x, y| (-x.squared_distance(y).sqrt()).exp());
/// let x = SparseVector::new(vec![0], vec![1.0]);
/// assert_eq!(laplacian.compute(&x, &x), 1.0);
/// ```
#[derive(Clone)]
pub struct CustomKernel {
    name: String,
    func: Arc<KernelFn>,
}

impl CustomKernel {
    /// Wrap a closure as a kernel
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SparseVector, &SparseVector) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKernel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Kernel for CustomKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (self.func)(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_kernel_evaluates_closure() {
        let kernel = CustomKernel::new("product-plus-one", |x, y| x.dot(y) + 1.0);
        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);

        assert_eq!(kernel.compute(&x, &y), 12.0);
        assert_eq!(kernel.name(), "product-plus-one");
    }

    #[test]
    fn test_custom_kernel_clone_shares_function() {
        let kernel = CustomKernel::new("constant", |_, _| 0.5);
        let cloned = kernel.clone();
        let x = SparseVector::empty();

        assert_eq!(cloned.compute(&x, &x), kernel.compute(&x, &x));
        assert!(format!("{kernel:?}").contains("constant"));
    }
}
