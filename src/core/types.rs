//! Core type definitions for RVM

use crate::core::{RVMError, Result};
use crate::kernel::KernelConfig;

/// Prediction result containing the predictive mean and, optionally, its spread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Mean of the predictive distribution
    pub mean: f64,
    /// Standard deviation of the predictive distribution, when requested
    pub std: Option<f64>,
}

impl Prediction {
    /// Create a point prediction
    pub fn new(mean: f64) -> Self {
        Self { mean, std: None }
    }

    /// Create a prediction carrying its predictive standard deviation
    pub fn with_std(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std: Some(std),
        }
    }

    /// Symmetric interval `mean ± z * std`, if a standard deviation is available
    pub fn interval(&self, z: f64) -> Option<(f64, f64)> {
        self.std.map(|s| (self.mean - z * s, self.mean + z * s))
    }
}

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a sparse vector from a dense row, dropping exact zeros
    pub fn from_dense<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let (indices, values) = values
            .into_iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Expand into a dense vector of length `dim`
    pub fn to_dense(&self, dim: usize) -> Vec<f64> {
        let mut dense = vec![0.0; dim];
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            if i < dim {
                dense[i] = v;
            }
        }
        dense
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Dot product with another sparse vector
    ///
    /// Both index lists are sorted, so a merge walk visits each entry once.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut result = 0.0;
        let (mut i, mut j) = (0, 0);

        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Equal => {
                    result += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }

        result
    }

    /// Squared Euclidean distance to another sparse vector
    pub fn squared_distance(&self, other: &SparseVector) -> f64 {
        let mut distance_sq = 0.0;
        let (mut i, mut j) = (0, 0);

        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Equal => {
                    let diff = self.values[i] - other.values[j];
                    distance_sq += diff * diff;
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    distance_sq += self.values[i] * self.values[i];
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    distance_sq += other.values[j] * other.values[j];
                    j += 1;
                }
            }
        }

        distance_sq += self.values[i..].iter().map(|v| v * v).sum::<f64>();
        distance_sq += other.values[j..].iter().map(|v| v * v).sum::<f64>();

        distance_sq
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Compute L2 norm
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dimension implied by the largest stored index
    pub fn implied_dim(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }
}

/// Training sample with features and a real-valued target
#[derive(Clone, Debug)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Regression target
    pub target: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, target: f64) -> Self {
        Self { features, target }
    }
}

/// Outcome of the basis selection loop
///
/// Reaching the iteration limit is not an error; `converged` tells the
/// two cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitSummary {
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the convergence criterion was met before the iteration limit
    pub converged: bool,
}

/// Configuration for relevance vector training
#[derive(Debug, Clone)]
pub struct RVMConfig {
    /// Kernel family and its parameters
    pub kernel: KernelConfig,
    /// Tolerance on the log-precision change of a re-estimated basis
    pub tol: f64,
    /// Bases with precision at or above this value are pruned from the model
    pub threshold_alpha: f64,
    /// Hard limit on basis selection iterations
    pub max_iterations: usize,
    /// Log per-iteration state at info level
    pub verbose: bool,
}

impl Default for RVMConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            tol: 1e-6,
            threshold_alpha: 1e5,
            max_iterations: 5000,
            verbose: false,
        }
    }
}

impl RVMConfig {
    /// Check every parameter that does not depend on the training data
    pub fn validate(&self) -> Result<()> {
        self.kernel.validate()?;

        if !self.tol.is_finite() {
            return Err(RVMError::InvalidParameter(format!(
                "tol must be finite, got: {}",
                self.tol
            )));
        }

        if self.threshold_alpha.is_nan() || self.threshold_alpha <= 0.0 {
            return Err(RVMError::InvalidParameter(format!(
                "threshold_alpha must be positive, got: {}",
                self.threshold_alpha
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Gamma, KernelType};

    #[test]
    fn test_sparse_vector_creation() {
        let indices = vec![2, 0, 4];
        let values = vec![2.0, 1.0, 3.0];
        let sv = SparseVector::new(indices, values);

        // Check that indices are sorted
        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sparse_vector_get() {
        let sv = SparseVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);

        assert_eq!(sv.get(0), 0.0);
        assert_eq!(sv.get(1), 1.0);
        assert_eq!(sv.get(3), 2.0);
        assert_eq!(sv.get(5), 3.0);
        assert_eq!(sv.get(6), 0.0);
    }

    #[test]
    fn test_sparse_vector_norm() {
        let sv = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);
        assert_eq!(sv.norm_squared(), 25.0);
        assert_eq!(sv.norm(), 5.0);
    }

    #[test]
    fn test_dense_round_trip() {
        let dense = [0.0, 1.5, 0.0, -2.0];
        let sv = SparseVector::from_dense(dense.iter());

        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![1.5, -2.0]);
        assert_eq!(sv.implied_dim(), 4);
        assert_eq!(sv.to_dense(4), dense.to_vec());
    }

    #[test]
    fn test_dot_product() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // Overlap at 2 and 5: 3*2 + 2*4
        assert_eq!(x.dot(&y), 14.0);
        assert_eq!(y.dot(&x), 14.0);
        assert_eq!(x.dot(&SparseVector::empty()), 0.0);
    }

    #[test]
    fn test_squared_distance() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // 1 + 1 + 1 + 4
        assert_eq!(x.squared_distance(&y), 7.0);
        assert_eq!(x.squared_distance(&x), 0.0);

        let empty = SparseVector::empty();
        let z = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        assert_eq!(empty.squared_distance(&z), 5.0);
        assert_eq!(z.squared_distance(&empty), 5.0);
    }

    #[test]
    fn test_prediction() {
        let point = Prediction::new(1.5);
        assert_eq!(point.mean, 1.5);
        assert_eq!(point.std, None);
        assert_eq!(point.interval(1.96), None);

        let spread = Prediction::with_std(1.0, 0.5);
        assert_eq!(spread.interval(2.0), Some((0.0, 2.0)));
    }

    #[test]
    fn test_sample() {
        let features = SparseVector::new(vec![0, 2], vec![1.0, 3.0]);
        let sample = Sample::new(features.clone(), -0.25);

        assert_eq!(sample.features, features);
        assert_eq!(sample.target, -0.25);
    }

    #[test]
    fn test_config_defaults() {
        let config = RVMConfig::default();
        assert_eq!(config.tol, 1e-6);
        assert_eq!(config.threshold_alpha, 1e5);
        assert_eq!(config.max_iterations, 5000);
        assert!(!config.verbose);
        assert!(matches!(config.kernel.kernel, KernelType::Rbf));
        assert_eq!(config.kernel.gamma, Gamma::Auto);
        assert_eq!(config.kernel.degree, 3);
        assert_eq!(config.kernel.coef0, 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(RVMConfig::default().validate().is_ok());

        let bad_threshold = RVMConfig {
            threshold_alpha: 0.0,
            ..RVMConfig::default()
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(RVMError::InvalidParameter(_))
        ));

        let bad_tol = RVMConfig {
            tol: f64::NAN,
            ..RVMConfig::default()
        };
        assert!(bad_tol.validate().is_err());
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }
}
