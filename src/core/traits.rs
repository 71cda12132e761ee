//! Core traits for RVM implementation

use crate::core::{FitSummary, Prediction, RVMConfig, Result, Sample, SparseVector};

/// Dataset abstraction for efficient data access
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Number of features (dimensionality)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> Sample;

    /// Get multiple samples at once
    fn get_batch(&self, indices: &[usize]) -> Vec<Sample> {
        indices.iter().map(|&i| self.get_sample(i)).collect()
    }

    /// Get all regression targets in sample order
    fn get_targets(&self) -> Vec<f64>;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trained sparse Bayesian regression model
pub trait RegressionModel: Send + Sync {
    /// Predict the mean for a single feature vector
    fn predict(&self, features: &SparseVector) -> Prediction;

    /// Predict mean and predictive standard deviation for a single feature vector
    fn predict_with_std(&self, features: &SparseVector) -> Prediction;

    /// Predict multiple feature vectors
    fn predict_batch(&self, features: &[SparseVector]) -> Vec<Prediction> {
        features.iter().map(|f| self.predict(f)).collect()
    }

    /// Number of retained relevance vectors (bias excluded)
    fn n_relevance_vectors(&self) -> usize;

    /// Estimated observation noise variance
    fn noise_variance(&self) -> f64;
}

/// Common contract of relevance vector estimators
///
/// Estimators own their configuration and, once fitted, the trained model.
/// Variants that are not available report `RVMError::NotImplemented`.
pub trait RelevanceVectorMachine {
    /// Training configuration
    fn config(&self) -> &RVMConfig;

    /// Fit on the given samples, replacing any previously fitted model
    fn fit_samples(&mut self, samples: &[Sample]) -> Result<FitSummary>;

    /// Predict the given feature vectors with the fitted model
    fn predict_samples(&self, features: &[SparseVector], return_std: bool)
        -> Result<Vec<Prediction>>;

    /// Whether a fitted model is available
    fn is_fitted(&self) -> bool;
}
