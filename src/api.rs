//! High-level API for relevance vector machines
//!
//! This module provides the estimator types users interact with: [`RVR`] for
//! regression, with a builder for its configuration, and the [`RVC`]
//! classifier placeholder.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rsrvm::api::RVR;
//! use rsrvm::kernel::Gamma;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rvr = RVR::new().with_gamma(Gamma::Scale).with_tol(1e-6);
//! let summary = rvr.fit_from_file("train.libsvm")?;
//! println!("Converged: {}", summary.converged);
//!
//! let metrics = rvr.evaluate_from_file("test.libsvm")?;
//! println!("RMSE: {:.4}", metrics.rmse);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    Dataset, FitSummary, Prediction, RVMConfig, RVMError, RegressionModel,
    RelevanceVectorMachine, Result, Sample, SparseVector,
};
use crate::data::{CSVDataset, LibSVMDataset};
use crate::kernel::{Gamma, KernelType};
use crate::optimizer::{RVMOptimizer, TrainedRVR};
use nalgebra::{DMatrix, DVector};
use std::path::Path;

/// Relevance vector regression estimator with builder pattern
///
/// Holds the configuration and, after a successful fit, the trained model.
/// Fitting again replaces the model.
#[derive(Debug, Clone, Default)]
pub struct RVR {
    config: RVMConfig,
    model: Option<TrainedRVR>,
}

impl RVR {
    /// Create a new estimator with the RBF kernel and default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator from a full configuration
    pub fn with_config(config: RVMConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Wrap an already trained model, e.g. one loaded from disk
    pub fn from_model(model: TrainedRVR) -> Self {
        let config = RVMConfig {
            kernel: model.kernel_config().clone(),
            ..RVMConfig::default()
        };
        Self {
            config,
            model: Some(model),
        }
    }

    /// Set the kernel family
    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.config.kernel.kernel = kernel;
        self
    }

    /// Set the polynomial degree
    pub fn with_degree(mut self, degree: u32) -> Self {
        self.config.kernel.degree = degree;
        self
    }

    /// Set the kernel coefficient
    pub fn with_gamma(mut self, gamma: impl Into<Gamma>) -> Self {
        self.config.kernel.gamma = gamma.into();
        self
    }

    /// Set the independent kernel term
    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.config.kernel.coef0 = coef0;
        self
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    /// Set the pruning threshold on basis precisions
    pub fn with_threshold_alpha(mut self, threshold_alpha: f64) -> Self {
        self.config.threshold_alpha = threshold_alpha;
        self
    }

    /// Set maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Log per-iteration progress at info level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Fit on a dense design: one row of `x` per target in `y`
    pub fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<FitSummary> {
        if x.nrows() != y.len() {
            return Err(RVMError::DimensionMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let samples: Vec<Sample> = dense_rows(x)
            .into_iter()
            .zip(y.iter())
            .map(|(features, &target)| Sample::new(features, target))
            .collect();
        self.fit_samples_with_dim(&samples, Some(x.ncols()))
    }

    fn fit_samples_with_dim(
        &mut self,
        samples: &[Sample],
        n_features: Option<usize>,
    ) -> Result<FitSummary> {
        let model = RVMOptimizer::new(self.config.clone())
            .train_samples_with_dim(samples, n_features)?;
        Ok(self.store(model))
    }

    /// Fit on every sample of a dataset
    pub fn fit_dataset<D: Dataset>(&mut self, dataset: &D) -> Result<FitSummary> {
        let model = RVMOptimizer::new(self.config.clone()).train(dataset)?;
        Ok(self.store(model))
    }

    /// Fit from a LibSVM format file
    pub fn fit_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FitSummary> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.fit_dataset(&dataset)
    }

    /// Fit from a CSV file (automatically detects headers)
    pub fn fit_from_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<FitSummary> {
        let dataset = CSVDataset::from_file(path)?;
        self.fit_dataset(&dataset)
    }

    fn store(&mut self, model: TrainedRVR) -> FitSummary {
        let summary = model.summary();
        self.model = Some(model);
        summary
    }

    /// Predictive means for the rows of `x`
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        Ok(self.model()?.predict_mean(&dense_rows(x)))
    }

    /// Predictive means and standard deviations for the rows of `x`
    pub fn predict_with_std(&self, x: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        Ok(self.model()?.predict_mean_and_std(&dense_rows(x)))
    }

    /// Predict every sample of a dataset
    pub fn predict_dataset<D: Dataset>(
        &self,
        dataset: &D,
        return_std: bool,
    ) -> Result<Vec<Prediction>> {
        let features: Vec<SparseVector> = (0..dataset.len())
            .map(|i| dataset.get_sample(i).features)
            .collect();
        self.predict_samples(&features, return_std)
    }

    /// Predict from a LibSVM file
    pub fn predict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Prediction>> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.predict_dataset(&dataset, false)
    }

    /// Regression metrics on a dataset
    pub fn evaluate<D: Dataset>(&self, dataset: &D) -> Result<RegressionMetrics> {
        let predicted: Vec<f64> = self
            .predict_dataset(dataset, false)?
            .iter()
            .map(|p| p.mean)
            .collect();
        Ok(RegressionMetrics::new(&predicted, &dataset.get_targets()))
    }

    /// Regression metrics from a LibSVM file
    pub fn evaluate_from_file<P: AsRef<Path>>(&self, path: P) -> Result<RegressionMetrics> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.evaluate(&dataset)
    }

    /// Regression metrics from a CSV file
    pub fn evaluate_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<RegressionMetrics> {
        let dataset = CSVDataset::from_file(path)?;
        self.evaluate(&dataset)
    }

    /// The trained model
    pub fn model(&self) -> Result<&TrainedRVR> {
        self.model.as_ref().ok_or(RVMError::ModelNotTrained)
    }

    /// Summary of the trained model
    pub fn info(&self) -> Result<ModelInfo> {
        let model = self.model()?;
        Ok(ModelInfo {
            n_relevance_vectors: model.n_relevance_vectors(),
            relevance_indices: model.relevance_indices().to_vec(),
            bias: model.bias(),
            noise_variance: model.noise_variance(),
            kernel: model.kernel_config().kernel.name().to_string(),
            gamma: model.kernel_config().gamma,
            summary: model.summary(),
        })
    }
}

impl RelevanceVectorMachine for RVR {
    fn config(&self) -> &RVMConfig {
        &self.config
    }

    fn fit_samples(&mut self, samples: &[Sample]) -> Result<FitSummary> {
        self.fit_samples_with_dim(samples, None)
    }

    fn predict_samples(
        &self,
        features: &[SparseVector],
        return_std: bool,
    ) -> Result<Vec<Prediction>> {
        let model = self.model()?;
        let predictions: Vec<Prediction> = if return_std {
            let (mean, std) = model.predict_mean_and_std(features);
            mean.iter()
                .zip(std.iter())
                .map(|(&m, &s)| Prediction::with_std(m, s))
                .collect()
        } else {
            model
                .predict_mean(features)
                .iter()
                .map(|&m| Prediction::new(m))
                .collect()
        };
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

/// Relevance vector classifier
///
/// Not available yet: every operation returns [`RVMError::NotImplemented`].
#[derive(Debug, Clone, Default)]
pub struct RVC {
    config: RVMConfig,
}

const RVC_UNAVAILABLE: &str = "relevance vector classification";

impl RVC {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class probabilities for the rows of `x`
    pub fn predict_proba(&self, _x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        Err(RVMError::NotImplemented(RVC_UNAVAILABLE))
    }
}

impl RelevanceVectorMachine for RVC {
    fn config(&self) -> &RVMConfig {
        &self.config
    }

    fn fit_samples(&mut self, _samples: &[Sample]) -> Result<FitSummary> {
        Err(RVMError::NotImplemented(RVC_UNAVAILABLE))
    }

    fn predict_samples(
        &self,
        _features: &[SparseVector],
        _return_std: bool,
    ) -> Result<Vec<Prediction>> {
        Err(RVMError::NotImplemented(RVC_UNAVAILABLE))
    }

    fn is_fitted(&self) -> bool {
        false
    }
}

fn dense_rows(x: &DMatrix<f64>) -> Vec<SparseVector> {
    x.row_iter()
        .map(|row| SparseVector::from_dense(row.iter()))
        .collect()
}

/// Regression quality of predictions against known targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    /// Mean squared error
    pub mse: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compare predictions with targets pairwise
    ///
    /// R² is 1 for a perfect fit. With constant targets it is 1 when the fit
    /// is perfect and 0 otherwise.
    pub fn new(predicted: &[f64], actual: &[f64]) -> Self {
        let n = predicted.len().min(actual.len());
        if n == 0 {
            return Self {
                mse: 0.0,
                rmse: 0.0,
                mae: 0.0,
                r2: 0.0,
                n_samples: 0,
            };
        }

        let pairs = || predicted.iter().zip(actual.iter()).take(n);
        let ss_res: f64 = pairs().map(|(p, a)| (p - a).powi(2)).sum();
        let abs_err: f64 = pairs().map(|(p, a)| (p - a).abs()).sum();

        let mean_actual = actual[..n].iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = actual[..n].iter().map(|a| (a - mean_actual).powi(2)).sum();

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        let mse = ss_res / n as f64;
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs_err / n as f64,
            r2,
            n_samples: n,
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub n_relevance_vectors: usize,
    pub relevance_indices: Vec<usize>,
    pub bias: Option<f64>,
    pub noise_variance: f64,
    pub kernel: String,
    /// Gamma used for training, resolved to a concrete value
    pub gamma: Gamma,
    pub summary: FitSummary,
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Fit an RBF model on LibSVM data with default parameters
    pub fn train_libsvm<P: AsRef<Path>>(path: P) -> Result<RVR> {
        let mut rvr = RVR::new();
        rvr.fit_from_file(path)?;
        Ok(rvr)
    }

    /// Fit an RBF model on CSV data with default parameters
    pub fn train_csv<P: AsRef<Path>>(path: P) -> Result<RVR> {
        let mut rvr = RVR::new();
        rvr.fit_from_csv(path)?;
        Ok(rvr)
    }

    /// Fit with a custom gamma
    pub fn train_libsvm_with_gamma<P: AsRef<Path>>(path: P, gamma: impl Into<Gamma>) -> Result<RVR> {
        let mut rvr = RVR::new().with_gamma(gamma);
        rvr.fit_from_file(path)?;
        Ok(rvr)
    }

    /// Quick evaluation: train on training file, test on test file
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        train_path: P1,
        test_path: P2,
    ) -> Result<RegressionMetrics> {
        let model = train_libsvm(train_path)?;
        model.evaluate_from_file(test_path)
    }

    /// Hold-out validation on a sequential split
    pub fn simple_validation<D: Dataset>(
        dataset: &D,
        train_ratio: f64,
        gamma: impl Into<Gamma>,
    ) -> Result<RegressionMetrics> {
        if train_ratio <= 0.0 || train_ratio >= 1.0 {
            return Err(RVMError::InvalidParameter(format!(
                "Train ratio must be between 0 and 1, got: {train_ratio}"
            )));
        }

        let n = dataset.len();
        let train_size = (n as f64 * train_ratio) as usize;

        // Sequential split keeps the result reproducible
        let train_samples: Vec<Sample> = (0..train_size).map(|i| dataset.get_sample(i)).collect();
        let test_samples: Vec<Sample> = (train_size..n).map(|i| dataset.get_sample(i)).collect();

        let mut rvr = RVR::new().with_gamma(gamma);
        rvr.fit_samples_with_dim(&train_samples, Some(dataset.dim()))?;

        let features: Vec<SparseVector> =
            test_samples.iter().map(|s| s.features.clone()).collect();
        let predicted: Vec<f64> = rvr
            .predict_samples(&features, false)?
            .iter()
            .map(|p| p.mean)
            .collect();
        let actual: Vec<f64> = test_samples.iter().map(|s| s.target).collect();

        Ok(RegressionMetrics::new(&predicted, &actual))
    }
}
