//! Training and prediction for relevance vector regression
//!
//! [`RVMOptimizer`] ties kernel resolution, design matrix construction and the
//! sequential solver together. The resulting [`TrainedRVR`] keeps only what
//! prediction needs: the relevance vectors, the pruned posterior and the noise
//! variance.

use crate::core::{
    Dataset, FitSummary, Prediction, RVMConfig, RVMError, RegressionModel, Result, Sample,
    SparseVector,
};
use crate::kernel::{Kernel, KernelConfig, KernelMatrixBuilder, ResolvedKernel};
use crate::solver::{SequentialSolver, SolverResult};
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::sync::Arc;

/// Fits relevance vector regression models with a fixed configuration
pub struct RVMOptimizer {
    config: RVMConfig,
}

impl RVMOptimizer {
    /// Create a new optimizer with the given configuration
    pub fn new(config: RVMConfig) -> Self {
        Self { config }
    }

    /// Train on every sample of a dataset
    pub fn train<D: Dataset>(&self, dataset: &D) -> Result<TrainedRVR> {
        let samples: Vec<Sample> = (0..dataset.len()).map(|i| dataset.get_sample(i)).collect();
        self.train_samples_with_dim(&samples, Some(dataset.dim()))
    }

    /// Train on a slice of samples
    ///
    /// The feature count used by `Gamma::Auto` and `Gamma::Scale` is taken
    /// from the highest stored feature index.
    pub fn train_samples(&self, samples: &[Sample]) -> Result<TrainedRVR> {
        self.train_samples_with_dim(samples, None)
    }

    /// Train on a slice of samples drawn from data with `n_features` columns
    pub fn train_samples_with_dim(
        &self,
        samples: &[Sample],
        n_features: Option<usize>,
    ) -> Result<TrainedRVR> {
        self.config.validate()?;

        if samples.len() < 2 {
            return Err(RVMError::InvalidDataset(format!(
                "At least 2 samples are required, got {}",
                samples.len()
            )));
        }
        if let Some(bad) = samples.iter().position(|s| !s.target.is_finite()) {
            return Err(RVMError::InvalidDataset(format!(
                "Target of sample {bad} is not finite: {}",
                samples[bad].target
            )));
        }

        let rows: Vec<SparseVector> = samples.iter().map(|s| s.features.clone()).collect();
        let targets = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.target));

        let resolved = self.config.kernel.resolve(&rows, n_features)?;
        let design = KernelMatrixBuilder::new(resolved.kernel.as_ref()).design_matrix(&rows);
        debug!(
            "Built {}x{} design matrix",
            design.n_samples(),
            design.n_bases()
        );

        let result = SequentialSolver::new(&self.config).solve(&design, &targets)?;

        Ok(TrainedRVR::from_solution(
            resolved,
            &rows,
            result,
            self.config.threshold_alpha,
        ))
    }

    /// Get the optimizer configuration
    pub fn config(&self) -> &RVMConfig {
        &self.config
    }
}

/// A fitted relevance vector regression model
///
/// Independent of any training state; cloning shares the kernel.
#[derive(Clone)]
pub struct TrainedRVR {
    kernel: Arc<dyn Kernel>,
    kernel_config: KernelConfig,
    relevance_vectors: Vec<SparseVector>,
    relevance_indices: Vec<usize>,
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    noise_variance: f64,
    summary: FitSummary,
}

impl fmt::Debug for TrainedRVR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedRVR")
            .field("kernel_config", &self.kernel_config)
            .field("relevance_indices", &self.relevance_indices)
            .field("mean", &self.mean)
            .field("noise_variance", &self.noise_variance)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl TrainedRVR {
    /// Prune a solver result into a prediction-ready model
    ///
    /// Active bases whose precision is below `threshold_alpha` are kept. The
    /// posterior mean and covariance are restricted to those bases, and the
    /// training rows behind the kept non-bias bases become the relevance
    /// vectors.
    pub fn from_solution(
        resolved: ResolvedKernel,
        rows: &[SparseVector],
        result: SolverResult,
        threshold_alpha: f64,
    ) -> Self {
        let active = &result.posterior.active;
        let keep: Vec<usize> = (0..active.len())
            .filter(|&k| result.precision.get(active[k]) < threshold_alpha)
            .collect();

        // Basis 0 is the bias; basis j + 1 is training row j
        let relevance_indices: Vec<usize> = keep
            .iter()
            .map(|&k| active[k])
            .filter(|&basis| basis != 0)
            .map(|basis| basis - 1)
            .collect();
        let relevance_vectors = relevance_indices.iter().map(|&i| rows[i].clone()).collect();

        let mean = DVector::from_iterator(
            keep.len(),
            keep.iter().map(|&k| result.posterior.mean[k]),
        );
        let covariance = result
            .posterior
            .covariance
            .select_rows(&keep)
            .select_columns(&keep);

        debug!(
            "Kept {} of {} active bases ({} relevance vectors)",
            keep.len(),
            active.len(),
            relevance_indices.len()
        );

        Self {
            kernel: resolved.kernel,
            kernel_config: resolved.config,
            relevance_vectors,
            relevance_indices,
            mean,
            covariance,
            noise_variance: result.noise_variance,
            summary: result.summary,
        }
    }

    /// Rebuild a model from stored parts
    ///
    /// `mean` holds one weight per relevance vector, preceded by the bias
    /// weight when the model has one.
    pub fn from_parts(
        resolved: ResolvedKernel,
        relevance_vectors: Vec<SparseVector>,
        relevance_indices: Vec<usize>,
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
        noise_variance: f64,
        summary: FitSummary,
    ) -> Result<Self> {
        let n_rv = relevance_vectors.len();
        if mean.len() != n_rv && mean.len() != n_rv + 1 {
            return Err(RVMError::DimensionMismatch {
                expected: n_rv,
                actual: mean.len(),
            });
        }
        if relevance_indices.len() != n_rv {
            return Err(RVMError::DimensionMismatch {
                expected: n_rv,
                actual: relevance_indices.len(),
            });
        }
        if covariance.shape() != (mean.len(), mean.len()) {
            return Err(RVMError::DimensionMismatch {
                expected: mean.len(),
                actual: covariance.nrows(),
            });
        }
        if !(noise_variance.is_finite() && noise_variance > 0.0) {
            return Err(RVMError::InvalidParameter(format!(
                "Noise variance must be positive and finite, got: {noise_variance}"
            )));
        }

        Ok(Self {
            kernel: resolved.kernel,
            kernel_config: resolved.config,
            relevance_vectors,
            relevance_indices,
            mean,
            covariance,
            noise_variance,
            summary,
        })
    }

    /// Whether the first weight belongs to the bias basis
    pub fn includes_bias(&self) -> bool {
        self.mean.len() != self.relevance_vectors.len()
    }

    /// Bias weight, if the bias survived pruning
    pub fn bias(&self) -> Option<f64> {
        self.includes_bias().then(|| self.mean[0])
    }

    /// Basis responses of new rows, bias column first when present
    fn basis_matrix(&self, rows: &[SparseVector]) -> DMatrix<f64> {
        let cross =
            KernelMatrixBuilder::new(self.kernel.as_ref()).cross(rows, &self.relevance_vectors);
        if self.includes_bias() {
            cross.insert_column(0, 1.0)
        } else {
            cross
        }
    }

    /// Predictive means for a batch of rows
    pub fn predict_mean(&self, rows: &[SparseVector]) -> DVector<f64> {
        self.basis_matrix(rows) * &self.mean
    }

    /// Predictive means and standard deviations for a batch of rows
    ///
    /// `std_i = sqrt(sigma2 + k_i^T Sigma k_i)`, with the quadratic term
    /// floored at zero.
    pub fn predict_mean_and_std(&self, rows: &[SparseVector]) -> (DVector<f64>, DVector<f64>) {
        let basis = self.basis_matrix(rows);
        let mean = &basis * &self.mean;
        let projected = &basis * &self.covariance;

        let std = DVector::from_iterator(
            rows.len(),
            (0..rows.len()).map(|i| {
                let quadratic = projected.row(i).dot(&basis.row(i)).max(0.0);
                (self.noise_variance + quadratic).sqrt()
            }),
        );

        (mean, std)
    }

    /// Training rows kept as relevance vectors
    pub fn relevance_vectors(&self) -> &[SparseVector] {
        &self.relevance_vectors
    }

    /// Positions of the relevance vectors in the training set
    pub fn relevance_indices(&self) -> &[usize] {
        &self.relevance_indices
    }

    /// Posterior weight mean (bias first when present)
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Posterior weight covariance
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn kernel_config(&self) -> &KernelConfig {
        &self.kernel_config
    }

    pub fn summary(&self) -> FitSummary {
        self.summary
    }
}

impl RegressionModel for TrainedRVR {
    fn predict(&self, features: &SparseVector) -> Prediction {
        let mean = self.predict_mean(std::slice::from_ref(features));
        Prediction::new(mean[0])
    }

    fn predict_with_std(&self, features: &SparseVector) -> Prediction {
        let (mean, std) = self.predict_mean_and_std(std::slice::from_ref(features));
        Prediction::with_std(mean[0], std[0])
    }

    fn n_relevance_vectors(&self) -> usize {
        self.relevance_vectors.len()
    }

    fn noise_variance(&self) -> f64 {
        self.noise_variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Gamma, KernelType};
    use crate::solver::{Posterior, PrecisionVector};
    use approx::assert_relative_eq;

    fn point(x: f64) -> SparseVector {
        SparseVector::from_dense([x].iter())
    }

    fn linear() -> ResolvedKernel {
        KernelConfig {
            kernel: KernelType::Linear,
            ..KernelConfig::default()
        }
        .resolve(&[point(1.0)], None)
        .unwrap()
    }

    fn sin_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let x = i as f64 / (n - 1) as f64;
                Sample::new(point(x), (2.0 * std::f64::consts::PI * x).sin())
            })
            .collect()
    }

    #[test]
    fn test_extraction_prunes_large_precisions() {
        let rows: Vec<SparseVector> = (0..4).map(|i| point(i as f64 + 1.0)).collect();
        let mut precision = PrecisionVector::new(5);
        precision.activate(0, 1.0);
        precision.activate(2, 1e6);
        precision.activate(4, 2.0);

        let result = SolverResult {
            posterior: Posterior {
                active: vec![0, 2, 4],
                covariance: DMatrix::from_row_slice(
                    3,
                    3,
                    &[1.0, 0.1, 0.2, 0.1, 2.0, 0.3, 0.2, 0.3, 3.0],
                ),
                mean: DVector::from_row_slice(&[0.5, 7.0, -1.5]),
                used_pseudo_inverse: false,
            },
            precision,
            noise_variance: 0.01,
            summary: FitSummary {
                iterations: 10,
                converged: true,
            },
        };

        let model = TrainedRVR::from_solution(linear(), &rows, result, 1e5);

        assert!(model.includes_bias());
        assert_eq!(model.bias(), Some(0.5));
        assert_eq!(model.relevance_indices(), &[3]);
        assert_eq!(model.relevance_vectors(), &[point(4.0)]);
        assert_eq!(model.mean().as_slice(), &[0.5, -1.5]);
        assert_eq!(
            model.covariance(),
            &DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 3.0])
        );
        assert_eq!(model.noise_variance(), 0.01);
    }

    #[test]
    fn test_single_relevance_vector_prediction_is_linear_combination() {
        let model = TrainedRVR::from_parts(
            linear(),
            vec![point(2.0)],
            vec![0],
            DVector::from_row_slice(&[0.5]),
            DMatrix::from_element(1, 1, 0.25),
            0.04,
            FitSummary {
                iterations: 1,
                converged: true,
            },
        )
        .unwrap();

        assert!(!model.includes_bias());
        assert_eq!(model.bias(), None);
        // 0.5 * <3, 2>
        assert_relative_eq!(model.predict(&point(3.0)).mean, 3.0, epsilon = 1e-12);

        // sqrt(0.04 + 6 * 0.25 * 6)
        let prediction = model.predict_with_std(&point(3.0));
        assert_relative_eq!(prediction.std.unwrap(), 9.04_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_bias_column_prepended() {
        let model = TrainedRVR::from_parts(
            linear(),
            vec![point(1.0)],
            vec![0],
            DVector::from_row_slice(&[2.0, 3.0]),
            DMatrix::identity(2, 2),
            1.0,
            FitSummary {
                iterations: 1,
                converged: true,
            },
        )
        .unwrap();

        let means = model.predict_mean(&[point(0.0), point(2.0)]);
        assert_eq!(means.as_slice(), &[2.0, 8.0]);
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_shapes() {
        let summary = FitSummary {
            iterations: 0,
            converged: false,
        };
        let err = TrainedRVR::from_parts(
            linear(),
            vec![point(1.0)],
            vec![0],
            DVector::from_row_slice(&[1.0, 2.0, 3.0]),
            DMatrix::identity(3, 3),
            1.0,
            summary,
        )
        .unwrap_err();
        assert!(matches!(err, RVMError::DimensionMismatch { .. }));

        let err = TrainedRVR::from_parts(
            linear(),
            vec![point(1.0)],
            vec![0],
            DVector::from_row_slice(&[1.0]),
            DMatrix::identity(1, 1),
            0.0,
            summary,
        )
        .unwrap_err();
        assert!(matches!(err, RVMError::InvalidParameter(_)));
    }

    #[test]
    fn test_train_sin() {
        let mut config = RVMConfig::default();
        config.kernel.gamma = Gamma::Value(50.0);
        let samples = sin_samples(5);

        let model = RVMOptimizer::new(config).train_samples(&samples).unwrap();

        assert!(model.summary().converged);
        assert!(model.n_relevance_vectors() <= 5);
        assert!(model.noise_variance() > 0.0);
        assert_eq!(model.kernel_config().gamma, Gamma::Value(50.0));
        assert!(model.predict(&point(0.5)).mean.abs() < 0.05);
        for (rv, &i) in model.relevance_vectors().iter().zip(model.relevance_indices()) {
            assert_eq!(rv, &samples[i].features);
        }
    }

    #[test]
    fn test_std_never_below_noise() {
        let mut config = RVMConfig::default();
        config.kernel.gamma = Gamma::Value(20.0);
        let model = RVMOptimizer::new(config).train_samples(&sin_samples(9)).unwrap();

        let queries: Vec<SparseVector> = (0..21).map(|i| point(i as f64 / 10.0 - 0.5)).collect();
        let (_, std) = model.predict_mean_and_std(&queries);
        let floor = model.noise_variance().sqrt();
        for s in std.iter() {
            assert!(s.is_finite());
            assert!(*s >= floor - 1e-12);
        }
    }

    #[test]
    fn test_training_rejects_bad_input() {
        let optimizer = RVMOptimizer::new(RVMConfig::default());

        let err = optimizer.train_samples(&sin_samples(2)[..1]).unwrap_err();
        assert!(matches!(err, RVMError::InvalidDataset(_)));

        let mut samples = sin_samples(3);
        samples[1].target = f64::NAN;
        let err = optimizer.train_samples(&samples).unwrap_err();
        assert!(matches!(err, RVMError::InvalidDataset(_)));

        let mut config = RVMConfig::default();
        config.kernel.gamma = Gamma::Value(0.0);
        let err = RVMOptimizer::new(config)
            .train_samples(&sin_samples(3))
            .unwrap_err();
        assert!(matches!(err, RVMError::InvalidParameter(_)));
    }
}
