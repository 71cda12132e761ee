//! Posterior and sparsity/quality statistics
//!
//! For the active bases `Phi` with precisions `A` and noise precision
//! `beta = 1 / sigma2`:
//!
//! ```text
//! Sigma = (A + beta Phi^T Phi)^-1
//! mu    = beta Sigma Phi^T y
//! S_i   = beta ||phi_i||^2 - beta^2 (Phi^T phi_i)^T Sigma (Phi^T phi_i)
//! Q_i   = beta phi_i^T y  - beta^2 (Phi^T phi_i)^T Sigma Phi^T y
//! ```
//!
//! `S` and `Q` follow from the Woodbury identity and are evaluated for every
//! candidate through the m x (n + 1) product `Phi^T K`, so no inverse larger
//! than the active set is ever formed.

use crate::kernel::DesignMatrix;
use crate::solver::PrecisionVector;
use nalgebra::{DMatrix, DVector};

/// Singular values below this fraction of the largest one are treated as zero
const PSEUDO_INVERSE_RCOND: f64 = 1e-15;

/// Weight posterior over the active bases
#[derive(Debug, Clone)]
pub struct Posterior {
    /// Active basis indices, ascending; row/column `k` of the posterior
    /// belongs to basis `active[k]`
    pub active: Vec<usize>,
    /// Sigma, m x m
    pub covariance: DMatrix<f64>,
    /// mu, length m
    pub mean: DVector<f64>,
    /// Whether inverting the posterior precision needed the SVD fallback
    pub used_pseudo_inverse: bool,
}

/// Posterior plus the per-candidate sparsity and quality factors
#[derive(Debug, Clone)]
pub struct Statistics {
    pub posterior: Posterior,
    /// s_i for every candidate basis
    pub sparsity: DVector<f64>,
    /// q_i for every candidate basis
    pub quality: DVector<f64>,
}

impl Statistics {
    /// theta_i = q_i^2 - s_i
    pub fn theta(&self, i: usize) -> f64 {
        self.quality[i] * self.quality[i] - self.sparsity[i]
    }
}

/// Evaluates posteriors and candidate statistics for one training problem
pub struct StatisticsEngine<'a> {
    design: &'a DesignMatrix,
    targets: &'a DVector<f64>,
    /// K^T y, shared by every evaluation
    design_t_targets: DVector<f64>,
}

impl<'a> StatisticsEngine<'a> {
    pub fn new(design: &'a DesignMatrix, targets: &'a DVector<f64>) -> Self {
        debug_assert_eq!(design.n_samples(), targets.len());
        let design_t_targets = design.matrix().tr_mul(targets);
        Self {
            design,
            targets,
            design_t_targets,
        }
    }

    /// Posterior mean and covariance for the current active set
    pub fn posterior(&self, precision: &PrecisionVector, noise_variance: f64) -> Posterior {
        let beta = 1.0 / noise_variance;
        let active = precision.active_indices();
        let phi = self.design.select_bases(&active);

        let mut h = phi.tr_mul(&phi) * beta;
        for (k, &basis) in active.iter().enumerate() {
            h[(k, k)] += precision.get(basis);
        }

        let (covariance, used_pseudo_inverse) = invert(h);
        let phi_t_y = self.active_design_t_targets(&active);
        let mean = &covariance * phi_t_y * beta;

        Posterior {
            active,
            covariance,
            mean,
            used_pseudo_inverse,
        }
    }

    /// Posterior together with s and q for every candidate
    pub fn compute(&self, precision: &PrecisionVector, noise_variance: f64) -> Statistics {
        let posterior = self.posterior(precision, noise_variance);
        self.factors(precision, noise_variance, posterior)
    }

    /// s and q for every candidate given an already computed posterior
    pub fn factors(
        &self,
        precision: &PrecisionVector,
        noise_variance: f64,
        posterior: Posterior,
    ) -> Statistics {
        let beta = 1.0 / noise_variance;
        let n_bases = self.design.n_bases();

        let phi = self.design.select_bases(&posterior.active);
        // Column i holds Phi^T phi_i
        let cross = phi.tr_mul(self.design.matrix());
        let sigma_cross = &posterior.covariance * &cross;
        // beta Sigma Phi^T y is the posterior mean
        let cross_t_mean = cross.tr_mul(&posterior.mean);

        let mut sparsity = DVector::zeros(n_bases);
        let mut quality = DVector::zeros(n_bases);

        for i in 0..n_bases {
            let quadratic = cross.column(i).dot(&sigma_cross.column(i));
            let big_s = beta * self.design.column_norms_sq()[i] - beta * beta * quadratic;
            let big_q = beta * self.design_t_targets[i] - beta * cross_t_mean[i];

            if precision.is_active(i) {
                let alpha = precision.get(i);
                let denom = alpha - big_s;
                sparsity[i] = alpha * big_s / denom;
                quality[i] = alpha * big_q / denom;
            } else {
                sparsity[i] = big_s;
                quality[i] = big_q;
            }
        }

        Statistics {
            posterior,
            sparsity,
            quality,
        }
    }

    /// Residual y - Phi mu for a posterior
    pub fn residual(&self, posterior: &Posterior) -> DVector<f64> {
        let phi = self.design.select_bases(&posterior.active);
        self.targets - phi * &posterior.mean
    }

    pub fn n_samples(&self) -> usize {
        self.design.n_samples()
    }

    fn active_design_t_targets(&self, active: &[usize]) -> DVector<f64> {
        DVector::from_iterator(
            active.len(),
            active.iter().map(|&basis| self.design_t_targets[basis]),
        )
    }
}

/// Invert a symmetric positive (semi-)definite matrix, never failing
///
/// A 1 x 1 matrix is inverted by its reciprocal. Larger matrices go through
/// LU; when that reports singularity or yields non-finite entries the SVD
/// pseudo-inverse is used instead. The flag reports the fallback.
pub fn invert(h: DMatrix<f64>) -> (DMatrix<f64>, bool) {
    if h.nrows() == 1 {
        return (DMatrix::from_element(1, 1, 1.0 / h[(0, 0)]), false);
    }

    if let Some(inverse) = h.clone().try_inverse() {
        if inverse.iter().all(|v| v.is_finite()) {
            return (inverse, false);
        }
    }

    (pseudo_inverse(h), true)
}

fn pseudo_inverse(h: DMatrix<f64>) -> DMatrix<f64> {
    let n = h.nrows();
    let svd = h.svd(true, true);
    let largest = svd.singular_values.iter().cloned().fold(0.0, f64::max);
    let cutoff = largest * PSEUDO_INVERSE_RCOND;

    // Only fails when U or V^T were not requested
    svd.pseudo_inverse(cutoff)
        .unwrap_or_else(|_| DMatrix::zeros(n, n))
}
