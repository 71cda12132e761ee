//! Sequential sparse Bayesian basis selection
//!
//! Starting from a model that holds only the bias, candidates are visited in a
//! fixed round-robin order. Each visit either re-estimates, adds or deletes the
//! candidate basis, depending on the sign of `theta = q^2 - s`, after which the
//! noise variance and the statistics are refreshed.

use crate::core::{FitSummary, RVMConfig, RVMError, Result};
use crate::kernel::DesignMatrix;
use crate::solver::{
    estimate_noise_variance, CandidateQueue, Posterior, PrecisionVector, Statistics,
    StatisticsEngine,
};
use log::{debug, log, warn, Level};
use nalgebra::DVector;

/// Floor for the target variance when seeding the noise variance
const MIN_TARGET_VARIANCE: f64 = 1e-6;

/// Fraction of the target variance used as the initial noise variance
const INITIAL_NOISE_FRACTION: f64 = 0.1;

/// What a single iteration did to its candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BasisAction {
    /// Active basis given a new precision
    Reestimate { alpha: f64 },
    /// Inactive basis brought into the model
    Add { alpha: f64 },
    /// Active basis removed from the model
    Delete,
    /// Nothing changed
    Skip,
}

/// State at the end of a fit
#[derive(Debug, Clone)]
pub struct SolverResult {
    pub precision: PrecisionVector,
    /// Posterior consistent with `precision` and `noise_variance`
    pub posterior: Posterior,
    pub noise_variance: f64,
    pub summary: FitSummary,
}

/// Fast marginal likelihood maximisation over a fixed design matrix
#[derive(Debug, Clone)]
pub struct SequentialSolver {
    tol: f64,
    max_iterations: usize,
    verbose: bool,
}

impl SequentialSolver {
    pub fn new(config: &RVMConfig) -> Self {
        Self {
            tol: config.tol,
            max_iterations: config.max_iterations,
            verbose: config.verbose,
        }
    }

    fn level(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Trace
        }
    }

    /// Run basis selection until convergence or the iteration limit
    pub fn solve(&self, design: &DesignMatrix, targets: &DVector<f64>) -> Result<SolverResult> {
        let n = design.n_samples();
        if n < 2 {
            return Err(RVMError::InvalidDataset(format!(
                "At least 2 samples are required, got {n}"
            )));
        }
        if targets.len() != n {
            return Err(RVMError::DimensionMismatch {
                expected: n,
                actual: targets.len(),
            });
        }

        let level = self.level();
        let engine = StatisticsEngine::new(design, targets);

        let mut noise_variance = initial_noise_variance(targets);
        let bias_precision = initial_bias_precision(design, targets, noise_variance);
        if !(noise_variance.is_finite() && bias_precision.is_finite() && bias_precision > 0.0) {
            return Err(RVMError::InvalidDataset(format!(
                "Targets are too large to fit: initial sigma2={noise_variance:e}, bias alpha={bias_precision:e}"
            )));
        }
        let mut precision = PrecisionVector::new(design.n_bases());
        precision.activate(0, bias_precision);
        debug!(
            "Initial state: sigma2={noise_variance:.6e}, bias alpha={:.6e}",
            precision.get(0)
        );

        let mut stats = engine.compute(&precision, noise_variance);
        let mut queue = CandidateQueue::new(design.n_bases());
        let mut summary = FitSummary {
            iterations: 0,
            converged: false,
        };

        for iteration in 1..=self.max_iterations {
            summary.iterations = iteration;

            let candidate = queue.next_candidate();
            let theta = stats.theta(candidate);
            let alpha_old = precision.get(candidate);
            let action = decide(&precision, &stats, candidate);

            match action {
                BasisAction::Reestimate { alpha } | BasisAction::Add { alpha } => {
                    precision.activate(candidate, alpha)
                }
                BasisAction::Delete => precision.deactivate(candidate),
                BasisAction::Skip => {}
            }

            log!(
                level,
                "Iteration {iteration}: candidate {candidate}, theta={theta:.6e}, {action:?}, active={}, sigma2={noise_variance:.6e}",
                precision.n_active()
            );

            let stationary = match action {
                BasisAction::Reestimate { alpha } => alpha.ln() - alpha_old.ln() < self.tol,
                // Only the protected last basis is skipped while active
                BasisAction::Skip => precision.is_active(candidate),
                BasisAction::Add { .. } | BasisAction::Delete => false,
            };
            if stationary && !has_pending_additions(&precision, &stats) {
                summary.converged = true;
                break;
            }

            let posterior = engine.posterior(&precision, noise_variance);
            report_fallback(level, &posterior);
            match estimate_noise_variance(&engine.residual(&posterior), &precision, &posterior) {
                Some(estimate) => noise_variance = estimate,
                None => warn!(
                    "Noise variance estimate degenerate at iteration {iteration}; keeping sigma2={noise_variance:.6e}"
                ),
            }

            stats = engine.compute(&precision, noise_variance);
            report_fallback(level, &stats.posterior);
        }

        if summary.converged {
            log!(
                level,
                "Converged after {} iterations with {} active bases",
                summary.iterations,
                precision.n_active()
            );
        } else {
            warn!(
                "Basis selection did not converge within {} iterations",
                self.max_iterations
            );
        }

        // The last accepted update may not be reflected in the statistics yet
        let posterior = engine.posterior(&precision, noise_variance);
        report_fallback(level, &posterior);

        Ok(SolverResult {
            precision,
            posterior,
            noise_variance,
            summary,
        })
    }
}

/// Action for `candidate` under the current statistics
///
/// A positive theta whose implied precision is not a finite positive number
/// is treated like a non-positive theta. The last active basis is never
/// deleted.
pub fn decide(precision: &PrecisionVector, stats: &Statistics, candidate: usize) -> BasisAction {
    let proposed = proposed_precision(stats.sparsity[candidate], stats.quality[candidate]);

    match (proposed, precision.is_active(candidate)) {
        (Some(alpha), true) => BasisAction::Reestimate { alpha },
        (Some(alpha), false) => BasisAction::Add { alpha },
        (None, true) if precision.n_active() > 1 => BasisAction::Delete,
        (None, _) => BasisAction::Skip,
    }
}

/// alpha = s^2 / (q^2 - s) when that is a usable precision
pub fn proposed_precision(s: f64, q: f64) -> Option<f64> {
    let theta = q * q - s;
    if theta <= 0.0 || theta.is_nan() {
        return None;
    }

    let alpha = s * s / theta;
    (alpha.is_finite() && alpha > 0.0).then_some(alpha)
}

fn has_pending_additions(precision: &PrecisionVector, stats: &Statistics) -> bool {
    precision
        .inactive_indices()
        .any(|i| proposed_precision(stats.sparsity[i], stats.quality[i]).is_some())
}

fn report_fallback(level: Level, posterior: &Posterior) {
    if posterior.used_pseudo_inverse {
        log!(
            level,
            "Posterior precision over {} active bases is singular; used the pseudo-inverse",
            posterior.active.len()
        );
    }
}

/// `0.1 * max(1e-6, Var(y))` with the population variance
pub fn initial_noise_variance(targets: &DVector<f64>) -> f64 {
    INITIAL_NOISE_FRACTION * targets.variance().max(MIN_TARGET_VARIANCE)
}

/// Seed precision for the bias basis
///
/// With only the bias in the model the marginal likelihood is maximised at
/// `||phi||^2 / ((phi . y)^2 / ||phi||^2 - sigma2)`. The denominator is
/// floored at `sigma2` so targets with a near-zero mean still give a finite
/// positive seed.
pub fn initial_bias_precision(
    design: &DesignMatrix,
    targets: &DVector<f64>,
    noise_variance: f64,
) -> f64 {
    let norm_sq = design.column_norms_sq()[0];
    let projection = design.matrix().column(0).dot(targets);
    let denom = ((projection / norm_sq) * projection - noise_variance).max(noise_variance);
    norm_sq / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::{KernelMatrixBuilder, RBFKernel};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sin_problem(n: usize, gamma: f64) -> (DesignMatrix, DVector<f64>) {
        let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let rows: Vec<SparseVector> = xs
            .iter()
            .map(|&x| SparseVector::from_dense([x].iter()))
            .collect();
        let kernel = RBFKernel::new(gamma);
        let design = KernelMatrixBuilder::new(&kernel).design_matrix(&rows);
        let targets = DVector::from_iterator(n, xs.iter().map(|&x| (2.0 * PI * x).sin()));
        (design, targets)
    }

    fn config() -> RVMConfig {
        RVMConfig::default()
    }

    #[test]
    fn test_initial_noise_variance() {
        let targets = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(initial_noise_variance(&targets), 0.1 * 2.0 / 3.0, epsilon = 1e-12);

        let constant = DVector::from_element(4, 7.0);
        assert_relative_eq!(initial_noise_variance(&constant), 1e-7, epsilon = 1e-18);
    }

    #[test]
    fn test_initial_bias_precision() {
        let (design, _) = sin_problem(3, 1.0);
        let targets = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let noise = initial_noise_variance(&targets);

        // ||1||^2 = 3, <1, y> = 6
        let expected = 3.0 / (36.0 / 3.0 - noise);
        assert_relative_eq!(
            initial_bias_precision(&design, &targets, noise),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_initial_bias_precision_zero_mean_targets() {
        let (design, targets) = sin_problem(5, 1.0);
        let noise = initial_noise_variance(&targets);
        let alpha = initial_bias_precision(&design, &targets, noise);

        // Projection vanishes, so the denominator falls back to sigma2 = 0.04
        assert!(alpha.is_finite() && alpha > 0.0);
        assert_relative_eq!(alpha, 5.0 / noise, max_relative = 1e-9);
    }

    #[test]
    fn test_proposed_precision() {
        assert_eq!(proposed_precision(1.0, 2.0), Some(1.0 / 3.0));
        assert_eq!(proposed_precision(1.0, 1.0), None);
        assert_eq!(proposed_precision(2.0, 1.0), None);
        assert_eq!(proposed_precision(0.0, 1.0), None);
        assert_eq!(proposed_precision(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_last_active_basis_is_never_deleted() {
        let (design, targets) = sin_problem(4, 1.0);
        let engine = StatisticsEngine::new(&design, &targets);
        let mut precision = PrecisionVector::new(design.n_bases());
        precision.activate(2, 1.0);

        let mut stats = engine.compute(&precision, 0.1);
        // Force a non-positive theta for the only active basis
        stats.quality[2] = 0.0;
        stats.sparsity[2] = 1.0;

        assert_eq!(decide(&precision, &stats, 2), BasisAction::Skip);

        precision.activate(0, 1.0);
        assert_eq!(decide(&precision, &stats, 2), BasisAction::Delete);
    }

    #[test]
    fn test_initial_bias_precision_huge_targets() {
        let (design, _) = sin_problem(4, 1.0);
        // (sum y)^2 overflows while mean(y) * sum(y) does not
        let targets = DVector::from_element(4, 5e153);
        let noise = initial_noise_variance(&targets);
        let alpha = initial_bias_precision(&design, &targets, noise);

        assert!(alpha.is_finite() && alpha > 0.0);
    }

    #[test]
    fn test_overflowing_targets_are_rejected() {
        let (design, _) = sin_problem(3, 1.0);
        let targets = DVector::from_row_slice(&[1e200, -1e200, 3e200]);

        let err = SequentialSolver::new(&config())
            .solve(&design, &targets)
            .unwrap_err();
        assert!(matches!(err, RVMError::InvalidDataset(_)));
    }

    #[test]
    fn test_protected_bias_only_model_converges() {
        // With gamma 1 no kernel basis is worth adding and the bias carries
        // no signal, so the bias is the only and undeletable basis
        let (design, targets) = sin_problem(5, 1.0);
        let result = SequentialSolver::new(&config()).solve(&design, &targets).unwrap();

        assert!(result.summary.converged);
        assert!(result.summary.iterations < 5000);
        assert!(result.precision.n_active() >= 1);
        assert!(result.noise_variance > 0.0);
    }

    #[test]
    fn test_two_samples_fit() {
        let (design, targets) = sin_problem(2, 1.0);
        let targets = targets + DVector::from_row_slice(&[0.5, 1.5]);

        let result = SequentialSolver::new(&config()).solve(&design, &targets).unwrap();

        assert!(result.precision.n_active() >= 1);
        assert!(result.precision.n_active() <= 3);
        assert!(result.noise_variance > 0.0);
        assert_eq!(result.posterior.active, result.precision.active_indices());
        assert_eq!(result.posterior.mean.len(), result.precision.n_active());
    }

    #[test]
    fn test_sin_fit_converges_and_stays_consistent() {
        let (design, targets) = sin_problem(5, 50.0);
        let result = SequentialSolver::new(&config()).solve(&design, &targets).unwrap();

        assert!(result.summary.converged);
        assert!(result.summary.iterations < 5000);
        assert!(result.noise_variance > 0.0 && result.noise_variance.is_finite());
        assert!(result.precision.n_active() >= 1);
        for i in 0..result.precision.len() {
            assert_eq!(result.precision.is_active(i), result.precision.get(i).is_finite());
        }
    }

    #[test]
    fn test_iteration_limit_is_soft() {
        let (design, targets) = sin_problem(5, 50.0);
        let limited = RVMConfig {
            max_iterations: 3,
            ..RVMConfig::default()
        };

        let result = SequentialSolver::new(&limited).solve(&design, &targets).unwrap();
        assert_eq!(result.summary.iterations, 3);
        assert!(!result.summary.converged);
        assert!(result.precision.n_active() >= 1);
    }

    #[test]
    fn test_solve_is_deterministic() {
        let (design, targets) = sin_problem(8, 10.0);
        let solver = SequentialSolver::new(&config());

        let first = solver.solve(&design, &targets).unwrap();
        let second = solver.solve(&design, &targets).unwrap();

        assert_eq!(first.precision, second.precision);
        assert_eq!(first.posterior.mean, second.posterior.mean);
        assert_eq!(first.noise_variance, second.noise_variance);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_too_few_samples() {
        let (design, _) = sin_problem(2, 1.0);
        let single = KernelMatrixBuilder::new(&RBFKernel::new(1.0))
            .design_matrix(&[SparseVector::empty()]);

        let err = SequentialSolver::new(&config())
            .solve(&single, &DVector::from_element(1, 1.0))
            .unwrap_err();
        assert!(matches!(err, RVMError::InvalidDataset(_)));

        let err = SequentialSolver::new(&config())
            .solve(&design, &DVector::from_element(3, 1.0))
            .unwrap_err();
        assert!(matches!(err, RVMError::DimensionMismatch { .. }));
    }
}
