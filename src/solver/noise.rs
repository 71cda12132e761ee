//! Noise variance re-estimation

use crate::solver::{Posterior, PrecisionVector};
use nalgebra::DVector;

/// Re-estimate sigma2 from the residual of a posterior
///
/// `sigma2 = ||y - Phi mu||^2 / (n - m + sum_k alpha_k Sigma_kk)`, where the
/// denominator is the number of samples minus the effective number of
/// well-determined weights. Returns `None` when the denominator is not
/// strictly positive or the estimate is not a finite positive number.
pub fn estimate_noise_variance(
    residual: &DVector<f64>,
    precision: &PrecisionVector,
    posterior: &Posterior,
) -> Option<f64> {
    let n = residual.len() as f64;
    let m = posterior.active.len() as f64;

    let undetermined: f64 = posterior
        .active
        .iter()
        .enumerate()
        .map(|(k, &basis)| precision.get(basis) * posterior.covariance[(k, k)])
        .sum();

    let denom = n - m + undetermined;
    if denom.is_nan() || denom <= 0.0 {
        return None;
    }

    let estimate = residual.norm_squared() / denom;
    (estimate.is_finite() && estimate > 0.0).then_some(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn posterior(active: Vec<usize>, diagonal: &[f64]) -> Posterior {
        Posterior {
            covariance: DMatrix::from_diagonal(&DVector::from_row_slice(diagonal)),
            mean: DVector::zeros(active.len()),
            active,
            used_pseudo_inverse: false,
        }
    }

    #[test]
    fn test_noise_estimate() {
        let mut precision = PrecisionVector::new(4);
        precision.activate(0, 2.0);
        precision.activate(2, 4.0);
        let posterior = posterior(vec![0, 2], &[0.25, 0.125]);
        let residual = DVector::from_row_slice(&[1.0, -1.0, 2.0]);

        // 6 / (3 - 2 + 0.5 + 0.5)
        let estimate = estimate_noise_variance(&residual, &precision, &posterior).unwrap();
        assert_eq!(estimate, 3.0);
    }

    #[test]
    fn test_zero_residual_is_rejected() {
        let mut precision = PrecisionVector::new(3);
        precision.activate(0, 1.0);
        let posterior = posterior(vec![0], &[0.5]);
        let residual = DVector::zeros(2);

        assert_eq!(estimate_noise_variance(&residual, &precision, &posterior), None);
    }

    #[test]
    fn test_non_positive_denominator_is_rejected() {
        let mut precision = PrecisionVector::new(3);
        precision.activate(1, 1.0);
        precision.activate(2, 1.0);
        // Every weight fully determined by the data: 2 - 2 + 0
        let posterior = posterior(vec![1, 2], &[0.0, 0.0]);
        let residual = DVector::from_row_slice(&[0.1, 0.1]);

        assert_eq!(estimate_noise_variance(&residual, &precision, &posterior), None);
    }
}
