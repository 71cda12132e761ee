//! Kernel selection and parameter resolution
//!
//! A [`KernelConfig`] names a kernel family and its parameters. It is resolved
//! once per fit, against the training rows, into a shared kernel object that
//! both training and prediction evaluate.

use crate::core::{RVMError, Result, SparseVector};
use crate::kernel::{
    CustomKernel, Kernel, LinearKernel, PolynomialKernel, RBFKernel, SigmoidKernel,
};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Kernel family
#[derive(Debug, Clone)]
pub enum KernelType {
    /// K(x, y) = <x, y>
    Linear,
    /// K(x, y) = (γ<x, y> + coef0)^degree
    Polynomial,
    /// K(x, y) = exp(-γ||x - y||²)
    Rbf,
    /// K(x, y) = tanh(γ<x, y> + coef0)
    Sigmoid,
    /// User-supplied function; gamma, degree and coef0 are ignored
    Custom(CustomKernel),
}

impl KernelType {
    /// Stable identifier used by the CLI and model files
    pub fn name(&self) -> &str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "poly",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Custom(custom) => custom.name(),
        }
    }

    /// Parse a named kernel; custom kernels cannot be named
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(KernelType::Linear),
            "poly" | "polynomial" => Ok(KernelType::Polynomial),
            "rbf" => Ok(KernelType::Rbf),
            "sigmoid" => Ok(KernelType::Sigmoid),
            other => Err(RVMError::InvalidParameter(format!(
                "Unknown kernel '{other}'. Use one of: linear, poly, rbf, sigmoid"
            ))),
        }
    }

    fn uses_gamma(&self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }
}

/// Kernel coefficient for the rbf, poly and sigmoid kernels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// 1 / n_features
    Auto,
    /// 1 / (n_features * Var(X)), with Var taken over every dense entry
    Scale,
    /// Explicit value
    Value(f64),
}

impl From<f64> for Gamma {
    fn from(value: f64) -> Self {
        Gamma::Value(value)
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gamma::Auto => write!(f, "auto"),
            Gamma::Scale => write!(f, "scale"),
            Gamma::Value(v) => write!(f, "{v}"),
        }
    }
}

impl std::str::FromStr for Gamma {
    type Err = RVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Gamma::Auto),
            "scale" => Ok(Gamma::Scale),
            other => other.parse::<f64>().map(Gamma::Value).map_err(|_| {
                RVMError::ParseError(format!(
                    "Invalid gamma '{other}': expected 'auto', 'scale' or a number"
                ))
            }),
        }
    }
}

/// Kernel family plus the parameters shared by the named kernels
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub kernel: KernelType,
    /// Degree of the polynomial kernel; ignored by the others
    pub degree: u32,
    pub gamma: Gamma,
    /// Independent term of the poly and sigmoid kernels
    pub coef0: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            kernel: KernelType::Rbf,
            degree: 3,
            gamma: Gamma::Auto,
            coef0: 0.0,
        }
    }
}

/// A kernel ready for evaluation together with the parameters that produced it
#[derive(Clone)]
pub struct ResolvedKernel {
    /// Shared kernel object
    pub kernel: Arc<dyn Kernel>,
    /// Configuration with `gamma` replaced by the concrete value used
    pub config: KernelConfig,
}

impl fmt::Debug for ResolvedKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKernel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KernelConfig {
    /// Check the parameters that do not depend on data
    pub fn validate(&self) -> Result<()> {
        if let Gamma::Value(gamma) = self.gamma {
            if gamma == 0.0 {
                return Err(RVMError::InvalidParameter(
                    "The gamma value of 0.0 is invalid. Use Gamma::Auto to set gamma to a value of 1 / n_features"
                        .to_string(),
                ));
            }
            if self.kernel.uses_gamma() && !(gamma.is_finite() && gamma > 0.0) {
                return Err(RVMError::InvalidParameter(format!(
                    "Gamma must be a positive finite number, got: {gamma}"
                )));
            }
        }

        if matches!(self.kernel, KernelType::Polynomial) && self.degree == 0 {
            return Err(RVMError::InvalidParameter(
                "Polynomial degree must be positive".to_string(),
            ));
        }

        if !self.coef0.is_finite() {
            return Err(RVMError::InvalidParameter(format!(
                "coef0 must be finite, got: {}",
                self.coef0
            )));
        }

        Ok(())
    }

    /// Concrete gamma for the given training rows
    ///
    /// `n_features` is the dense column count of the training data. Sparse
    /// rows cannot tell trailing all-zero columns apart from absent ones, so
    /// without it the count falls back to the highest stored index.
    pub fn resolve_gamma(
        &self,
        rows: &[SparseVector],
        n_features: Option<usize>,
    ) -> Result<f64> {
        self.validate()?;

        let implied = rows.iter().map(SparseVector::implied_dim).max().unwrap_or(0);
        let n_features = n_features.unwrap_or(0).max(implied).max(1);

        let gamma = match self.gamma {
            Gamma::Value(gamma) => gamma,
            Gamma::Auto => 1.0 / n_features as f64,
            Gamma::Scale => {
                let variance = dense_variance(rows, n_features);
                if variance > 0.0 {
                    1.0 / (n_features as f64 * variance)
                } else {
                    1.0
                }
            }
        };

        Ok(gamma)
    }

    /// Resolve into a shared kernel object for the given training rows
    pub fn resolve(
        &self,
        rows: &[SparseVector],
        n_features: Option<usize>,
    ) -> Result<ResolvedKernel> {
        let gamma = self.resolve_gamma(rows, n_features)?;
        let config = KernelConfig {
            gamma: Gamma::Value(gamma),
            ..self.clone()
        };

        let kernel: Arc<dyn Kernel> = match &self.kernel {
            KernelType::Linear => Arc::new(LinearKernel::new()),
            KernelType::Polynomial => {
                Arc::new(PolynomialKernel::new(self.degree, gamma, self.coef0))
            }
            KernelType::Rbf => Arc::new(RBFKernel::new(gamma)),
            KernelType::Sigmoid => {
                let sigmoid = SigmoidKernel::new(gamma, self.coef0);
                let max_dot = rows.iter().map(SparseVector::norm_squared).fold(0.0, f64::max);
                if !sigmoid.is_well_scaled(max_dot) {
                    warn!(
                        "Sigmoid kernel (gamma={gamma}, coef0={}) saturates on this data; basis functions will be nearly constant",
                        self.coef0
                    );
                }
                Arc::new(sigmoid)
            }
            KernelType::Custom(custom) => Arc::new(custom.clone()),
        };

        debug!("Resolved {} kernel with gamma={gamma}", self.kernel.name());

        Ok(ResolvedKernel { kernel, config })
    }
}

/// Variance over every entry of the dense n x d matrix behind `rows`
fn dense_variance(rows: &[SparseVector], n_features: usize) -> f64 {
    let count = (rows.len() * n_features) as f64;
    if count == 0.0 {
        return 0.0;
    }

    let (sum, sum_sq) = rows
        .iter()
        .flat_map(|row| row.values.iter())
        .fold((0.0, 0.0), |(s, sq), &v| (s + v, sq + v * v));

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}
