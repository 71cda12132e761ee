//! Model serialization and persistence
//!
//! This module saves trained regression models as JSON and loads them back
//! for use with the CLI application and other scenarios where model
//! persistence is needed.

use crate::core::{FitSummary, RVMConfig, RVMError, RegressionModel, Result, SparseVector};
use crate::kernel::{Gamma, KernelConfig, KernelType};
use crate::optimizer::TrainedRVR;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Marks kernels whose function is not stored in the file
const CUSTOM_KERNEL_PREFIX: &str = "custom:";

fn kernel_type_tag(kernel: &KernelType) -> String {
    match kernel {
        KernelType::Custom(custom) => format!("{CUSTOM_KERNEL_PREFIX}{}", custom.name()),
        named => named.name().to_string(),
    }
}

/// Serializable representation of a trained RVR model
#[derive(Serialize, Deserialize)]
pub struct SerializableModel {
    /// Relevance vectors in sparse form
    pub relevance_vectors: Vec<SerializableVector>,
    /// Posterior weight mean, bias first when present
    pub mean: Vec<f64>,
    /// Posterior weight covariance, row-major
    pub covariance: Vec<f64>,
    /// Estimated noise variance
    pub noise_variance: f64,
    /// Kernel used for training
    pub kernel: KernelDescription,
    /// Model metadata
    pub metadata: ModelMetadata,
}

/// Serializable relevance vector
#[derive(Serialize, Deserialize, Clone)]
pub struct SerializableVector {
    /// Position in the training set
    pub training_index: usize,
    /// Feature indices
    pub indices: Vec<usize>,
    /// Feature values
    pub values: Vec<f64>,
}

/// Kernel family and the parameters it was trained with
#[derive(Serialize, Deserialize)]
pub struct KernelDescription {
    pub kernel_type: String,
    pub degree: u32,
    /// Concrete gamma, or "auto"/"scale" if it was never resolved
    pub gamma: String,
    pub coef0: f64,
}

/// Model metadata for tracking and validation
#[derive(Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Number of relevance vectors
    pub n_relevance_vectors: usize,
    /// Whether the bias basis survived pruning
    pub includes_bias: bool,
    /// Training parameters used
    pub training_params: TrainingParams,
    /// Basis selection iterations performed
    pub iterations: usize,
    /// Whether basis selection converged
    pub converged: bool,
    /// Creation timestamp
    pub created_at: String,
}

/// Training parameters for reference
#[derive(Serialize, Deserialize)]
pub struct TrainingParams {
    pub tol: f64,
    pub threshold_alpha: f64,
    pub max_iterations: usize,
}

impl SerializableModel {
    /// Create a serializable model from a trained model and its training configuration
    pub fn from_trained_model(model: &TrainedRVR, config: &RVMConfig) -> Self {
        let relevance_vectors = model
            .relevance_vectors()
            .iter()
            .zip(model.relevance_indices())
            .map(|(rv, &training_index)| SerializableVector {
                training_index,
                indices: rv.indices.clone(),
                values: rv.values.clone(),
            })
            .collect();

        // Column-major storage of the transpose is the row-major layout
        let covariance = model.covariance().transpose().iter().copied().collect();

        let kernel_config = model.kernel_config();
        let summary = model.summary();

        Self {
            relevance_vectors,
            mean: model.mean().iter().copied().collect(),
            covariance,
            noise_variance: model.noise_variance(),
            kernel: KernelDescription {
                kernel_type: kernel_type_tag(&kernel_config.kernel),
                degree: kernel_config.degree,
                gamma: kernel_config.gamma.to_string(),
                coef0: kernel_config.coef0,
            },
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                n_relevance_vectors: model.n_relevance_vectors(),
                includes_bias: model.includes_bias(),
                training_params: TrainingParams {
                    tol: config.tol,
                    threshold_alpha: config.threshold_alpha,
                    max_iterations: config.max_iterations,
                },
                iterations: summary.iterations,
                converged: summary.converged,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(RVMError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| RVMError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(RVMError::IoError)?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)
            .map_err(|e| RVMError::SerializationError(e.to_string()))?;
        Ok(model)
    }

    /// Convert back to a trained model
    ///
    /// Only the named kernels can be restored; a custom kernel's function is
    /// not part of the file.
    pub fn to_trained_model(&self) -> Result<TrainedRVR> {
        if let Some(name) = self.kernel.kernel_type.strip_prefix(CUSTOM_KERNEL_PREFIX) {
            return Err(RVMError::InvalidParameter(format!(
                "Custom kernel '{name}' cannot be restored from a model file"
            )));
        }
        let kernel = KernelType::from_name(&self.kernel.kernel_type).map_err(|_| {
            RVMError::InvalidParameter(format!(
                "Kernel '{}' cannot be restored from a model file",
                self.kernel.kernel_type
            ))
        })?;
        let gamma: Gamma = self.kernel.gamma.parse()?;

        let relevance_vectors: Vec<SparseVector> = self
            .relevance_vectors
            .iter()
            .map(|rv| {
                if rv.indices.len() != rv.values.len() {
                    return Err(RVMError::DimensionMismatch {
                        expected: rv.indices.len(),
                        actual: rv.values.len(),
                    });
                }
                Ok(SparseVector::new(rv.indices.clone(), rv.values.clone()))
            })
            .collect::<Result<_>>()?;
        let relevance_indices = self
            .relevance_vectors
            .iter()
            .map(|rv| rv.training_index)
            .collect();

        let m = self.mean.len();
        if self.covariance.len() != m * m {
            return Err(RVMError::DimensionMismatch {
                expected: m * m,
                actual: self.covariance.len(),
            });
        }

        let resolved = KernelConfig {
            kernel,
            degree: self.kernel.degree,
            gamma,
            coef0: self.kernel.coef0,
        }
        .resolve(&relevance_vectors, None)?;

        TrainedRVR::from_parts(
            resolved,
            relevance_vectors,
            relevance_indices,
            DVector::from_column_slice(&self.mean),
            DMatrix::from_row_slice(m, m, &self.covariance),
            self.noise_variance,
            FitSummary {
                iterations: self.metadata.iterations,
                converged: self.metadata.converged,
            },
        )
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== RVR Model Summary ===");
        println!("Kernel Type: {}", self.kernel.kernel_type);
        println!("Gamma: {}", self.kernel.gamma);
        if self.kernel.kernel_type == "poly" {
            println!("Degree: {}", self.kernel.degree);
        }
        if matches!(self.kernel.kernel_type.as_str(), "poly" | "sigmoid") {
            println!("Coef0: {}", self.kernel.coef0);
        }
        println!("Relevance Vectors: {}", self.metadata.n_relevance_vectors);
        if self.metadata.includes_bias {
            println!("Bias: {:.6}", self.mean.first().copied().unwrap_or(0.0));
        } else {
            println!("Bias: pruned");
        }
        println!("Noise Variance: {:.6e}", self.noise_variance);
        println!(
            "Iterations: {} ({})",
            self.metadata.iterations,
            if self.metadata.converged {
                "converged"
            } else {
                "not converged"
            }
        );
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  Tol: {}", self.metadata.training_params.tol);
        println!(
            "  Threshold Alpha: {}",
            self.metadata.training_params.threshold_alpha
        );
        println!(
            "  Max Iterations: {}",
            self.metadata.training_params.max_iterations
        );
    }
}
