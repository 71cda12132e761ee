//! Rust implementation of Relevance Vector Regression (RVR)
//!
//! Based on "Sparse Bayesian Learning and the Relevance Vector Machine" by
//! Michael E. Tipping, trained with the fast marginal likelihood
//! maximisation of Tipping and Faul.

pub mod api;
pub mod core;
pub mod data;
pub mod kernel;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{ModelInfo, RegressionMetrics, RVC, RVR};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{CSVDataset, LibSVMDataset};
pub use crate::kernel::{Gamma, Kernel, KernelType, LinearKernel, RBFKernel};
pub use crate::optimizer::{RVMOptimizer, TrainedRVR};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
