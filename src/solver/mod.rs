//! Sparse Bayesian learning solver
//!
//! Implements the fast sequential marginal likelihood maximisation of
//! Tipping and Faul, "Fast Marginal Likelihood Maximisation for Sparse
//! Bayesian Models" (2003), over a precomputed design matrix.

pub mod noise;
pub mod precision;
pub mod sequential;
pub mod statistics;

pub use self::noise::*;
pub use self::precision::*;
pub use self::sequential::*;
pub use self::statistics::*;
