//! Data loading and dataset implementations
//!
//! This module provides implementations of the Dataset trait for the text
//! formats regression data usually comes in.

pub mod csv;
pub mod libsvm;

pub use self::csv::*;
pub use self::libsvm::*;
