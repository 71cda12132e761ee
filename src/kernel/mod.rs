//! Kernel functions for RVM

pub mod config;
pub mod custom;
pub mod linear;
pub mod matrix;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::config::*;
pub use self::custom::*;
pub use self::linear::*;
pub use self::matrix::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;
