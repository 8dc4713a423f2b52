//! Mathematical utilities: spline basis, penalized least squares, quantiles.

pub mod basis;
pub mod pls;
pub mod stats;

pub use basis::*;
pub use pls::*;
pub use stats::*;
