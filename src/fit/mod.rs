//! Forecast fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate the smoothing-parameter grid
//! - fit each candidate penalty (parallel) and select by GCV
//! - assemble fitted values, forecasts and uncertainty bands
//! - cache the most recent forecast per dashboard panel

pub mod cache;
pub mod engine;
pub mod fitter;
pub mod lambda_grid;

pub use cache::*;
pub use engine::*;
pub use fitter::*;
pub use lambda_grid::*;
