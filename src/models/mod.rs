//! Additive trend model: design rows, penalties and prediction.
//!
//! Models are implemented as small, pure functions so that the fitting/search
//! code can stay generic.

pub mod model;

pub use model::*;
