//! Input/output helpers.
//!
//! - JHU CSV ingest + validation (`ingest`)
//! - forecast CSV export (`export`)
//! - forecast JSON read/write (`forecast_file`)

pub mod export;
pub mod forecast_file;
pub mod ingest;

pub use export::*;
pub use forecast_file::*;
pub use ingest::*;
