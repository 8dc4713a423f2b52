//! External data sources.
//!
//! - Johns Hopkins CSSE time series (`jhu`)
//! - newsapi.org headlines (`news`)

pub mod jhu;
pub mod news;

pub use jhu::*;
pub use news::*;
