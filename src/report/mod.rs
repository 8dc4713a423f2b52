//! Reporting utilities: terminal summaries and number formatting.

pub mod format;

pub use format::*;
