//! Module containing the basic statistics (medians, MADs, outlier thresholds)
//! and matrix helpers used across the crate.

pub mod stats;
pub mod utils;
