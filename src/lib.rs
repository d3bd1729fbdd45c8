//! Demultiplexing of cell hashing (HTO) libraries.
//!
//! The statistical core lives in [`single_cell::methods::hashed_drops`]; the
//! R interface is only compiled with the `r` feature.

pub mod core;
pub mod single_cell;
pub mod utils;

#[cfg(feature = "r")]
mod r_bindings;

#[cfg(feature = "r")]
use extendr_api::prelude::*;

#[cfg(feature = "r")]
pub use r_bindings::r_single_cell::r_hashed_drops;

pub use single_cell::methods::hashed_drops::{hashed_drops, HashedDropsParams, HashedDropsRes};
pub use utils::errors::{HashDemuxError, Result};

#[cfg(feature = "r")]
extendr_module! {
    mod htodemux;
    use r_hashed_drops;
}
