//! General utilities: error types, assertion macros and (with the `r`
//! feature) the conversions between R and Rust objects.

pub mod errors;
pub mod macros;
#[cfg(feature = "r")]
pub mod r_rust_interface;
