//! Everything and anything related to the Rust <> R interface.

pub mod r_single_cell;
