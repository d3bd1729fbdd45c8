//! Module containing the data structures for HTO count data and the
//! generation of synthetic hashing data

pub mod hto_matrix;
pub mod synthetic_data;
