//! Specific named methods in the single cell space are implemented here.
//! Currently this is the demultiplexing of cell hashing (HTO) libraries.

pub mod hashed_drops;
