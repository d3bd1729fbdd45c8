//! Core functionality that is not specific to a single method: basic
//! statistics, matrix helpers and data structures.

pub mod base;
pub mod data;
