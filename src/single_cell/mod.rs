//! Contains the single cell functionalities that are exposed to R.

pub mod methods;
