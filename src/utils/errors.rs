//! Error types for the hashing demultiplexer.

use thiserror::Error;

/// Errors raised while demultiplexing a hashed library.
///
/// All variants are input validity problems that are surfaced synchronously;
/// no partial results are produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HashDemuxError {
    /// Matrix or vector dimensions do not fit together
    #[error("input shape error: {0}")]
    InputShape(String),

    /// Counts or ambient values that are negative or not finite
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Parameters outside of their valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Fewer than two HTOs left after removing HTOs with zero ambient
    /// abundance
    #[error("degenerate ambient profile: only {retained} HTO(s) with non-zero ambient abundance")]
    DegenerateAmbient { retained: usize },

    /// Too few barcodes to calculate the median and MAD
    #[error("insufficient barcodes: need at least 2, got {0}")]
    InsufficientBarcodes(usize),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HashDemuxError>;
