//! Error types for GRIB decoding.

use thiserror::Error;

/// Result type alias using [`GribError`].
pub type Result<T> = std::result::Result<T, GribError>;

/// Errors raised while framing or decoding GRIB messages.
#[derive(Debug, Error)]
pub enum GribError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GRIB format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Message at offset {offset} is truncated: declared {declared} bytes, {available} available")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("Unsupported GRIB edition {0}")]
    UnsupportedEdition(u8),

    #[error("Unpacking failed: {0}")]
    Unpacking(String),

    #[error("Invalid table file: {0}")]
    Tables(String),
}
