//! Error types for inspection operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::decoder::DecoderError;

/// Errors that abort an inspection operation.
///
/// A parameter that matches no message is not an error; see
/// [`ParameterMatch::NotFound`](crate::ParameterMatch::NotFound).
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Cannot read GRIB file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("Message index {index} outside [1, {count}]")]
    Range { index: usize, count: usize },

    #[error("Failed to extract key '{key}' from message {message}: {source}")]
    KeyExtraction {
        message: usize,
        key: String,
        #[source]
        source: DecoderError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl InspectError {
    pub(crate) fn file(path: &std::path::Path, source: impl std::fmt::Display) -> Self {
        InspectError::File {
            path: path.to_path_buf(),
            reason: source.to_string(),
        }
    }

    pub(crate) fn key(message: usize, key: &str, source: DecoderError) -> Self {
        InspectError::KeyExtraction {
            message,
            key: key.to_string(),
            source,
        }
    }
}

/// Result type for inspection operations.
pub type Result<T> = std::result::Result<T, InspectError>;
