//! The message decoder seam.
//!
//! Inspection operations reach GRIB data only through these traits. A
//! [`Decoder`] opens files, a [`GribFile`] yields messages in file order, and
//! a [`MessageHandle`] answers key queries for one message.
//!
//! Files and handles are released by dropping them, so every exit path of
//! an operation (success, empty result or error) releases what it acquired.

mod memory;
mod native;

pub use memory::{MemoryDecoder, MemoryFile, MemoryHandle, MemoryMessage};
pub use native::{NativeDecoder, NativeFile, NativeMessage};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::value::{Scalar, Value};

/// Errors reported by a decoder.
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Cannot open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Corrupt GRIB data: {0}")]
    Corrupt(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key '{key}' is not accessible: {reason}")]
    Unsupported { key: String, reason: String },

    #[error("Key '{key}' could not be decoded: {reason}")]
    Unreadable { key: String, reason: String },
}

/// Per-call decoder configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Enumerate every field of a multi-field message as its own message.
    /// When off, only the first field of each message is seen.
    pub multi_field_support: bool,
}

impl DecoderOptions {
    pub fn multi_field(multi_field_support: bool) -> Self {
        Self {
            multi_field_support,
        }
    }
}

/// Opens GRIB files for reading.
pub trait Decoder {
    type File: GribFile;

    /// Open a file. Dropping the returned value closes it.
    fn open(&self, path: &Path, options: &DecoderOptions) -> Result<Self::File, DecoderError>;

    /// Number of messages `open` would enumerate with the same options.
    fn count(&self, path: &Path, options: &DecoderOptions) -> Result<usize, DecoderError>;
}

/// An open file, enumerating messages in file order.
pub trait GribFile {
    type Message: MessageHandle;

    /// Acquire the next message, or `None` once the file is exhausted.
    fn next_message(&mut self) -> Result<Option<Self::Message>, DecoderError>;

    /// Skip `n` messages without handing them out.
    fn skip(&mut self, n: usize) -> Result<usize, DecoderError> {
        let mut skipped = 0;
        while skipped < n {
            if self.next_message()?.is_none() {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// Key access for one message. Dropping the handle releases it.
pub trait MessageHandle {
    /// Key names in decoder order.
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    /// Number of elements held by a key; scalars report 1.
    fn size(&self, key: &str) -> Result<usize, DecoderError>;

    fn get_scalar(&self, key: &str) -> Result<Scalar, DecoderError>;

    fn get_array(&self, key: &str) -> Result<Vec<Scalar>, DecoderError>;

    /// Field data shaped like the native grid.
    fn get_values(&self) -> Result<Value, DecoderError>;

    /// True when the coded value is the "missing" pattern.
    fn is_missing(&self, key: &str) -> Result<bool, DecoderError>;
}
