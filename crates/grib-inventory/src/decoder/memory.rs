//! In-memory decoder over registered key lists.
//!
//! Useful when keys come from another source than a GRIB file, and for
//! exercising inspection logic against exact key orders and failures.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Decoder, DecoderError, DecoderOptions, GribFile, MessageHandle};
use crate::value::{Scalar, Value};

#[derive(Debug, Clone)]
enum Entry {
    Value(Value),
    Missing(Scalar),
    Fail(String),
}

/// One message's keys, in the order they will be reported.
#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    keys: Vec<(String, Entry)>,
}

impl MemoryMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.keys
            .push((key.to_string(), Entry::Value(Value::Scalar(value.into()))));
        self
    }

    pub fn array(mut self, key: &str, values: Vec<Scalar>) -> Self {
        self.keys.push((key.to_string(), Entry::Value(Value::Array(values))));
        self
    }

    /// Field data for the `values` key.
    pub fn values(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.keys
            .push(("values".to_string(), Entry::Value(Value::Grid(rows))));
        self
    }

    /// A key whose coded value is the missing pattern.
    pub fn missing(mut self, key: &str, raw: impl Into<Scalar>) -> Self {
        self.keys.push((key.to_string(), Entry::Missing(raw.into())));
        self
    }

    /// A key listed by the message whose value cannot be read.
    pub fn failing(mut self, key: &str, reason: &str) -> Self {
        self.keys.push((key.to_string(), Entry::Fail(reason.to_string())));
        self
    }
}

/// Decoder whose files are registered message lists.
///
/// Each registered message is a group of fields; without multi-field
/// support only the first field of each group is enumerated.
#[derive(Debug, Clone, Default)]
pub struct MemoryDecoder {
    files: HashMap<PathBuf, Vec<Vec<MemoryMessage>>>,
    live_handles: Arc<AtomicUsize>,
    open_files: Arc<AtomicUsize>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file of single-field messages.
    pub fn with_file(self, path: impl Into<PathBuf>, messages: Vec<MemoryMessage>) -> Self {
        let groups = messages.into_iter().map(|m| vec![m]).collect();
        self.with_grouped_file(path, groups)
    }

    /// Register a file whose messages may hold several fields.
    pub fn with_grouped_file(
        mut self,
        path: impl Into<PathBuf>,
        messages: Vec<Vec<MemoryMessage>>,
    ) -> Self {
        self.files.insert(path.into(), messages);
        self
    }

    /// Message handles acquired and not yet dropped.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Files opened and not yet dropped.
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::SeqCst)
    }

    fn messages(&self, path: &Path, options: &DecoderOptions) -> Result<Vec<MemoryMessage>, DecoderError> {
        let groups = self.files.get(path).ok_or_else(|| DecoderError::Open {
            path: path.to_path_buf(),
            reason: "No such file".to_string(),
        })?;

        Ok(groups
            .iter()
            .flat_map(|group| {
                let take = if options.multi_field_support { group.len() } else { 1 };
                group.iter().take(take).cloned()
            })
            .collect())
    }
}

impl Decoder for MemoryDecoder {
    type File = MemoryFile;

    fn open(&self, path: &Path, options: &DecoderOptions) -> Result<MemoryFile, DecoderError> {
        let messages = self.messages(path, options)?;
        self.open_files.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryFile {
            messages: messages.into(),
            live_handles: Arc::clone(&self.live_handles),
            open_files: Arc::clone(&self.open_files),
        })
    }

    fn count(&self, path: &Path, options: &DecoderOptions) -> Result<usize, DecoderError> {
        self.messages(path, options).map(|m| m.len())
    }
}

pub struct MemoryFile {
    messages: VecDeque<MemoryMessage>,
    live_handles: Arc<AtomicUsize>,
    open_files: Arc<AtomicUsize>,
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.open_files.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GribFile for MemoryFile {
    type Message = MemoryHandle;

    fn next_message(&mut self) -> Result<Option<MemoryHandle>, DecoderError> {
        Ok(self.messages.pop_front().map(|message| {
            self.live_handles.fetch_add(1, Ordering::SeqCst);
            MemoryHandle {
                message,
                live_handles: Arc::clone(&self.live_handles),
            }
        }))
    }
}

pub struct MemoryHandle {
    message: MemoryMessage,
    live_handles: Arc<AtomicUsize>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryHandle {
    fn entry(&self, key: &str) -> Result<&Entry, DecoderError> {
        self.message
            .keys
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, entry)| entry)
            .ok_or_else(|| DecoderError::KeyNotFound(key.to_string()))
    }

    fn value(&self, key: &str) -> Result<Value, DecoderError> {
        match self.entry(key)? {
            Entry::Value(value) => Ok(value.clone()),
            Entry::Missing(raw) => Ok(Value::Scalar(raw.clone())),
            Entry::Fail(reason) => Err(DecoderError::Unreadable {
                key: key.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

impl MessageHandle for MemoryHandle {
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.message.keys.iter().map(|(name, _)| name.as_str()))
    }

    fn size(&self, key: &str) -> Result<usize, DecoderError> {
        Ok(match self.value(key)? {
            Value::Scalar(_) => 1,
            Value::Array(values) => values.len(),
            Value::Grid(rows) => rows.iter().map(Vec::len).sum(),
        })
    }

    fn get_scalar(&self, key: &str) -> Result<Scalar, DecoderError> {
        match self.value(key)? {
            Value::Scalar(scalar) => Ok(scalar),
            Value::Array(mut values) if values.len() == 1 => Ok(values.remove(0)),
            _ => Err(DecoderError::Unsupported {
                key: key.to_string(),
                reason: "not a scalar".to_string(),
            }),
        }
    }

    fn get_array(&self, key: &str) -> Result<Vec<Scalar>, DecoderError> {
        Ok(match self.value(key)? {
            Value::Scalar(scalar) => vec![scalar],
            Value::Array(values) => values,
            Value::Grid(rows) => rows.into_iter().flatten().map(Scalar::Float).collect(),
        })
    }

    fn get_values(&self) -> Result<Value, DecoderError> {
        self.value("values")
    }

    fn is_missing(&self, key: &str) -> Result<bool, DecoderError> {
        Ok(matches!(self.entry(key)?, Entry::Missing(_)))
    }
}
