//! Per-message parameter names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::decoder::{Decoder, DecoderOptions, GribFile, MessageHandle};
use crate::error::{InspectError, Result};
use crate::extract::read_value;
use crate::value::Value;

/// Key used to name the parameter of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameKey {
    #[default]
    ParameterName,
    Name,
    ShortName,
    CfName,
}

impl NameKey {
    pub const ALL: [NameKey; 4] = [
        NameKey::ParameterName,
        NameKey::Name,
        NameKey::ShortName,
        NameKey::CfName,
    ];

    /// Key name as reported by the decoder
    pub fn key(&self) -> &'static str {
        match self {
            NameKey::ParameterName => "parameterName",
            NameKey::Name => "name",
            NameKey::ShortName => "shortName",
            NameKey::CfName => "cfName",
        }
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for NameKey {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self> {
        NameKey::ALL
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                InspectError::Precondition(format!(
                    "Unknown name key '{}', expected one of parameterName, name, shortName, cfName",
                    s
                ))
            })
    }
}

/// Name value captured from one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterName {
    /// 1-based message index
    pub message: usize,
    pub value: Value,
}

/// Names in message order. Messages lacking the name key have no entry, so
/// positions do not line up with message indices; use
/// [`ParameterName::message`].
pub type ParameterNameList = Vec<ParameterName>;

/// Scans each message of a file for a name key.
pub struct ParameterIndexer<'a, D: Decoder> {
    decoder: &'a D,
    options: DecoderOptions,
}

impl<'a, D: Decoder> ParameterIndexer<'a, D> {
    pub fn new(decoder: &'a D, options: DecoderOptions) -> Self {
        Self { decoder, options }
    }

    pub fn index(&self, path: &Path, name_key: NameKey) -> Result<ParameterNameList> {
        let mut file = self
            .decoder
            .open(path, &self.options)
            .map_err(|e| InspectError::file(path, e))?;

        let wanted = name_key.key();
        let mut names = Vec::new();
        let mut index = 0;

        while let Some(message) = file.next_message().map_err(|e| InspectError::file(path, e))? {
            index += 1;
            // Case-insensitive scan in decoder order, first match wins
            let found = message.keys().find(|k| k.eq_ignore_ascii_case(wanted));
            match found {
                Some(key) => {
                    let value = read_value(&message, key)
                        .map_err(|e| InspectError::key(index, key, e))?;
                    names.push(ParameterName {
                        message: index,
                        value,
                    });
                }
                None => debug!(message = index, key = wanted, "Message has no name key"),
            }
        }

        info!(
            path = %path.display(),
            key = wanted,
            messages = index,
            names = names.len(),
            "Indexed parameter names"
        );
        Ok(names)
    }
}
