//! Inspection configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::DecoderOptions;
use crate::error::{InspectError, Result};
use crate::filter::KeyFilter;
use crate::index::NameKey;
use crate::lookup::LookupOptions;

/// Settings shared by every operation of an [`Inspector`](crate::Inspector).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Enumerate each field of multi-field messages as its own message
    pub multi_field_support: bool,

    /// Key naming the parameter of a message
    pub name_key: NameKey,

    /// Deduplicate record keys case-insensitively
    pub structured: bool,

    /// Keys excluded in addition to the fixed table
    pub extra_excluded_keys: Vec<String>,

    /// YAML file extending the built-in parameter tables
    pub tables_path: Option<PathBuf>,
}

impl InspectConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| InspectError::Config(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| InspectError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Override fields from `GRIB_INSPECT_*` environment variables.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("GRIB_INSPECT_MULTI_FIELD") {
            self.multi_field_support = parse_bool("GRIB_INSPECT_MULTI_FIELD", &v)?;
        }
        if let Some(v) = var("GRIB_INSPECT_NAME_KEY") {
            self.name_key = v
                .parse::<NameKey>()
                .map_err(|e| InspectError::Config(e.to_string()))?;
        }
        if let Some(v) = var("GRIB_INSPECT_STRUCTURED") {
            self.structured = parse_bool("GRIB_INSPECT_STRUCTURED", &v)?;
        }
        if let Some(v) = var("GRIB_INSPECT_EXCLUDE") {
            self.extra_excluded_keys = v
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = var("GRIB_INSPECT_TABLES") {
            self.tables_path = Some(PathBuf::from(v));
        }
        Ok(self)
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions::multi_field(self.multi_field_support)
    }

    pub fn key_filter(&self) -> KeyFilter {
        KeyFilter::with_extra(self.extra_excluded_keys.iter().cloned())
    }

    pub fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            name_key: self.name_key,
            structured: self.structured,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(InspectError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
