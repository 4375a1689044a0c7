//! The four inspection operations over one decoder.

use std::path::Path;
use tracing::{debug, info};

use crate::config::InspectConfig;
use crate::decoder::{Decoder, GribFile, NativeDecoder};
use crate::error::{InspectError, Result};
use crate::extract::RecordExtractor;
use crate::filter::KeyFilter;
use crate::index::{NameKey, ParameterIndexer, ParameterNameList};
use crate::inventory::{Inventory, InventoryBuilder};
use crate::lookup::{LookupOptions, ParameterLookup, ParameterMatch};
use crate::value::Record;

/// Which record to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRequest {
    /// 1-based message index
    pub index: usize,
    /// Message count supplied by the caller, skipping the counting pass.
    /// Validated the same way as a counted value.
    pub record_count: Option<usize>,
    pub structured: bool,
}

impl Default for RecordRequest {
    fn default() -> Self {
        Self {
            index: 1,
            record_count: None,
            structured: false,
        }
    }
}

impl RecordRequest {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

/// Runs inspection operations with one decoder and configuration.
pub struct Inspector<D: Decoder> {
    decoder: D,
    config: InspectConfig,
    filter: KeyFilter,
}

impl Inspector<NativeDecoder> {
    /// Native decoder, with parameter tables extended from
    /// `config.tables_path` when set.
    pub fn native(config: InspectConfig) -> Result<Self> {
        let decoder = match &config.tables_path {
            Some(path) => NativeDecoder::with_table_file(path)
                .map_err(|e| InspectError::Config(e.to_string()))?,
            None => NativeDecoder::default(),
        };
        Ok(Self::new(decoder, config))
    }
}

impl<D: Decoder> Inspector<D> {
    pub fn new(decoder: D, config: InspectConfig) -> Self {
        let filter = config.key_filter();
        Self {
            decoder,
            config,
            filter,
        }
    }

    pub fn config(&self) -> &InspectConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Header lines and one fixed-column line per message.
    pub fn inventory(&self, path: &Path) -> Result<Inventory> {
        require_path(path)?;
        InventoryBuilder::new(&self.decoder, self.config.decoder_options()).build(path)
    }

    /// The record of one message.
    pub fn get_record(&self, path: &Path, request: &RecordRequest) -> Result<Record> {
        let mut records = self.get_records(path, request, 1)?;
        records.pop().ok_or(InspectError::Range {
            index: request.index,
            count: 0,
        })
    }

    /// Records of `n` consecutive messages starting at `request.index`.
    pub fn get_records(&self, path: &Path, request: &RecordRequest, n: usize) -> Result<Vec<Record>> {
        require_path(path)?;
        if n == 0 {
            return Err(InspectError::Precondition(
                "record count must be at least 1".to_string(),
            ));
        }
        let options = self.config.decoder_options();

        let count = match request.record_count {
            Some(count) => count,
            None => self
                .decoder
                .count(path, &options)
                .map_err(|e| InspectError::file(path, e))?,
        };

        let first = request.index;
        let last = first
            .checked_add(n - 1)
            .ok_or(InspectError::Range {
                index: usize::MAX,
                count,
            })?;
        for index in [first, last] {
            if index < 1 || index > count {
                return Err(InspectError::Range { index, count });
            }
        }

        let mut file = self
            .decoder
            .open(path, &options)
            .map_err(|e| InspectError::file(path, e))?;
        let skipped = file
            .skip(first - 1)
            .map_err(|e| InspectError::file(path, e))?;
        if skipped < first - 1 {
            return Err(InspectError::Range {
                index: first,
                count: skipped,
            });
        }

        let extractor = RecordExtractor::new(&self.filter);
        let mut records = Vec::new();
        for index in first..=last {
            let message = file
                .next_message()
                .map_err(|e| InspectError::file(path, e))?
                .ok_or(InspectError::Range {
                    index,
                    count: index - 1,
                })?;
            records.push(extractor.extract(&message, index, request.structured)?);
        }

        debug!(path = %path.display(), first, records = records.len(), "Extracted records");
        Ok(records)
    }

    /// Name-key value of each message carrying it.
    pub fn get_parameter_names(&self, path: &Path, name_key: NameKey) -> Result<ParameterNameList> {
        require_path(path)?;
        ParameterIndexer::new(&self.decoder, self.config.decoder_options()).index(path, name_key)
    }

    /// Every record whose name-key value equals `parameter`.
    pub fn get_parameter(
        &self,
        path: &Path,
        parameter: &str,
        lookup: &LookupOptions,
    ) -> Result<ParameterMatch> {
        require_path(path)?;
        if parameter.is_empty() {
            return Err(InspectError::Precondition(
                "parameter must be a non-empty string".to_string(),
            ));
        }
        let result = ParameterLookup::new(&self.decoder, self.config.decoder_options(), &self.filter)
            .lookup(path, parameter, lookup)?;
        info!(parameter, matches = result.len(), "Lookup finished");
        Ok(result)
    }
}

fn require_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(InspectError::Precondition(
            "path must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MemoryDecoder, MemoryMessage};
    use crate::value::Value;

    fn inspector() -> Inspector<MemoryDecoder> {
        let messages = (1..=3)
            .map(|i| {
                MemoryMessage::new()
                    .scalar("parameterName", format!("p{}", i))
                    .scalar("level", i as i64)
            })
            .collect();
        let decoder = MemoryDecoder::new().with_file("f.grib", messages);
        Inspector::new(decoder, InspectConfig::default())
    }

    #[test]
    fn test_record_range_boundaries() {
        let inspector = inspector();
        let path = Path::new("f.grib");

        for index in [0, 4] {
            let err = inspector.get_record(path, &RecordRequest::new(index)).unwrap_err();
            assert!(matches!(err, InspectError::Range { count: 3, .. }));
        }
        let first = inspector.get_record(path, &RecordRequest::new(1)).unwrap();
        let last = inspector.get_record(path, &RecordRequest::new(3)).unwrap();
        assert_eq!(first["level"], Value::from(1i64));
        assert_eq!(last["level"], Value::from(3i64));
        assert_eq!(inspector.decoder().live_handles(), 0);
        assert_eq!(inspector.decoder().open_files(), 0);
    }

    #[test]
    fn test_supplied_record_count() {
        let inspector = inspector();
        let path = Path::new("f.grib");

        let request = RecordRequest {
            index: 2,
            record_count: Some(1),
            structured: false,
        };
        assert!(matches!(
            inspector.get_record(path, &request),
            Err(InspectError::Range { index: 2, count: 1 })
        ));

        // Overstated counts fail when the file runs out
        let request = RecordRequest {
            index: 5,
            record_count: Some(10),
            structured: false,
        };
        assert!(matches!(
            inspector.get_record(path, &request),
            Err(InspectError::Range { index: 5, count: 3 })
        ));
    }

    #[test]
    fn test_get_records_span() {
        let inspector = inspector();
        let path = Path::new("f.grib");

        let records = inspector.get_records(path, &RecordRequest::new(2), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["parameterName"], Value::from("p3"));
        assert!(inspector.get_records(path, &RecordRequest::new(2), 3).is_err());
    }

    #[test]
    fn test_get_records_overflowing_span() {
        let inspector = inspector();
        let path = Path::new("f.grib");

        for first in [2, usize::MAX] {
            let result = inspector.get_records(path, &RecordRequest::new(first), usize::MAX);
            assert!(
                matches!(result, Err(InspectError::Range { count: 3, .. })),
                "first {}",
                first
            );
        }
        assert_eq!(inspector.decoder().open_files(), 0);
        assert!(matches!(
            inspector.get_records(path, &RecordRequest::new(1), 0),
            Err(InspectError::Precondition(_))
        ));
    }

    #[test]
    fn test_preconditions() {
        let inspector = inspector();
        assert!(matches!(
            inspector.inventory(Path::new("")),
            Err(InspectError::Precondition(_))
        ));
        assert!(matches!(
            inspector.get_parameter(Path::new("f.grib"), "", &LookupOptions::default()),
            Err(InspectError::Precondition(_))
        ));
    }

    #[test]
    fn test_unknown_file() {
        let inspector = inspector();
        assert!(matches!(
            inspector.get_parameter_names(Path::new("other.grib"), NameKey::Name),
            Err(InspectError::File { .. })
        ));
    }
}
