//! Exact-match parameter lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::decoder::{Decoder, DecoderOptions, GribFile};
use crate::error::{InspectError, Result};
use crate::extract::RecordExtractor;
use crate::filter::KeyFilter;
use crate::index::{NameKey, ParameterIndexer};
use crate::value::Record;

/// Options for [`ParameterLookup::lookup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOptions {
    pub name_key: NameKey,
    pub structured: bool,
}

/// Outcome of a lookup. No match is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterMatch {
    NotFound,
    Single(Record),
    Many(Vec<Record>),
}

impl ParameterMatch {
    fn from_records(mut records: Vec<Record>) -> Self {
        match records.len() {
            0 => ParameterMatch::NotFound,
            1 => ParameterMatch::Single(records.remove(0)),
            _ => ParameterMatch::Many(records),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ParameterMatch::NotFound)
    }

    pub fn len(&self) -> usize {
        match self {
            ParameterMatch::NotFound => 0,
            ParameterMatch::Single(_) => 1,
            ParameterMatch::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matched records in message order.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            ParameterMatch::NotFound => Vec::new(),
            ParameterMatch::Single(record) => vec![record],
            ParameterMatch::Many(records) => records,
        }
    }
}

/// Finds the records whose name key equals a parameter string.
pub struct ParameterLookup<'a, D: Decoder> {
    decoder: &'a D,
    options: DecoderOptions,
    filter: &'a KeyFilter,
}

impl<'a, D: Decoder> ParameterLookup<'a, D> {
    pub fn new(decoder: &'a D, options: DecoderOptions, filter: &'a KeyFilter) -> Self {
        Self {
            decoder,
            options,
            filter,
        }
    }

    /// Compare `parameter` against each message's name with exact string
    /// equality and extract every matching message.
    pub fn lookup(
        &self,
        path: &Path,
        parameter: &str,
        lookup: &LookupOptions,
    ) -> Result<ParameterMatch> {
        let names = ParameterIndexer::new(self.decoder, self.options).index(path, lookup.name_key)?;

        let matched: BTreeSet<usize> = names
            .iter()
            .filter(|name| name.value.as_text().as_deref() == Some(parameter))
            .map(|name| name.message)
            .collect();

        if matched.is_empty() {
            info!(
                path = %path.display(),
                parameter,
                key = %lookup.name_key,
                "Parameter not found"
            );
            return Ok(ParameterMatch::NotFound);
        }
        debug!(parameter, messages = ?matched, "Matched messages");

        let extractor = RecordExtractor::new(self.filter);
        let mut file = self
            .decoder
            .open(path, &self.options)
            .map_err(|e| InspectError::file(path, e))?;

        let mut records = Vec::with_capacity(matched.len());
        let mut index = 0;
        while records.len() < matched.len() {
            let Some(message) = file.next_message().map_err(|e| InspectError::file(path, e))? else {
                return Err(InspectError::file(path, "file changed during lookup"));
            };
            index += 1;
            if matched.contains(&index) {
                records.push(extractor.extract(&message, index, lookup.structured)?);
            }
        }

        info!(parameter, records = records.len(), "Parameter found");
        Ok(ParameterMatch::from_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MemoryDecoder, MemoryMessage};
    use crate::value::Value;

    fn decoder() -> MemoryDecoder {
        MemoryDecoder::new().with_file(
            "f.grib",
            vec![
                MemoryMessage::new().scalar("parameterName", "520").scalar("level", 1i64),
                MemoryMessage::new().scalar("parameterName", "52").scalar("level", 2i64),
                MemoryMessage::new().scalar("parameterName", "052").scalar("level", 3i64),
                MemoryMessage::new().scalar("parameterName", "52").scalar("level", 4i64),
            ],
        )
    }

    fn lookup(decoder: &MemoryDecoder, parameter: &str) -> ParameterMatch {
        let filter = KeyFilter::new();
        ParameterLookup::new(decoder, DecoderOptions::default(), &filter)
            .lookup(Path::new("f.grib"), parameter, &LookupOptions::default())
            .unwrap()
    }

    #[test]
    fn test_exact_string_equality() {
        let decoder = decoder();
        let records = lookup(&decoder, "52").into_records();
        let levels: Vec<&Value> = records.iter().map(|r| &r["level"]).collect();
        assert_eq!(levels, vec![&Value::from(2i64), &Value::from(4i64)]);
    }

    #[test]
    fn test_single_and_not_found() {
        let decoder = decoder();
        assert!(matches!(lookup(&decoder, "520"), ParameterMatch::Single(_)));
        assert!(lookup(&decoder, "5").is_not_found());
        assert!(lookup(&decoder, "52 ").is_not_found());
        assert_eq!(decoder.open_files(), 0);
        assert_eq!(decoder.live_handles(), 0);
    }

    #[test]
    fn test_numeric_name_values_compare_as_text() {
        let decoder = MemoryDecoder::new().with_file(
            "f.grib",
            vec![MemoryMessage::new().scalar("parameterName", 157i64)],
        );
        assert_eq!(lookup(&decoder, "157").len(), 1);
    }

    #[test]
    fn test_lookup_by_short_name_structured() {
        let decoder = MemoryDecoder::new().with_file(
            "f.grib",
            vec![MemoryMessage::new()
                .scalar("shortName", "cape")
                .scalar("Level", 0i64)
                .scalar("level", 1i64)],
        );
        let filter = KeyFilter::new();
        let options = LookupOptions {
            name_key: NameKey::ShortName,
            structured: true,
        };
        let result = ParameterLookup::new(&decoder, DecoderOptions::default(), &filter)
            .lookup(Path::new("f.grib"), "cape", &options)
            .unwrap();

        match result {
            ParameterMatch::Single(record) => assert_eq!(record.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
