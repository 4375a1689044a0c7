//! Message-to-record extraction.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::decoder::MessageHandle;
use crate::error::{InspectError, Result};
use crate::filter::KeyFilter;
use crate::value::{Record, Value};

/// Key carrying the field data, read through the shape-preserving accessor.
pub const VALUES_KEY: &str = "values";

/// Copies a message's keys into a [`Record`].
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor<'a> {
    filter: &'a KeyFilter,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(filter: &'a KeyFilter) -> Self {
        Self { filter }
    }

    /// Extract every non-excluded key of `message` in decoder order.
    ///
    /// With `structured`, key names must be unique ignoring case: a later key
    /// colliding with an earlier one is skipped. A key the decoder refuses to
    /// read aborts extraction of this message.
    pub fn extract<M: MessageHandle>(
        &self,
        message: &M,
        index: usize,
        structured: bool,
    ) -> Result<Record> {
        let mut record = Record::new();
        let mut seen = HashSet::new();

        for key in message.keys() {
            if self.filter.is_excluded(key) {
                continue;
            }
            if structured && !seen.insert(key.to_lowercase()) {
                warn!(message = index, key, "Skipping duplicate key in structured record");
                continue;
            }

            let value = read_value(message, key).map_err(|e| InspectError::key(index, key, e))?;
            record.insert(key.to_string(), value);
        }

        debug!(message = index, keys = record.len(), "Extracted record");
        Ok(record)
    }
}

/// Read one key, deciding scalar or array from the reported size.
pub(crate) fn read_value<M: MessageHandle>(
    message: &M,
    key: &str,
) -> std::result::Result<Value, crate::decoder::DecoderError> {
    if key == VALUES_KEY {
        return message.get_values();
    }
    if message.size(key)? > 1 {
        Ok(Value::Array(message.get_array(key)?))
    } else {
        Ok(Value::Scalar(message.get_scalar(key)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, DecoderOptions, GribFile, MemoryDecoder, MemoryMessage};
    use crate::value::Scalar;
    use std::path::Path;

    fn extract(message: MemoryMessage, filter: &KeyFilter, structured: bool) -> Result<Record> {
        let decoder = MemoryDecoder::new().with_file("m.grib2", vec![message]);
        let mut file = decoder
            .open(Path::new("m.grib2"), &DecoderOptions::default())
            .unwrap();
        let handle = file.next_message().unwrap().unwrap();
        RecordExtractor::new(filter).extract(&handle, 1, structured)
    }

    #[test]
    fn test_keeps_decoder_order_and_drops_excluded() {
        let message = MemoryMessage::new()
            .scalar("editionNumber", 2i64)
            .scalar("shortName", "t")
            .scalar("packingType", "grid_simple")
            .failing("latitudes", "requires a geographic iterator")
            .scalar("level", 500i64)
            .values(vec![vec![1.0, 2.0]])
            .scalar("7777", "7777");

        let record = extract(message, &KeyFilter::new(), false).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["editionNumber", "shortName", "level", "values"]);
        assert_eq!(record["values"], Value::Grid(vec![vec![1.0, 2.0]]));
    }

    #[test]
    fn test_size_decides_cardinality() {
        let message = MemoryMessage::new()
            .array("pv", vec![Scalar::Float(0.5), Scalar::Float(1.5)])
            .array("single", vec![Scalar::Int(4)]);

        let record = extract(message, &KeyFilter::new(), false).unwrap();
        assert!(matches!(&record["pv"], Value::Array(v) if v.len() == 2));
        assert_eq!(record["single"], Value::Scalar(Scalar::Int(4)));
    }

    #[test]
    fn test_structured_first_occurrence_wins() {
        let message = MemoryMessage::new()
            .scalar("Level", 1i64)
            .scalar("level", 2i64)
            .scalar("shortName", "t");

        let plain = extract(message.clone(), &KeyFilter::new(), false).unwrap();
        assert_eq!(plain.len(), 3);

        let structured = extract(message, &KeyFilter::new(), true).unwrap();
        assert_eq!(structured.len(), 2);
        assert_eq!(structured["Level"], Value::from(1i64));
        assert!(!structured.contains_key("level"));
    }

    #[test]
    fn test_unreadable_key_is_an_error() {
        let message = MemoryMessage::new()
            .scalar("shortName", "t")
            .failing("gridType", "decoder fault");

        let err = extract(message, &KeyFilter::new(), false).unwrap_err();
        match err {
            InspectError::KeyExtraction { message, key, .. } => {
                assert_eq!(message, 1);
                assert_eq!(key, "gridType");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_extra_exclusions() {
        let message = MemoryMessage::new()
            .scalar("shortName", "t")
            .failing("gridType", "decoder fault");

        let filter = KeyFilter::with_extra(["gridType"]);
        let record = extract(message, &filter, false).unwrap();
        assert_eq!(record.len(), 1);
    }
}
