//! Message framing over a GRIB file held in memory.

use bytes::Bytes;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{GribError, Result};
use crate::grib1::{self, Grib1Field};
use crate::keys::{GridValues, KeyedField};
use crate::sections::{self, Grib2Field};
use crate::tables::ParameterTables;
use crate::unpacking::unsigned;

/// Sequential reader over the messages of a GRIB file.
///
/// Bytes between messages (padding, headers added by some archives) are
/// skipped. A message that overruns the buffer or lacks its `7777` end
/// marker is reported as an error.
pub struct GribReader {
    data: Bytes,
    offset: usize,
}

/// One framed GRIB message.
#[derive(Debug, Clone)]
pub struct GribMessage {
    /// Byte offset of the `GRIB` magic in the file
    pub offset: usize,
    pub edition: u8,
    pub data: Bytes,
}

/// One field of a message, ready to be keyed.
#[derive(Debug, Clone)]
pub enum Field {
    Grib1(Box<Grib1Field>),
    Grib2(Box<Grib2Field>),
}

impl GribReader {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Read a whole file into memory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        debug!(path = %path.display(), size = data.len(), "Read GRIB file");
        Ok(Self::new(Bytes::from(data)))
    }

    /// Size of the underlying buffer in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Frame the next message, or `None` at end of data.
    pub fn next_message(&mut self) -> Result<Option<GribMessage>> {
        let start = match find_magic(&self.data, self.offset) {
            Some(pos) => pos,
            None => {
                if self.offset < self.data.len() {
                    debug!(
                        trailing = self.data.len() - self.offset,
                        "Ignoring trailing bytes after last message"
                    );
                }
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        if start > self.offset {
            warn!(
                offset = self.offset,
                skipped = start - self.offset,
                "Skipping bytes before GRIB message"
            );
        }

        let available = self.data.len() - start;
        if available < 8 {
            return Err(GribError::Truncated {
                offset: start,
                declared: 8,
                available,
            });
        }

        let edition = self.data[start + 7];
        let length = match edition {
            1 => unsigned(&self.data[start + 4..start + 7]) as usize,
            2 => {
                if available < 16 {
                    return Err(GribError::Truncated {
                        offset: start,
                        declared: 16,
                        available,
                    });
                }
                unsigned(&self.data[start + 8..start + 16]) as usize
            }
            other => return Err(GribError::UnsupportedEdition(other)),
        };

        if length > available {
            return Err(GribError::Truncated {
                offset: start,
                declared: length,
                available,
            });
        }

        let data = self.data.slice(start..start + length);
        if length < 12 || &data[length - 4..] != b"7777" {
            return Err(GribError::InvalidFormat(format!(
                "Message at offset {} does not end with the 7777 marker",
                start
            )));
        }

        self.offset = start + length;
        Ok(Some(GribMessage {
            offset: start,
            edition,
            data,
        }))
    }
}

impl GribMessage {
    /// Split the message into fields. GRIB1 messages always hold one.
    pub fn fields(&self) -> Result<Vec<Field>> {
        match self.edition {
            1 => Ok(vec![Field::Grib1(Box::new(grib1::parse_message(&self.data)?))]),
            2 => Ok(sections::split_fields(&self.data)?
                .into_iter()
                .map(|f| Field::Grib2(Box::new(f)))
                .collect()),
            other => Err(GribError::UnsupportedEdition(other)),
        }
    }

    /// Number of fields without building their keys.
    pub fn field_count(&self) -> Result<usize> {
        self.fields().map(|fields| fields.len())
    }
}

impl Field {
    pub fn edition(&self) -> u8 {
        match self {
            Field::Grib1(_) => 1,
            Field::Grib2(_) => 2,
        }
    }

    /// Ordered key list of the field. Keys derived from the data values are
    /// listed as [`KeyEntry::Data`](crate::KeyEntry::Data).
    pub fn keys(&self, tables: &ParameterTables) -> KeyedField {
        match self {
            Field::Grib1(field) => grib1::field_keys(field, tables),
            Field::Grib2(field) => sections::field_keys(field, tables),
        }
    }

    /// Unpack the data values.
    pub fn decode_values(&self) -> Result<GridValues> {
        match self {
            Field::Grib1(field) => grib1::decode_values(field),
            Field::Grib2(field) => sections::decode_values(field),
        }
    }
}

impl Iterator for GribReader {
    type Item = Result<GribMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => None,
            Err(e) => {
                // A framing error leaves no reliable resume point
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_grib1(total: usize) -> Vec<u8> {
        let mut msg = vec![0u8; total];
        msg[0..4].copy_from_slice(b"GRIB");
        msg[4..7].copy_from_slice(&(total as u32).to_be_bytes()[1..]);
        msg[7] = 1;
        msg[total - 4..].copy_from_slice(b"7777");
        msg
    }

    #[test]
    fn test_frames_messages_and_skips_padding() {
        let mut data = b"junk".to_vec();
        data.extend(minimal_grib1(20));
        data.extend([0u8; 3]);
        data.extend(minimal_grib1(24));

        let mut reader = GribReader::new(Bytes::from(data));
        let first = reader.next_message().unwrap().unwrap();
        assert_eq!(first.offset, 4);
        assert_eq!(first.edition, 1);
        assert_eq!(first.data.len(), 20);

        let second = reader.next_message().unwrap().unwrap();
        assert_eq!(second.offset, 27);
        assert_eq!(second.data.len(), 24);

        assert!(reader.next_message().unwrap().is_none());
    }

    #[test]
    fn test_truncated_message() {
        let mut data = minimal_grib1(40);
        data.truncate(30);
        let mut reader = GribReader::new(Bytes::from(data));
        assert!(matches!(
            reader.next_message(),
            Err(GribError::Truncated { declared: 40, available: 30, .. })
        ));
    }

    #[test]
    fn test_missing_end_marker() {
        let mut data = minimal_grib1(20);
        data[19] = b'X';
        let mut reader = GribReader::new(Bytes::from(data));
        assert!(matches!(reader.next_message(), Err(GribError::InvalidFormat(_))));
    }

    #[test]
    fn test_unknown_edition() {
        let mut data = minimal_grib1(20);
        data[7] = 3;
        let mut reader = GribReader::new(Bytes::from(data));
        assert!(matches!(
            reader.next_message(),
            Err(GribError::UnsupportedEdition(3))
        ));
    }

    #[test]
    fn test_empty_buffer() {
        let mut reader = GribReader::new(Bytes::new());
        assert!(reader.next_message().unwrap().is_none());
        assert_eq!(reader.size(), 0);
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut data = minimal_grib1(20);
        data[19] = b'X';
        let reader = GribReader::new(Bytes::from(data));
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
