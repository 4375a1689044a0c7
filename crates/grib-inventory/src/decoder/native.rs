//! Decoder backed by the native `grib-parser` reader.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use grib_parser::{
    DataKey, Field, GribReader, GridValues, KeyEntry, KeyValue, KeyedField, ParameterTables,
};

use super::{Decoder, DecoderError, DecoderOptions, GribFile, MessageHandle};
use crate::value::{Scalar, Value};

/// Reads GRIB1 and GRIB2 files with the built-in parser.
#[derive(Debug, Clone)]
pub struct NativeDecoder {
    tables: Arc<ParameterTables>,
}

impl Default for NativeDecoder {
    fn default() -> Self {
        Self::new(ParameterTables::builtin())
    }
}

impl NativeDecoder {
    pub fn new(tables: ParameterTables) -> Self {
        Self {
            tables: Arc::new(tables),
        }
    }

    /// Built-in tables extended with the parameters of a YAML table file.
    pub fn with_table_file(path: &Path) -> Result<Self, grib_parser::GribError> {
        let mut tables = ParameterTables::builtin();
        tables.extend_from_yaml(path)?;
        Ok(Self::new(tables))
    }

    pub fn tables(&self) -> &ParameterTables {
        &self.tables
    }

    fn reader(path: &Path) -> Result<GribReader, DecoderError> {
        GribReader::from_path(path).map_err(|e| DecoderError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl Decoder for NativeDecoder {
    type File = NativeFile;

    fn open(&self, path: &Path, options: &DecoderOptions) -> Result<NativeFile, DecoderError> {
        let reader = Self::reader(path)?;
        debug!(
            path = %path.display(),
            size = reader.size(),
            multi_field = options.multi_field_support,
            "Opened GRIB file"
        );
        Ok(NativeFile {
            path: path.to_path_buf(),
            reader,
            tables: Arc::clone(&self.tables),
            options: *options,
            pending: VecDeque::new(),
        })
    }

    fn count(&self, path: &Path, options: &DecoderOptions) -> Result<usize, DecoderError> {
        let mut reader = Self::reader(path)?;
        let mut count = 0;
        while let Some(message) = reader.next_message().map_err(corrupt)? {
            count += if options.multi_field_support {
                message.field_count().map_err(corrupt)?
            } else {
                1
            };
        }
        debug!(path = %path.display(), count, "Counted messages");
        Ok(count)
    }
}

/// An open file of the native decoder.
pub struct NativeFile {
    path: PathBuf,
    reader: GribReader,
    tables: Arc<ParameterTables>,
    options: DecoderOptions,
    pending: VecDeque<Field>,
}

impl GribFile for NativeFile {
    type Message = NativeMessage;

    fn next_message(&mut self) -> Result<Option<NativeMessage>, DecoderError> {
        if self.pending.is_empty() {
            let Some(message) = self.reader.next_message().map_err(corrupt)? else {
                return Ok(None);
            };
            let mut fields = message.fields().map_err(corrupt)?;
            if !self.options.multi_field_support {
                fields.truncate(1);
            }
            debug!(
                path = %self.path.display(),
                offset = message.offset,
                edition = message.edition,
                fields = fields.len(),
                "Read GRIB message"
            );
            self.pending.extend(fields);
        }

        Ok(self.pending.pop_front().map(|field| NativeMessage {
            keys: field.keys(&self.tables),
            field,
            grid: OnceCell::new(),
        }))
    }
}

/// One field's keys. Data values stay packed until a data key is read.
#[derive(Debug)]
pub struct NativeMessage {
    field: Field,
    keys: KeyedField,
    grid: OnceCell<Result<GridValues, String>>,
}

impl NativeMessage {
    fn grid(&self, key: &str) -> Result<&GridValues, DecoderError> {
        let grid = self.grid.get_or_init(|| {
            debug!(edition = self.field.edition(), "Unpacking data values");
            self.field.decode_values().map_err(|e| e.to_string())
        });
        grid.as_ref().map_err(|reason| DecoderError::Unreadable {
            key: key.to_string(),
            reason: reason.clone(),
        })
    }

    fn missing_value(&self) -> f64 {
        match self.keys.value("missingValue") {
            Some(KeyValue::Double(v)) => *v,
            _ => grib_parser::unpacking::MISSING_VALUE,
        }
    }

    fn resolve(&self, key: &str) -> Result<Cow<'_, KeyEntry>, DecoderError> {
        match self.keys.get(key) {
            Some(KeyEntry::Data(data_key)) => {
                let grid = self.grid(key)?;
                Ok(Cow::Owned(data_key.resolve(grid, self.missing_value())))
            }
            Some(entry) => Ok(Cow::Borrowed(entry)),
            None => Err(DecoderError::KeyNotFound(key.to_string())),
        }
    }

    fn entry(&self, key: &str) -> Result<Cow<'_, KeyValue>, DecoderError> {
        match self.resolve(key)? {
            Cow::Owned(KeyEntry::Value { value, .. }) => Ok(Cow::Owned(value)),
            Cow::Owned(entry) => value_of(key, &entry).map(|value| Cow::Owned(value.clone())),
            Cow::Borrowed(entry) => value_of(key, entry).map(Cow::Borrowed),
        }
    }
}

fn value_of<'a>(key: &str, entry: &'a KeyEntry) -> Result<&'a KeyValue, DecoderError> {
    match entry {
        KeyEntry::Value { value, .. } => Ok(value),
        KeyEntry::Unsupported(reason) => Err(DecoderError::Unsupported {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        KeyEntry::Data(_) => Err(DecoderError::Unreadable {
            key: key.to_string(),
            reason: "data key did not resolve".to_string(),
        }),
    }
}

impl MessageHandle for NativeMessage {
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.keys.names())
    }

    fn size(&self, key: &str) -> Result<usize, DecoderError> {
        if let Some(KeyEntry::Data(DataKey::Values)) = self.keys.get(key) {
            return self.grid(key).map(|grid| grid.values.len());
        }
        self.entry(key).map(|value| value.size())
    }

    fn get_scalar(&self, key: &str) -> Result<Scalar, DecoderError> {
        match &*self.entry(key)? {
            KeyValue::Str(s) => Ok(Scalar::Text(s.clone())),
            KeyValue::Long(v) => Ok(Scalar::Int(*v)),
            KeyValue::Double(v) => Ok(Scalar::Float(*v)),
            KeyValue::LongArray(v) if v.len() == 1 => Ok(Scalar::Int(v[0])),
            KeyValue::DoubleArray(v) if v.len() == 1 => Ok(Scalar::Float(v[0])),
            other => Err(DecoderError::Unsupported {
                key: key.to_string(),
                reason: format!("array of {} elements read as a scalar", other.size()),
            }),
        }
    }

    fn get_array(&self, key: &str) -> Result<Vec<Scalar>, DecoderError> {
        Ok(match &*self.entry(key)? {
            KeyValue::LongArray(v) => v.iter().copied().map(Scalar::Int).collect(),
            KeyValue::DoubleArray(v) => v.iter().copied().map(Scalar::Float).collect(),
            _ => vec![self.get_scalar(key)?],
        })
    }

    fn get_values(&self) -> Result<Value, DecoderError> {
        let key = DataKey::Values.name();
        if !matches!(self.keys.get(key), Some(KeyEntry::Data(DataKey::Values))) {
            return Err(DecoderError::KeyNotFound(key.to_string()));
        }
        let grid = self.grid(key)?;
        if grid.is_regular() {
            Ok(Value::Grid(grid.rows()))
        } else {
            Ok(Value::Array(
                grid.values.iter().copied().map(Scalar::Float).collect(),
            ))
        }
    }

    fn is_missing(&self, key: &str) -> Result<bool, DecoderError> {
        match self.keys.get(key) {
            Some(KeyEntry::Value { missing, .. }) => Ok(*missing),
            Some(KeyEntry::Data(DataKey::Values)) => Ok(false),
            Some(KeyEntry::Data(_)) => match &*self.resolve(key)? {
                KeyEntry::Value { missing, .. } => Ok(*missing),
                _ => Ok(false),
            },
            Some(_) => Ok(false),
            None => Err(DecoderError::KeyNotFound(key.to_string())),
        }
    }
}

fn corrupt(error: grib_parser::GribError) -> DecoderError {
    DecoderError::Corrupt(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    #[test]
    fn test_count_with_and_without_multi_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::multi_field_file(dir.path());
        let decoder = NativeDecoder::default();

        assert_eq!(decoder.count(&path, &DecoderOptions::default()).unwrap(), 2);
        assert_eq!(
            decoder.count(&path, &DecoderOptions::multi_field(true)).unwrap(),
            3
        );
    }

    #[test]
    fn test_multi_field_enumerates_each_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::multi_field_file(dir.path());
        let decoder = NativeDecoder::default();

        let short_names = |options: DecoderOptions| {
            let mut file = decoder.open(&path, &options).unwrap();
            let mut names = Vec::new();
            while let Some(message) = file.next_message().unwrap() {
                names.push(message.get_scalar("shortName").unwrap().to_string());
            }
            names
        };

        assert_eq!(short_names(DecoderOptions::default()), vec!["t", "cape"]);
        assert_eq!(
            short_names(DecoderOptions::multi_field(true)),
            vec!["t", "r", "cape"]
        );
    }

    #[test]
    fn test_message_key_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let decoder = NativeDecoder::default();
        let mut file = decoder.open(&path, &DecoderOptions::default()).unwrap();
        let message = file.next_message().unwrap().unwrap();

        assert_eq!(message.size("shortName").unwrap(), 1);
        assert_eq!(message.get_scalar("level").unwrap(), Scalar::Int(2));
        assert!(matches!(
            message.get_values().unwrap(),
            Value::Grid(rows) if rows.len() == 3 && rows[0].len() == 4
        ));
        assert!(matches!(
            message.size("latitudes"),
            Err(DecoderError::Unsupported { .. })
        ));
        assert!(matches!(
            message.get_scalar("noSuchKey"),
            Err(DecoderError::KeyNotFound(_))
        ));
        assert!(message.keys().any(|k| k == "7777"));
    }

    #[test]
    fn test_data_values_unpacked_on_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::oversized_grid_file(dir.path());
        let decoder = NativeDecoder::default();
        let mut file = decoder.open(&path, &DecoderOptions::default()).unwrap();

        // Acquiring the message and reading metadata never touches the data
        let message = file.next_message().unwrap().unwrap();
        assert_eq!(message.get_scalar("shortName").unwrap(), Scalar::Text("t".to_string()));
        assert_eq!(message.get_scalar("missingValue").unwrap(), Scalar::Float(9999.0));
        assert!(message.keys().any(|k| k == "values"));

        assert!(matches!(
            message.get_values(),
            Err(DecoderError::Unreadable { key, .. }) if key == "values"
        ));
        assert!(matches!(
            message.size("maximum"),
            Err(DecoderError::Unreadable { key, .. }) if key == "maximum"
        ));
    }

    #[test]
    fn test_statistics_from_unpacked_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let decoder = NativeDecoder::default();
        let mut file = decoder.open(&path, &DecoderOptions::default()).unwrap();
        let message = file.next_message().unwrap().unwrap();

        assert_eq!(message.get_scalar("numberOfMissing").unwrap(), Scalar::Int(0));
        assert!(!message.is_missing("maximum").unwrap());
        match message.get_scalar("minimum").unwrap() {
            Scalar::Float(min) => assert!((min - 270.0).abs() < 0.01),
            other => panic!("unexpected minimum {:?}", other),
        }
        assert_eq!(message.size("values").unwrap(), 12);
    }

    #[test]
    fn test_missing_coded_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let decoder = NativeDecoder::default();
        let mut file = decoder.open(&path, &DecoderOptions::default()).unwrap();
        let message = file.next_message().unwrap().unwrap();

        // No second fixed surface: type 255
        assert!(message.is_missing("typeOfSecondFixedSurface").unwrap());
        assert!(!message.is_missing("typeOfFirstFixedSurface").unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        let decoder = NativeDecoder::default();
        let result = decoder.open(Path::new("/nonexistent.grib2"), &DecoderOptions::default());
        assert!(matches!(result, Err(DecoderError::Open { .. })));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::truncated_file(dir.path());
        let decoder = NativeDecoder::default();
        assert!(matches!(
            decoder.count(&path, &DecoderOptions::default()),
            Err(DecoderError::Corrupt(_))
        ));
    }
}
