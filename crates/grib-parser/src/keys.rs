//! Keyed view of a decoded field.
//!
//! Every field is exposed as an ordered list of named keys, in the order the
//! sections appear in the message. Key names follow the ecCodes vocabulary
//! (`shortName`, `typeOfLevel`, `dataDate`, ...) so that tools written against
//! that key model work unchanged.

/// Raw value of a key as held by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Str(String),
    Long(i64),
    Double(f64),
    LongArray(Vec<i64>),
    DoubleArray(Vec<f64>),
}

impl KeyValue {
    /// Number of elements; scalars report 1.
    pub fn size(&self) -> usize {
        match self {
            KeyValue::LongArray(v) => v.len(),
            KeyValue::DoubleArray(v) => v.len(),
            _ => 1,
        }
    }
}

/// A key slot in a field.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyEntry {
    /// A decoded value. `missing` is set when the coded value was all ones.
    Value { value: KeyValue, missing: bool },
    /// Listed by the message but only reachable through an accessor this
    /// reader does not provide (geographic iterators, for instance).
    Unsupported(&'static str),
    /// Derived from the data values, which are only unpacked on access.
    /// See [`DataKey::resolve`].
    Data(DataKey),
}

/// Keys whose value comes from the unpacked data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKey {
    NumberOfMissing,
    Maximum,
    Minimum,
    Average,
    Values,
}

impl DataKey {
    pub const ALL: [DataKey; 5] = [
        DataKey::NumberOfMissing,
        DataKey::Maximum,
        DataKey::Minimum,
        DataKey::Average,
        DataKey::Values,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataKey::NumberOfMissing => "numberOfMissing",
            DataKey::Maximum => "maximum",
            DataKey::Minimum => "minimum",
            DataKey::Average => "average",
            DataKey::Values => "values",
        }
    }

    /// Value of the key over unpacked data. Points equal to `missing_value`
    /// are left out of the statistics, which are reported missing when no
    /// point is present.
    pub fn resolve(self, grid: &GridValues, missing_value: f64) -> KeyEntry {
        let present = || grid.values.iter().copied().filter(|v| *v != missing_value);
        let count = present().count();
        let statistic = |value: f64| KeyEntry::Value {
            value: KeyValue::Double(if count == 0 { missing_value } else { value }),
            missing: count == 0,
        };

        match self {
            DataKey::NumberOfMissing => KeyEntry::Value {
                value: KeyValue::Long((grid.values.len() - count) as i64),
                missing: false,
            },
            DataKey::Maximum => statistic(present().fold(f64::NEG_INFINITY, f64::max)),
            DataKey::Minimum => statistic(present().fold(f64::INFINITY, f64::min)),
            DataKey::Average => statistic(present().sum::<f64>() / count.max(1) as f64),
            DataKey::Values => KeyEntry::Value {
                value: KeyValue::DoubleArray(grid.values.clone()),
                missing: false,
            },
        }
    }
}

/// Decoded data values together with their grid shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridValues {
    /// Points along a parallel (columns)
    pub ni: usize,
    /// Points along a meridian (rows)
    pub nj: usize,
    pub values: Vec<f64>,
}

impl GridValues {
    /// True when the value count matches `ni * nj` and can be viewed as rows.
    pub fn is_regular(&self) -> bool {
        self.ni > 0 && self.nj > 0 && self.ni * self.nj == self.values.len()
    }

    /// Values split into `nj` rows of `ni` points. Irregular grids yield a
    /// single row holding every value.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        if self.is_regular() {
            self.values.chunks(self.ni).map(|row| row.to_vec()).collect()
        } else {
            vec![self.values.clone()]
        }
    }
}

/// One field's keys in section order.
#[derive(Debug, Clone, Default)]
pub struct KeyedField {
    keys: Vec<(String, KeyEntry)>,
}

impl KeyedField {
    /// Key names in section order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(name, _)| name.as_str())
    }

    /// Look up a key by exact name.
    pub fn get(&self, name: &str) -> Option<&KeyEntry> {
        self.keys
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    /// Convenience accessor for a decoded, non-missing value.
    pub fn value(&self, name: &str) -> Option<&KeyValue> {
        match self.get(name) {
            Some(KeyEntry::Value { value, missing: false }) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Builder used by the edition-specific key writers.
#[derive(Debug, Default)]
pub(crate) struct KeyList {
    field: KeyedField,
}

impl KeyList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, entry: KeyEntry) {
        self.field.keys.push((name.to_string(), entry));
    }

    pub(crate) fn str(&mut self, name: &str, value: impl Into<String>) {
        self.push(
            name,
            KeyEntry::Value {
                value: KeyValue::Str(value.into()),
                missing: false,
            },
        );
    }

    pub(crate) fn long(&mut self, name: &str, value: i64) {
        self.push(
            name,
            KeyEntry::Value {
                value: KeyValue::Long(value),
                missing: false,
            },
        );
    }

    /// Long coded in `bits` bits; all ones marks the value as missing.
    pub(crate) fn coded(&mut self, name: &str, value: u64, bits: u32) {
        let all_ones = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.push(
            name,
            KeyEntry::Value {
                value: KeyValue::Long(value as i64),
                missing: value == all_ones,
            },
        );
    }

    pub(crate) fn double(&mut self, name: &str, value: f64) {
        self.push(
            name,
            KeyEntry::Value {
                value: KeyValue::Double(value),
                missing: false,
            },
        );
    }

    pub(crate) fn double_array(&mut self, name: &str, values: Vec<f64>) {
        self.push(
            name,
            KeyEntry::Value {
                value: KeyValue::DoubleArray(values),
                missing: false,
            },
        );
    }

    pub(crate) fn unsupported(&mut self, name: &str, reason: &'static str) {
        self.push(name, KeyEntry::Unsupported(reason));
    }

    /// Geographic coordinate arrays need an iterator over the grid geometry.
    pub(crate) fn coordinate_arrays(&mut self) {
        for name in [
            "latitudes",
            "longitudes",
            "distinctLatitudes",
            "distinctLongitudes",
        ] {
            self.unsupported(name, "requires a geographic iterator");
        }
    }

    /// Data values plus the summary statistics derived from them, left
    /// for the caller to unpack.
    pub(crate) fn data_values(&mut self, missing_value: f64) {
        self.double("missingValue", missing_value);
        for key in DataKey::ALL {
            self.push(key.name(), KeyEntry::Data(key));
        }
    }

    pub(crate) fn end_marker(&mut self) {
        self.str("7777", "7777");
    }

    pub(crate) fn finish(self) -> KeyedField {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_all_ones_is_missing() {
        let mut keys = KeyList::new();
        keys.coded("scaleFactorOfSecondFixedSurface", 255, 8);
        keys.coded("scaledValueOfFirstFixedSurface", 2, 32);
        let field = keys.finish();

        assert!(matches!(
            field.get("scaleFactorOfSecondFixedSurface"),
            Some(KeyEntry::Value { missing: true, .. })
        ));
        assert_eq!(
            field.value("scaledValueOfFirstFixedSurface"),
            Some(&KeyValue::Long(2))
        );
        assert_eq!(field.value("scaleFactorOfSecondFixedSurface"), None);
    }

    #[test]
    fn test_names_keep_insertion_order() {
        let mut keys = KeyList::new();
        keys.long("editionNumber", 2);
        keys.str("centre", "kwbc");
        keys.end_marker();
        let field = keys.finish();

        let names: Vec<&str> = field.names().collect();
        assert_eq!(names, vec!["editionNumber", "centre", "7777"]);
    }

    #[test]
    fn test_data_keys_are_deferred() {
        let mut keys = KeyList::new();
        keys.data_values(9999.0);
        let field = keys.finish();

        assert_eq!(field.value("missingValue"), Some(&KeyValue::Double(9999.0)));
        assert_eq!(field.get("values"), Some(&KeyEntry::Data(DataKey::Values)));
        assert_eq!(field.value("maximum"), None);
    }

    #[test]
    fn test_statistics_skip_missing() {
        let grid = GridValues {
            ni: 2,
            nj: 2,
            values: vec![1.0, 9999.0, 3.0, 5.0],
        };
        let resolve = |key: DataKey| match key.resolve(&grid, 9999.0) {
            KeyEntry::Value { value, missing: false } => value,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(resolve(DataKey::NumberOfMissing), KeyValue::Long(1));
        assert_eq!(resolve(DataKey::Maximum), KeyValue::Double(5.0));
        assert_eq!(resolve(DataKey::Minimum), KeyValue::Double(1.0));
        assert_eq!(resolve(DataKey::Average), KeyValue::Double(3.0));
        assert_eq!(resolve(DataKey::Values).size(), 4);
    }

    #[test]
    fn test_statistics_of_fully_masked_grid_are_missing() {
        let grid = GridValues {
            ni: 2,
            nj: 1,
            values: vec![9999.0, 9999.0],
        };
        assert_eq!(
            DataKey::Maximum.resolve(&grid, 9999.0),
            KeyEntry::Value {
                value: KeyValue::Double(9999.0),
                missing: true
            }
        );
        assert_eq!(
            DataKey::NumberOfMissing.resolve(&grid, 9999.0),
            KeyEntry::Value {
                value: KeyValue::Long(2),
                missing: false
            }
        );
    }

    #[test]
    fn test_irregular_grid_is_single_row() {
        let grid = GridValues {
            ni: 3,
            nj: 3,
            values: vec![1.0, 2.0],
        };
        assert!(!grid.is_regular());
        assert_eq!(grid.rows(), vec![vec![1.0, 2.0]]);
    }
}
