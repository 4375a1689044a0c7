//! Fixed-column inventory of a GRIB file.
//!
//! ```text
//! File: gfs.t00z.pgrb2.0p25.f000
//! GRIB2
//! Originating centre: kwbc
//! Records: 2
//!    1 : t      : Temperature (K)                                    : 2 (m)                : heightAboveGround
//!    2 : cape   : Convective available potential energy (J kg**-1)   : 0 (n/a)              : surface
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::decoder::{Decoder, DecoderOptions, GribFile, MessageHandle};
use crate::error::{InspectError, Result};

/// Substituted for descriptive keys a message does not carry.
pub const UNAVAILABLE: &str = "n/a";

/// Descriptive keys captured for the inventory.
pub const INVENTORY_KEYS: [&str; 11] = [
    "editionNumber",
    "centre",
    "name",
    "shortName",
    "parameterName",
    "units",
    "typeOfLevel",
    "pressureUnits",
    "level",
    "levels",
    "unitsOfFirstFixedSurface",
];

/// File-level summary, taken from the first message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryHeader {
    pub path: String,
    pub edition: String,
    pub centre: String,
    pub message_count: usize,
}

/// One inventory line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryEntry {
    /// 1-based message index
    pub index: usize,
    pub short_name: String,
    pub name: String,
    pub units: String,
    pub level: String,
    pub level_units: String,
    pub type_of_level: String,
}

impl InventoryEntry {
    /// Apply the missing-key defaults to the keys captured from a message.
    fn from_keys(index: usize, mut keys: HashMap<&'static str, String>) -> Self {
        let mut take = |key: &str| keys.remove(key);

        let parameter_name = take("parameterName");
        let name = match take("name") {
            Some(name) if name != "unknown" => name,
            _ => parameter_name.unwrap_or_else(|| UNAVAILABLE.to_string()),
        };
        let level = take("level")
            .or_else(|| take("levels"))
            .unwrap_or_else(|| UNAVAILABLE.to_string());
        let level_units =
            take("unitsOfFirstFixedSurface").unwrap_or_else(|| UNAVAILABLE.to_string());

        Self {
            index,
            short_name: take("shortName").unwrap_or_else(|| UNAVAILABLE.to_string()),
            name,
            units: take("units").unwrap_or_else(|| UNAVAILABLE.to_string()),
            level,
            level_units,
            type_of_level: take("typeOfLevel").unwrap_or_else(|| UNAVAILABLE.to_string()),
        }
    }

    /// `index : shortName : name (units) : level (units) : typeOfLevel`
    pub fn line(&self) -> String {
        format!(
            "{:>4} : {:<6} : {:<50} : {:<20} : {}",
            self.index,
            self.short_name,
            format!("{} ({})", self.name, self.units),
            format!("{} ({})", self.level, self.level_units),
            self.type_of_level
        )
    }
}

/// Inventory of a whole file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub header: InventoryHeader,
    pub entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn header_lines(&self) -> [String; 4] {
        [
            format!("File: {}", self.header.path),
            format!("GRIB{}", self.header.edition),
            format!("Originating centre: {}", self.header.centre),
            format!("Records: {}", self.header.message_count),
        ]
    }

    /// Header lines followed by one line per message.
    pub fn lines(&self) -> Vec<String> {
        self.header_lines()
            .into_iter()
            .chain(self.entries.iter().map(InventoryEntry::line))
            .collect()
    }
}

/// Builds an [`Inventory`] one message at a time.
pub struct InventoryBuilder<'a, D: Decoder> {
    decoder: &'a D,
    options: DecoderOptions,
}

impl<'a, D: Decoder> InventoryBuilder<'a, D> {
    pub fn new(decoder: &'a D, options: DecoderOptions) -> Self {
        Self { decoder, options }
    }

    pub fn build(&self, path: &Path) -> Result<Inventory> {
        let mut file = self
            .decoder
            .open(path, &self.options)
            .map_err(|e| InspectError::file(path, e))?;

        let mut entries = Vec::new();
        let mut header_keys: Option<(String, String)> = None;

        while let Some(message) = file.next_message().map_err(|e| InspectError::file(path, e))? {
            let index = entries.len() + 1;
            let mut keys = capture(&message, index)?;

            if header_keys.is_none() {
                header_keys = Some((
                    keys.get("editionNumber").cloned().unwrap_or_else(|| UNAVAILABLE.to_string()),
                    keys.get("centre").cloned().unwrap_or_else(|| UNAVAILABLE.to_string()),
                ));
            }
            keys.remove("editionNumber");
            keys.remove("centre");

            let entry = InventoryEntry::from_keys(index, keys);
            debug!(message = index, short_name = %entry.short_name, "Inventory entry");
            entries.push(entry);
        }

        let (edition, centre) = header_keys.ok_or_else(|| {
            InspectError::file(path, "file contains no GRIB messages")
        })?;

        info!(path = %path.display(), messages = entries.len(), "Built inventory");
        Ok(Inventory {
            header: InventoryHeader {
                path: path.display().to_string(),
                edition,
                centre,
                message_count: entries.len(),
            },
            entries,
        })
    }
}

/// Text of every allow-listed key the message carries with a non-missing value.
fn capture<M: MessageHandle>(message: &M, index: usize) -> Result<HashMap<&'static str, String>> {
    let mut keys = HashMap::new();
    for key in message.keys() {
        let Some(&wanted) = INVENTORY_KEYS.iter().find(|k| **k == key) else {
            continue;
        };
        if keys.contains_key(wanted) {
            continue;
        }
        if message.is_missing(key).map_err(|e| InspectError::key(index, key, e))? {
            continue;
        }
        let value = message
            .get_scalar(key)
            .map_err(|e| InspectError::key(index, key, e))?;
        keys.insert(wanted, value.to_string());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MemoryDecoder, MemoryMessage};

    fn entry(keys: &[(&'static str, &str)]) -> InventoryEntry {
        let keys = keys.iter().map(|(k, v)| (*k, v.to_string())).collect();
        InventoryEntry::from_keys(1, keys)
    }

    #[test]
    fn test_defaults_for_missing_keys() {
        let e = entry(&[("parameterName", "157"), ("name", "unknown")]);
        assert_eq!(e.name, "157");
        assert_eq!(e.short_name, "n/a");
        assert_eq!(e.units, "n/a");
        assert_eq!(e.level, "n/a");
        assert_eq!(e.level_units, "n/a");
        assert_eq!(e.type_of_level, "n/a");
    }

    #[test]
    fn test_level_falls_back_to_levels() {
        let e = entry(&[("levels", "0-30"), ("typeOfLevel", "heightAboveGroundLayer")]);
        assert_eq!(e.level, "0-30");

        let e = entry(&[("level", "2"), ("levels", "0-30")]);
        assert_eq!(e.level, "2");
    }

    #[test]
    fn test_level_units_from_first_fixed_surface_only() {
        let e = entry(&[("unitsOfFirstFixedSurface", "m"), ("pressureUnits", "hPa")]);
        assert_eq!(e.level_units, "m");
        let e = entry(&[("pressureUnits", "hPa")]);
        assert_eq!(e.level_units, "n/a");
    }

    #[test]
    fn test_line_format() {
        let e = InventoryEntry {
            index: 12,
            short_name: "t".to_string(),
            name: "Temperature".to_string(),
            units: "K".to_string(),
            level: "500".to_string(),
            level_units: "hPa".to_string(),
            type_of_level: "isobaricInhPa".to_string(),
        };
        let line = e.line();
        assert_eq!(
            line,
            format!(
                "  12 : t      : {:<50} : {:<20} : isobaricInhPa",
                "Temperature (K)", "500 (hPa)"
            )
        );
        assert_eq!(line.matches(" : ").count(), 4);
    }

    #[test]
    fn test_build_header_from_first_message() {
        let decoder = MemoryDecoder::new().with_file(
            "f.grib",
            vec![
                MemoryMessage::new()
                    .scalar("editionNumber", 2i64)
                    .scalar("centre", "kwbc")
                    .scalar("shortName", "t"),
                MemoryMessage::new()
                    .scalar("editionNumber", 1i64)
                    .scalar("centre", "ecmf")
                    .scalar("shortName", "cape"),
            ],
        );
        let inventory = InventoryBuilder::new(&decoder, DecoderOptions::default())
            .build(Path::new("f.grib"))
            .unwrap();

        let lines = inventory.lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "File: f.grib");
        assert_eq!(lines[1], "GRIB2");
        assert_eq!(lines[2], "Originating centre: kwbc");
        assert_eq!(lines[3], "Records: 2");
        assert!(lines[5].starts_with("   2 : cape"));
    }

    #[test]
    fn test_missing_coded_level_is_unavailable() {
        let decoder = MemoryDecoder::new().with_file(
            "f.grib",
            vec![MemoryMessage::new()
                .scalar("shortName", "tcc")
                .missing("level", 2147483647i64)],
        );
        let inventory = InventoryBuilder::new(&decoder, DecoderOptions::default())
            .build(Path::new("f.grib"))
            .unwrap();
        assert_eq!(inventory.entries[0].level, "n/a");
        assert_eq!(inventory.header.edition, "n/a");
    }

    #[test]
    fn test_empty_file_is_a_file_error() {
        let decoder = MemoryDecoder::new().with_file("empty.grib", vec![]);
        let err = InventoryBuilder::new(&decoder, DecoderOptions::default())
            .build(Path::new("empty.grib"))
            .unwrap_err();
        assert!(matches!(err, InspectError::File { .. }));
        assert_eq!(decoder.open_files(), 0);
    }
}
