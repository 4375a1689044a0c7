//! Parameter, level and centre lookup tables.
//!
//! Translates GRIB numeric codes into the naming keys exposed on each field
//! (`shortName`, `name`, `units`, `cfName`, `typeOfLevel`, `centre`).
//!
//! The built-in tables cover the common WMO and NCEP parameters. They can be
//! extended from a YAML file, allowing local parameters to be named without
//! code changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{GribError, Result};

/// Lookup key for a GRIB2 parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Naming information for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub short_name: String,
    pub name: String,
    pub units: String,
    #[serde(default)]
    pub cf_name: Option<String>,
}

impl ParameterEntry {
    fn new(short_name: &str, name: &str, units: &str, cf_name: Option<&str>) -> Self {
        Self {
            short_name: short_name.to_string(),
            name: name.to_string(),
            units: units.to_string(),
            cf_name: cf_name.map(str::to_string),
        }
    }
}

/// Level type naming: the `typeOfLevel` value and the unit of the fixed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelType {
    pub name: &'static str,
    pub units: Option<&'static str>,
}

// (discipline, category, number, shortName, name, units, cfName)
const GRIB2_PARAMETERS: &[(u8, u8, u8, &str, &str, &str, Option<&str>)] = &[
    (0, 0, 0, "t", "Temperature", "K", Some("air_temperature")),
    (0, 0, 2, "pt", "Potential temperature", "K", Some("air_potential_temperature")),
    (0, 0, 6, "dpt", "Dew point temperature", "K", Some("dew_point_temperature")),
    (0, 1, 0, "q", "Specific humidity", "kg kg**-1", Some("specific_humidity")),
    (0, 1, 1, "r", "Relative humidity", "%", Some("relative_humidity")),
    (0, 1, 3, "pwat", "Precipitable water", "kg m**-2", Some("atmosphere_mass_content_of_water_vapor")),
    (0, 1, 8, "tp", "Total precipitation", "kg m**-2", Some("precipitation_amount")),
    (0, 2, 0, "wdir", "Wind direction", "Degree true", Some("wind_from_direction")),
    (0, 2, 1, "ws", "Wind speed", "m s**-1", Some("wind_speed")),
    (0, 2, 2, "u", "U component of wind", "m s**-1", Some("eastward_wind")),
    (0, 2, 3, "v", "V component of wind", "m s**-1", Some("northward_wind")),
    (0, 2, 8, "w", "Vertical velocity", "Pa s**-1", Some("lagrangian_tendency_of_air_pressure")),
    (0, 2, 10, "absv", "Absolute vorticity", "s**-1", Some("atmosphere_absolute_vorticity")),
    (0, 2, 22, "gust", "Wind speed (gust)", "m s**-1", Some("wind_speed_of_gust")),
    (0, 3, 0, "pres", "Pressure", "Pa", Some("air_pressure")),
    (0, 3, 1, "prmsl", "Pressure reduced to MSL", "Pa", Some("air_pressure_at_mean_sea_level")),
    (0, 3, 5, "gh", "Geopotential height", "gpm", Some("geopotential_height")),
    (0, 6, 1, "tcc", "Total cloud cover", "%", Some("cloud_area_fraction")),
    (0, 7, 6, "cape", "Convective available potential energy", "J kg**-1", Some("atmosphere_convective_available_potential_energy")),
    (0, 7, 7, "cin", "Convective inhibition", "J kg**-1", Some("atmosphere_convective_inhibition")),
    (0, 16, 196, "refc", "Composite reflectivity", "dB", None),
    (0, 19, 0, "vis", "Visibility", "m", Some("visibility_in_air")),
    (2, 0, 0, "lsm", "Land-sea mask", "(0 - 1)", Some("land_binary_mask")),
    (10, 2, 0, "ci", "Sea ice area fraction", "(0 - 1)", Some("sea_ice_area_fraction")),
    (209, 0, 16, "refl", "Merged reflectivity QC", "dBZ", None),
];

// (indicatorOfParameter, shortName, name, units, cfName) for GRIB1 table 2
const GRIB1_PARAMETERS: &[(u8, &str, &str, &str, Option<&str>)] = &[
    (1, "pres", "Pressure", "Pa", Some("air_pressure")),
    (2, "prmsl", "Pressure reduced to MSL", "Pa", Some("air_pressure_at_mean_sea_level")),
    (7, "gh", "Geopotential height", "gpm", Some("geopotential_height")),
    (11, "t", "Temperature", "K", Some("air_temperature")),
    (17, "dpt", "Dew point temperature", "K", Some("dew_point_temperature")),
    (33, "u", "U component of wind", "m s**-1", Some("eastward_wind")),
    (34, "v", "V component of wind", "m s**-1", Some("northward_wind")),
    (39, "w", "Vertical velocity", "Pa s**-1", Some("lagrangian_tendency_of_air_pressure")),
    (51, "q", "Specific humidity", "kg kg**-1", Some("specific_humidity")),
    (52, "r", "Relative humidity", "%", Some("relative_humidity")),
    (54, "pwat", "Precipitable water", "kg m**-2", None),
    (61, "tp", "Total precipitation", "kg m**-2", Some("precipitation_amount")),
    (71, "tcc", "Total cloud cover", "%", Some("cloud_area_fraction")),
    (157, "cape", "Convective available potential energy", "J kg**-1", None),
];

/// Parameter naming tables for both editions.
#[derive(Debug, Clone, Default)]
pub struct ParameterTables {
    grib2: HashMap<ParamKey, ParameterEntry>,
    grib1: HashMap<u8, ParameterEntry>,
}

impl ParameterTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables populated with the built-in WMO/NCEP parameters.
    pub fn builtin() -> Self {
        let mut tables = Self::new();
        for &(d, c, n, short, name, units, cf) in GRIB2_PARAMETERS {
            tables.add_grib2(d, c, n, ParameterEntry::new(short, name, units, cf));
        }
        for &(indicator, short, name, units, cf) in GRIB1_PARAMETERS {
            tables.add_grib1(indicator, ParameterEntry::new(short, name, units, cf));
        }
        tables
    }

    /// Add or replace a GRIB2 parameter mapping
    pub fn add_grib2(&mut self, discipline: u8, category: u8, number: u8, entry: ParameterEntry) {
        self.grib2.insert((discipline, category, number), entry);
    }

    /// Add or replace a GRIB1 table 2 mapping
    pub fn add_grib1(&mut self, indicator: u8, entry: ParameterEntry) {
        self.grib1.insert(indicator, entry);
    }

    pub fn grib2(&self, discipline: u8, category: u8, number: u8) -> Option<&ParameterEntry> {
        self.grib2.get(&(discipline, category, number))
    }

    pub fn grib1(&self, indicator: u8) -> Option<&ParameterEntry> {
        self.grib1.get(&indicator)
    }

    /// Merge the parameters listed in a YAML table file.
    ///
    /// ```yaml
    /// grib2:
    ///   - { discipline: 0, category: 7, number: 199, short_name: mxuphl,
    ///       name: Maximum updraft helicity, units: "m**2 s**-2" }
    /// grib1:
    ///   - { indicator: 228, short_name: gust, name: Wind gust, units: "m s**-1" }
    /// ```
    pub fn extend_from_yaml(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let file: TableFile = serde_yaml::from_str(&content)
            .map_err(|e| GribError::Tables(format!("{}: {}", path.display(), e)))?;

        debug!(
            path = %path.display(),
            grib2 = file.grib2.len(),
            grib1 = file.grib1.len(),
            "Loaded parameter table extension"
        );

        for row in file.grib2 {
            self.add_grib2(row.discipline, row.category, row.number, row.entry);
        }
        for row in file.grib1 {
            self.add_grib1(row.indicator, row.entry);
        }
        Ok(())
    }

    /// Get the number of parameters in the tables
    pub fn parameter_count(&self) -> usize {
        self.grib2.len() + self.grib1.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.grib2.is_empty() && self.grib1.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    grib2: Vec<Grib2Row>,
    #[serde(default)]
    grib1: Vec<Grib1Row>,
}

#[derive(Debug, Deserialize)]
struct Grib2Row {
    discipline: u8,
    category: u8,
    number: u8,
    #[serde(flatten)]
    entry: ParameterEntry,
}

#[derive(Debug, Deserialize)]
struct Grib1Row {
    indicator: u8,
    #[serde(flatten)]
    entry: ParameterEntry,
}

/// GRIB2 code table 4.5: type of fixed surface.
pub fn grib2_level_type(code: u8) -> Option<LevelType> {
    let (name, units) = match code {
        1 => ("surface", None),
        2 => ("cloudBase", None),
        3 => ("cloudTop", None),
        4 => ("isothermZero", None),
        6 => ("maxWind", None),
        7 => ("tropopause", None),
        8 => ("nominalTop", None),
        10 => ("entireAtmosphere", None),
        100 => ("isobaricInhPa", Some("Pa")),
        101 => ("meanSea", None),
        102 => ("heightAboveSea", Some("m")),
        103 => ("heightAboveGround", Some("m")),
        104 => ("sigma", None),
        105 => ("hybrid", None),
        106 => ("depthBelowLandLayer", Some("m")),
        107 => ("theta", Some("K")),
        108 => ("pressureFromGroundLayer", Some("Pa")),
        109 => ("potentialVorticity", Some("K m2 kg-1 s-1")),
        _ => return None,
    };
    Some(LevelType { name, units })
}

/// GRIB1 table 3: type of level. The flag marks layer types whose two level
/// octets hold a top and a bottom value.
pub fn grib1_level_type(code: u8) -> Option<(&'static str, bool)> {
    let level = match code {
        1 => ("surface", false),
        4 => ("isothermZero", false),
        6 => ("maxWind", false),
        7 => ("tropopause", false),
        8 => ("nominalTop", false),
        100 => ("isobaricInhPa", false),
        101 => ("isobaricLayer", true),
        102 => ("meanSea", false),
        103 => ("heightAboveSea", false),
        105 => ("heightAboveGround", false),
        106 => ("heightAboveGroundLayer", true),
        107 => ("sigma", false),
        109 => ("hybrid", false),
        111 => ("depthBelowLand", false),
        112 => ("depthBelowLandLayer", true),
        200 => ("entireAtmosphere", false),
        _ => return None,
    };
    Some(level)
}

/// WMO common code table C-11 abbreviation for an originating centre.
pub fn centre_abbreviation(centre: u16) -> String {
    let abbr = match centre {
        7 => "kwbc",
        8 => "kwbe",
        34 => "rjtd",
        54 => "cwao",
        74 => "egrr",
        78 => "edzw",
        80 => "cnmc",
        85 => "lfpw",
        98 => "ecmf",
        _ => return centre.to_string(),
    };
    abbr.to_string()
}
