//! Key list of a GRIB1 message.

use super::Grib1Field;
use crate::error::{GribError, Result};
use crate::keys::{GridValues, KeyList, KeyedField};
use crate::tables::{centre_abbreviation, grib1_level_type, ParameterTables};
use crate::unpacking::{unpack_simple, SimplePacking, MISSING_VALUE};

/// Build the ordered key list of a GRIB1 message. Data values are left packed.
pub fn field_keys(field: &Grib1Field, tables: &ParameterTables) -> KeyedField {
    let mut keys = KeyList::new();
    let pd = &field.product_definition;

    // Section 0
    keys.str("identifier", "GRIB");
    keys.long("editionNumber", 1);
    keys.long("totalLength", field.total_length as i64);

    // Section 1
    keys.long("table2Version", pd.table_version as i64);
    keys.str("centre", centre_abbreviation(pd.centre as u16));
    keys.coded("subCentre", pd.sub_centre as u64, 8);
    keys.long("generatingProcessIdentifier", pd.generating_process as i64);
    keys.coded("gridDefinition", pd.grid_definition as u64, 8);
    keys.long("indicatorOfParameter", pd.indicator_of_parameter as i64);
    // The parameter name of a GRIB1 message is its table 2 indicator
    keys.str("parameterName", pd.indicator_of_parameter.to_string());
    match tables.grib1(pd.indicator_of_parameter) {
        Some(entry) => {
            keys.str("shortName", entry.short_name.as_str());
            keys.str("name", entry.name.as_str());
            keys.str("units", entry.units.as_str());
            if let Some(cf) = &entry.cf_name {
                keys.str("cfName", cf.as_str());
            }
        }
        None => {
            keys.str("shortName", "unknown");
            keys.str("name", "unknown");
        }
    }

    keys.long("indicatorOfTypeOfLevel", pd.level_type as i64);
    match grib1_level_type(pd.level_type) {
        Some((name, true)) => {
            let (top, bottom) = (pd.level_octets[0], pd.level_octets[1]);
            keys.str("typeOfLevel", name);
            keys.long("topLevel", top as i64);
            keys.long("bottomLevel", bottom as i64);
            keys.str("levels", format!("{}-{}", top, bottom));
        }
        Some((name, false)) => {
            keys.str("typeOfLevel", name);
            keys.long(
                "level",
                u16::from_be_bytes(pd.level_octets) as i64,
            );
            if pd.level_type == 100 {
                keys.str("pressureUnits", "hPa");
            }
        }
        None => {
            keys.str("typeOfLevel", "unknown");
            keys.long("level", u16::from_be_bytes(pd.level_octets) as i64);
        }
    }

    let date = pd.year() as i64 * 10_000 + pd.month as i64 * 100 + pd.day as i64;
    keys.long("dataDate", date);
    keys.long("dataTime", pd.hour as i64 * 100 + pd.minute as i64);
    keys.long("unitOfTimeRange", pd.time_unit as i64);
    keys.long("P1", pd.p1 as i64);
    keys.long("P2", pd.p2 as i64);
    keys.long("timeRangeIndicator", pd.time_range_indicator as i64);
    keys.long("decimalScaleFactor", pd.decimal_scale_factor as i64);

    // Section 2
    if let Some(gds) = &field.grid_description {
        keys.long("dataRepresentationType", gds.data_representation_type as i64);
        keys.long("Ni", gds.ni as i64);
        keys.long("Nj", gds.nj as i64);
        if let Some(ll) = &gds.lat_lon {
            keys.str("gridType", "regular_ll");
            keys.double("latitudeOfFirstGridPointInDegrees", ll.first_latitude as f64 / 1000.0);
            keys.double("longitudeOfFirstGridPointInDegrees", ll.first_longitude as f64 / 1000.0);
            keys.long("resolutionAndComponentFlags", ll.resolution_flags as i64);
            keys.double("latitudeOfLastGridPointInDegrees", ll.last_latitude as f64 / 1000.0);
            keys.double("longitudeOfLastGridPointInDegrees", ll.last_longitude as f64 / 1000.0);
            keys.double("iDirectionIncrementInDegrees", ll.i_increment as f64 / 1000.0);
            keys.double("jDirectionIncrementInDegrees", ll.j_increment as f64 / 1000.0);
            keys.long("scanningMode", ll.scanning_mode as i64);
        }
        keys.coordinate_arrays();
    }

    // Section 3
    keys.long("bitmapPresent", field.bitmap.is_some() as i64);

    // Section 4
    let bd = &field.binary_data;
    keys.str(
        "packingType",
        if bd.is_simple_grid_point() { "grid_simple" } else { "unknown" },
    );
    keys.double("referenceValue", bd.reference_value);
    keys.long("binaryScaleFactor", bd.binary_scale_factor as i64);
    keys.long("bitsPerValue", bd.bits_per_value as i64);
    keys.data_values(MISSING_VALUE);

    keys.end_marker();
    keys.finish()
}

/// Unpack the data values of a GRIB1 message.
pub fn decode_values(field: &Grib1Field) -> Result<GridValues> {
    let bd = &field.binary_data;
    if !bd.is_simple_grid_point() {
        return Err(GribError::Unpacking(
            "only simple grid point packing is supported".to_string(),
        ));
    }

    let (ni, nj) = field
        .grid_description
        .as_ref()
        .map(|g| (g.ni as usize, g.nj as usize))
        .unwrap_or((0, 0));

    // Without a grid description the point count comes from the packed data
    let num_points = if ni * nj > 0 {
        ni * nj
    } else {
        match &field.bitmap {
            Some(bitmap) => bitmap.len() * 8,
            None => bd.packed_count(),
        }
    };

    let packing = SimplePacking {
        reference_value: bd.reference_value,
        binary_scale_factor: bd.binary_scale_factor,
        decimal_scale_factor: field.product_definition.decimal_scale_factor,
        bits_per_value: bd.bits_per_value,
    };

    let values = unpack_simple(&bd.data, num_points, packing, field.bitmap.as_deref())?;

    Ok(GridValues { ni, nj, values })
}
