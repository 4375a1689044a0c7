//! Key list of a GRIB2 field.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use super::{FixedSurface, Grib2Field};
use crate::error::{GribError, Result};
use crate::keys::{GridValues, KeyList, KeyedField};
use crate::tables::{centre_abbreviation, grib2_level_type, ParameterTables};
use crate::unpacking::{check_grid, unpack_simple, unpack_submessage, MISSING_VALUE};

/// Build the ordered key list of a GRIB2 field. Data values are left packed.
pub fn field_keys(field: &Grib2Field, tables: &ParameterTables) -> KeyedField {
    let mut keys = KeyList::new();
    let ind = &field.indicator;
    let id = &field.identification;
    let grid = &field.grid_definition;
    let prod = &field.product_definition;
    let repr = &field.data_representation;

    // Section 0
    keys.str("identifier", "GRIB");
    keys.long("discipline", ind.discipline as i64);
    keys.long("editionNumber", ind.edition as i64);
    keys.long("totalLength", ind.total_length as i64);

    // Section 1
    keys.str("centre", centre_abbreviation(id.centre));
    keys.coded("subCentre", id.sub_centre as u64, 16);
    keys.long("tablesVersion", id.tables_version as i64);
    keys.long("localTablesVersion", id.local_tables_version as i64);
    keys.long(
        "significanceOfReferenceTime",
        id.significance_of_reference_time as i64,
    );
    push_date_time(&mut keys, "data", id.reference_time);
    keys.coded(
        "productionStatusOfProcessedData",
        id.production_status as u64,
        8,
    );
    keys.coded("typeOfProcessedData", id.data_type as u64, 8);

    // Section 3
    keys.long("sourceOfGridDefinition", grid.source as i64);
    keys.long("numberOfDataPoints", grid.num_data_points as i64);
    keys.long("gridDefinitionTemplateNumber", grid.template as i64);
    keys.str("gridType", grid_type(grid.template));
    if let (Some(ni), Some(nj)) = (grid.ni, grid.nj) {
        keys.coded("Ni", ni as u64, 32);
        keys.coded("Nj", nj as u64, 32);
    }
    if let Some(ll) = &grid.lat_lon {
        keys.long("shapeOfTheEarth", ll.shape_of_earth as i64);
        keys.double("latitudeOfFirstGridPointInDegrees", degrees(ll.first_latitude));
        keys.double("longitudeOfFirstGridPointInDegrees", degrees(ll.first_longitude));
        keys.long("resolutionAndComponentFlags", ll.resolution_flags as i64);
        keys.double("latitudeOfLastGridPointInDegrees", degrees(ll.last_latitude));
        keys.double("longitudeOfLastGridPointInDegrees", degrees(ll.last_longitude));
        keys.double("iDirectionIncrementInDegrees", degrees(ll.i_increment as i64));
        keys.double("jDirectionIncrementInDegrees", degrees(ll.j_increment as i64));
        keys.long("scanningMode", ll.scanning_mode as i64);
    }
    keys.coordinate_arrays();

    // Section 4
    keys.long("NV", prod.pv.len() as i64);
    keys.long("productDefinitionTemplateNumber", prod.template as i64);
    keys.long("parameterCategory", prod.parameter_category as i64);
    keys.long("parameterNumber", prod.parameter_number as i64);
    match tables.grib2(ind.discipline, prod.parameter_category, prod.parameter_number) {
        Some(entry) => {
            keys.str("parameterName", entry.name.as_str());
            keys.str("shortName", entry.short_name.as_str());
            keys.str("name", entry.name.as_str());
            keys.str("units", entry.units.as_str());
            if let Some(cf) = &entry.cf_name {
                keys.str("cfName", cf.as_str());
            }
        }
        None => {
            keys.str("parameterName", prod.parameter_number.to_string());
            keys.str("shortName", "unknown");
            keys.str("name", "unknown");
        }
    }

    if prod.first_surface.is_some() {
        keys.coded("typeOfGeneratingProcess", prod.generating_process as u64, 8);
        keys.coded(
            "generatingProcessIdentifier",
            prod.generating_process_identifier as u64,
            8,
        );
        keys.long("indicatorOfUnitOfTimeRange", prod.time_unit as i64);
        keys.long("forecastTime", prod.forecast_time as i64);
        if let Some(validity) = validity_time(field) {
            push_date_time(&mut keys, "validity", validity);
        }
    }

    if let (Some(first), Some(second)) = (prod.first_surface, prod.second_surface) {
        push_surfaces(&mut keys, first, second);
    }

    if let Some(ens) = &prod.ensemble {
        keys.long("typeOfEnsembleForecast", ens.type_of_ensemble_forecast as i64);
        keys.long("perturbationNumber", ens.perturbation_number as i64);
        keys.long("numberOfForecastsInEnsemble", ens.number_of_forecasts as i64);
    }

    if let Some(stats) = &prod.statistics {
        let [year, month, day, hour, minute, second] = stats.end_of_interval;
        keys.long("yearOfEndOfOverallTimeInterval", year as i64);
        keys.long("monthOfEndOfOverallTimeInterval", month as i64);
        keys.long("dayOfEndOfOverallTimeInterval", day as i64);
        keys.long("hourOfEndOfOverallTimeInterval", hour as i64);
        keys.long("minuteOfEndOfOverallTimeInterval", minute as i64);
        keys.long("secondOfEndOfOverallTimeInterval", second as i64);
        keys.long("numberOfTimeRange", stats.ranges.len() as i64);
        keys.long(
            "numberOfMissingInStatisticalProcess",
            stats.number_missing as i64,
        );
        if let Some(range) = stats.ranges.first() {
            keys.long("typeOfStatisticalProcessing", range.statistical_process as i64);
            keys.long("typeOfTimeIncrement", range.type_of_time_increment as i64);
            keys.long("indicatorOfUnitForTimeRange", range.unit_for_time_range as i64);
            keys.long("lengthOfTimeRange", range.length_of_time_range as i64);
            keys.long(
                "indicatorOfUnitForTimeIncrement",
                range.unit_for_time_increment as i64,
            );
            keys.coded("timeIncrement", range.time_increment as u64, 32);
        }
    }

    if !prod.pv.is_empty() {
        keys.double_array("pv", prod.pv.clone());
    }

    // Section 5
    keys.long("numberOfValues", repr.num_values as i64);
    keys.long("dataRepresentationTemplateNumber", repr.template as i64);
    keys.str("packingType", repr.packing_type());
    keys.double("referenceValue", repr.reference_value as f64);
    keys.long("binaryScaleFactor", repr.binary_scale_factor as i64);
    keys.long("decimalScaleFactor", repr.decimal_scale_factor as i64);
    keys.long("bitsPerValue", repr.bits_per_value as i64);
    keys.long("typeOfOriginalFieldValues", repr.original_data_type as i64);

    // Section 6
    keys.long("bitMapIndicator", field.bitmap.indicator as i64);
    keys.long("bitmapPresent", field.bitmap.data.is_some() as i64);

    // Section 7
    keys.data_values(MISSING_VALUE);

    keys.end_marker();
    keys.finish()
}

fn push_date_time(keys: &mut KeyList, prefix: &str, time: NaiveDateTime) {
    let date = time.year() as i64 * 10_000 + time.month() as i64 * 100 + time.day() as i64;
    let hhmm = time.hour() as i64 * 100 + time.minute() as i64;
    keys.long(&format!("{}Date", prefix), date);
    keys.long(&format!("{}Time", prefix), hhmm);
}

fn push_surfaces(keys: &mut KeyList, first: FixedSurface, second: FixedSurface) {
    keys.coded("typeOfFirstFixedSurface", first.type_code as u64, 8);
    let level_type = grib2_level_type(first.type_code);
    let first_value = first.value().unwrap_or(0.0);
    // Isobaric levels on whole hPa are reported in hPa
    let in_hpa = first.type_code == 100 && !first.is_missing() && first_value % 100.0 == 0.0;
    let surface_units = if in_hpa {
        Some("hPa")
    } else {
        level_type.and_then(|l| l.units)
    };
    if let Some(units) = surface_units {
        keys.str("unitsOfFirstFixedSurface", units);
    }
    keys.coded("scaleFactorOfFirstFixedSurface", first.scale_factor as u64, 8);
    keys.coded("scaledValueOfFirstFixedSurface", first.scaled_value as u64, 32);
    keys.coded("typeOfSecondFixedSurface", second.type_code as u64, 8);
    keys.coded("scaleFactorOfSecondFixedSurface", second.scale_factor as u64, 8);
    keys.coded("scaledValueOfSecondFixedSurface", second.scaled_value as u64, 32);

    if first.is_missing() {
        return;
    }

    let second_value = if second.type_code == first.type_code {
        second.value()
    } else {
        None
    };

    let type_name = level_type.map(|l| l.name).unwrap_or("unknown");
    if first.type_code == 100 {
        if in_hpa {
            keys.str("typeOfLevel", type_name);
            push_level(keys, "level", first_value / 100.0);
            keys.str("pressureUnits", "hPa");
        } else {
            keys.str("typeOfLevel", "isobaricInPa");
            push_level(keys, "level", first_value);
            keys.str("pressureUnits", "Pa");
        }
    } else {
        keys.str("typeOfLevel", type_name);
        push_level(keys, "level", first_value);
    }

    if let Some(bottom) = second_value {
        keys.str(
            "levels",
            format!("{}-{}", format_level(first_value), format_level(bottom)),
        );
    }
}

fn push_level(keys: &mut KeyList, name: &str, value: f64) {
    if value.fract() == 0.0 {
        keys.long(name, value as i64);
    } else {
        keys.double(name, value);
    }
}

fn format_level(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Valid time: the end of the overall interval for statistically processed
/// products, otherwise reference time plus forecast time.
fn validity_time(field: &Grib2Field) -> Option<NaiveDateTime> {
    let prod = &field.product_definition;
    if let Some(stats) = &prod.statistics {
        let [year, month, day, hour, minute, second] = stats.end_of_interval;
        return NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32));
    }

    let unit_seconds: i64 = match prod.time_unit {
        0 => 60,
        1 => 3600,
        2 => 86_400,
        10 => 3 * 3600,
        11 => 6 * 3600,
        12 => 12 * 3600,
        13 => 1,
        _ => return None,
    };
    let offset = TimeDelta::try_seconds(prod.forecast_time as i64 * unit_seconds)?;
    field
        .identification
        .reference_time
        .checked_add_signed(offset)
}

/// Unpack the data values of a GRIB2 field.
pub fn decode_values(field: &Grib2Field) -> Result<GridValues> {
    let repr = &field.data_representation;
    let grid = &field.grid_definition;
    let num_points = grid.num_data_points as usize;
    let bitmap = field.bitmap.data.as_deref();

    let values = match repr.simple_packing() {
        Some(packing) => unpack_simple(&field.data_section.data, num_points, packing, bitmap)?,
        None => {
            check_grid(num_points, repr.bits_per_value, None, bitmap)?;
            let values = unpack_submessage(&field.message, field.field_index)?;
            if values.len() != num_points {
                return Err(GribError::Unpacking(format!(
                    "{} packing yielded {} values for {} points",
                    repr.packing_type(),
                    values.len(),
                    num_points
                )));
            }
            values
        }
    };

    Ok(GridValues {
        ni: grid.ni.unwrap_or(0) as usize,
        nj: grid.nj.unwrap_or(0) as usize,
        values,
    })
}

fn grid_type(template: u16) -> &'static str {
    match template {
        0 => "regular_ll",
        1 => "rotated_ll",
        10 => "mercator",
        20 => "polar_stereographic",
        30 => "lambert",
        40 => "regular_gg",
        90 => "space_view",
        _ => "unknown",
    }
}

fn degrees(micro: i64) -> f64 {
    micro as f64 / 1_000_000.0
}
