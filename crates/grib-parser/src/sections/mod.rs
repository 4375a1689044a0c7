//! GRIB2 section parsing.
//!
//! This module handles parsing of individual GRIB2 message sections.
//! Each GRIB2 message consists of multiple sections containing
//! metadata, grid information, and compressed data. Sections 2 to 7 may
//! repeat inside one message; every Section 7 closes one field.

mod keys;

pub use keys::{decode_values, field_keys};

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{GribError, Result};
use crate::unpacking::{signed, unsigned, SimplePacking};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub total_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub centre: u16,
    pub sub_centre: u16,
    pub tables_version: u8,
    pub local_tables_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: NaiveDateTime,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub source: u8,
    pub num_data_points: u32,
    pub template: u16,
    /// Points along a parallel, for templates that carry it at the common offset
    pub ni: Option<u32>,
    /// Points along a meridian, for templates that carry it at the common offset
    pub nj: Option<u32>,
    /// Corner and increment details of template 3.0
    pub lat_lon: Option<LatLonGrid>,
}

/// Template 3.0 details. Angles are in microdegrees.
#[derive(Debug, Clone)]
pub struct LatLonGrid {
    pub shape_of_earth: u8,
    pub first_latitude: i64,
    pub first_longitude: i64,
    pub resolution_flags: u8,
    pub last_latitude: i64,
    pub last_longitude: i64,
    pub i_increment: u32,
    pub j_increment: u32,
    pub scanning_mode: u8,
}

/// A fixed surface of Section 4, as coded.
#[derive(Debug, Clone, Copy)]
pub struct FixedSurface {
    pub type_code: u8,
    pub scale_factor: u8,
    pub scaled_value: u32,
}

impl FixedSurface {
    pub fn is_missing(&self) -> bool {
        self.type_code == 255
    }

    /// Physical value: scaled_value * 10^-scale_factor (scale factor is sign-magnitude).
    pub fn value(&self) -> Option<f64> {
        if self.is_missing() || self.scaled_value == u32::MAX {
            return None;
        }
        let factor = if self.scale_factor == 255 {
            0
        } else {
            signed(&[self.scale_factor]) as i32
        };
        Some(self.scaled_value as f64 * 10f64.powi(-factor))
    }
}

/// Template 4.1 ensemble information.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleInfo {
    pub type_of_ensemble_forecast: u8,
    pub perturbation_number: u8,
    pub number_of_forecasts: u8,
}

/// One time range specification of template 4.8.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub statistical_process: u8,
    pub type_of_time_increment: u8,
    pub unit_for_time_range: u8,
    pub length_of_time_range: u32,
    pub unit_for_time_increment: u8,
    pub time_increment: u32,
}

/// Template 4.8 statistical processing information.
#[derive(Debug, Clone)]
pub struct StatisticalInfo {
    pub end_of_interval: [u16; 6],
    pub number_missing: u32,
    pub ranges: Vec<TimeRange>,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub generating_process: u8,
    pub generating_process_identifier: u8,
    pub time_unit: u8,
    pub forecast_time: u32,
    pub first_surface: Option<FixedSurface>,
    pub second_surface: Option<FixedSurface>,
    pub ensemble: Option<EnsembleInfo>,
    pub statistics: Option<StatisticalInfo>,
    /// Vertical coordinate parameters
    pub pv: Vec<f64>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_values: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i32,
    pub decimal_scale_factor: i32,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

impl DataRepresentation {
    /// Templates whose octets 12-21 hold R, E, D, the bit width and the
    /// type of original values.
    pub fn has_common_parameters(&self) -> bool {
        matches!(self.template, 0 | 2 | 3 | 40 | 41 | 42)
    }

    /// Packing parameters when the field can be unpacked without the
    /// template-specific code: simple packing, or any template sharing its
    /// parameters with zero bits per value (a constant field).
    pub fn simple_packing(&self) -> Option<SimplePacking> {
        let constant = self.has_common_parameters() && self.bits_per_value == 0;
        (self.template == 0 || constant).then_some(SimplePacking {
            reference_value: self.reference_value as f64,
            binary_scale_factor: self.binary_scale_factor,
            decimal_scale_factor: self.decimal_scale_factor,
            bits_per_value: self.bits_per_value,
        })
    }

    pub fn packing_type(&self) -> &'static str {
        match self.template {
            0 => "grid_simple",
            2 => "grid_complex",
            3 => "grid_complex_spatial_differencing",
            4 => "grid_ieee",
            40 => "grid_jpeg",
            41 => "grid_png",
            42 => "grid_ccsds",
            _ => "unknown",
        }
    }
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    /// Bitmap bits; `None` when the indicator says no bitmap applies
    pub data: Option<Bytes>,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

/// One field of a GRIB2 message: the latest sections in force when a
/// Section 7 was reached.
#[derive(Debug, Clone)]
pub struct Grib2Field {
    /// The whole message the field belongs to
    pub message: Bytes,
    /// 0-based position of the field within its message
    pub field_index: usize,
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Bitmap,
    pub data_section: DataSection,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator> {
    if data.len() < 16 {
        return Err(GribError::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(GribError::InvalidFormat("Invalid GRIB magic bytes".to_string()));
    }

    // Octets 1-4: "GRIB" (indices 0-3)
    // Octets 5-6: Reserved (indices 4-5)
    // Octet 7: Discipline (index 6)
    // Octet 8: GRIB Edition Number (index 7)
    // Octets 9-16: Total length of GRIB message (indices 8-15)
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(GribError::UnsupportedEdition(edition));
    }

    Ok(Indicator {
        discipline,
        edition,
        total_length: unsigned(&data[8..16]),
    })
}

/// Parse Section 1 (Identification). `sec` starts at the section length octets.
pub fn parse_identification(sec: &[u8]) -> Result<Identification> {
    require_len(sec, 1, 21)?;

    let year = unsigned(&sec[12..14]) as i32;
    let (month, day, hour, minute, second) = (sec[14], sec[15], sec[16], sec[17], sec[18]);

    let reference_time = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| GribError::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        centre: unsigned(&sec[5..7]) as u16,
        sub_centre: unsigned(&sec[7..9]) as u16,
        tables_version: sec[9],
        local_tables_version: sec[10],
        significance_of_reference_time: sec[11],
        reference_time,
        production_status: sec[19],
        data_type: sec[20],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(sec: &[u8]) -> Result<GridDefinition> {
    require_len(sec, 3, 14)?;

    // Bytes 0-3: Section length
    // Byte 4: Section number (3)
    // Byte 5: Source of grid definition
    // Bytes 6-9: Number of data points (u32)
    // Byte 10: Number of octets for optional list
    // Byte 11: Interpretation of optional list
    // Bytes 12-13: Grid definition template number (u16)
    // Bytes 14+: Template-specific data
    let template = unsigned(&sec[12..14]) as u16;
    let gd = &sec[14..];

    // Templates 3.0, 3.1, 3.10, 3.20, 3.30 and 3.40 all carry the two grid
    // dimensions right after the 16 octets describing the shape of the Earth.
    let (ni, nj) = if matches!(template, 0 | 1 | 10 | 20 | 30 | 40) && gd.len() >= 24 {
        (
            Some(unsigned(&gd[16..20]) as u32),
            Some(unsigned(&gd[20..24]) as u32),
        )
    } else {
        (None, None)
    };

    let lat_lon = if template == 0 {
        // Template 3.0: Latitude/longitude (or equidistant cylindrical or Plate Carree)
        //
        // Byte 0: Shape of the Earth (Table 3.2)
        // Bytes 1-15: Radius and axes of the Earth
        // Bytes 16-19: Ni - number of points along a parallel
        // Bytes 20-23: Nj - number of points along a meridian
        // Bytes 24-31: Basic angle and subdivisions
        // Bytes 32-35: La1 (microdegrees, sign-magnitude)
        // Bytes 36-39: Lo1
        // Byte 40: Resolution and component flags
        // Bytes 41-44: La2
        // Bytes 45-48: Lo2
        // Bytes 49-52: Di
        // Bytes 53-56: Dj
        // Byte 57: Scanning mode (flags)
        if gd.len() < 58 {
            return Err(GribError::InvalidSection {
                section: 3,
                reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
            });
        }
        Some(LatLonGrid {
            shape_of_earth: gd[0],
            first_latitude: signed(&gd[32..36]),
            first_longitude: signed(&gd[36..40]),
            resolution_flags: gd[40],
            last_latitude: signed(&gd[41..45]),
            last_longitude: signed(&gd[45..49]),
            i_increment: unsigned(&gd[49..53]) as u32,
            j_increment: unsigned(&gd[53..57]) as u32,
            scanning_mode: gd[57],
        })
    } else {
        None
    };

    Ok(GridDefinition {
        source: sec[5],
        num_data_points: unsigned(&sec[6..10]) as u32,
        template,
        ni,
        nj,
        lat_lon,
    })
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(sec: &[u8]) -> Result<ProductDefinition> {
    require_len(sec, 4, 11)?;

    // Bytes 5-6: Number of coordinate values after template
    // Bytes 7-8: Product definition template number
    // Byte 9: Parameter category
    // Byte 10: Parameter number
    let nv = unsigned(&sec[5..7]) as usize;
    let template = unsigned(&sec[7..9]) as u16;

    let mut product = ProductDefinition {
        template,
        parameter_category: sec[9],
        parameter_number: sec[10],
        generating_process: 255,
        generating_process_identifier: 255,
        time_unit: 255,
        forecast_time: 0,
        first_surface: None,
        second_surface: None,
        ensemble: None,
        statistics: None,
        pv: Vec::new(),
    };

    // Templates 4.0, 4.1, 4.8 and 4.11 share the horizontal level layout:
    // Byte 11: Type of generating process
    // Byte 13: Generating process identifier
    // Byte 17: Indicator of unit of time range
    // Bytes 18-21: Forecast time
    // Byte 22-27: First fixed surface (type, scale factor, scaled value)
    // Byte 28-33: Second fixed surface
    if matches!(template, 0 | 1 | 8 | 11) {
        require_len(sec, 4, 34)?;
        product.generating_process = sec[11];
        product.generating_process_identifier = sec[13];
        product.time_unit = sec[17];
        product.forecast_time = unsigned(&sec[18..22]) as u32;
        product.first_surface = Some(FixedSurface {
            type_code: sec[22],
            scale_factor: sec[23],
            scaled_value: unsigned(&sec[24..28]) as u32,
        });
        product.second_surface = Some(FixedSurface {
            type_code: sec[28],
            scale_factor: sec[29],
            scaled_value: unsigned(&sec[30..34]) as u32,
        });
    }

    let mut stats_offset = 34;
    if matches!(template, 1 | 11) {
        require_len(sec, 4, 37)?;
        product.ensemble = Some(EnsembleInfo {
            type_of_ensemble_forecast: sec[34],
            perturbation_number: sec[35],
            number_of_forecasts: sec[36],
        });
        stats_offset = 37;
    }

    if matches!(template, 8 | 11) {
        product.statistics = Some(parse_statistics(sec, stats_offset)?);
    }

    if nv > 0 {
        let start = sec.len().checked_sub(nv * 4).ok_or_else(|| GribError::InvalidSection {
            section: 4,
            reason: format!("{} coordinate values do not fit the section", nv),
        })?;
        product.pv = sec[start..]
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect();
    }

    Ok(product)
}

/// Statistical processing block: end of interval, then `n` 12-byte time ranges.
fn parse_statistics(sec: &[u8], offset: usize) -> Result<StatisticalInfo> {
    require_len(sec, 4, offset + 12)?;
    let b = &sec[offset..];
    let end_of_interval = [
        unsigned(&b[0..2]) as u16,
        b[2] as u16,
        b[3] as u16,
        b[4] as u16,
        b[5] as u16,
        b[6] as u16,
    ];
    let count = b[7] as usize;
    let number_missing = unsigned(&b[8..12]) as u32;

    require_len(sec, 4, offset + 12 + count * 12)?;
    let ranges = (0..count)
        .map(|i| {
            let r = &b[12 + i * 12..24 + i * 12];
            TimeRange {
                statistical_process: r[0],
                type_of_time_increment: r[1],
                unit_for_time_range: r[2],
                length_of_time_range: unsigned(&r[3..7]) as u32,
                unit_for_time_increment: r[7],
                time_increment: unsigned(&r[8..12]) as u32,
            }
        })
        .collect();

    Ok(StatisticalInfo {
        end_of_interval,
        number_missing,
        ranges,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(sec: &[u8]) -> Result<DataRepresentation> {
    require_len(sec, 5, 11)?;

    // Octets 6-9 [5-8]: Number of data points (N)
    // Octets 10-11 [9-10]: Data representation template number
    // Templates 5.0, 5.2, 5.3, 5.40, 5.41 and 5.42 then share:
    // Octets 12-15 [11-14]: Reference value (R) - IEEE 32-bit float
    // Octets 16-17 [15-16]: Binary scale factor (E) - sign-magnitude
    // Octets 18-19 [17-18]: Decimal scale factor (D) - sign-magnitude
    // Octet 20 [19]: Number of bits per packed value
    // Octet 21 [20]: Type of original field values
    let num_values = unsigned(&sec[5..9]) as u32;
    let template = unsigned(&sec[9..11]) as u16;

    let mut repr = DataRepresentation {
        num_values,
        template,
        reference_value: 0.0,
        binary_scale_factor: 0,
        decimal_scale_factor: 0,
        bits_per_value: 0,
        original_data_type: 0,
    };

    if repr.has_common_parameters() {
        require_len(sec, 5, 21)?;
        repr.reference_value = f32::from_be_bytes([sec[11], sec[12], sec[13], sec[14]]);
        repr.binary_scale_factor = signed(&sec[15..17]) as i32;
        repr.decimal_scale_factor = signed(&sec[17..19]) as i32;
        repr.bits_per_value = sec[19];
        repr.original_data_type = sec[20];
    }

    Ok(repr)
}

/// Parse Section 6 (Bitmap). Indicator 254 reuses the bitmap defined earlier
/// in the same message.
pub fn parse_bitmap(sec: &[u8], previous: Option<&Bytes>) -> Result<Bitmap> {
    require_len(sec, 6, 6)?;
    let indicator = sec[5];

    let data = match indicator {
        0 => Some(Bytes::copy_from_slice(&sec[6..])),
        254 => Some(previous.cloned().ok_or_else(|| GribError::InvalidSection {
            section: 6,
            reason: "Bitmap indicator 254 without a previously defined bitmap".to_string(),
        })?),
        255 => None,
        other => {
            return Err(GribError::InvalidSection {
                section: 6,
                reason: format!("Predefined bitmap {} not supported", other),
            })
        }
    };

    Ok(Bitmap { indicator, data })
}

/// Parse Section 7 (Data)
pub fn parse_data_section(sec: &[u8]) -> Result<DataSection> {
    require_len(sec, 7, 5)?;
    Ok(DataSection {
        data: Bytes::copy_from_slice(&sec[5..]),
    })
}

/// Split a complete GRIB2 message into its fields.
///
/// Sections 3 to 6 stay in force until replaced, so a repeated Section 4/5/6/7
/// group yields a new field sharing the earlier grid definition.
pub fn split_fields(message: &Bytes) -> Result<Vec<Grib2Field>> {
    let indicator = parse_indicator(message)?;

    if message.len() < 20 || &message[message.len() - 4..] != b"7777" {
        return Err(GribError::InvalidFormat(
            "Message does not end with the 7777 marker".to_string(),
        ));
    }
    let end = message.len() - 4;

    let mut identification = None;
    let mut grid = None;
    let mut product = None;
    let mut representation = None;
    let mut bitmap: Option<Bitmap> = None;
    let mut defined_bitmap: Option<Bytes> = None;
    let mut fields = Vec::new();

    let mut offset = 16; // After Section 0
    while offset < end {
        if offset + 5 > end {
            return Err(GribError::InvalidFormat(format!(
                "Trailing {} bytes before end marker",
                end - offset
            )));
        }

        let section_length = unsigned(&message[offset..offset + 4]) as usize;
        let section_num = message[offset + 4];

        if section_length < 5 || offset + section_length > end {
            return Err(GribError::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        let sec = &message[offset..offset + section_length];
        match section_num {
            1 => identification = Some(parse_identification(sec)?),
            2 => {} // Local use section
            3 => grid = Some(parse_grid_definition(sec)?),
            4 => product = Some(parse_product_definition(sec)?),
            5 => representation = Some(parse_data_representation(sec)?),
            6 => {
                let parsed = parse_bitmap(sec, defined_bitmap.as_ref())?;
                if parsed.indicator == 0 {
                    defined_bitmap = parsed.data.clone();
                }
                bitmap = Some(parsed);
            }
            7 => {
                let field = Grib2Field {
                    message: message.clone(),
                    field_index: fields.len(),
                    indicator: indicator.clone(),
                    identification: missing_section(&identification, 1)?,
                    grid_definition: missing_section(&grid, 3)?,
                    product_definition: missing_section(&product, 4)?,
                    data_representation: missing_section(&representation, 5)?,
                    bitmap: missing_section(&bitmap, 6)?,
                    data_section: parse_data_section(sec)?,
                };
                fields.push(field);
            }
            other => {
                return Err(GribError::InvalidSection {
                    section: other,
                    reason: "Unknown section number".to_string(),
                })
            }
        }

        offset += section_length;
    }

    if fields.is_empty() {
        return Err(GribError::InvalidFormat("Message has no data section".to_string()));
    }

    Ok(fields)
}

/// Decode a 4-byte GRIB2 sign-magnitude integer; any other length yields 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    signed(bytes) as i32
}

// ===== Helper Functions =====

fn require_len(sec: &[u8], section: u8, needed: usize) -> Result<()> {
    if sec.len() < needed {
        return Err(GribError::InvalidSection {
            section,
            reason: format!("Not enough data: need {} bytes, have {}", needed, sec.len()),
        });
    }
    Ok(())
}

fn missing_section<T: Clone>(section: &Option<T>, number: u8) -> Result<T> {
    section.clone().ok_or_else(|| GribError::InvalidSection {
        section: number,
        reason: "Required section missing before data section".to_string(),
    })
}
