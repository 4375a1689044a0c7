//! GRIB1 section parsing (WMO FM 92 GRIB Edition 1).
//!
//! A GRIB1 message always carries exactly one field:
//! indicator (8 bytes), product definition section, optional grid
//! description section, optional bitmap section, binary data section, `7777`.

mod keys;

pub use keys::{decode_values, field_keys};

use bytes::Bytes;

use crate::error::{GribError, Result};
use crate::unpacking::{ibm_to_f64, signed, unsigned};

/// Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub table_version: u8,
    pub centre: u8,
    pub generating_process: u8,
    pub grid_definition: u8,
    pub flags: u8,
    pub indicator_of_parameter: u8,
    pub level_type: u8,
    pub level_octets: [u8; 2],
    pub year_of_century: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub time_unit: u8,
    pub p1: u8,
    pub p2: u8,
    pub time_range_indicator: u8,
    pub century: u8,
    pub sub_centre: u8,
    pub decimal_scale_factor: i32,
}

impl ProductDefinition {
    pub fn has_grid_description(&self) -> bool {
        self.flags & 0x80 != 0
    }

    pub fn has_bitmap(&self) -> bool {
        self.flags & 0x40 != 0
    }

    /// Four digit year of the reference time
    pub fn year(&self) -> i32 {
        (self.century as i32 - 1) * 100 + self.year_of_century as i32
    }
}

/// Grid Description Section (data representation type 0 details when present)
#[derive(Debug, Clone)]
pub struct GridDescription {
    pub data_representation_type: u8,
    pub ni: u16,
    pub nj: u16,
    /// Corner and increment details of a regular lat/lon grid, in millidegrees
    pub lat_lon: Option<LatLonGrid>,
}

#[derive(Debug, Clone)]
pub struct LatLonGrid {
    pub first_latitude: i64,
    pub first_longitude: i64,
    pub resolution_flags: u8,
    pub last_latitude: i64,
    pub last_longitude: i64,
    pub i_increment: u16,
    pub j_increment: u16,
    pub scanning_mode: u8,
}

/// Binary Data Section
#[derive(Debug, Clone)]
pub struct BinaryData {
    pub flags: u8,
    pub unused_bits: u8,
    pub binary_scale_factor: i32,
    pub reference_value: f64,
    pub bits_per_value: u8,
    pub data: Bytes,
}

impl BinaryData {
    /// Spherical harmonics or second order packing are not unpacked here.
    pub fn is_simple_grid_point(&self) -> bool {
        self.flags & 0xC0 == 0
    }

    /// Number of packed values in the data octets.
    pub fn packed_count(&self) -> usize {
        if self.bits_per_value == 0 {
            return 0;
        }
        let bits = (self.data.len() * 8).saturating_sub(self.unused_bits as usize);
        bits / self.bits_per_value as usize
    }
}

/// A decoded GRIB1 message.
#[derive(Debug, Clone)]
pub struct Grib1Field {
    pub total_length: usize,
    pub product_definition: ProductDefinition,
    pub grid_description: Option<GridDescription>,
    pub bitmap: Option<Bytes>,
    pub binary_data: BinaryData,
}

/// Parse a complete GRIB1 message.
pub fn parse_message(message: &[u8]) -> Result<Grib1Field> {
    if message.len() < 12 || &message[0..4] != b"GRIB" {
        return Err(GribError::InvalidFormat("Invalid GRIB magic bytes".to_string()));
    }
    if message[7] != 1 {
        return Err(GribError::UnsupportedEdition(message[7]));
    }
    if &message[message.len() - 4..] != b"7777" {
        return Err(GribError::InvalidFormat(
            "Message does not end with the 7777 marker".to_string(),
        ));
    }
    let total_length = unsigned(&message[4..7]) as usize;
    let end = message.len() - 4;

    let mut offset = 8;
    let pds = section(message, offset, end, 1)?;
    let product_definition = parse_product_definition(pds)?;
    offset += pds.len();

    let grid_description = if product_definition.has_grid_description() {
        let gds = section(message, offset, end, 2)?;
        offset += gds.len();
        Some(parse_grid_description(gds)?)
    } else {
        None
    };

    let bitmap = if product_definition.has_bitmap() {
        let bms = section(message, offset, end, 3)?;
        offset += bms.len();
        Some(parse_bitmap(bms)?)
    } else {
        None
    };

    let bds = section(message, offset, end, 4)?;
    let binary_data = parse_binary_data(bds)?;

    Ok(Grib1Field {
        total_length,
        product_definition,
        grid_description,
        bitmap,
        binary_data,
    })
}

/// Slice a section whose 3-byte length prefix starts at `offset`.
fn section(message: &[u8], offset: usize, end: usize, number: u8) -> Result<&[u8]> {
    if offset + 3 > end {
        return Err(GribError::InvalidSection {
            section: number,
            reason: "Section not found".to_string(),
        });
    }
    let length = unsigned(&message[offset..offset + 3]) as usize;
    if length < 4 || offset + length > end {
        return Err(GribError::InvalidSection {
            section: number,
            reason: "Invalid section length".to_string(),
        });
    }
    Ok(&message[offset..offset + length])
}

pub fn parse_product_definition(pds: &[u8]) -> Result<ProductDefinition> {
    if pds.len() < 28 {
        return Err(GribError::InvalidSection {
            section: 1,
            reason: format!("Product definition needs 28 bytes, got {}", pds.len()),
        });
    }

    // Bytes 0-2: Section length
    // Byte 3: Parameter table version
    // Byte 4: Centre, 5: generating process, 6: grid definition, 7: flags
    // Byte 8: Indicator of parameter, 9: type of level, 10-11: level
    // Bytes 12-16: Year of century, month, day, hour, minute
    // Byte 17: Time unit, 18: P1, 19: P2, 20: time range indicator
    // Byte 24: Century, 25: sub-centre, 26-27: decimal scale factor
    Ok(ProductDefinition {
        table_version: pds[3],
        centre: pds[4],
        generating_process: pds[5],
        grid_definition: pds[6],
        flags: pds[7],
        indicator_of_parameter: pds[8],
        level_type: pds[9],
        level_octets: [pds[10], pds[11]],
        year_of_century: pds[12],
        month: pds[13],
        day: pds[14],
        hour: pds[15],
        minute: pds[16],
        time_unit: pds[17],
        p1: pds[18],
        p2: pds[19],
        time_range_indicator: pds[20],
        century: pds[24],
        sub_centre: pds[25],
        decimal_scale_factor: signed(&pds[26..28]) as i32,
    })
}

pub fn parse_grid_description(gds: &[u8]) -> Result<GridDescription> {
    if gds.len() < 10 {
        return Err(GribError::InvalidSection {
            section: 2,
            reason: "Not enough data".to_string(),
        });
    }

    // Byte 5: Data representation type, 6-7: Ni, 8-9: Nj
    let data_representation_type = gds[5];
    let ni = unsigned(&gds[6..8]) as u16;
    let nj = unsigned(&gds[8..10]) as u16;

    // Type 0 (regular lat/lon):
    // Bytes 10-12: La1, 13-15: Lo1 (millidegrees, sign-magnitude)
    // Byte 16: Resolution and component flags
    // Bytes 17-19: La2, 20-22: Lo2, 23-24: Di, 25-26: Dj
    // Byte 27: Scanning mode
    let lat_lon = if data_representation_type == 0 && gds.len() >= 28 {
        Some(LatLonGrid {
            first_latitude: signed(&gds[10..13]),
            first_longitude: signed(&gds[13..16]),
            resolution_flags: gds[16],
            last_latitude: signed(&gds[17..20]),
            last_longitude: signed(&gds[20..23]),
            i_increment: unsigned(&gds[23..25]) as u16,
            j_increment: unsigned(&gds[25..27]) as u16,
            scanning_mode: gds[27],
        })
    } else {
        None
    };

    Ok(GridDescription {
        data_representation_type,
        ni,
        nj,
        lat_lon,
    })
}

pub fn parse_bitmap(bms: &[u8]) -> Result<Bytes> {
    if bms.len() < 6 {
        return Err(GribError::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }
    // Bytes 4-5: predefined bitmap number, 0 when the bitmap follows
    let predefined = unsigned(&bms[4..6]);
    if predefined != 0 {
        return Err(GribError::InvalidSection {
            section: 3,
            reason: format!("Predefined bitmap {} not supported", predefined),
        });
    }
    Ok(Bytes::copy_from_slice(&bms[6..]))
}

pub fn parse_binary_data(bds: &[u8]) -> Result<BinaryData> {
    if bds.len() < 11 {
        return Err(GribError::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Byte 3: flags (high nibble) and unused bits at end (low nibble)
    // Bytes 4-5: Binary scale factor (sign-magnitude)
    // Bytes 6-9: Reference value (IBM float)
    // Byte 10: Bits per value
    Ok(BinaryData {
        flags: bds[3] & 0xF0,
        unused_bits: bds[3] & 0x0F,
        binary_scale_factor: signed(&bds[4..6]) as i32,
        reference_value: ibm_to_f64([bds[6], bds[7], bds[8], bds[9]]),
        bits_per_value: bds[10],
        data: Bytes::copy_from_slice(&bds[11..]),
    })
}
