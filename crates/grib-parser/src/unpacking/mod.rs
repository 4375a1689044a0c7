//! GRIB data unpacking algorithms and bit-level helpers.
//!
//! Implements simple grid-point packing for both editions:
//! - GRIB2 template 5.0 (IEEE reference value)
//! - GRIB1 simple packing (IBM reference value)
//!
//! Other GRIB2 packings (complex, PNG, ...) go through the `grib`
//! crate, see [`unpack_submessage`].

mod submessage;

pub use submessage::unpack_submessage;

use crate::error::{GribError, Result};

/// Value substituted for points masked out by a bitmap.
pub const MISSING_VALUE: f64 = 9999.0;

/// Largest grid unpacked when neither a bitmap nor the packed bits bound its
/// size: constant fields and compressed packings.
pub const MAX_UNBOUNDED_POINTS: usize = 1 << 26;

/// Parameters shared by the simple packing of both editions.
#[derive(Debug, Clone, Copy)]
pub struct SimplePacking {
    pub reference_value: f64,
    pub binary_scale_factor: i32,
    pub decimal_scale_factor: i32,
    pub bits_per_value: u8,
}

/// Number of points holding a packed value, once the bitmap has been checked
/// to cover `num_points` and the grid size to be within bounds.
///
/// `packed_bits` is the number of data bits available when each point takes
/// `bits_per_value` of them, or `None` for compressed data.
pub fn check_grid(
    num_points: usize,
    bits_per_value: u8,
    packed_bits: Option<usize>,
    bitmap: Option<&[u8]>,
) -> Result<usize> {
    let present = match bitmap {
        Some(bm) => {
            if bm.len().saturating_mul(8) < num_points {
                return Err(GribError::Unpacking(format!(
                    "bitmap of {} octets cannot cover {} points",
                    bm.len(),
                    num_points
                )));
            }
            count_present(bm, num_points)
        }
        None => num_points,
    };

    let bounded = match packed_bits {
        Some(_) if bits_per_value == 0 => bitmap.is_some(),
        Some(available) => {
            let needed = present.checked_mul(bits_per_value as usize);
            if !needed.is_some_and(|bits| bits <= available) {
                return Err(GribError::Unpacking(format!(
                    "{} points of {} bits do not fit in {} data bits",
                    present, bits_per_value, available
                )));
            }
            true
        }
        None => bitmap.is_some(),
    };

    if !bounded && num_points > MAX_UNBOUNDED_POINTS {
        return Err(GribError::Unpacking(format!(
            "{} points exceed the limit of {}",
            num_points, MAX_UNBOUNDED_POINTS
        )));
    }
    Ok(present)
}

/// Unpack simple packed data.
///
/// Simple packing formula: value = (reference_value + packed_value * 2^E) * 10^(-D)
///
/// `num_points` is the total number of grid points. When a bitmap is given,
/// only points whose bit is set consume a packed value; the others receive
/// [`MISSING_VALUE`]. Grids the bitmap or packed data cannot hold are
/// rejected before anything is allocated.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    packing: SimplePacking,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f64>> {
    check_grid(
        num_points,
        packing.bits_per_value,
        Some(packed_data.len().saturating_mul(8)),
        bitmap,
    )?;

    let binary_scale = 2.0_f64.powi(packing.binary_scale_factor);
    let decimal_scale = 10.0_f64.powi(-packing.decimal_scale_factor);
    let constant = packing.reference_value * decimal_scale;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let bits_per_value = packing.bits_per_value as usize;

    for i in 0..num_points {
        let has_value = match bitmap {
            // 1 bit per data point, 1 = value present, 0 = missing
            Some(bm) => {
                let byte_idx = i / 8;
                let bit_idx = 7 - (i % 8);
                byte_idx < bm.len() && (bm[byte_idx] >> bit_idx) & 1 == 1
            }
            None => true,
        };

        if !has_value {
            values.push(MISSING_VALUE);
            continue;
        }

        if bits_per_value == 0 {
            values.push(constant);
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value)
            .map_err(|e| GribError::Unpacking(format!("point {}: {}", i, e)))?;
        bit_position += bits_per_value;

        let value =
            (packing.reference_value + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value);
    }

    Ok(values)
}

/// Number of set bits in the first `num_points` bits of a bitmap.
pub fn count_present(bitmap: &[u8], num_points: usize) -> usize {
    (0..num_points)
        .filter(|i| {
            let byte_idx = i / 8;
            byte_idx < bitmap.len() && (bitmap[byte_idx] >> (7 - i % 8)) & 1 == 1
        })
        .count()
}

/// Extract bits from a byte array, MSB first.
/// Returns the bits as a 32-bit unsigned integer.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> std::result::Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

/// Unsigned big-endian integer of up to 8 bytes.
pub(crate) fn unsigned(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Signed big-endian integer in GRIB sign-magnitude form (MSB is the sign).
pub(crate) fn signed(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let raw = unsigned(bytes);
    let sign_bit = 1u64 << (bytes.len() * 8 - 1);
    let magnitude = (raw & !sign_bit) as i64;
    if raw & sign_bit != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Convert a 4-byte IBM System/360 single precision float (GRIB1 reference values).
pub fn ibm_to_f64(bytes: [u8; 4]) -> f64 {
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7f) as i32;
    let mantissa = unsigned(&bytes[1..4]) as f64;
    if mantissa == 0.0 {
        return 0.0;
    }
    sign * mantissa * 16.0_f64.powi(exponent - 64) / 16_777_216.0
}
