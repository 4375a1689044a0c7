//! GRIB2 packings unpacked by the `grib` crate.

use std::fmt::Display;
use std::io::Cursor;

use grib::Grib2SubmessageDecoder;

use super::MISSING_VALUE;
use crate::error::{GribError, Result};

/// Unpack the field at `field_index` (0-based) of a complete GRIB2 message.
///
/// The decoder yields `f32` values with NaN at points masked by the bitmap;
/// those become [`MISSING_VALUE`].
pub fn unpack_submessage(message: &[u8], field_index: usize) -> Result<Vec<f64>> {
    let grib2 = grib::from_reader(Cursor::new(message)).map_err(unpacking)?;
    let (_, submessage) = grib2.iter().nth(field_index).ok_or_else(|| {
        GribError::Unpacking(format!("message has no field {}", field_index + 1))
    })?;

    let decoder = Grib2SubmessageDecoder::from(submessage).map_err(unpacking)?;
    let values = decoder
        .dispatch()
        .map_err(unpacking)?
        .map(|value| {
            if value.is_nan() {
                MISSING_VALUE
            } else {
                value as f64
            }
        })
        .collect();
    Ok(values)
}

fn unpacking(error: impl Display) -> GribError {
    GribError::Unpacking(error.to_string())
}
