//! Common test fixtures for GRIB inspection tests.
//!
//! Each fixture writes a small multi-message file into a caller-owned
//! directory (usually a `tempfile::TempDir`) and returns its path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::generators::{Grib1Builder, Grib2Builder};

/// Write the concatenation of `messages` to `dir/name`.
pub fn write_messages(dir: &Path, name: &str, messages: &[Vec<u8>]) -> PathBuf {
    let path = dir.join(name);
    let bytes: Vec<u8> = messages.iter().flatten().copied().collect();
    fs::write(&path, bytes).expect("Failed to write fixture file");
    path
}

/// 2 m temperature, GRIB2
pub fn temperature_2m() -> Vec<u8> {
    Grib2Builder::new_gfs().with_gradient(270.0, 300.0).build()
}

/// Surface CAPE, GRIB1 (parameterName "157")
pub fn cape_surface() -> Vec<u8> {
    Grib1Builder::new_cape().build()
}

/// Relative humidity at 500 hPa, GRIB2
pub fn relative_humidity_500() -> Vec<u8> {
    Grib2Builder::new_gfs()
        .with_parameter(1, 1)
        .with_level(100, 50_000)
        .with_gradient(10.0, 90.0)
        .build()
}

/// A parameter missing from every table: no `units` key, `name` = "unknown"
pub fn unknown_parameter() -> Vec<u8> {
    Grib2Builder::new_gfs()
        .with_parameter(250, 250)
        .with_level(1, 0)
        .with_constant_value(1.0)
        .build()
}

/// Temperature and relative humidity sharing one GRIB2 message.
pub fn multi_field_message() -> Vec<u8> {
    Grib2Builder::build_multi_field(&[
        Grib2Builder::new_gfs().with_level(100, 85_000),
        Grib2Builder::new_gfs()
            .with_parameter(1, 1)
            .with_level(100, 85_000)
            .with_constant_value(55.0),
    ])
}

/// Three messages: GRIB2 temperature, GRIB1 CAPE, GRIB2 relative humidity.
pub fn three_message_file(dir: &Path) -> PathBuf {
    write_messages(
        dir,
        "three_messages.grib",
        &[temperature_2m(), cape_surface(), relative_humidity_500()],
    )
}

/// A single GRIB2 message holding two fields, followed by GRIB1 CAPE.
pub fn multi_field_file(dir: &Path) -> PathBuf {
    write_messages(
        dir,
        "multi_field.grib2",
        &[multi_field_message(), cape_surface()],
    )
}

/// Temperature followed by a parameter the tables do not know.
pub fn unknown_parameter_file(dir: &Path) -> PathBuf {
    write_messages(
        dir,
        "unknown_parameter.grib2",
        &[temperature_2m(), unknown_parameter()],
    )
}

/// A constant temperature field (288.15 K) written with packing `template`.
pub fn constant_packing_file(dir: &Path, template: u16) -> PathBuf {
    write_messages(
        dir,
        &format!("constant_{}.grib2", template),
        &[Grib2Builder::new_gfs().with_packing_template(template).build()],
    )
}

/// The 2 m temperature gradient (270 K to 300 K) PNG packed, template 5.41.
pub fn png_packing_file(dir: &Path) -> PathBuf {
    write_messages(
        dir,
        "png_packing.grib2",
        &[Grib2Builder::new_gfs()
            .with_packing_template(41)
            .with_gradient(270.0, 300.0)
            .build()],
    )
}

/// Temperature whose Section 3 declares 2^32 - 1 points over a 4x3 grid.
pub fn oversized_grid_file(dir: &Path) -> PathBuf {
    write_messages(
        dir,
        "oversized_grid.grib2",
        &[Grib2Builder::new_gfs().with_declared_points(u32::MAX).build()],
    )
}

/// A file whose only message is cut short.
pub fn truncated_file(dir: &Path) -> PathBuf {
    let mut message = temperature_2m();
    message.truncate(message.len() / 2);
    write_messages(dir, "truncated.grib2", &[message])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_message_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = three_message_file(dir.path());
        let bytes = fs::read(&path).unwrap();

        let magic = bytes.windows(4).filter(|w| *w == b"GRIB").count();
        assert_eq!(magic, 3);
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
    }

    #[test]
    fn test_truncated_file_is_shorter() {
        let dir = tempfile::tempdir().unwrap();
        let path = truncated_file(dir.path());
        assert!(fs::metadata(&path).unwrap().len() < temperature_2m().len() as u64);
    }
}
