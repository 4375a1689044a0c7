//! Native GRIB reader (WMO FM 92 GRIB Editions 1 and 2).
//!
//! This crate frames the messages of a GRIB file, parses their sections and
//! exposes each field as an ordered list of ecCodes-style keys. Data values
//! are only unpacked on request ([`Field::decode_values`]): simple packing
//! and constant fields natively, other GRIB2 packings through the `grib`
//! crate.
//!
//! ```no_run
//! use grib_parser::{GribReader, ParameterTables};
//!
//! let tables = ParameterTables::builtin();
//! let mut reader = GribReader::from_path("gfs.grib2".as_ref())?;
//! while let Some(message) = reader.next_message()? {
//!     for field in message.fields()? {
//!         let keys = field.keys(&tables);
//!         let grid = field.decode_values()?;
//!         println!("{:?}: {} values", keys.value("shortName"), grid.values.len());
//!     }
//! }
//! # Ok::<(), grib_parser::GribError>(())
//! ```

pub mod error;
pub mod grib1;
pub mod keys;
pub mod reader;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use error::{GribError, Result};
pub use keys::{DataKey, GridValues, KeyEntry, KeyValue, KeyedField};
pub use reader::{Field, GribMessage, GribReader};
pub use tables::{ParameterEntry, ParameterTables};
