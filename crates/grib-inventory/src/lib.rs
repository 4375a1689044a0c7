//! Record extraction, inventory and parameter lookup over GRIB files.
//!
//! Four operations read a GRIB file through a [`Decoder`]:
//!
//! - [`inventory`]: one fixed-column line per message
//! - [`get_record`]: every non-excluded key of one message
//! - [`get_parameter_names`]: the name-key value of each message
//! - [`get_parameter`]: the records whose name-key value equals a string
//!
//! The free functions use the [`NativeDecoder`]. [`Inspector`] runs the same
//! operations over any decoder with a shared [`InspectConfig`].
//!
//! ```no_run
//! use grib_inventory::{get_parameter, DecoderOptions, LookupOptions, ParameterMatch};
//!
//! let result = get_parameter("gfs.grib2", "Temperature", &LookupOptions::default(), DecoderOptions::default())?;
//! if let ParameterMatch::Single(record) = result {
//!     println!("{:?}", record["level"]);
//! }
//! # Ok::<(), grib_inventory::InspectError>(())
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod inspector;
pub mod inventory;
pub mod lookup;
pub mod value;

use std::path::Path;

pub use config::InspectConfig;
pub use decoder::{
    Decoder, DecoderError, DecoderOptions, GribFile, MemoryDecoder, MemoryMessage, MessageHandle,
    NativeDecoder,
};
pub use error::{InspectError, Result};
pub use extract::RecordExtractor;
pub use filter::{KeyFilter, EXCLUDED_KEYS};
pub use index::{NameKey, ParameterName, ParameterNameList};
pub use inspector::{Inspector, RecordRequest};
pub use inventory::{Inventory, InventoryEntry, InventoryHeader};
pub use lookup::{LookupOptions, ParameterMatch};
pub use value::{Record, Scalar, Value};

fn native(options: DecoderOptions) -> Inspector<NativeDecoder> {
    let config = InspectConfig {
        multi_field_support: options.multi_field_support,
        ..InspectConfig::default()
    };
    Inspector::new(NativeDecoder::default(), config)
}

/// Inventory of a GRIB file.
pub fn inventory<P: AsRef<Path>>(path: P, options: DecoderOptions) -> Result<Inventory> {
    native(options).inventory(path.as_ref())
}

/// Record of the message at `request.index`.
pub fn get_record<P: AsRef<Path>>(
    path: P,
    request: &RecordRequest,
    options: DecoderOptions,
) -> Result<Record> {
    native(options).get_record(path.as_ref(), request)
}

/// Name-key value of every message carrying the key.
pub fn get_parameter_names<P: AsRef<Path>>(
    path: P,
    name_key: NameKey,
    options: DecoderOptions,
) -> Result<ParameterNameList> {
    native(options).get_parameter_names(path.as_ref(), name_key)
}

/// Records whose name-key value equals `parameter`.
pub fn get_parameter<P: AsRef<Path>>(
    path: P,
    parameter: &str,
    lookup: &LookupOptions,
    options: DecoderOptions,
) -> Result<ParameterMatch> {
    native(options).get_parameter(path.as_ref(), parameter, lookup)
}
