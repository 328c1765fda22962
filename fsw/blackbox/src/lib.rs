//! Conversion of self-describing binary sensor logs into CSV.
//!
//! A log starts with a text header declaring every sensor and the typed
//! fields of its packets, followed by a binary stream of timestamped packets.
//! [`convert_file`] turns one log into a sparse CSV table with one column block
//! per sensor; [`euler`] optionally rewrites the IMU quaternion as Euler
//! angles.

pub mod config;
pub mod convert;
pub mod decode;
pub mod error;
pub mod euler;
pub mod header;
pub mod schema;
pub mod table;

pub use config::Config;
pub use convert::{BatchReport, Conversion, FileOutcome, convert_batch, convert_file};
pub use decode::{DecodeStats, DecodedRow, PacketDecoder};
pub use error::Error;
pub use header::read_header;
pub use schema::{FieldDescriptor, PrimitiveType, SensorDescriptor, Value, parse_sensor_line};
pub use table::{CsvLayout, Table};
