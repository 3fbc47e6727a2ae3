//! Tagged binary telemetry log format.
//!
//! A telemetry file is laid out as:
//!
//! ```text
//! [header map][record]*[dictionary][u64 dictionary offset]
//! ```
//!
//! All integers are little-endian. Names are stored once, in the trailing
//! dictionary, and referenced everywhere else by a compact `u16` tag.
//!
//! This crate provides:
//! - [`KeyDictionary`]: the trailing name/tag index
//! - [`TaggedMap`] and [`TaggedValue`]: runtime-typed attribute maps
//! - [`RecordStream`]: forward iteration over the record body
//! - [`FileHeader`]: the file-level bindings every file must carry
//! - [`TelemetryWriter`]: an encoder producing the same format

pub mod dictionary;
pub mod error;
pub mod header;
pub mod reader;
pub mod record;
pub mod tagged_map;
pub mod value;
pub mod writer;

pub use dictionary::KeyDictionary;
pub use error::{FormatError, Result};
pub use header::FileHeader;
pub use reader::BodyReader;
pub use record::{RecordLayout, RecordStream, TelemetryRecord};
pub use tagged_map::TaggedMap;
pub use value::{TaggedValue, ValueKind};
pub use writer::{TelemetryWriter, STANDARD_KEYS};

/// Size of the trailer holding the dictionary offset.
pub const TRAILER_LEN: u64 = 8;

/// Size of a fixed hash payload.
pub const HASH_LEN: usize = 32;
