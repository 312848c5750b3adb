//! An implementation of the Tagged Binary Format: a compact, self-describing
//! binary representation of records whose fields are addressed by tags.
//! Producers assemble an object field by field through a [`Writer`], nesting
//! objects and arrays as they go; consumers hand the resulting bytes to an
//! [`ObjectReader`], which indexes the object once on first access and then
//! answers tag lookups in constant time, returning borrowed slices of the
//! input wherever the wire layout allows it.
//!
//! Tags travel in one of two modes, fixed per buffer: name-based streams
//! spell out each field name, id-based streams send a 16-bit hash-derived id
//! instead. Both sides must agree on the mode; see [`Tag`] for how ids are
//! derived.
//!
//! # Example
//!
//! ```
//! use tbf::{ObjectReader, Tag, Writer};
//!
//! const ID: Tag = Tag::new("id");
//!
//! let mut writer = Writer::new(true);
//! writer.root().field_i32(ID, 7);
//! let buf = writer.finish();
//! assert_eq!(buf, [
//!     8, 0, 0, 0,    // root object size
//!     0x02,          // Int32
//!     2, b'i', b'd', // tag name
//!     7, 0, 0, 0,    // value, little-endian
//! ]);
//!
//! let reader = ObjectReader::new(&buf, true);
//! assert!(reader.is_valid());
//! assert_eq!(reader.read_i32(ID), Some(7));
//! assert_eq!(reader.read_i16(ID), None); // wrong type, not an error
//! ```
//!
//! # A note on endianness
//!
//! The wire format is little-endian throughout. Values are converted at the
//! point where they cross the buffer boundary, so on little-endian hosts both
//! directions compile down to plain copies and the input buffer is never
//! modified by reads.
//!
//! # A note on validity
//!
//! A reader validates the entire field sequence of its object during the
//! first access and either ends up valid or permanently poisoned; there is no
//! partial success. Tag-level problems, like a missing tag or a type other
//! than the one asked for, are not errors: the affected read returns `None`
//! and everything else is untouched.

mod arrays;
mod error;
mod reader;
mod tag;
mod types;
mod writer;

pub use arrays::*;
pub use error::*;
pub use reader::*;
pub use tag::*;
pub use types::*;
pub use writer::*;
