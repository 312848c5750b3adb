use std::fmt::{Display, Formatter, self};

/// Raised by encoding operations whose payload cannot be represented on wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodeError {
    /// A string exceeded the `u16` length prefix or a binary payload or
    /// fixed-element array exceeded the `u32` size prefix.
    Length(usize),
}

impl std::error::Error for EncodeError {}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            EncodeError::Length(value) => write!(f, "Couldn't encode length {}: exceeds limit", value),
        }
    }
}

/// Raised by the validation pass over a decoded object. Readers never surface
/// this directly; a failed validation marks the whole object invalid and every
/// read on it returns `None`. The recorded cause is available through
/// [`ObjectReader::validate`](crate::ObjectReader::validate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeError {
    /// A size or length prefix reached past the end of the enclosing region,
    /// or the region itself reached past the end of the supplied buffer.
    Eof,
    /// A type byte outside the valid set.
    Type(u8),
}

impl std::error::Error for DecodeError {}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            DecodeError::Eof => f.write_str("Unexpected end of buffer while decoding"),
            DecodeError::Type(t) => write!(f, "Unexpected type byte {:#04x} while decoding field", t),
        }
    }
}

/// Raised by [`Tag::try_new`](crate::Tag::try_new) for names that cannot
/// appear on wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TagError {
    Empty,
    TooLong(usize),
    Char(char),
    ReservedId,
}

impl std::error::Error for TagError {}

impl Display for TagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TagError::Empty => f.write_str("Tag names must not be empty"),
            TagError::TooLong(len) => write!(f, "Tag name of {} bytes exceeds the 255 byte limit", len),
            TagError::Char(c) => write!(f, "Tag names may only contain [A-Za-z0-9_], found {:?}", c),
            TagError::ReservedId => f.write_str("Tag id 0 is reserved"),
        }
    }
}
