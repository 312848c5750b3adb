//! Encoding is a single forward pass over a growable buffer. A [`Writer`]
//! owns the buffer and the tag mode; the field operations live on
//! [`ObjectWriter`], which represents one open object scope. Objects and the
//! three variable-element array kinds reserve a four byte size slot when they
//! open and patch the final size into it when they close. Closing happens on
//! drop, so a scope that goes out of scope without an explicit
//! [`ObjectWriter::finish`] still leaves a consistent buffer behind. Because
//! every sub-writer mutably borrows its parent, the borrow checker enforces
//! that scopes are closed innermost first and that a parent is never written
//! to while one of its children is open.

use crate::error::EncodeError;
use crate::tag::{check_name, Tag};
use crate::types::{DataType, Element};

const MIN_GROW_SIZE: usize = 1024;
const DEFAULT_GROW_SIZE: usize = 1024 * 1024;
const SIZE_SLOT: usize = 4;

/// Owns the output buffer of one encoding run.
///
/// The root object's size slot is reserved at construction; [`Writer::root`]
/// hands out the scope that fields are written through and
/// [`Writer::finish`] patches the root size and releases the buffer.
pub struct Writer {
    buf: Vec<u8>,
    grow_size: usize,
    name_based: bool,
}

impl Writer {
    /// A writer with the default grow step of 1 MiB.
    pub fn new(name_based: bool) -> Self {
        Self::with_grow_size(name_based, DEFAULT_GROW_SIZE)
    }

    /// A writer that grows its buffer in steps of `grow_size` bytes, clamped
    /// to a 1 KiB minimum.
    pub fn with_grow_size(name_based: bool, grow_size: usize) -> Self {
        let grow_size = grow_size.max(MIN_GROW_SIZE);
        let mut buf = Vec::with_capacity(grow_size);
        buf.extend_from_slice(&[0; SIZE_SLOT]);
        Writer { buf, grow_size, name_based }
    }

    /// The root object scope. May be taken repeatedly; each handle re-patches
    /// the root size when it closes, so fields can be appended in bursts.
    pub fn root(&mut self) -> ObjectWriter<'_> {
        ObjectWriter { writer: self, size_slot: 0, closed: false }
    }

    /// Patches the root size slot and hands back the finished buffer.
    pub fn finish(mut self) -> Vec<u8> {
        self.patch_size(0);
        self.buf
    }

    /// The buffer as written so far. The root size slot is only patched by
    /// [`Writer::finish`], so this view is raw while the root is still open.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn reserve(&mut self, additional: usize) {
        if self.buf.capacity() - self.buf.len() < additional {
            let grow = if additional > self.grow_size {
                additional + self.grow_size
            } else {
                self.grow_size
            };
            self.buf.reserve_exact(self.buf.capacity() - self.buf.len() + grow);
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.reserve(1);
        self.buf.push(byte);
    }

    fn push_bytes(&mut self, data: &[u8]) {
        self.reserve(data.len());
        self.buf.extend_from_slice(data);
    }

    fn reserve_size_slot(&mut self) -> usize {
        let slot = self.buf.len();
        self.push_bytes(&[0; SIZE_SLOT]);
        slot
    }

    fn patch_size(&mut self, slot: usize) {
        let size = (self.buf.len() - slot - SIZE_SLOT) as u32;
        self.buf[slot..slot + SIZE_SLOT].copy_from_slice(&size.to_le_bytes());
    }

    fn field_header(&mut self, tag: Tag<'_>, ty: DataType) {
        self.push_byte(ty.byte());
        if self.name_based {
            let name = tag.name().unwrap_or("");
            debug_assert!(
                check_name(name).is_ok(),
                "tag must carry a valid name in a name-based writer"
            );
            self.push_byte(name.len() as u8);
            self.push_bytes(name.as_bytes());
        } else {
            debug_assert!(tag.has_id(), "tag must carry an id in an id-based writer");
            self.push_bytes(&tag.id().to_le_bytes());
        }
    }

    fn push_string(&mut self, value: &str) -> Result<(), EncodeError> {
        if value.len() > u16::MAX as usize {
            return Err(EncodeError::Length(value.len()));
        }
        self.push_bytes(&(value.len() as u16).to_le_bytes());
        self.push_bytes(value.as_bytes());
        Ok(())
    }

    fn push_binary(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        if value.len() > u32::MAX as usize {
            return Err(EncodeError::Length(value.len()));
        }
        self.push_bytes(&(value.len() as u32).to_le_bytes());
        self.push_bytes(value);
        Ok(())
    }
}

/// One open object scope: the root object, a nested object field or an
/// element of an object array.
pub struct ObjectWriter<'w> {
    writer: &'w mut Writer,
    size_slot: usize,
    closed: bool,
}

impl<'w> ObjectWriter<'w> {
    fn open(writer: &'w mut Writer) -> Self {
        let size_slot = writer.reserve_size_slot();
        ObjectWriter { writer, size_slot, closed: false }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.writer.patch_size(self.size_slot);
        }
    }

    /// Closes the scope. Dropping the writer has the same effect; this form
    /// exists to make the end of a scope visible in the caller.
    pub fn finish(mut self) {
        self.close();
    }

    fn scalar<T: Element>(&mut self, tag: Tag<'_>, ty: DataType, value: T) {
        self.writer.field_header(tag, ty);
        self.writer.reserve(T::SIZE);
        value.write_le(&mut self.writer.buf);
    }

    fn vector<T: Element, const N: usize>(&mut self, tag: Tag<'_>, ty: DataType, values: [T; N]) {
        self.writer.field_header(tag, ty);
        self.writer.reserve(N * T::SIZE);
        for value in values {
            value.write_le(&mut self.writer.buf);
        }
    }

    fn array<T: Element>(&mut self, tag: Tag<'_>, ty: DataType, values: &[T]) -> Result<(), EncodeError> {
        let size = values
            .len()
            .checked_mul(T::SIZE)
            .filter(|size| *size <= u32::MAX as usize)
            .ok_or(EncodeError::Length(values.len()))?;
        self.writer.field_header(tag, ty);
        self.writer.reserve(SIZE_SLOT + size);
        self.writer.buf.extend_from_slice(&(size as u32).to_le_bytes());
        for value in values {
            value.write_le(&mut self.writer.buf);
        }
        Ok(())
    }

    pub fn field_i8(&mut self, tag: Tag<'_>, value: i8) {
        self.scalar(tag, DataType::INT8, value);
    }

    pub fn field_i16(&mut self, tag: Tag<'_>, value: i16) {
        self.scalar(tag, DataType::INT16, value);
    }

    pub fn field_i32(&mut self, tag: Tag<'_>, value: i32) {
        self.scalar(tag, DataType::INT32, value);
    }

    pub fn field_i64(&mut self, tag: Tag<'_>, value: i64) {
        self.scalar(tag, DataType::INT64, value);
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u8(&mut self, tag: Tag<'_>, value: u8) {
        self.scalar(tag, DataType::UINT8, value);
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u16(&mut self, tag: Tag<'_>, value: u16) {
        self.scalar(tag, DataType::UINT16, value);
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u32(&mut self, tag: Tag<'_>, value: u32) {
        self.scalar(tag, DataType::UINT32, value);
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u64(&mut self, tag: Tag<'_>, value: u64) {
        self.scalar(tag, DataType::UINT64, value);
    }

    pub fn field_bool(&mut self, tag: Tag<'_>, value: bool) {
        self.scalar(tag, DataType::BOOLEAN, value);
    }

    /// Raw IEEE-754 half precision bits; the format assigns them no further
    /// meaning and neither does this crate.
    pub fn field_f16(&mut self, tag: Tag<'_>, bits: u16) {
        self.scalar(tag, DataType::FLOAT16, bits);
    }

    /// Stored as its raw bit pattern, so NaN payloads survive the trip.
    pub fn field_f32(&mut self, tag: Tag<'_>, value: f32) {
        self.scalar(tag, DataType::FLOAT32, value);
    }

    pub fn field_f64(&mut self, tag: Tag<'_>, value: f64) {
        self.scalar(tag, DataType::FLOAT64, value);
    }

    pub fn field_uuid(&mut self, tag: Tag<'_>, uuid: &[u8; 16]) {
        self.writer.field_header(tag, DataType::UUID);
        self.writer.push_bytes(uuid);
    }

    /// Fails with [`EncodeError::Length`] beyond 65535 bytes; nothing is
    /// written in that case.
    pub fn field_str(&mut self, tag: Tag<'_>, value: &str) -> Result<(), EncodeError> {
        if value.len() > u16::MAX as usize {
            return Err(EncodeError::Length(value.len()));
        }
        self.writer.field_header(tag, DataType::STRING);
        self.writer.push_string(value)
    }

    pub fn field_bytes(&mut self, tag: Tag<'_>, value: &[u8]) -> Result<(), EncodeError> {
        if value.len() > u32::MAX as usize {
            return Err(EncodeError::Length(value.len()));
        }
        self.writer.field_header(tag, DataType::BINARY);
        self.writer.push_binary(value)
    }

    /// Opens a nested object scope.
    pub fn field_object(&mut self, tag: Tag<'_>) -> ObjectWriter<'_> {
        self.writer.field_header(tag, DataType::OBJECT);
        ObjectWriter::open(self.writer)
    }

    pub fn field_i8_array(&mut self, tag: Tag<'_>, values: &[i8]) -> Result<(), EncodeError> {
        self.array(tag, DataType::INT8_ARRAY, values)
    }

    pub fn field_i16_array(&mut self, tag: Tag<'_>, values: &[i16]) -> Result<(), EncodeError> {
        self.array(tag, DataType::INT16_ARRAY, values)
    }

    pub fn field_i32_array(&mut self, tag: Tag<'_>, values: &[i32]) -> Result<(), EncodeError> {
        self.array(tag, DataType::INT32_ARRAY, values)
    }

    pub fn field_i64_array(&mut self, tag: Tag<'_>, values: &[i64]) -> Result<(), EncodeError> {
        self.array(tag, DataType::INT64_ARRAY, values)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u8_array(&mut self, tag: Tag<'_>, values: &[u8]) -> Result<(), EncodeError> {
        self.array(tag, DataType::UINT8_ARRAY, values)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u16_array(&mut self, tag: Tag<'_>, values: &[u16]) -> Result<(), EncodeError> {
        self.array(tag, DataType::UINT16_ARRAY, values)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u32_array(&mut self, tag: Tag<'_>, values: &[u32]) -> Result<(), EncodeError> {
        self.array(tag, DataType::UINT32_ARRAY, values)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn field_u64_array(&mut self, tag: Tag<'_>, values: &[u64]) -> Result<(), EncodeError> {
        self.array(tag, DataType::UINT64_ARRAY, values)
    }

    pub fn field_bool_array(&mut self, tag: Tag<'_>, values: &[bool]) -> Result<(), EncodeError> {
        self.array(tag, DataType::BOOLEAN_ARRAY, values)
    }

    pub fn field_f16_array(&mut self, tag: Tag<'_>, bits: &[u16]) -> Result<(), EncodeError> {
        self.array(tag, DataType::FLOAT16_ARRAY, bits)
    }

    pub fn field_f32_array(&mut self, tag: Tag<'_>, values: &[f32]) -> Result<(), EncodeError> {
        self.array(tag, DataType::FLOAT32_ARRAY, values)
    }

    pub fn field_f64_array(&mut self, tag: Tag<'_>, values: &[f64]) -> Result<(), EncodeError> {
        self.array(tag, DataType::FLOAT64_ARRAY, values)
    }

    /// Opens a string array scope; elements are appended through
    /// [`StringArrayWriter::push`].
    pub fn field_str_array(&mut self, tag: Tag<'_>) -> StringArrayWriter<'_> {
        self.writer.field_header(tag, DataType::STRING_ARRAY);
        let size_slot = self.writer.reserve_size_slot();
        StringArrayWriter { writer: &mut *self.writer, size_slot, closed: false }
    }

    /// Writes a whole string array in one call. All elements are checked
    /// against the `u16` length prefix before anything reaches the buffer.
    pub fn field_str_values(&mut self, tag: Tag<'_>, values: &[&str]) -> Result<(), EncodeError> {
        if let Some(value) = values.iter().find(|value| value.len() > u16::MAX as usize) {
            return Err(EncodeError::Length(value.len()));
        }
        let mut array = self.field_str_array(tag);
        for value in values {
            array.push(value)?;
        }
        Ok(())
    }

    /// Opens a binary array scope; elements are appended through
    /// [`BinaryArrayWriter::push`].
    pub fn field_bytes_array(&mut self, tag: Tag<'_>) -> BinaryArrayWriter<'_> {
        self.writer.field_header(tag, DataType::BINARY_ARRAY);
        let size_slot = self.writer.reserve_size_slot();
        BinaryArrayWriter { writer: &mut *self.writer, size_slot, closed: false }
    }

    /// Writes a whole binary array in one call.
    pub fn field_bytes_values(&mut self, tag: Tag<'_>, values: &[&[u8]]) -> Result<(), EncodeError> {
        if let Some(value) = values.iter().find(|value| value.len() > u32::MAX as usize) {
            return Err(EncodeError::Length(value.len()));
        }
        let mut array = self.field_bytes_array(tag);
        for value in values {
            array.push(value)?;
        }
        Ok(())
    }

    /// Opens an object array scope; elements are opened through
    /// [`ObjectArrayWriter::element`].
    pub fn field_object_array(&mut self, tag: Tag<'_>) -> ObjectArrayWriter<'_> {
        self.writer.field_header(tag, DataType::OBJECT_ARRAY);
        let size_slot = self.writer.reserve_size_slot();
        ObjectArrayWriter { writer: &mut *self.writer, size_slot, closed: false }
    }

    // Vectors carry no size prefix; the element count is part of the type.

    pub fn field_vector2_i8(&mut self, tag: Tag<'_>, values: [i8; 2]) {
        self.vector(tag, DataType::VECTOR2_I8, values);
    }

    pub fn field_vector2_i16(&mut self, tag: Tag<'_>, values: [i16; 2]) {
        self.vector(tag, DataType::VECTOR2_I16, values);
    }

    pub fn field_vector2_i32(&mut self, tag: Tag<'_>, values: [i32; 2]) {
        self.vector(tag, DataType::VECTOR2_I32, values);
    }

    pub fn field_vector2_i64(&mut self, tag: Tag<'_>, values: [i64; 2]) {
        self.vector(tag, DataType::VECTOR2_I64, values);
    }

    pub fn field_vector2_bool(&mut self, tag: Tag<'_>, values: [bool; 2]) {
        self.vector(tag, DataType::VECTOR2_BOOL, values);
    }

    pub fn field_vector2_f16(&mut self, tag: Tag<'_>, bits: [u16; 2]) {
        self.vector(tag, DataType::VECTOR2_F16, bits);
    }

    pub fn field_vector2_f32(&mut self, tag: Tag<'_>, values: [f32; 2]) {
        self.vector(tag, DataType::VECTOR2_F32, values);
    }

    pub fn field_vector2_f64(&mut self, tag: Tag<'_>, values: [f64; 2]) {
        self.vector(tag, DataType::VECTOR2_F64, values);
    }

    pub fn field_vector3_i8(&mut self, tag: Tag<'_>, values: [i8; 3]) {
        self.vector(tag, DataType::VECTOR3_I8, values);
    }

    pub fn field_vector3_i16(&mut self, tag: Tag<'_>, values: [i16; 3]) {
        self.vector(tag, DataType::VECTOR3_I16, values);
    }

    pub fn field_vector3_i32(&mut self, tag: Tag<'_>, values: [i32; 3]) {
        self.vector(tag, DataType::VECTOR3_I32, values);
    }

    pub fn field_vector3_i64(&mut self, tag: Tag<'_>, values: [i64; 3]) {
        self.vector(tag, DataType::VECTOR3_I64, values);
    }

    pub fn field_vector3_bool(&mut self, tag: Tag<'_>, values: [bool; 3]) {
        self.vector(tag, DataType::VECTOR3_BOOL, values);
    }

    pub fn field_vector3_f16(&mut self, tag: Tag<'_>, bits: [u16; 3]) {
        self.vector(tag, DataType::VECTOR3_F16, bits);
    }

    pub fn field_vector3_f32(&mut self, tag: Tag<'_>, values: [f32; 3]) {
        self.vector(tag, DataType::VECTOR3_F32, values);
    }

    pub fn field_vector3_f64(&mut self, tag: Tag<'_>, values: [f64; 3]) {
        self.vector(tag, DataType::VECTOR3_F64, values);
    }

    pub fn field_vector4_i8(&mut self, tag: Tag<'_>, values: [i8; 4]) {
        self.vector(tag, DataType::VECTOR4_I8, values);
    }

    pub fn field_vector4_i16(&mut self, tag: Tag<'_>, values: [i16; 4]) {
        self.vector(tag, DataType::VECTOR4_I16, values);
    }

    pub fn field_vector4_i32(&mut self, tag: Tag<'_>, values: [i32; 4]) {
        self.vector(tag, DataType::VECTOR4_I32, values);
    }

    pub fn field_vector4_i64(&mut self, tag: Tag<'_>, values: [i64; 4]) {
        self.vector(tag, DataType::VECTOR4_I64, values);
    }

    pub fn field_vector4_bool(&mut self, tag: Tag<'_>, values: [bool; 4]) {
        self.vector(tag, DataType::VECTOR4_BOOL, values);
    }

    pub fn field_vector4_f16(&mut self, tag: Tag<'_>, bits: [u16; 4]) {
        self.vector(tag, DataType::VECTOR4_F16, bits);
    }

    pub fn field_vector4_f32(&mut self, tag: Tag<'_>, values: [f32; 4]) {
        self.vector(tag, DataType::VECTOR4_F32, values);
    }

    pub fn field_vector4_f64(&mut self, tag: Tag<'_>, values: [f64; 4]) {
        self.vector(tag, DataType::VECTOR4_F64, values);
    }
}

impl Drop for ObjectWriter<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open string array scope. Elements are length-prefixed with a `u16`.
pub struct StringArrayWriter<'w> {
    writer: &'w mut Writer,
    size_slot: usize,
    closed: bool,
}

impl StringArrayWriter<'_> {
    pub fn push(&mut self, value: &str) -> Result<(), EncodeError> {
        self.writer.push_string(value)
    }

    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.writer.patch_size(self.size_slot);
        }
    }
}

impl Drop for StringArrayWriter<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open binary array scope. Elements are size-prefixed with a `u32`.
pub struct BinaryArrayWriter<'w> {
    writer: &'w mut Writer,
    size_slot: usize,
    closed: bool,
}

impl BinaryArrayWriter<'_> {
    pub fn push(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        self.writer.push_binary(value)
    }

    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.writer.patch_size(self.size_slot);
        }
    }
}

impl Drop for BinaryArrayWriter<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open object array scope. Every element is a full object with its own
/// size slot and field sequence.
pub struct ObjectArrayWriter<'w> {
    writer: &'w mut Writer,
    size_slot: usize,
    closed: bool,
}

impl ObjectArrayWriter<'_> {
    pub fn element(&mut self) -> ObjectWriter<'_> {
        ObjectWriter::open(self.writer)
    }

    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.writer.patch_size(self.size_slot);
        }
    }
}

impl Drop for ObjectArrayWriter<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;
    use crate::error::EncodeError;
    use crate::tag::Tag;

    #[test]
    fn empty_root() {
        let writer = Writer::new(true);
        assert_eq!(writer.finish(), [0, 0, 0, 0]);
    }

    #[test]
    fn name_mode_layout() {
        let mut writer = Writer::new(true);
        writer.root().field_i8(Tag::new("a"), -5);
        assert_eq!(writer.finish(), [
            4, 0, 0, 0,    // root size
            0x00,          // Int8
            1, b'a',       // tag name
            0xFB,          // -5
        ]);
    }

    #[test]
    fn id_mode_layout() {
        let mut writer = Writer::new(false);
        writer.root().field_i16(Tag::new("a"), 300);
        assert_eq!(writer.finish(), [
            5, 0, 0, 0,    // root size
            0x01,          // Int16
            0x8C, 0x5B,    // id of "a"
            0x2C, 0x01,    // 300
        ]);
    }

    #[test]
    fn string_layout() {
        let mut writer = Writer::new(true);
        writer.root().field_str(Tag::new("s"), "hi").unwrap();
        assert_eq!(writer.finish(), [
            7, 0, 0, 0,
            0x0D,          // String
            1, b's',
            2, 0,          // length
            b'h', b'i',
        ]);
    }

    #[test]
    fn nested_object_backpatch_on_drop() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            let mut object = root.field_object(Tag::new("o"));
            object.field_bool(Tag::new("b"), true);
            // neither scope is finished explicitly
        }
        assert_eq!(writer.finish(), [
            11, 0, 0, 0,
            0x0F,          // Object
            1, b'o',
            4, 0, 0, 0,    // object size
            0x08,          // Boolean
            1, b'b',
            1,
        ]);
    }

    #[test]
    fn fixed_array_layout() {
        let mut writer = Writer::new(true);
        writer.root().field_i16_array(Tag::new("a"), &[1, -1]).unwrap();
        assert_eq!(writer.finish(), [
            11, 0, 0, 0,
            0xA1,          // Int16Array
            1, b'a',
            4, 0, 0, 0,    // size = 2 * 2
            1, 0,
            0xFF, 0xFF,
        ]);
    }

    #[test]
    fn vector_layout() {
        let mut writer = Writer::new(true);
        writer.root().field_vector3_f32(Tag::new("v"), [1.0, 1.0, 1.0]);
        let buf = writer.finish();
        assert_eq!(buf[..7], [15, 0, 0, 0, 0x3A, 1, b'v']);
        assert_eq!(buf[7..11], 1.0f32.to_bits().to_le_bytes());
        assert_eq!(buf.len(), 4 + 15);
    }

    #[test]
    fn string_array_scope() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            let mut array = root.field_str_array(Tag::new("a"));
            array.push("x").unwrap();
            array.push("yz").unwrap();
        }
        assert_eq!(writer.finish(), [
            14, 0, 0, 0,
            0xAD,          // StringArray
            1, b'a',
            7, 0, 0, 0,    // array size
            1, 0, b'x',
            2, 0, b'y', b'z',
        ]);
    }

    #[test]
    fn binary_array_scope() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            let mut array = root.field_bytes_array(Tag::new("a"));
            array.push(&[0xAB]).unwrap();
            array.finish();
        }
        assert_eq!(writer.finish(), [
            12, 0, 0, 0,
            0xAE,          // BinaryArray
            1, b'a',
            5, 0, 0, 0,
            1, 0, 0, 0, 0xAB,
        ]);
    }

    #[test]
    fn oversized_string_is_rejected_before_writing() {
        let big = "x".repeat(u16::MAX as usize + 1);
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            assert_eq!(
                root.field_str(Tag::new("s"), &big),
                Err(EncodeError::Length(65536))
            );
            assert_eq!(
                root.field_str_values(Tag::new("a"), &[big.as_str()]),
                Err(EncodeError::Length(65536))
            );
        }
        // the failed fields left no trace, not even a header
        assert_eq!(writer.finish(), [0, 0, 0, 0]);
    }

    #[test]
    fn reopening_the_root_appends() {
        let mut writer = Writer::new(true);
        writer.root().field_i8(Tag::new("a"), 1);
        writer.root().field_i8(Tag::new("b"), 2);
        let buf = writer.finish();
        assert_eq!(buf[..4], [8, 0, 0, 0]);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn grow_size_is_clamped() {
        // a tiny grow hint must not break large writes
        let mut writer = Writer::with_grow_size(true, 1);
        let payload = vec![0u8; 8 * 1024];
        writer.root().field_bytes(Tag::new("b"), &payload).unwrap();
        let buf = writer.finish();
        assert_eq!(buf.len(), 4 + 1 + 1 + 1 + 4 + payload.len());
    }
}
