//! Decoding is zero-copy: an [`ObjectReader`] borrows the input bytes and
//! hands out slices of them. The first access walks the object's field
//! sequence once, validating every size prefix against the enclosing region
//! and collecting a tag index; the index memoizes scalar values inline and
//! records buffer offsets for everything else, so later lookups are a single
//! hash probe. A walk that runs out of bounds or meets an unknown type byte
//! poisons the whole object: `is_valid` turns false and every read returns
//! `None`. Multibyte values are converted from their little-endian wire shape
//! at each access, which keeps the borrowed buffer untouched.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use crate::arrays::{BinaryArrayReader, FixedArray, ObjectArrayReader, StringArrayReader};
use crate::error::DecodeError;
use crate::tag::Tag;
use crate::types::{BaseType, Classification, DataType, Element};

const SIZE_PREFIX: usize = 4;

#[derive(Clone, Copy)]
enum Payload {
    /// A scalar value parked in the index during the validation walk.
    Bits(u64),
    /// Offset of the payload within the field region, pointing at the
    /// size or length prefix where the wire carries one.
    At(usize),
}

#[derive(Clone, Copy)]
struct Entry {
    ty: DataType,
    payload: Payload,
}

enum Index<'a> {
    Name(HashMap<&'a [u8], Entry>),
    Id(HashMap<u16, Entry>),
}

enum Key<'a> {
    Name(&'a [u8]),
    Id(u16),
}

struct RawField<'a> {
    key: Key<'a>,
    ty: DataType,
    payload: Payload,
}

/// In-order walk over a field region. Fused on the first error.
struct RawFields<'a> {
    region: &'a [u8],
    pos: usize,
    name_based: bool,
    done: bool,
}

impl<'a> RawFields<'a> {
    fn new(region: &'a [u8], name_based: bool) -> Self {
        RawFields { region, pos: 0, name_based, done: false }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Eof)?;
        if end > self.region.len() {
            return Err(DecodeError::Eof);
        }
        let bytes = &self.region[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn parse_field(&mut self) -> Result<RawField<'a>, DecodeError> {
        let ty_byte = self.take(1)?[0];
        let ty = DataType::from_byte(ty_byte);
        if !ty.is_valid() {
            return Err(DecodeError::Type(ty_byte));
        }
        let key = if self.name_based {
            let len = self.take(1)?[0] as usize;
            Key::Name(self.take(len)?)
        } else {
            Key::Id(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
        };
        let payload = match ty.classification() {
            Some(Classification::Raw) => {
                let base = ty.base();
                if base.is_scalar() {
                    Payload::Bits(le_bits(self.take(base.size())?))
                } else {
                    match base {
                        BaseType::Uuid => {
                            let at = self.pos;
                            self.take(16)?;
                            Payload::At(at)
                        }
                        BaseType::String => {
                            let at = self.pos;
                            let len = u16::from_le_bytes(self.take(2)?.try_into().unwrap());
                            self.take(len as usize)?;
                            Payload::At(at)
                        }
                        _ => {
                            // Binary and Object share the u32 size prefix
                            let at = self.pos;
                            let size = u32::from_le_bytes(self.take(4)?.try_into().unwrap());
                            self.take(size as usize)?;
                            Payload::At(at)
                        }
                    }
                }
            }
            Some(Classification::Vector2)
            | Some(Classification::Vector3)
            | Some(Classification::Vector4) => {
                let at = self.pos;
                self.take(ty.vector_dim() * ty.base().size())?;
                Payload::At(at)
            }
            Some(Classification::Array) => {
                let at = self.pos;
                let size = u32::from_le_bytes(self.take(4)?.try_into().unwrap());
                self.take(size as usize)?;
                Payload::At(at)
            }
            None => unreachable!(),
        };
        Ok(RawField { key, ty, payload })
    }
}

impl<'a> Iterator for RawFields<'a> {
    type Item = Result<RawField<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.region.len() {
            return None;
        }
        match self.parse_field() {
            Ok(field) => Some(Ok(field)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn le_bits(bytes: &[u8]) -> u64 {
    match bytes.len() {
        1 => bytes[0] as u64,
        2 => u16::from_le_bytes(bytes.try_into().unwrap()) as u64,
        4 => u32::from_le_bytes(bytes.try_into().unwrap()) as u64,
        _ => u64::from_le_bytes(bytes.try_into().unwrap()),
    }
}

fn build_index(region: &[u8], name_based: bool) -> Result<Index<'_>, DecodeError> {
    let mut index = if name_based {
        Index::Name(HashMap::new())
    } else {
        Index::Id(HashMap::new())
    };
    for field in RawFields::new(region, name_based) {
        let field = field?;
        let entry = Entry { ty: field.ty, payload: field.payload };
        // duplicate tags: the later occurrence wins
        match (&mut index, field.key) {
            (Index::Name(map), Key::Name(name)) => {
                map.insert(name, entry);
            }
            (Index::Id(map), Key::Id(id)) => {
                map.insert(id, entry);
            }
            _ => unreachable!(),
        }
    }
    Ok(index)
}

/// A decoded view of one object: the root of a buffer, a nested object field
/// or an object array element. All returned slices borrow from the buffer the
/// root was constructed over and stay alive as long as it does.
pub struct ObjectReader<'a> {
    region: &'a [u8],
    name_based: bool,
    index: OnceCell<Result<Index<'a>, DecodeError>>,
}

impl<'a> ObjectReader<'a> {
    /// Reads the root object of `buffer`. The buffer must start with the
    /// object's `u32` size prefix; bytes beyond the object are ignored. An
    /// undersized buffer yields a reader that is permanently invalid.
    pub fn new(buffer: &'a [u8], name_based: bool) -> Self {
        match Self::root_region(buffer) {
            Some(region) => Self::from_region(region, name_based),
            None => {
                let index = OnceCell::new();
                let _ = index.set(Err(DecodeError::Eof));
                ObjectReader { region: &[], name_based, index }
            }
        }
    }

    fn root_region(buffer: &'a [u8]) -> Option<&'a [u8]> {
        let size = u32::from_le_bytes(buffer.get(..SIZE_PREFIX)?.try_into().unwrap()) as usize;
        let end = SIZE_PREFIX.checked_add(size)?;
        buffer.get(SIZE_PREFIX..end)
    }

    pub(crate) fn from_region(region: &'a [u8], name_based: bool) -> Self {
        ObjectReader { region, name_based, index: OnceCell::new() }
    }

    fn index(&self) -> Result<&Index<'a>, DecodeError> {
        match self.index.get_or_init(|| build_index(self.region, self.name_based)) {
            Ok(index) => Ok(index),
            Err(e) => Err(*e),
        }
    }

    /// Triggers the validation walk on first call.
    pub fn is_valid(&self) -> bool {
        self.index().is_ok()
    }

    /// Like [`is_valid`](Self::is_valid), but reports why a walk failed.
    pub fn validate(&self) -> Result<(), DecodeError> {
        self.index().map(|_| ())
    }

    fn entry(&self, tag: Tag<'_>) -> Option<Entry> {
        match self.index().ok()? {
            Index::Name(map) => map.get(tag.name()?.as_bytes()).copied(),
            Index::Id(map) => map.get(&tag.id()).copied(),
        }
    }

    pub fn contains(&self, tag: Tag<'_>) -> bool {
        self.entry(tag).is_some()
    }

    pub fn type_of(&self, tag: Tag<'_>) -> Option<DataType> {
        self.entry(tag).map(|entry| entry.ty)
    }

    /// Every tag of this object, in no particular order. Name-based tags
    /// whose wire bytes are not UTF-8 are skipped.
    pub fn tags(&self) -> Vec<Tag<'a>> {
        match self.index() {
            Err(_) => Vec::new(),
            Ok(Index::Name(map)) => map
                .keys()
                .filter_map(|name| std::str::from_utf8(name).ok())
                .map(Tag::from_name)
                .collect(),
            Ok(Index::Id(map)) => map.keys().copied().map(Tag::from_id).collect(),
        }
    }

    fn scalar<T: Element>(&self, tag: Tag<'_>, ty: DataType) -> Option<T> {
        let entry = self.entry(tag)?;
        if entry.ty != ty {
            return None;
        }
        match entry.payload {
            Payload::Bits(bits) => Some(T::from_bits(bits)),
            Payload::At(_) => None,
        }
    }

    fn payload_at(&self, tag: Tag<'_>, ty: DataType) -> Option<usize> {
        let entry = self.entry(tag)?;
        if entry.ty != ty {
            return None;
        }
        match entry.payload {
            Payload::At(at) => Some(at),
            Payload::Bits(_) => None,
        }
    }

    /// The bytes behind a `u32` size prefix. In bounds by construction: the
    /// validation walk checked the prefix against the region.
    fn sized_payload(&self, tag: Tag<'_>, ty: DataType) -> Option<&'a [u8]> {
        let at = self.payload_at(tag, ty)?;
        let size = u32::from_le_bytes(self.region[at..at + 4].try_into().unwrap()) as usize;
        Some(&self.region[at + 4..at + 4 + size])
    }

    pub fn read_i8(&self, tag: Tag<'_>) -> Option<i8> {
        self.scalar(tag, DataType::INT8)
    }

    pub fn read_i16(&self, tag: Tag<'_>) -> Option<i16> {
        self.scalar(tag, DataType::INT16)
    }

    pub fn read_i32(&self, tag: Tag<'_>) -> Option<i32> {
        self.scalar(tag, DataType::INT32)
    }

    pub fn read_i64(&self, tag: Tag<'_>) -> Option<i64> {
        self.scalar(tag, DataType::INT64)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u8(&self, tag: Tag<'_>) -> Option<u8> {
        self.scalar(tag, DataType::UINT8)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u16(&self, tag: Tag<'_>) -> Option<u16> {
        self.scalar(tag, DataType::UINT16)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u32(&self, tag: Tag<'_>) -> Option<u32> {
        self.scalar(tag, DataType::UINT32)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u64(&self, tag: Tag<'_>) -> Option<u64> {
        self.scalar(tag, DataType::UINT64)
    }

    pub fn read_bool(&self, tag: Tag<'_>) -> Option<bool> {
        self.scalar(tag, DataType::BOOLEAN)
    }

    /// Raw half precision bits, uninterpreted.
    pub fn read_f16(&self, tag: Tag<'_>) -> Option<u16> {
        self.scalar(tag, DataType::FLOAT16)
    }

    pub fn read_f32(&self, tag: Tag<'_>) -> Option<f32> {
        self.scalar(tag, DataType::FLOAT32)
    }

    pub fn read_f64(&self, tag: Tag<'_>) -> Option<f64> {
        self.scalar(tag, DataType::FLOAT64)
    }

    /// `None` for absent tags, type mismatches and payloads that are not
    /// valid UTF-8.
    pub fn read_str(&self, tag: Tag<'_>) -> Option<&'a str> {
        let at = self.payload_at(tag, DataType::STRING)?;
        let len = u16::from_le_bytes(self.region[at..at + 2].try_into().unwrap()) as usize;
        std::str::from_utf8(&self.region[at + 2..at + 2 + len]).ok()
    }

    pub fn read_bytes(&self, tag: Tag<'_>) -> Option<&'a [u8]> {
        self.sized_payload(tag, DataType::BINARY)
    }

    pub fn read_uuid(&self, tag: Tag<'_>) -> Option<&'a [u8; 16]> {
        let at = self.payload_at(tag, DataType::UUID)?;
        self.region[at..at + 16].try_into().ok()
    }

    /// A reader over a nested object field, inheriting the tag mode.
    pub fn read_object(&self, tag: Tag<'_>) -> Option<ObjectReader<'a>> {
        let payload = self.sized_payload(tag, DataType::OBJECT)?;
        Some(ObjectReader::from_region(payload, self.name_based))
    }

    fn fixed_array<T: Element>(&self, tag: Tag<'_>, ty: DataType) -> Option<FixedArray<'a, T>> {
        let payload = self.sized_payload(tag, ty)?;
        if payload.len() % T::SIZE != 0 {
            return None;
        }
        Some(FixedArray::new(payload))
    }

    pub fn read_i8_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, i8>> {
        self.fixed_array(tag, DataType::INT8_ARRAY)
    }

    pub fn read_i16_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, i16>> {
        self.fixed_array(tag, DataType::INT16_ARRAY)
    }

    pub fn read_i32_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, i32>> {
        self.fixed_array(tag, DataType::INT32_ARRAY)
    }

    pub fn read_i64_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, i64>> {
        self.fixed_array(tag, DataType::INT64_ARRAY)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u8_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, u8>> {
        self.fixed_array(tag, DataType::UINT8_ARRAY)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u16_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, u16>> {
        self.fixed_array(tag, DataType::UINT16_ARRAY)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u32_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, u32>> {
        self.fixed_array(tag, DataType::UINT32_ARRAY)
    }

    #[deprecated(note = "unsigned integer fields are deprecated in the wire format; prefer the signed variants")]
    pub fn read_u64_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, u64>> {
        self.fixed_array(tag, DataType::UINT64_ARRAY)
    }

    pub fn read_bool_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, bool>> {
        self.fixed_array(tag, DataType::BOOLEAN_ARRAY)
    }

    pub fn read_f16_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, u16>> {
        self.fixed_array(tag, DataType::FLOAT16_ARRAY)
    }

    pub fn read_f32_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, f32>> {
        self.fixed_array(tag, DataType::FLOAT32_ARRAY)
    }

    pub fn read_f64_array(&self, tag: Tag<'_>) -> Option<FixedArray<'a, f64>> {
        self.fixed_array(tag, DataType::FLOAT64_ARRAY)
    }

    pub fn read_str_array(&self, tag: Tag<'_>) -> Option<StringArrayReader<'a>> {
        let payload = self.sized_payload(tag, DataType::STRING_ARRAY)?;
        Some(StringArrayReader::new(payload))
    }

    pub fn read_bytes_array(&self, tag: Tag<'_>) -> Option<BinaryArrayReader<'a>> {
        let payload = self.sized_payload(tag, DataType::BINARY_ARRAY)?;
        Some(BinaryArrayReader::new(payload))
    }

    pub fn read_object_array(&self, tag: Tag<'_>) -> Option<ObjectArrayReader<'a>> {
        let payload = self.sized_payload(tag, DataType::OBJECT_ARRAY)?;
        Some(ObjectArrayReader::new(payload, self.name_based))
    }

    fn vector<T: Element, const N: usize>(&self, tag: Tag<'_>, ty: DataType) -> Option<[T; N]> {
        let at = self.payload_at(tag, ty)?;
        let bytes = &self.region[at..at + N * T::SIZE];
        Some(std::array::from_fn(|i| {
            T::read_le(&bytes[i * T::SIZE..(i + 1) * T::SIZE])
        }))
    }

    pub fn read_vector2_i8(&self, tag: Tag<'_>) -> Option<[i8; 2]> {
        self.vector(tag, DataType::VECTOR2_I8)
    }

    pub fn read_vector2_i16(&self, tag: Tag<'_>) -> Option<[i16; 2]> {
        self.vector(tag, DataType::VECTOR2_I16)
    }

    pub fn read_vector2_i32(&self, tag: Tag<'_>) -> Option<[i32; 2]> {
        self.vector(tag, DataType::VECTOR2_I32)
    }

    pub fn read_vector2_i64(&self, tag: Tag<'_>) -> Option<[i64; 2]> {
        self.vector(tag, DataType::VECTOR2_I64)
    }

    pub fn read_vector2_bool(&self, tag: Tag<'_>) -> Option<[bool; 2]> {
        self.vector(tag, DataType::VECTOR2_BOOL)
    }

    pub fn read_vector2_f16(&self, tag: Tag<'_>) -> Option<[u16; 2]> {
        self.vector(tag, DataType::VECTOR2_F16)
    }

    pub fn read_vector2_f32(&self, tag: Tag<'_>) -> Option<[f32; 2]> {
        self.vector(tag, DataType::VECTOR2_F32)
    }

    pub fn read_vector2_f64(&self, tag: Tag<'_>) -> Option<[f64; 2]> {
        self.vector(tag, DataType::VECTOR2_F64)
    }

    pub fn read_vector3_i8(&self, tag: Tag<'_>) -> Option<[i8; 3]> {
        self.vector(tag, DataType::VECTOR3_I8)
    }

    pub fn read_vector3_i16(&self, tag: Tag<'_>) -> Option<[i16; 3]> {
        self.vector(tag, DataType::VECTOR3_I16)
    }

    pub fn read_vector3_i32(&self, tag: Tag<'_>) -> Option<[i32; 3]> {
        self.vector(tag, DataType::VECTOR3_I32)
    }

    pub fn read_vector3_i64(&self, tag: Tag<'_>) -> Option<[i64; 3]> {
        self.vector(tag, DataType::VECTOR3_I64)
    }

    pub fn read_vector3_bool(&self, tag: Tag<'_>) -> Option<[bool; 3]> {
        self.vector(tag, DataType::VECTOR3_BOOL)
    }

    pub fn read_vector3_f16(&self, tag: Tag<'_>) -> Option<[u16; 3]> {
        self.vector(tag, DataType::VECTOR3_F16)
    }

    pub fn read_vector3_f32(&self, tag: Tag<'_>) -> Option<[f32; 3]> {
        self.vector(tag, DataType::VECTOR3_F32)
    }

    pub fn read_vector3_f64(&self, tag: Tag<'_>) -> Option<[f64; 3]> {
        self.vector(tag, DataType::VECTOR3_F64)
    }

    pub fn read_vector4_i8(&self, tag: Tag<'_>) -> Option<[i8; 4]> {
        self.vector(tag, DataType::VECTOR4_I8)
    }

    pub fn read_vector4_i16(&self, tag: Tag<'_>) -> Option<[i16; 4]> {
        self.vector(tag, DataType::VECTOR4_I16)
    }

    pub fn read_vector4_i32(&self, tag: Tag<'_>) -> Option<[i32; 4]> {
        self.vector(tag, DataType::VECTOR4_I32)
    }

    pub fn read_vector4_i64(&self, tag: Tag<'_>) -> Option<[i64; 4]> {
        self.vector(tag, DataType::VECTOR4_I64)
    }

    pub fn read_vector4_bool(&self, tag: Tag<'_>) -> Option<[bool; 4]> {
        self.vector(tag, DataType::VECTOR4_BOOL)
    }

    pub fn read_vector4_f16(&self, tag: Tag<'_>) -> Option<[u16; 4]> {
        self.vector(tag, DataType::VECTOR4_F16)
    }

    pub fn read_vector4_f32(&self, tag: Tag<'_>) -> Option<[f32; 4]> {
        self.vector(tag, DataType::VECTOR4_F32)
    }

    pub fn read_vector4_f64(&self, tag: Tag<'_>) -> Option<[f64; 4]> {
        self.vector(tag, DataType::VECTOR4_F64)
    }

    // ---- canonical text rendering ----

    fn fmt_field(&self, field: &RawField<'a>) -> String {
        let key = match field.key {
            Key::Name(name) => String::from_utf8_lossy(name).into_owned(),
            Key::Id(id) => format!("@{}", id),
        };
        format!("{}: {} = {},", key, field.ty, self.fmt_value(field))
    }

    fn fmt_value(&self, field: &RawField<'a>) -> String {
        match (field.ty.classification(), field.payload) {
            (Some(Classification::Raw), Payload::Bits(bits)) => fmt_scalar(field.ty.base(), bits),
            (Some(Classification::Raw), Payload::At(at)) => match field.ty.base() {
                BaseType::Uuid => uuid_string(&self.region[at..at + 16]),
                BaseType::String => {
                    let len =
                        u16::from_le_bytes(self.region[at..at + 2].try_into().unwrap()) as usize;
                    quote(&String::from_utf8_lossy(&self.region[at + 2..at + 2 + len]))
                }
                BaseType::Binary => format!("'{}'", b64(self.sized_bytes(at))),
                _ => ObjectReader::from_region(self.sized_bytes(at), self.name_based).to_string(),
            },
            (Some(Classification::Array), Payload::At(at)) => {
                let payload = self.sized_bytes(at);
                match field.ty.base() {
                    BaseType::String => {
                        let items: Vec<String> =
                            StringArrayReader::new(payload).iter().map(|s| quote(s)).collect();
                        format!("[{}]", items.join(", "))
                    }
                    BaseType::Binary => {
                        let items: Vec<String> = BinaryArrayReader::new(payload)
                            .iter()
                            .map(|bytes| format!("'{}'", b64(bytes)))
                            .collect();
                        format!("[{}]", items.join(", "))
                    }
                    BaseType::Object => {
                        let items: Vec<String> = ObjectArrayReader::new(payload, self.name_based)
                            .iter()
                            .map(|object| object.to_string())
                            .collect();
                        format!("[{}]", items.join(", "))
                    }
                    base => fmt_fixed_array(base, payload),
                }
            }
            (Some(_), Payload::At(at)) => {
                let base = field.ty.base();
                let size = base.size();
                let items: Vec<String> = (0..field.ty.vector_dim())
                    .map(|i| fmt_scalar(base, le_bits(&self.region[at + i * size..at + (i + 1) * size])))
                    .collect();
                format!("<{}>", items.join(", "))
            }
            _ => unreachable!(),
        }
    }

    fn sized_bytes(&self, at: usize) -> &'a [u8] {
        let size = u32::from_le_bytes(self.region[at..at + 4].try_into().unwrap()) as usize;
        &self.region[at + 4..at + 4 + size]
    }
}

fn fmt_scalar(base: BaseType, bits: u64) -> String {
    match base {
        BaseType::Int8 => (bits as u8 as i8).to_string(),
        BaseType::Int16 => (bits as u16 as i16).to_string(),
        BaseType::Int32 => (bits as u32 as i32).to_string(),
        BaseType::Int64 => (bits as i64).to_string(),
        BaseType::UInt8 => (bits as u8).to_string(),
        BaseType::UInt16 => (bits as u16).to_string(),
        BaseType::UInt32 => (bits as u32).to_string(),
        BaseType::UInt64 => bits.to_string(),
        BaseType::Boolean => if bits != 0 { "true" } else { "false" }.to_string(),
        BaseType::Float16 => (bits as u16).to_string(),
        BaseType::Float32 => f32::from_bits(bits as u32).to_string(),
        BaseType::Float64 => f64::from_bits(bits).to_string(),
        _ => unreachable!(),
    }
}

fn fmt_fixed_array(base: BaseType, payload: &[u8]) -> String {
    let size = base.size();
    if size == 0 || payload.len() % size != 0 {
        return "[]".to_string();
    }
    let items: Vec<String> = if base == BaseType::Uuid {
        payload.chunks(size).map(uuid_string).collect()
    } else {
        payload.chunks(size).map(|chunk| fmt_scalar(base, le_bits(chunk))).collect()
    };
    format!("[{}]", items.join(", "))
}

fn quote(value: &str) -> String {
    format!(
        "\"{}\"",
        value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
    )
}

fn uuid_string(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|byte| format!("{:02x}", byte)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex[0..4].join(""),
        hex[4..6].join(""),
        hex[6..8].join(""),
        hex[8..10].join(""),
        hex[10..16].join(""),
    )
}

fn b64(input: &[u8]) -> String {
    const CHAR_SET: &[char] = &[
        'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
        'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
        'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1',
        '2', '3', '4', '5', '6', '7', '8', '9', '+', '/',
    ];
    let mut array = [0; 4];
    input
        .chunks(3)
        .flat_map(|chunk| {
            let len = chunk.len();
            array[1..1 + len].copy_from_slice(chunk);
            for i in 0..(3 - len) {
                array[3 - i] = 0;
            }
            let x = u32::from_be_bytes(array);
            (0..=len)
                .map(move |o| CHAR_SET[(x >> (18 - 6 * o) & 0x3f) as usize])
                .chain(std::iter::repeat('=').take(3 - len))
        })
        .collect()
}

/// The canonical textual rendering: fields in wire order, one per line,
/// nested objects indented. Invalid objects render as `(invalid)`.
impl fmt::Display for ObjectReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("(invalid)");
        }
        let fields: Vec<String> = RawFields::new(self.region, self.name_based)
            .filter_map(|field| field.ok())
            .map(|field| self.fmt_field(&field))
            .collect();
        if fields.is_empty() {
            return f.write_str("()");
        }
        write!(
            f,
            "(\n{}\n)",
            fields
                .iter()
                .flat_map(|field| field.lines().map(|line| format!("  {}", line)))
                .collect::<Vec<String>>()
                .join("\n")
        )
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::ObjectReader;
    use crate::error::DecodeError;
    use crate::tag::Tag;
    use crate::types::DataType;
    use crate::writer::Writer;

    fn decode(buf: &[u8]) -> ObjectReader<'_> {
        ObjectReader::new(buf, true)
    }

    #[test]
    fn primitives_roundtrip() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i8(Tag::new("int8"), -100);
            root.field_i32(Tag::new("int32"), -123456789);
            root.field_u64(Tag::new("uint64"), 12345678901234567890);
            root.field_f32(Tag::new("float32"), 3.14159);
            root.field_bool(Tag::new("flag"), true);
            root.field_str(Tag::new("greeting"), "Hello, TBF!").unwrap();
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        assert!(reader.is_valid());
        assert_eq!(reader.read_i8(Tag::new("int8")), Some(-100));
        assert_eq!(reader.read_i32(Tag::new("int32")), Some(-123456789));
        assert_eq!(reader.read_u64(Tag::new("uint64")), Some(12345678901234567890));
        assert_eq!(reader.read_f32(Tag::new("float32")), Some(3.14159));
        assert_eq!(reader.read_bool(Tag::new("flag")), Some(true));
        assert_eq!(reader.read_str(Tag::new("greeting")), Some("Hello, TBF!"));
        // same tag, wrong width
        assert_eq!(reader.read_i16(Tag::new("int8")), None);
        assert_eq!(reader.read_u8(Tag::new("int8")), None);
        assert_eq!(reader.read_i64(Tag::new("uint64")), None);
        // absent tag
        assert_eq!(reader.read_i8(Tag::new("missing")), None);
        assert!(!reader.contains(Tag::new("missing")));
        assert_eq!(reader.type_of(Tag::new("int8")), Some(DataType::INT8));
    }

    #[test]
    fn extreme_values_survive_bit_exactly() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i64(Tag::new("min"), i64::MIN);
            root.field_i64(Tag::new("max"), i64::MAX);
            root.field_u64(Tag::new("umax"), u64::MAX);
            root.field_f64(Tag::new("neg_zero"), -0.0);
            root.field_f64(Tag::new("nan"), f64::from_bits(0x7FF8_0000_0000_1234));
            root.field_f32(Tag::new("nan32"), f32::from_bits(0x7FC0_0001));
            root.field_f16(Tag::new("half"), 0x3C00);
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        assert_eq!(reader.read_i64(Tag::new("min")), Some(i64::MIN));
        assert_eq!(reader.read_i64(Tag::new("max")), Some(i64::MAX));
        assert_eq!(reader.read_u64(Tag::new("umax")), Some(u64::MAX));
        assert_eq!(reader.read_f64(Tag::new("neg_zero")).map(f64::to_bits), Some((-0.0f64).to_bits()));
        assert_eq!(
            reader.read_f64(Tag::new("nan")).map(f64::to_bits),
            Some(0x7FF8_0000_0000_1234)
        );
        assert_eq!(reader.read_f32(Tag::new("nan32")).map(f32::to_bits), Some(0x7FC0_0001));
        assert_eq!(reader.read_f16(Tag::new("half")), Some(0x3C00));
    }

    #[test]
    fn nested_objects() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            let mut user = root.field_object(Tag::new("user"));
            user.field_i32(Tag::new("id"), 12345);
            user.field_str(Tag::new("name"), "John Doe").unwrap();
            let mut settings = user.field_object(Tag::new("settings"));
            settings.field_str(Tag::new("theme"), "dark").unwrap();
            settings.field_bool(Tag::new("notifications"), true);
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        let user = reader.read_object(Tag::new("user")).unwrap();
        assert_eq!(user.read_i32(Tag::new("id")), Some(12345));
        assert_eq!(user.read_str(Tag::new("name")), Some("John Doe"));
        let settings = user.read_object(Tag::new("settings")).unwrap();
        assert_eq!(settings.read_str(Tag::new("theme")), Some("dark"));
        assert_eq!(settings.read_bool(Tag::new("notifications")), Some(true));
        // a nested object is not a string
        assert_eq!(reader.read_str(Tag::new("user")), None);
    }

    #[test]
    fn uuid_and_bytes() {
        let uuid = [
            0x67, 0xE5, 0x50, 0x44, 0x10, 0xB1, 0x42, 0x6F, 0x92, 0x47, 0xBB, 0x68, 0x0E, 0x5F,
            0xE0, 0xC8,
        ];
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_uuid(Tag::new("device"), &uuid);
            root.field_bytes(Tag::new("blob"), &[1, 2, 3, 255]).unwrap();
            root.field_bytes(Tag::new("empty"), &[]).unwrap();
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        assert_eq!(reader.read_uuid(Tag::new("device")), Some(&uuid));
        assert_eq!(reader.read_bytes(Tag::new("blob")), Some(&[1u8, 2, 3, 255][..]));
        assert_eq!(reader.read_bytes(Tag::new("empty")), Some(&[][..]));
        assert_eq!(reader.read_bytes(Tag::new("device")), None);
    }

    #[test]
    fn vectors() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_vector3_f32(Tag::new("vec3_f32"), [1.1, 2.2, 3.3]);
            root.field_vector2_i64(Tag::new("span"), [-1, 1]);
            root.field_vector4_bool(Tag::new("mask"), [true, false, false, true]);
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        assert_eq!(reader.read_vector3_f32(Tag::new("vec3_f32")), Some([1.1, 2.2, 3.3]));
        assert_eq!(reader.read_vector2_i64(Tag::new("span")), Some([-1, 1]));
        assert_eq!(
            reader.read_vector4_bool(Tag::new("mask")),
            Some([true, false, false, true])
        );
        // wrong dimension and wrong base are both mismatches
        assert_eq!(reader.read_vector2_f32(Tag::new("vec3_f32")), None);
        assert_eq!(reader.read_vector3_i32(Tag::new("vec3_f32")), None);
    }

    #[test]
    fn id_mode_roundtrip() {
        let mut writer = Writer::new(false);
        {
            let mut root = writer.root();
            root.field_i8(Tag::new("int8"), -100);
            root.field_str(Tag::new("greeting"), "Hello, TBF!").unwrap();
            root.field_f64(Tag::new("ratio"), 0.5);
        }
        let buf = writer.finish();
        let reader = ObjectReader::new(&buf, false);
        assert!(reader.is_valid());
        assert_eq!(reader.read_i8(Tag::new("int8")), Some(-100));
        assert_eq!(reader.read_str(Tag::new("greeting")), Some("Hello, TBF!"));
        assert_eq!(reader.read_f64(Tag::new("ratio")), Some(0.5));
        // ids survive case folding, names would not
        assert_eq!(reader.read_i8(Tag::new("INT8")), Some(-100));
        // a nameless lookup tag works in id mode
        assert_eq!(reader.read_f64(Tag::from_id(Tag::new("ratio").id())), Some(0.5));
        // a name-only lookup tag cannot address an id-based stream
        assert_eq!(reader.read_i8(Tag::from_name("int8")), None);
    }

    #[test]
    fn truncated_buffers_are_invalid() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i32(Tag::new("a"), 1);
            root.field_str(Tag::new("b"), "payload").unwrap();
        }
        let buf = writer.finish();
        for cut in 0..buf.len() {
            let reader = decode(&buf[..cut]);
            assert!(!reader.is_valid(), "prefix of {} bytes decoded", cut);
            assert_eq!(reader.read_i32(Tag::new("a")), None);
        }
        assert!(decode(&buf).is_valid());
    }

    #[test]
    fn trailing_slack_is_ignored() {
        let mut writer = Writer::new(true);
        writer.root().field_i32(Tag::new("a"), 7);
        let mut buf = writer.finish();
        buf.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let reader = decode(&buf);
        assert!(reader.is_valid());
        assert_eq!(reader.read_i32(Tag::new("a")), Some(7));
    }

    #[test]
    fn structural_errors_poison_every_read() {
        // an unknown type byte aborts the walk even though "a" parsed fine
        let mut writer = Writer::new(true);
        writer.root().field_i32(Tag::new("a"), 7);
        let mut buf = writer.finish();
        buf.extend_from_slice(&[0x50, 1, b'b']);
        let size = (buf.len() - 4) as u32;
        buf[..4].copy_from_slice(&size.to_le_bytes());
        let reader = decode(&buf);
        assert!(!reader.is_valid());
        assert_eq!(reader.validate(), Err(DecodeError::Type(0x50)));
        assert_eq!(reader.read_i32(Tag::new("a")), None);
    }

    #[test]
    fn size_prefix_overruns_are_eof() {
        // a string length reaching past the object end
        let buf = [5, 0, 0, 0, 0x0D, 1, b's', 0xFF, 0x00];
        let reader = decode(&buf);
        assert_eq!(reader.validate(), Err(DecodeError::Eof));
        // the root size reaching past the supplied span
        let reader = decode(&[10, 0, 0, 0, 0x08]);
        assert_eq!(reader.validate(), Err(DecodeError::Eof));
        // no room for the root size prefix at all
        assert_eq!(decode(&[1, 2]).validate(), Err(DecodeError::Eof));
    }

    #[test]
    fn empty_object_is_valid() {
        let reader = decode(&[0, 0, 0, 0]);
        assert!(reader.is_valid());
        assert!(!reader.contains(Tag::new("anything")));
        assert!(reader.tags().is_empty());
    }

    #[test]
    fn duplicate_tags_last_wins() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i32(Tag::new("a"), 1);
            root.field_i32(Tag::new("a"), 2);
            root.field_i32(Tag::new("b"), 3);
            root.field_str(Tag::new("b"), "three").unwrap();
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        assert_eq!(reader.read_i32(Tag::new("a")), Some(2));
        assert_eq!(reader.read_i32(Tag::new("b")), None);
        assert_eq!(reader.read_str(Tag::new("b")), Some("three"));
    }

    #[test]
    fn tags_lists_every_field() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i32(Tag::new("alpha"), 1);
            root.field_bool(Tag::new("beta"), false);
        }
        let buf = writer.finish();
        let reader = decode(&buf);
        let mut names: Vec<&str> = reader.tags().iter().filter_map(|tag| tag.name()).collect();
        names.sort_unstable();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[test]
    fn display_renders_fields_in_wire_order() {
        let mut writer = Writer::new(true);
        {
            let mut root = writer.root();
            root.field_i32(Tag::new("id"), 7);
            root.field_str(Tag::new("name"), "Ada").unwrap();
            let mut settings = root.field_object(Tag::new("settings"));
            settings.field_str(Tag::new("theme"), "dark").unwrap();
        }
        let buf = writer.finish();
        assert_eq!(
            decode(&buf).to_string(),
            "(\n  id: i32 = 7,\n  name: str = \"Ada\",\n  settings: obj = (\n    theme: str = \"dark\",\n  ),\n)"
        );
    }

    #[test]
    fn display_of_invalid_and_empty_objects() {
        assert_eq!(decode(&[9, 9, 9, 9]).to_string(), "(invalid)");
        assert_eq!(decode(&[0, 0, 0, 0]).to_string(), "()");
    }

    #[test]
    fn display_in_id_mode() {
        let mut writer = Writer::new(false);
        writer.root().field_bool(Tag::with_id(77, "flag"), true);
        let buf = writer.finish();
        let reader = ObjectReader::new(&buf, false);
        assert_eq!(reader.to_string(), "(\n  @77: bool = true,\n)");
    }
}
