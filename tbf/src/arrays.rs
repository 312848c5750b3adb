//! Array views handed out by the reader. Fixed-element arrays become a
//! [`FixedArray`], a typed window over the raw element bytes. The three
//! variable-element kinds get dedicated readers that walk their payload once
//! at construction to count elements and check that the length-prefixed
//! elements tile the payload exactly; a reader that fails this check is
//! permanently empty. The element count is not stored on wire, so that single
//! walk is also what makes `len` cheap afterwards.

use std::fmt;
use std::marker::PhantomData;

use crate::reader::ObjectReader;
use crate::types::Element;

/// A zero-copy view over the elements of a fixed-element array. Elements are
/// decoded from their little-endian wire shape on access.
pub struct FixedArray<'a, T: Element> {
    bytes: &'a [u8],
    _elem: PhantomData<T>,
}

impl<'a, T: Element> FixedArray<'a, T> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() % T::SIZE == 0);
        FixedArray { bytes, _elem: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        Some(T::read_le(&self.bytes[index * T::SIZE..(index + 1) * T::SIZE]))
    }

    pub fn iter(&self) -> FixedArrayIter<'a, T> {
        FixedArrayIter { bytes: self.bytes, _elem: PhantomData }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// The raw little-endian element bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a, T: Element> IntoIterator for &FixedArray<'a, T> {
    type Item = T;
    type IntoIter = FixedArrayIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for FixedArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct FixedArrayIter<'a, T: Element> {
    bytes: &'a [u8],
    _elem: PhantomData<T>,
}

impl<T: Element> Iterator for FixedArrayIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.bytes.is_empty() {
            return None;
        }
        let (head, tail) = self.bytes.split_at(T::SIZE);
        self.bytes = tail;
        Some(T::read_le(head))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.bytes.len() / T::SIZE;
        (len, Some(len))
    }
}

impl<T: Element> ExactSizeIterator for FixedArrayIter<'_, T> {}

fn prefix_len(bytes: &[u8], width: usize) -> usize {
    if width == 2 {
        u16::from_le_bytes(bytes[..2].try_into().unwrap()) as usize
    } else {
        u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize
    }
}

/// Walks a variable-element payload once. Returns the element count if the
/// prefix-delimited elements end exactly at the payload end.
fn count_elements(payload: &[u8], width: usize) -> Option<usize> {
    let mut pos = 0;
    let mut count = 0;
    while pos < payload.len() {
        let end = pos.checked_add(width)?;
        if end > payload.len() {
            return None;
        }
        pos = end.checked_add(prefix_len(&payload[pos..], width))?;
        if pos > payload.len() {
            return None;
        }
        count += 1;
    }
    Some(count)
}

/// Elements of a string array field. Each element is a `u16` length prefix
/// followed by UTF-8 bytes; an element that is not valid UTF-8 invalidates
/// the whole array.
pub struct StringArrayReader<'a> {
    payload: &'a [u8],
    count: usize,
    valid: bool,
}

impl<'a> StringArrayReader<'a> {
    pub(crate) fn new(payload: &'a [u8]) -> Self {
        let count = count_elements(payload, 2).filter(|_| {
            let mut pos = 0;
            while pos < payload.len() {
                let len = prefix_len(&payload[pos..], 2);
                if std::str::from_utf8(&payload[pos + 2..pos + 2 + len]).is_err() {
                    return false;
                }
                pos += 2 + len;
            }
            true
        });
        match count {
            Some(count) => StringArrayReader { payload, count, valid: true },
            None => StringArrayReader { payload: &[], count: 0, valid: false },
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Walks from the start; elements are not random-access on wire.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> StringArrayIter<'a> {
        StringArrayIter { rest: self.payload, remaining: self.count }
    }
}

impl<'a> IntoIterator for &StringArrayReader<'a> {
    type Item = &'a str;
    type IntoIter = StringArrayIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct StringArrayIter<'a> {
    rest: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for StringArrayIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let len = prefix_len(self.rest, 2);
        let value = std::str::from_utf8(&self.rest[2..2 + len]).ok()?;
        self.rest = &self.rest[2 + len..];
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StringArrayIter<'_> {}

/// Elements of a binary array field: `u32` size prefix plus raw bytes.
pub struct BinaryArrayReader<'a> {
    payload: &'a [u8],
    count: usize,
    valid: bool,
}

impl<'a> BinaryArrayReader<'a> {
    pub(crate) fn new(payload: &'a [u8]) -> Self {
        match count_elements(payload, 4) {
            Some(count) => BinaryArrayReader { payload, count, valid: true },
            None => BinaryArrayReader { payload: &[], count: 0, valid: false },
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> BinaryArrayIter<'a> {
        BinaryArrayIter { rest: self.payload, remaining: self.count }
    }
}

impl<'a> IntoIterator for &BinaryArrayReader<'a> {
    type Item = &'a [u8];
    type IntoIter = BinaryArrayIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct BinaryArrayIter<'a> {
    rest: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for BinaryArrayIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let len = prefix_len(self.rest, 4);
        let value = &self.rest[4..4 + len];
        self.rest = &self.rest[4 + len..];
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BinaryArrayIter<'_> {}

/// Elements of an object array field. Every element is a complete object
/// (`u32` size prefix plus field sequence) and is handed out as its own
/// reader, inheriting the parent's tag mode. The element walk only checks the
/// size prefixes; each element validates its own fields lazily like any other
/// object.
pub struct ObjectArrayReader<'a> {
    payload: &'a [u8],
    count: usize,
    valid: bool,
    name_based: bool,
}

impl<'a> ObjectArrayReader<'a> {
    pub(crate) fn new(payload: &'a [u8], name_based: bool) -> Self {
        match count_elements(payload, 4) {
            Some(count) => ObjectArrayReader { payload, count, valid: true, name_based },
            None => ObjectArrayReader { payload: &[], count: 0, valid: false, name_based },
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn get(&self, index: usize) -> Option<ObjectReader<'a>> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> ObjectArrayIter<'a> {
        ObjectArrayIter { rest: self.payload, remaining: self.count, name_based: self.name_based }
    }
}

impl<'a> IntoIterator for &ObjectArrayReader<'a> {
    type Item = ObjectReader<'a>;
    type IntoIter = ObjectArrayIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ObjectArrayIter<'a> {
    rest: &'a [u8],
    remaining: usize,
    name_based: bool,
}

impl<'a> Iterator for ObjectArrayIter<'a> {
    type Item = ObjectReader<'a>;

    fn next(&mut self) -> Option<ObjectReader<'a>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let len = prefix_len(self.rest, 4);
        let fields = &self.rest[4..4 + len];
        self.rest = &self.rest[4 + len..];
        Some(ObjectReader::from_region(fields, self.name_based))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ObjectArrayIter<'_> {}
