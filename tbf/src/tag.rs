//! A field is identified by a tag, which carries a printable name, a 16-bit
//! id or both. Which of the two actually reaches the wire depends on the
//! writer's mode: name-based streams spell the name out (`u8` length plus the
//! bytes), id-based streams spend a fixed two bytes on the id. Ids are
//! derived from names by hashing so that both sides of an id-based exchange
//! can agree on them without a registry; the hash folds upper- and lowercase
//! letters together, so two names that differ only in case collide by
//! construction.

use crate::error::TagError;

/// Longest name the `u8` length prefix can express.
pub const MAX_NAME_LEN: usize = 255;

/// 32-bit FNV-1a over the restricted tag alphabet. Letters map to 1..26
/// without case, digits to 27..36, underscore to 37 and anything else to 0
/// before being folded into the hash. The low 16 bits become the tag id.
pub const fn name_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash: u32 = 2166136261;
    let mut i = 0;
    while i < bytes.len() {
        let mapped: u8 = match bytes[i] {
            c @ b'a'..=b'z' => c - b'a' + 1,
            c @ b'A'..=b'Z' => c - b'A' + 1,
            c @ b'0'..=b'9' => c - b'0' + 27,
            b'_' => 37,
            _ => 0,
        };
        hash ^= mapped as u32;
        hash = hash.wrapping_mul(16777619);
        i += 1;
    }
    hash
}

pub(crate) const fn check_name(name: &str) -> Result<(), TagError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(TagError::Empty);
    }
    if bytes.len() > MAX_NAME_LEN {
        return Err(TagError::TooLong(bytes.len()));
    }
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => {}
            c => return Err(TagError::Char(c as char)),
        }
        i += 1;
    }
    Ok(())
}

/// A field identifier. [`Tag::new`] and [`Tag::with_id`] are meant for
/// literals: they validate at compile time when used to initialize a `const`
/// and panic at runtime otherwise. [`Tag::from_id`] and [`Tag::from_name`]
/// build unvalidated lookup tags for whatever a running program happens to
/// hold.
///
/// ```
/// use tbf::Tag;
///
/// const POSITION: Tag = Tag::new("position");
/// assert_eq!(POSITION, Tag::new("POSITION")); // ids collide across case
/// assert_ne!(POSITION, Tag::new("velocity"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Tag<'a> {
    id: u16,
    name: Option<&'a str>,
}

impl<'a> Tag<'a> {
    /// Id 0 marks a tag that carries no id. It never appears on wire.
    pub const INVALID_ID: u16 = 0;

    /// Build a tag from a name, deriving the id from [`name_hash`].
    ///
    /// # Panics
    ///
    /// Panics if the name is empty, longer than [`MAX_NAME_LEN`], contains a
    /// character outside `[A-Za-z0-9_]` or hashes to the reserved id 0. In
    /// `const` position this is a compile error.
    pub const fn new(name: &'a str) -> Self {
        if check_name(name).is_err() {
            panic!("invalid tag name");
        }
        let id = name_hash(name) as u16;
        if id == Self::INVALID_ID {
            panic!("tag name hashes to the reserved id 0, assign one explicitly");
        }
        Tag { id, name: Some(name) }
    }

    /// Build a tag from a name and an explicitly assigned id.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Tag::new`], and if `id` is 0.
    pub const fn with_id(id: u16, name: &'a str) -> Self {
        if check_name(name).is_err() {
            panic!("invalid tag name");
        }
        if id == Self::INVALID_ID {
            panic!("tag id 0 is reserved");
        }
        Tag { id, name: Some(name) }
    }

    /// The checked runtime equivalent of [`Tag::new`].
    pub fn try_new(name: &'a str) -> Result<Self, TagError> {
        check_name(name)?;
        let id = name_hash(name) as u16;
        if id == Self::INVALID_ID {
            return Err(TagError::ReservedId);
        }
        Ok(Tag { id, name: Some(name) })
    }

    /// A nameless lookup tag for id-based streams.
    pub const fn from_id(id: u16) -> Tag<'static> {
        Tag { id, name: None }
    }

    /// An id-less lookup tag for name-based streams. The name is not
    /// validated; an invalid name simply never matches anything.
    pub const fn from_name(name: &'a str) -> Self {
        Tag { id: Self::INVALID_ID, name: Some(name) }
    }

    pub const fn id(self) -> u16 {
        self.id
    }

    pub const fn name(self) -> Option<&'a str> {
        self.name
    }

    pub const fn has_id(self) -> bool {
        self.id != Self::INVALID_ID
    }
}

/// Tags compare by id when both sides carry one and by name otherwise.
impl PartialEq for Tag<'_> {
    fn eq(&self, other: &Self) -> bool {
        if self.has_id() && other.has_id() {
            self.id == other.id
        } else {
            self.name == other.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{name_hash, Tag, MAX_NAME_LEN};
    use crate::error::TagError;

    // reference values computed from the schedule by hand
    #[test]
    fn hash_schedule() {
        assert_eq!(name_hash("foo"), 0x65DC3337);
        assert_eq!(name_hash("bar"), 0xB47C003A);
        assert_eq!(name_hash("user_name"), 0x60FEE416);
        assert_eq!(name_hash("a0"), 0xF6742EB5);
        assert_eq!(name_hash(""), 2166136261);
    }

    #[test]
    fn hash_ignores_case() {
        assert_eq!(name_hash("foo"), name_hash("FOO"));
        assert_eq!(name_hash("userName"), name_hash("username"));
        assert_ne!(name_hash("userName"), name_hash("user_name"));
    }

    #[test]
    fn literal_tags() {
        const FOO: Tag = Tag::new("foo");
        assert_eq!(FOO.id(), (name_hash("foo") & 0xFFFF) as u16);
        assert_eq!(FOO.name(), Some("foo"));
        assert!(FOO.has_id());

        const EXPLICIT: Tag = Tag::with_id(7, "foo");
        assert_eq!(EXPLICIT.id(), 7);
    }

    #[test]
    fn equality() {
        assert_eq!(Tag::new("foo"), Tag::new("FOO"));
        assert_ne!(Tag::new("foo"), Tag::new("bar"));
        // one side without an id falls back to name comparison
        assert_eq!(Tag::from_name("foo"), Tag::new("foo"));
        assert_ne!(Tag::from_name("FOO"), Tag::new("foo"));
        assert_eq!(Tag::from_id(42), Tag::with_id(42, "anything"));
        // two nameless, idless tags agree on nothing but each other
        assert_eq!(Tag::from_id(0), Tag::from_id(0));
        assert_ne!(Tag::from_id(0), Tag::from_name("foo"));
    }

    #[test]
    fn validation() {
        assert!(Tag::try_new("valid_name_123").is_ok());
        assert_eq!(Tag::try_new(""), Err(TagError::Empty));
        assert_eq!(Tag::try_new("has space"), Err(TagError::Char(' ')));
        assert_eq!(Tag::try_new("has-dash"), Err(TagError::Char('-')));
        assert_eq!(Tag::try_new("ümlaut"), Err(TagError::Char('Ã')));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(Tag::try_new(&long), Err(TagError::TooLong(256)));
        let just_fits = "x".repeat(MAX_NAME_LEN);
        assert!(Tag::try_new(&just_fits).is_ok());
    }
}
