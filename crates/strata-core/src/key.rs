//! Composite key codec.
//!
//! Every row of a composite lives under a key made of a base name, the
//! identity segments of the composite, and an optional tag naming the member
//! the row belongs to. Keys encode to strings of this layout, where `S` is the
//! segment separator and `T` the tag marker:
//!
//! ```text
//! <base> S <id-1> S ... <id-n> S [ T <tag-name> S [ <tag-value> S ] ]
//! ```
//!
//! Because every segment is terminated by `S` and no segment may contain `S`
//! or `T`, the encoding is injective and the encoding of a key is a byte
//! prefix of the encoding of every key that extends it. A composite's rows
//! are therefore exactly the keys in [`Key::range`] of its identity key.
//!
//! `S` sorts below `T`, and segments may only hold bytes above `T`, so a
//! segment sorts before every segment it is a proper prefix of. Byte order
//! of encoded keys is then segment-by-segment order of the keys.
//!
//! | Row                  | Tag                       |
//! |----------------------|---------------------------|
//! | root                 | none                      |
//! | witness              | empty name, no value      |
//! | singleton member     | member name, no value     |
//! | collection item      | member name, item id      |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Default byte terminating every key segment.
pub const DEFAULT_SEGMENT_SEPARATOR: u8 = 0x00;

/// Default byte introducing the tag segment.
pub const DEFAULT_TAG_MARKER: u8 = 0x01;

/// Separator bytes must sort below this byte.
const MAX_RESERVED_BYTE: u8 = 0x20;

/// The pair of reserved bytes used to lay out encoded keys.
///
/// Both bytes are ASCII control bytes (below `0x20`) and the segment
/// separator sorts below the tag marker. Segments may not contain any byte
/// at or below the tag marker, so the separator is always the smallest byte
/// of an encoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSeparator", into = "RawSeparator")]
pub struct Separator {
    segment: u8,
    tag: u8,
}

#[derive(Serialize, Deserialize)]
struct RawSeparator {
    segment: u8,
    tag: u8,
}

impl Separator {
    /// Create a separator pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSeparator`] if either byte is `0x20` or
    /// above, or the segment separator does not sort below the tag marker.
    pub fn new(segment: u8, tag: u8) -> Result<Self, KeyError> {
        if segment >= MAX_RESERVED_BYTE || tag >= MAX_RESERVED_BYTE {
            return Err(KeyError::InvalidSeparator(format!(
                "separator bytes must be below {MAX_RESERVED_BYTE:#04x}, got {segment:#04x} and {tag:#04x}"
            )));
        }
        if segment >= tag {
            return Err(KeyError::InvalidSeparator(format!(
                "segment separator {segment:#04x} must sort below tag marker {tag:#04x}"
            )));
        }
        Ok(Self { segment, tag })
    }

    /// The byte terminating every segment.
    pub const fn segment(self) -> u8 {
        self.segment
    }

    /// The byte introducing the tag segment.
    pub const fn tag(self) -> u8 {
        self.tag
    }

    const fn segment_char(self) -> char {
        self.segment as char
    }

    const fn tag_char(self) -> char {
        self.tag as char
    }

    fn check(self, segment: &str) -> Result<(), KeyError> {
        if segment.contains(self.segment_char()) {
            return Err(KeyError::invalid_segment(segment, "contains the segment separator"));
        }
        if segment.contains(self.tag_char()) {
            return Err(KeyError::invalid_segment(segment, "contains the tag marker"));
        }
        if segment.bytes().any(|b| b <= self.tag) {
            return Err(KeyError::invalid_segment(
                segment,
                "contains a byte sorting at or below the tag marker",
            ));
        }
        Ok(())
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self { segment: DEFAULT_SEGMENT_SEPARATOR, tag: DEFAULT_TAG_MARKER }
    }
}

impl TryFrom<RawSeparator> for Separator {
    type Error = KeyError;

    fn try_from(raw: RawSeparator) -> Result<Self, Self::Error> {
        Self::new(raw.segment, raw.tag)
    }
}

impl From<Separator> for RawSeparator {
    fn from(sep: Separator) -> Self {
        Self { segment: sep.segment, tag: sep.tag }
    }
}

/// The member tag of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    name: String,
    value: Option<String>,
}

impl Tag {
    /// Create a tag. The empty name is the witness tag.
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self { name: name.into(), value }
    }

    /// Create a member tag, rejecting the name reserved for witnesses.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::ReservedTag`] if `name` is empty.
    pub fn member(name: impl Into<String>, value: Option<String>) -> Result<Self, KeyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::ReservedTag);
        }
        Ok(Self { name, value })
    }

    /// The tag marking a composite's witness row.
    pub const fn witness() -> Self {
        Self { name: String::new(), value: None }
    }

    /// The tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag value, set for collection items.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether this is the witness tag.
    pub fn is_witness(&self) -> bool {
        self.name.is_empty() && self.value.is_none()
    }
}

/// A composite key: base name, identity segments and optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    base: String,
    identifiers: Vec<String>,
    tag: Option<Tag>,
}

impl Key {
    /// Create a key with no identity segments.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into(), identifiers: Vec::new(), tag: None }
    }

    /// Create an untagged key from a base name and identity segments.
    pub fn from_parts<I, S>(base: impl Into<String>, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: base.into(),
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            tag: None,
        }
    }

    /// Append an identity segment.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    /// Replace the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// The untagged form of this key tagged with `(name, value)`.
    #[must_use]
    pub fn tagged(&self, name: impl Into<String>, value: Option<String>) -> Self {
        self.base_key().with_tag(Tag::new(name, value))
    }

    /// The witness key of this key's identity.
    #[must_use]
    pub fn witness(&self) -> Self {
        self.base_key().with_tag(Tag::witness())
    }

    /// This key without its tag.
    #[must_use]
    pub fn base_key(&self) -> Self {
        Self { base: self.base.clone(), identifiers: self.identifiers.clone(), tag: None }
    }

    /// The base name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The identity segments.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// The tag, if any.
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Whether this is a witness key.
    pub fn is_witness(&self) -> bool {
        self.tag.as_ref().is_some_and(Tag::is_witness)
    }

    /// Check that every segment can be encoded with `sep`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeySegment`] if the base name is empty or
    /// any segment contains a byte at or below the tag marker.
    pub fn validate(&self, sep: Separator) -> Result<(), KeyError> {
        if self.base.is_empty() {
            return Err(KeyError::invalid_segment(&self.base, "base name must not be empty"));
        }
        sep.check(&self.base)?;
        for identifier in &self.identifiers {
            sep.check(identifier)?;
        }
        if let Some(tag) = &self.tag {
            sep.check(&tag.name)?;
            if let Some(value) = &tag.value {
                sep.check(value)?;
            }
        }
        Ok(())
    }

    /// Encode the key.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Key::validate`] fails.
    pub fn encode(&self, sep: Separator) -> Result<String, KeyError> {
        self.validate(sep)?;

        let s = sep.segment_char();
        let mut encoded = String::with_capacity(self.encoded_len_hint());
        encoded.push_str(&self.base);
        encoded.push(s);
        for identifier in &self.identifiers {
            encoded.push_str(identifier);
            encoded.push(s);
        }
        if let Some(tag) = &self.tag {
            encoded.push(sep.tag_char());
            encoded.push_str(&tag.name);
            encoded.push(s);
            if let Some(value) = &tag.value {
                encoded.push_str(value);
                encoded.push(s);
            }
        }
        Ok(encoded)
    }

    /// Encode the key as backend key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Key::validate`] fails.
    pub fn to_bytes(&self, sep: Separator) -> Result<Vec<u8>, KeyError> {
        self.encode(sep).map(String::into_bytes)
    }

    /// Parse an encoded key. Exact inverse of [`Key::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] if the string does not follow the
    /// segment layout, or [`KeyError::InvalidKeySegment`] if a segment holds
    /// a reserved byte in a position the layout does not allow.
    pub fn parse(encoded: &str, sep: Separator) -> Result<Self, KeyError> {
        let s = sep.segment_char();
        let body = encoded.strip_suffix(s).ok_or_else(|| {
            KeyError::Malformed(format!("{encoded:?} does not end with the segment separator"))
        })?;

        let mut chunks = body.split(s);
        let base = chunks.next().unwrap_or_default().to_string();
        let mut identifiers = Vec::new();
        let mut tag = None;

        while let Some(chunk) = chunks.next() {
            if let Some(name) = chunk.strip_prefix(sep.tag_char()) {
                tag = Some(Tag::new(name, chunks.next().map(str::to_string)));
                if chunks.next().is_some() {
                    return Err(KeyError::Malformed(format!(
                        "{encoded:?} has segments after the tag value"
                    )));
                }
                break;
            }
            identifiers.push(chunk.to_string());
        }

        let key = Self { base, identifiers, tag };
        key.validate(sep)?;
        Ok(key)
    }

    /// Parse backend key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] if the bytes are not UTF-8, plus any
    /// error of [`Key::parse`].
    pub fn from_bytes(bytes: &[u8], sep: Separator) -> Result<Self, KeyError> {
        let encoded = std::str::from_utf8(bytes)
            .map_err(|e| KeyError::Malformed(format!("key is not UTF-8: {e}")))?;
        Self::parse(encoded, sep)
    }

    /// The half-open byte range `[first, last)` holding exactly the keys
    /// this key is a prefix of.
    ///
    /// `first` is the encoding itself; `last` is the encoding with its final
    /// separator byte incremented.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Key::validate`] fails.
    pub fn range(&self, sep: Separator) -> Result<(Vec<u8>, Vec<u8>), KeyError> {
        let first = self.to_bytes(sep)?;
        let mut last = first.clone();
        if let Some(terminator) = last.last_mut() {
            *terminator = sep.segment() + 1;
        }
        Ok((first, last))
    }

    /// Whether the encoding of `self` is a byte prefix of (or equal to) the
    /// encoding of `other`, for any valid separator.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.base != other.base {
            return false;
        }
        match (&self.tag, &other.tag) {
            (None, _) => other.identifiers.starts_with(&self.identifiers),
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => {
                self.identifiers == other.identifiers
                    && mine.name == theirs.name
                    && (mine.value.is_none() || mine.value == theirs.value)
            }
        }
    }

    fn encoded_len_hint(&self) -> usize {
        let ids: usize = self.identifiers.iter().map(|id| id.len() + 1).sum();
        let tag = self
            .tag
            .as_ref()
            .map_or(0, |t| t.name.len() + 2 + t.value.as_ref().map_or(0, |v| v.len() + 1));
        self.base.len() + 1 + ids + tag
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for identifier in &self.identifiers {
            write!(f, ":{identifier}")?;
        }
        if let Some(tag) = &self.tag {
            write!(f, "#{}", tag.name)?;
            if let Some(value) = &tag.value {
                write!(f, "={value}")?;
            }
        }
        Ok(())
    }
}
