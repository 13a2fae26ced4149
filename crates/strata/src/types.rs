//! Value types exchanged with the composite store.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::Key;
use thiserror::Error;

/// A row to write: present bytes are stored, an absent value deletes the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The row key.
    pub key: Key,
    /// The encoded value, or `None` to delete the row.
    pub value: Option<Vec<u8>>,
}

impl Entry {
    /// An entry writing `value` under `key`.
    pub fn present(key: Key, value: Vec<u8>) -> Self {
        Self { key, value: Some(value) }
    }

    /// An entry deleting the row under `key`.
    pub fn absent(key: Key) -> Self {
        Self { key, value: None }
    }

    /// Whether the entry carries a value.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(bytes) => write!(f, "{} ({} bytes)", self.key, bytes.len()),
            None => write!(f, "{} (absent)", self.key),
        }
    }
}

/// One element of a collection member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item<T> {
    /// The item identifier, unique within its collection.
    pub identifier: String,
    /// The item value.
    pub value: T,
}

impl<T> Item<T> {
    /// Create an item.
    pub fn new(identifier: impl Into<String>, value: T) -> Self {
        Self { identifier: identifier.into(), value }
    }
}

/// An inclusive range of composite identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range<Id> {
    /// The first identity in the range.
    pub first: Id,
    /// The last identity in the range.
    pub last: Id,
}

impl<Id> Range<Id> {
    /// Create a range from `first` to `last`, both inclusive.
    pub const fn new(first: Id, last: Id) -> Self {
        Self { first, last }
    }
}

/// The part of a composite a [`MemberError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// The root row.
    Root,
    /// A singleton member row.
    Singleton,
    /// A collection item row.
    Collection,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "root",
            Self::Singleton => "singleton",
            Self::Collection => "collection",
        })
    }
}

/// A member row of a composite that could not be decoded.
///
/// Member errors do not fail a read: the rest of the composite is still
/// returned and the errors are attached to the [`Composite`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} member{} failed to decode: {message}", location(.tag, .item))]
pub struct MemberError {
    /// Which part of the composite failed.
    pub kind: MemberKind,
    /// The member tag, for singletons and collections.
    pub tag: Option<String>,
    /// The item identifier, for collection items.
    pub item: Option<String>,
    /// The decode failure.
    pub message: String,
}

fn location(tag: &Option<String>, item: &Option<String>) -> String {
    match (tag, item) {
        (Some(tag), Some(item)) => format!(" {tag:?} item {item:?}"),
        (Some(tag), None) => format!(" {tag:?}"),
        _ => String::new(),
    }
}

impl MemberError {
    /// The root row failed to decode.
    pub fn root(message: impl Into<String>) -> Self {
        Self { kind: MemberKind::Root, tag: None, item: None, message: message.into() }
    }

    /// A singleton row failed to decode.
    pub fn singleton(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Singleton,
            tag: Some(tag.into()),
            item: None,
            message: message.into(),
        }
    }

    /// A collection item row failed to decode.
    pub fn collection(
        tag: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: MemberKind::Collection,
            tag: Some(tag.into()),
            item: Some(item.into()),
            message: message.into(),
        }
    }
}

/// A reconstructed composite and the member rows that failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite<V> {
    /// The reconstructed value.
    pub value: V,
    /// Member rows that were skipped because they failed to decode.
    pub member_errors: Vec<MemberError>,
}

impl<V> Composite<V> {
    /// Create a composite result.
    pub const fn new(value: V, member_errors: Vec<MemberError>) -> Self {
        Self { value, member_errors }
    }

    /// Whether every row decoded.
    pub fn is_complete(&self) -> bool {
        self.member_errors.is_empty()
    }

    /// The value, discarding member errors.
    pub fn into_value(self) -> V {
        self.value
    }

    /// The value and member errors.
    pub fn into_parts(self) -> (V, Vec<MemberError>) {
        (self.value, self.member_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_error_messages() {
        assert_eq!(MemberError::root("bad json").to_string(), "root member failed to decode: bad json");
        assert_eq!(
            MemberError::singleton("email", "eof").to_string(),
            "singleton member \"email\" failed to decode: eof"
        );
        assert_eq!(
            MemberError::collection("phones", "home", "eof").to_string(),
            "collection member \"phones\" item \"home\" failed to decode: eof"
        );
    }

    #[test]
    fn member_errors_serialize() {
        let json = serde_json::to_string(&MemberError::collection("phones", "home", "eof"))
            .expect("serialize");
        assert_eq!(
            json,
            r#"{"kind":"collection","tag":"phones","item":"home","message":"eof"}"#
        );
    }

    #[test]
    fn composite_completeness() {
        let complete = Composite::new(1, Vec::new());
        assert!(complete.is_complete());
        assert_eq!(complete.into_value(), 1);

        let partial = Composite::new(2, vec![MemberError::root("x")]);
        assert!(!partial.is_complete());
        let (value, errors) = partial.into_parts();
        assert_eq!(value, 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn entry_presence() {
        let key = Key::from_parts("person", ["1"]);
        assert!(Entry::present(key.clone(), vec![1]).is_present());
        assert!(!Entry::absent(key.clone()).is_present());
        assert_eq!(Entry::absent(key).to_string(), "person:1 (absent)");
    }
}
