//! Error types for the core crate.

use thiserror::Error;

/// Maximum length for segment display in error messages.
const MAX_SEGMENT_DISPLAY_LEN: usize = 64;

/// Errors produced while building, encoding or parsing keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A key segment is empty where a name is required, or contains a
    /// reserved separator byte.
    #[error("invalid key segment {segment:?}: {reason}")]
    InvalidKeySegment {
        /// The offending segment (truncated for display).
        segment: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The separator configuration cannot produce an ordered encoding.
    #[error("invalid separator: {0}")]
    InvalidSeparator(String),

    /// The empty tag name is reserved for witness rows.
    #[error("member tags must not be empty")]
    ReservedTag,

    /// An encoded key does not follow the segment layout.
    #[error("malformed key: {0}")]
    Malformed(String),

    /// Key segments cannot be converted back into an identity value.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl KeyError {
    /// Creates an [`KeyError::InvalidKeySegment`], truncating long segments.
    #[must_use]
    pub fn invalid_segment(segment: &str, reason: &'static str) -> Self {
        let segment = if segment.len() > MAX_SEGMENT_DISPLAY_LEN {
            let mut end = MAX_SEGMENT_DISPLAY_LEN;
            while !segment.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &segment[..end])
        } else {
            segment.to_string()
        };
        Self::InvalidKeySegment { segment, reason }
    }
}

/// Errors that can occur in the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key could not be built, encoded or parsed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A value could not be marshaled or unmarshaled.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Bytes could not be filtered or unfiltered.
    #[error("filter error: {0}")]
    Filter(String),
}

impl CoreError {
    /// Creates an encoding error from any displayable cause.
    #[must_use]
    pub fn encoding(cause: impl std::fmt::Display) -> Self {
        Self::Encoding(cause.to_string())
    }

    /// Creates a filter error from any displayable cause.
    #[must_use]
    pub fn filter(cause: impl std::fmt::Display) -> Self {
        Self::Filter(cause.to_string())
    }
}
