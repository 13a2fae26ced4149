//! Identity segment encoding.
//!
//! Composite identities are stored as key segments. Integers are written as
//! fixed-width decimal strings so that the byte order of the segments matches
//! the numeric order of the values, which keeps range scans over identities
//! in identity order.
//!
//! Signed integers use a "sign-flip" offset: XOR with `0x8000_0000_0000_0000`
//! maps `i64::MIN..=i64::MAX` onto `0..=u64::MAX` monotonically.

use std::fmt;

use crate::error::KeyError;

/// Constant for flipping the sign bit of signed integers.
const SIGN_FLIP_I64: u64 = 0x8000_0000_0000_0000;

/// A value that can identify a composite within its key space.
pub trait Identifier: Sized + Clone + fmt::Debug {
    /// Number of key segments this identifier occupies.
    const ARITY: usize;

    /// Convert to exactly [`Identifier::ARITY`] key segments.
    fn to_key_segments(&self) -> Vec<String>;

    /// Convert back from exactly [`Identifier::ARITY`] key segments.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidIdentifier`] if the segment count is wrong
    /// or a segment cannot be parsed.
    fn from_key_segments(segments: &[String]) -> Result<Self, KeyError>;
}

fn check_arity(segments: &[String], arity: usize) -> Result<(), KeyError> {
    if segments.len() == arity {
        Ok(())
    } else {
        Err(KeyError::InvalidIdentifier(format!(
            "expected {arity} identity segment(s), got {}",
            segments.len()
        )))
    }
}

fn parse_fixed_width(segment: &str, width: usize) -> Result<u64, KeyError> {
    if segment.len() != width || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyError::InvalidIdentifier(format!(
            "{segment:?} is not a {width}-digit decimal segment"
        )));
    }
    segment.parse().map_err(|e| KeyError::InvalidIdentifier(format!("{segment:?}: {e}")))
}

impl Identifier for String {
    const ARITY: usize = 1;

    fn to_key_segments(&self) -> Vec<String> {
        vec![self.clone()]
    }

    fn from_key_segments(segments: &[String]) -> Result<Self, KeyError> {
        check_arity(segments, Self::ARITY)?;
        Ok(segments[0].clone())
    }
}

macro_rules! unsigned_identifier {
    ($ty:ty, $width:expr) => {
        impl Identifier for $ty {
            const ARITY: usize = 1;

            fn to_key_segments(&self) -> Vec<String> {
                vec![format!("{:0width$}", self, width = $width)]
            }

            fn from_key_segments(segments: &[String]) -> Result<Self, KeyError> {
                check_arity(segments, Self::ARITY)?;
                let value = parse_fixed_width(&segments[0], $width)?;
                <$ty>::try_from(value)
                    .map_err(|e| KeyError::InvalidIdentifier(format!("{value}: {e}")))
            }
        }
    };
}

unsigned_identifier!(u32, 10);
unsigned_identifier!(u64, 20);

impl Identifier for i64 {
    const ARITY: usize = 1;

    fn to_key_segments(&self) -> Vec<String> {
        let flipped = (*self as u64) ^ SIGN_FLIP_I64;
        vec![format!("{flipped:020}")]
    }

    fn from_key_segments(segments: &[String]) -> Result<Self, KeyError> {
        check_arity(segments, Self::ARITY)?;
        let flipped = parse_fixed_width(&segments[0], 20)?;
        Ok((flipped ^ SIGN_FLIP_I64) as i64)
    }
}

impl<A: Identifier, B: Identifier> Identifier for (A, B) {
    const ARITY: usize = A::ARITY + B::ARITY;

    fn to_key_segments(&self) -> Vec<String> {
        let mut segments = self.0.to_key_segments();
        segments.extend(self.1.to_key_segments());
        segments
    }

    fn from_key_segments(segments: &[String]) -> Result<Self, KeyError> {
        check_arity(segments, Self::ARITY)?;
        let (a, b) = segments.split_at(A::ARITY);
        Ok((A::from_key_segments(a)?, B::from_key_segments(b)?))
    }
}
