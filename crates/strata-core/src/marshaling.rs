//! Typed value serialization.
//!
//! A [`Marshaling`] strategy is the first stage of the value pipeline: it
//! turns a typed value into bytes and back. The store is generic over the
//! strategy, so the choice is made once per store at compile time.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;

/// Converts typed values to bytes and back.
pub trait Marshaling: Send + Sync {
    /// Serialize `value` to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] if the value cannot be serialized.
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CoreError>;

    /// Deserialize a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] if the bytes do not hold a `T`.
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CoreError>;
}

/// JSON marshaling via `serde_json`. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaling;

impl Marshaling for JsonMarshaling {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(value).map_err(CoreError::encoding)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CoreError> {
        serde_json::from_slice(bytes).map_err(CoreError::encoding)
    }
}

/// Compact binary marshaling via `bincode`.
///
/// Types relying on self-describing formats (`#[serde(untagged)]`,
/// `serde_json::Value`) cannot be stored with this strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeMarshaling;

impl Marshaling for BincodeMarshaling {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CoreError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(CoreError::encoding)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CoreError> {
        let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(CoreError::encoding)?;
        if read != bytes.len() {
            return Err(CoreError::Encoding(format!(
                "{} trailing bytes after value",
                bytes.len() - read
            )));
        }
        Ok(value)
    }
}
