//! The two-stage value pipeline.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::filtering::{Filtering, NoFiltering};
use crate::marshaling::{JsonMarshaling, Marshaling};

/// Composes a [`Marshaling`] and a [`Filtering`] stage.
///
/// Encoding marshals then filters; decoding unfilters then unmarshals.
#[derive(Debug, Clone, Default)]
pub struct Codec<M = JsonMarshaling, F = NoFiltering> {
    marshaling: M,
    filtering: F,
}

impl<M: Marshaling, F: Filtering> Codec<M, F> {
    /// Create a codec from its two stages.
    pub const fn new(marshaling: M, filtering: F) -> Self {
        Self { marshaling, filtering }
    }

    /// Replace the marshaling stage.
    pub fn with_marshaling<M2: Marshaling>(self, marshaling: M2) -> Codec<M2, F> {
        Codec { marshaling, filtering: self.filtering }
    }

    /// Replace the filtering stage.
    pub fn with_filtering<F2: Filtering>(self, filtering: F2) -> Codec<M, F2> {
        Codec { marshaling: self.marshaling, filtering }
    }

    /// The marshaling stage.
    pub const fn marshaling(&self) -> &M {
        &self.marshaling
    }

    /// The filtering stage.
    pub const fn filtering(&self) -> &F {
        &self.filtering
    }

    /// Marshal then filter `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] or [`CoreError::Filter`] from the
    /// failing stage.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CoreError> {
        let bytes = self.marshaling.marshal(value)?;
        self.filtering.filter(bytes)
    }

    /// Unfilter then unmarshal `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Filter`] or [`CoreError::Encoding`] from the
    /// failing stage.
    pub fn decode<T: DeserializeOwned>(&self, bytes: Vec<u8>) -> Result<T, CoreError> {
        let bytes = self.filtering.unfilter(bytes)?;
        self.marshaling.unmarshal(&bytes)
    }
}
