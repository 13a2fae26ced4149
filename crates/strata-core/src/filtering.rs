//! Byte post-processing.
//!
//! A [`Filtering`] strategy is the second stage of the value pipeline. It
//! sees the marshaled bytes of every stored value on the way in and reverses
//! its transformation on the way out: compression, encryption, framing.
//!
//! Filters compose as tuples: `(A, B)` applies `A` then `B` when filtering
//! and undoes `B` then `A` when unfiltering.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::trace;

use crate::error::CoreError;

/// Default bound on the size of unfiltered gzip output.
pub const DEFAULT_MAX_UNFILTERED_SIZE: usize = 64 * 1024 * 1024;

/// Transforms marshaled bytes before storage and restores them after.
pub trait Filtering: Send + Sync {
    /// Transform bytes on their way to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Filter`] if the transformation fails.
    fn filter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError>;

    /// Restore bytes read from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Filter`] if the bytes were not produced by
    /// [`Filtering::filter`] or cannot be restored.
    fn unfilter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError>;
}

/// The identity filter. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFiltering;

impl Filtering for NoFiltering {
    fn filter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        Ok(bytes)
    }

    fn unfilter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        Ok(bytes)
    }
}

/// Gzip compression with a bounded decompressed size.
///
/// The bound prevents a corrupted or hostile row from expanding into an
/// arbitrarily large allocation when it is read.
#[derive(Debug, Clone, Copy)]
pub struct GzipFiltering {
    level: u32,
    max_unfiltered_size: usize,
}

impl GzipFiltering {
    /// Create a gzip filter with the default level and size bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression level (0-9).
    #[must_use]
    pub const fn with_level(mut self, level: u32) -> Self {
        self.level = if level > 9 { 9 } else { level };
        self
    }

    /// Set the largest unfiltered output accepted by [`Filtering::unfilter`].
    #[must_use]
    pub const fn with_max_unfiltered_size(mut self, max: usize) -> Self {
        self.max_unfiltered_size = max;
        self
    }

    /// The compression level.
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// The largest unfiltered output accepted.
    pub const fn max_unfiltered_size(&self) -> usize {
        self.max_unfiltered_size
    }
}

impl Default for GzipFiltering {
    fn default() -> Self {
        Self { level: Compression::default().level(), max_unfiltered_size: DEFAULT_MAX_UNFILTERED_SIZE }
    }
}

impl Filtering for GzipFiltering {
    fn filter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(&bytes).map_err(CoreError::filter)?;
        let compressed = encoder.finish().map_err(CoreError::filter)?;
        trace!(input = bytes.len(), output = compressed.len(), "gzip filtered value");
        Ok(compressed)
    }

    fn unfilter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut decompressed = Vec::new();
        let mut buffer = [0u8; 8192];
        let mut total_read = 0usize;

        loop {
            let read = decoder.read(&mut buffer).map_err(CoreError::filter)?;
            if read == 0 {
                break;
            }

            total_read = total_read.saturating_add(read);
            if total_read > self.max_unfiltered_size {
                return Err(CoreError::Filter(format!(
                    "unfiltered value exceeds {} bytes",
                    self.max_unfiltered_size
                )));
            }

            decompressed.extend_from_slice(&buffer[..read]);
        }

        Ok(decompressed)
    }
}

impl<A: Filtering, B: Filtering> Filtering for (A, B) {
    fn filter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        self.1.filter(self.0.filter(bytes)?)
    }

    fn unfilter(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        self.0.unfilter(self.1.unfilter(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Appends a fixed trailer; lets chain tests observe stage order.
    struct Trailer(u8);

    impl Filtering for Trailer {
        fn filter(&self, mut bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
            bytes.push(self.0);
            Ok(bytes)
        }

        fn unfilter(&self, mut bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
            match bytes.pop() {
                Some(b) if b == self.0 => Ok(bytes),
                other => Err(CoreError::Filter(format!("expected trailer {}, got {other:?}", self.0))),
            }
        }
    }

    #[test]
    fn test_no_filtering_is_identity() {
        let bytes = b"payload".to_vec();
        assert_eq!(NoFiltering.filter(bytes.clone()).expect("filter"), bytes);
        assert_eq!(NoFiltering.unfilter(bytes.clone()).expect("unfilter"), bytes);
    }

    #[test]
    fn test_gzip_shrinks_repetitive_values() {
        let gzip = GzipFiltering::new().with_level(9);
        let bytes = b"abcdefgh".repeat(1000);

        let compressed = gzip.filter(bytes.clone()).expect("filter");
        assert!(compressed.len() < bytes.len() / 10);
        assert_eq!(gzip.unfilter(compressed).expect("unfilter"), bytes);
    }

    #[test]
    fn test_gzip_rejects_oversized_output() {
        let bomb = GzipFiltering::new().filter(vec![0u8; 100_000]).expect("filter");
        let bounded = GzipFiltering::new().with_max_unfiltered_size(10_000);

        let result = bounded.unfilter(bomb);
        assert!(matches!(result, Err(CoreError::Filter(msg)) if msg.contains("10000")));
    }

    #[test]
    fn test_gzip_rejects_plain_bytes() {
        let result = GzipFiltering::new().unfilter(br#"{"plain":"json"}"#.to_vec());
        assert!(matches!(result, Err(CoreError::Filter(_))));
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(GzipFiltering::new().with_level(42).level(), 9);
    }

    #[test]
    fn test_chain_order() {
        let chain = (Trailer(1), Trailer(2));
        let filtered = chain.filter(b"x".to_vec()).expect("filter");
        assert_eq!(filtered, b"x\x01\x02");
        assert_eq!(chain.unfilter(filtered).expect("unfilter"), b"x");

        let reversed = (Trailer(2), Trailer(1));
        assert!(reversed.unfilter(b"x\x01\x02".to_vec()).is_err());
    }

    #[test]
    fn test_chain_with_gzip() {
        let chain = (GzipFiltering::new(), Trailer(7));
        let filtered = chain.filter(b"hello hello hello".to_vec()).expect("filter");
        assert_eq!(filtered.last(), Some(&7));
        assert_eq!(chain.unfilter(filtered).expect("unfilter"), b"hello hello hello");
    }
}
