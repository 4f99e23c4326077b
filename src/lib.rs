//! Self-contained Brotli (RFC 7932) compressor and decompressor.
//!
//! Both operations are single-shot and synchronous: a contiguous input
//! buffer in, a contiguous output buffer out. Every stream the compressor
//! produces is accepted by any conformant Brotli decoder; the decompressor
//! accepts any conformant stream that does not reference the static
//! dictionary (dictionary-referencing streams fail with
//! [`Error::InvalidDistance`], see the crate notes below).
//!
//! ```
//! let data = b"Hello, World! Hello, World! Hello, World!";
//! let compressed = rbrotli::compress(data);
//! let restored = rbrotli::decompress(&compressed).unwrap();
//! assert_eq!(&restored, data);
//! ```
//!
//! # Static dictionary
//!
//! The RFC 7932 Appendix A dictionary is not embedded. Streams produced by
//! encoders at higher quality settings may reference it; decoding such a
//! stream fails with [`Error::InvalidDistance`] at the first reference.
//! The compressor never emits dictionary references, so round-trips of
//! this crate's own output are unaffected.

pub mod bits;
pub mod block;
pub mod command;
pub mod context;
pub mod decode;
pub mod distance;
pub mod encode;
pub mod error;
pub mod huffman;
pub mod lz77;

pub use decode::{decompress, decompress_with_limit};
pub use encode::{compress, compress_stats, compress_with_config, CompressConfig, CompressStats};
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_smoke() {
        let data = b"compression round trip";
        assert_eq!(decompress(&compress(data)).unwrap(), data);
    }

    #[test]
    fn test_decompress_rejects_truncation() {
        // Header plus a meta-block length field cut off mid-way
        assert!(decompress(&[0x1B]).is_err());
    }
}
