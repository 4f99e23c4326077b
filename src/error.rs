use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Bit stream errors
    #[error("Unexpected end of stream while reading a bit field")]
    EndOfStream,

    #[error("Stream ended before the final meta-block was seen")]
    TruncatedStream,

    // Prefix code errors
    #[error("Invalid prefix code: {0}")]
    InvalidPrefixCode(&'static str),

    // Context map errors
    #[error("Invalid context map: {0}")]
    InvalidContextMap(&'static str),

    // Back-reference errors
    #[error("Back-reference distance {distance} exceeds available history {available}")]
    InvalidDistance { distance: u32, available: u64 },

    // Meta-block framing errors
    #[error("Reserved bit in metadata block header is non-zero")]
    ReservedBitSet,

    #[error("Window size of {0} bits is outside the supported 10-24 range")]
    WindowTooLarge(u32),

    #[error("Decoded output exceeds the limit of {0} bytes")]
    OutputLimitExceeded(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
