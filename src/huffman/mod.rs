pub mod decoder;
pub mod encoder;

pub use decoder::{read_prefix_code, HuffmanDecoder};
pub use encoder::{build_codes_from_lengths, compute_code_lengths, write_prefix_code};

/// Maximum code length for every Brotli prefix code alphabet
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code-length alphabet itself
pub const MAX_CL_CODE_LENGTH: u8 = 5;

/// Order in which code-length-code lengths are transmitted
pub const CODE_LENGTH_ORDER: [usize; 18] =
    [1, 2, 3, 4, 0, 5, 17, 6, 16, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Canonical lengths of the fixed code that transmits the code-length-code
/// lengths themselves (RFC 7932 section 3.5: symbols 0-5)
pub const CL_DESCRIPTOR_LENGTHS: [u8; 6] = [2, 4, 3, 2, 2, 4];

/// Number of bits used to transmit one symbol of a simple prefix code
pub fn alphabet_bits(alphabet_size: u16) -> u8 {
    let mut n = 1;
    while (1u32 << n) < alphabet_size as u32 {
        n += 1;
    }
    n
}
