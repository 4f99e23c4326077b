//! Block-switch machinery for the three parallel block categories
//! (literal, insert-and-copy, distance).

use crate::bits::BitReader;
use crate::context::read_count;
use crate::error::Result;
use crate::huffman::{read_prefix_code, HuffmanDecoder};

/// Block count codes 0-25: (base, extra_bits), RFC 7932 section 6
pub const BLOCK_LENGTH_TABLE: [(u32, u8); 26] = [
    (1, 2),
    (5, 2),
    (9, 2),
    (13, 2),
    (17, 3),
    (25, 3),
    (33, 3),
    (41, 3),
    (49, 4),
    (65, 4),
    (81, 4),
    (97, 4),
    (113, 5),
    (145, 5),
    (177, 5),
    (209, 5),
    (241, 6),
    (305, 6),
    (369, 7),
    (497, 8),
    (753, 9),
    (1265, 10),
    (2289, 11),
    (4337, 12),
    (8433, 13),
    (16625, 24),
];

/// Per-category block switching state
///
/// With a single block type the category never switches and no prefix
/// codes are transmitted for it.
pub struct BlockState {
    pub num_types: u32,
    pub current: usize,
    previous: usize,
    remaining: u32,
    type_decoder: Option<HuffmanDecoder>,
    length_decoder: Option<HuffmanDecoder>,
}

impl BlockState {
    /// Parse the per-category header: type count, and for multi-type
    /// categories the two prefix codes plus the first block length.
    pub fn read(bits: &mut BitReader) -> Result<Self> {
        let num_types = read_count(bits)?;
        if num_types == 1 {
            return Ok(Self {
                num_types,
                current: 0,
                previous: 1,
                remaining: u32::MAX,
                type_decoder: None,
                length_decoder: None,
            });
        }

        let type_decoder = read_prefix_code(bits, (num_types + 2) as u16)?;
        let length_decoder = read_prefix_code(bits, 26)?;
        let remaining = read_block_length(bits, &length_decoder)?;
        Ok(Self {
            num_types,
            current: 0,
            previous: 1,
            remaining,
            type_decoder: Some(type_decoder),
            length_decoder: Some(length_decoder),
        })
    }

    /// Account one element; decodes a block switch first when the current
    /// block is exhausted.
    pub fn tick(&mut self, bits: &mut BitReader) -> Result<()> {
        if self.num_types == 1 {
            return Ok(());
        }
        if self.remaining == 0 {
            self.switch(bits)?;
        }
        self.remaining -= 1;
        Ok(())
    }

    fn switch(&mut self, bits: &mut BitReader) -> Result<()> {
        // Both decoders exist whenever num_types > 1.
        let type_decoder = self.type_decoder.as_ref().expect("multi-type state");
        let length_decoder = self.length_decoder.as_ref().expect("multi-type state");

        let code = type_decoder.decode(bits)? as u32;
        let next = match code {
            0 => self.previous,
            1 => (self.current + 1) % self.num_types as usize,
            _ => (code - 2) as usize,
        };
        self.previous = self.current;
        self.current = next;
        self.remaining = read_block_length(bits, length_decoder)?;
        Ok(())
    }
}

/// Read one block length: a code from the 26-symbol alphabet plus extras
pub fn read_block_length(bits: &mut BitReader, decoder: &HuffmanDecoder) -> Result<u32> {
    let code = decoder.decode(bits)? as usize;
    let (base, extra_bits) = BLOCK_LENGTH_TABLE[code];
    Ok(base + bits.read_bits(extra_bits)?)
}
