//! Literal context modelling
//!
//! The context of a literal is a 6-bit value derived from the previous two
//! output bytes according to the context mode of the current literal block
//! type. The UTF8 and Signed modes use the three lookup tables from
//! RFC 7932 section 7.1.

use crate::bits::BitReader;
use crate::error::{Error, Result};
use crate::huffman::read_prefix_code;

/// Literal context modes, in their 2-bit wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Lsb6,
    Msb6,
    Utf8,
    Signed,
}

impl ContextMode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ContextMode::Lsb6,
            1 => ContextMode::Msb6,
            2 => ContextMode::Utf8,
            _ => ContextMode::Signed,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            ContextMode::Lsb6 => 0,
            ContextMode::Msb6 => 1,
            ContextMode::Utf8 => 2,
            ContextMode::Signed => 3,
        }
    }
}

/// Context id for a literal given the previous two output bytes
/// (`p1` newest)
#[inline]
pub fn literal_context(mode: ContextMode, p1: u8, p2: u8) -> usize {
    (match mode {
        ContextMode::Lsb6 => p1 & 0x3F,
        ContextMode::Msb6 => p1 >> 2,
        ContextMode::Utf8 => CONTEXT_LUT0[p1 as usize] | CONTEXT_LUT1[p2 as usize],
        ContextMode::Signed => (CONTEXT_LUT2[p1 as usize] << 3) | CONTEXT_LUT2[p2 as usize],
    }) as usize
}

/// Variable-length count used for block-type counts and context-map tree
/// counts: 1 bit presence, then a 3-bit width and that many extra bits.
pub fn read_count(bits: &mut BitReader) -> Result<u32> {
    if !bits.read_bit()? {
        return Ok(1);
    }
    let nbits = bits.read_bits(3)?;
    if nbits == 0 {
        return Ok(2);
    }
    Ok((1 << nbits) + bits.read_bits(nbits as u8)? + 1)
}

/// Decoded context map: tree count plus one tree index per context
pub struct ContextMap {
    pub num_trees: u32,
    pub map: Vec<u8>,
}

impl ContextMap {
    /// All-zeros map for a single tree
    fn trivial(size: usize) -> Self {
        Self { num_trees: 1, map: vec![0; size] }
    }

    #[inline]
    pub fn tree_for(&self, block_type: usize, context: usize, contexts_per_type: usize) -> usize {
        self.map[block_type * contexts_per_type + context] as usize
    }
}

/// Read a context map: tree count, optional zero-run-length coding, and an
/// optional inverse move-to-front transform over the tree indices.
pub fn read_context_map(bits: &mut BitReader, size: usize) -> Result<ContextMap> {
    let num_trees = read_count(bits)?;
    if num_trees == 1 {
        return Ok(ContextMap::trivial(size));
    }

    let max_run_length_prefix = if bits.read_bit()? { bits.read_bits(4)? + 1 } else { 0 };

    let decoder = read_prefix_code(bits, (num_trees + max_run_length_prefix) as u16)?;
    let mut map = Vec::with_capacity(size);
    while map.len() < size {
        let code = decoder.decode(bits)? as u32;
        if code == 0 {
            map.push(0);
        } else if code <= max_run_length_prefix {
            let reps = (1usize << code) + bits.read_bits(code as u8)? as usize;
            if map.len() + reps > size {
                return Err(Error::InvalidContextMap("zero run past map end"));
            }
            map.resize(map.len() + reps, 0);
        } else {
            let value = code - max_run_length_prefix;
            debug_assert!(value < num_trees);
            map.push(value as u8);
        }
    }

    if bits.read_bit()? {
        inverse_move_to_front(&mut map);
    }

    if map.iter().any(|&v| v as u32 >= num_trees) {
        return Err(Error::InvalidContextMap("tree index out of range"));
    }

    Ok(ContextMap { num_trees, map })
}

/// Restore a move-to-front coded map in place
fn inverse_move_to_front(map: &mut [u8]) {
    let mut mtf: [u8; 256] = [0; 256];
    for (i, slot) in mtf.iter_mut().enumerate() {
        *slot = i as u8;
    }
    for value in map.iter_mut() {
        let index = *value as usize;
        let decoded = mtf[index];
        *value = decoded;
        // move to front
        for j in (1..=index).rev() {
            mtf[j] = mtf[j - 1];
        }
        mtf[0] = decoded;
    }
}

pub const CONTEXT_LUT0: [u8; 256] = [
     0,  0,  0,  0,  0,  0,  0,  0,  0,  4,  4,  0,  0,  4,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     8, 12, 16, 12, 12, 20, 12, 16, 24, 28, 12, 12, 32, 12, 36, 12,
    44, 44, 44, 44, 44, 44, 44, 44, 44, 44, 32, 32, 24, 40, 28, 12,
    12, 48, 52, 52, 52, 48, 52, 52, 52, 48, 52, 52, 52, 52, 52, 48,
    52, 52, 52, 52, 52, 48, 52, 52, 52, 52, 52, 24, 12, 28, 12, 12,
    12, 56, 60, 60, 60, 56, 60, 60, 60, 56, 60, 60, 60, 60, 60, 56,
    60, 60, 60, 60, 60, 56, 60, 60, 60, 60, 60, 24, 12, 28, 12,  0,
     0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,
     0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,
     0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,
     0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,  0,  1,
     2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,
     2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,
     2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,
     2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,  2,  3,
];

pub const CONTEXT_LUT1: [u8; 256] = [
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  1,  1,  1,  1,  1,  1,
     1,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  1,  1,  1,  1,  1,
     1,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  1,  1,  1,  1,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
];

pub const CONTEXT_LUT2: [u8; 256] = [
     0,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
     2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,
     5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,
     5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,
     6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  6,  7,
];
