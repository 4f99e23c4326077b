//! Meta-block decode driver
//!
//! Walks the stream header and meta-block sequence, pulling literals and
//! back-references out of the prefix-coded body and appending them to the
//! output history.

use log::debug;

use crate::bits::BitReader;
use crate::block::BlockState;
use crate::command::{read_lengths, unpack_command_symbol, DistanceHint};
use crate::context::{literal_context, read_context_map, ContextMode};
use crate::distance::{decode_distance, distance_context, DistanceParams, DistanceRing};
use crate::error::{Error, Result};
use crate::huffman::{read_prefix_code, HuffmanDecoder};

/// Largest meta-block payload: MLEN is at most 2^24
const MAX_META_BLOCK_LEN: usize = 1 << 24;

/// Decompress a complete Brotli stream
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress_with_limit(input, usize::MAX)
}

/// Decompress with an output ceiling; hostile streams can otherwise claim
/// gigabytes through chained meta-blocks.
pub fn decompress_with_limit(input: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut bits = BitReader::new(input);
    let mut decoder = Decoder::new(&mut bits)?;
    decoder.run(limit)
}

/// Whole-stream decode state
struct Decoder<'a, 'b> {
    bits: &'b mut BitReader<'a>,
    window_size: usize,
    /// Decoded output; doubles as the back-reference window, since the
    /// window never outlives the single-shot output buffer.
    output: Vec<u8>,
    distance_ring: DistanceRing,
    /// Previous two output bytes for context modelling
    p1: u8,
    p2: u8,
}

impl<'a, 'b> Decoder<'a, 'b> {
    fn new(bits: &'b mut BitReader<'a>) -> Result<Self> {
        let wbits = read_window_bits(bits)?;
        debug!("stream window: {} bits", wbits);
        Ok(Self {
            bits,
            window_size: (1usize << wbits) - 16,
            output: Vec::new(),
            distance_ring: DistanceRing::new(),
            p1: 0,
            p2: 0,
        })
    }

    fn run(&mut self, limit: usize) -> Result<Vec<u8>> {
        loop {
            // EOF exactly at a meta-block boundary means the last block
            // never arrived.
            let is_last = match self.bits.read_bit() {
                Ok(bit) => bit,
                Err(Error::EndOfStream) => return Err(Error::TruncatedStream),
                Err(e) => return Err(e),
            };

            if is_last && self.bits.read_bit()? {
                self.bits.skip_to_byte_boundary();
                break;
            }

            let mnibbles = self.bits.read_bits(2)?;
            if mnibbles == 3 {
                self.skip_metadata()?;
                if is_last {
                    self.bits.skip_to_byte_boundary();
                    break;
                }
                continue;
            }

            let nibbles = 4 + mnibbles as u8;
            let mlen = self.bits.read_bits(nibbles * 4)? as usize + 1;
            if self.output.len().saturating_add(mlen) > limit {
                return Err(Error::OutputLimitExceeded(limit));
            }

            let is_uncompressed = if is_last { false } else { self.bits.read_bit()? };
            debug!(
                "meta-block: mlen={} last={} uncompressed={}",
                mlen, is_last, is_uncompressed
            );

            if is_uncompressed {
                self.copy_uncompressed(mlen)?;
            } else {
                self.decode_body(mlen)?;
            }

            if is_last {
                self.bits.skip_to_byte_boundary();
                break;
            }
        }
        Ok(std::mem::take(&mut self.output))
    }

    /// Metadata block: reserved bit, optional skip length, raw bytes
    fn skip_metadata(&mut self) -> Result<()> {
        if self.bits.read_bit()? {
            return Err(Error::ReservedBitSet);
        }
        let skip_bytes = self.bits.read_bits(2)? as u8;
        let skip_len = if skip_bytes == 0 {
            0
        } else {
            self.bits.read_bits(skip_bytes * 8)? as usize + 1
        };
        self.bits.skip_to_byte_boundary();
        self.bits.skip_bytes(skip_len)?;
        debug!("metadata block: skipped {} bytes", skip_len);
        Ok(())
    }

    fn copy_uncompressed(&mut self, mlen: usize) -> Result<()> {
        self.bits.skip_to_byte_boundary();
        let start = self.output.len();
        self.output.resize(start + mlen, 0);
        self.bits.read_bytes(&mut self.output[start..])?;
        self.update_context_bytes();
        Ok(())
    }

    /// Parse one compressed meta-block header and body
    fn decode_body(&mut self, mlen: usize) -> Result<()> {
        debug_assert!(mlen <= MAX_META_BLOCK_LEN);

        let mut literal_blocks = BlockState::read(self.bits)?;
        let mut command_blocks = BlockState::read(self.bits)?;
        let mut distance_blocks = BlockState::read(self.bits)?;

        let postfix_bits = self.bits.read_bits(2)? as u8;
        let direct_codes = self.bits.read_bits(4)? << postfix_bits;
        let params = DistanceParams { postfix_bits, direct_codes };

        let mut modes = Vec::with_capacity(literal_blocks.num_types as usize);
        for _ in 0..literal_blocks.num_types {
            modes.push(ContextMode::from_bits(self.bits.read_bits(2)?));
        }

        let literal_map =
            read_context_map(self.bits, 64 * literal_blocks.num_types as usize)?;
        let distance_map =
            read_context_map(self.bits, 4 * distance_blocks.num_types as usize)?;

        let literal_trees = read_tree_group(self.bits, literal_map.num_trees, 256)?;
        let command_trees = read_tree_group(self.bits, command_blocks.num_types, 704)?;
        let distance_trees =
            read_tree_group(self.bits, distance_map.num_trees, params.alphabet_size())?;

        let mut written = 0usize;
        while written < mlen {
            command_blocks.tick(self.bits)?;
            let symbol = command_trees[command_blocks.current].decode(self.bits)?;
            let code = unpack_command_symbol(symbol);
            let (insert_len, copy_len) = read_lengths(self.bits, &code)?;

            for _ in 0..insert_len {
                if written >= mlen {
                    break;
                }
                literal_blocks.tick(self.bits)?;
                let ctx = literal_context(modes[literal_blocks.current], self.p1, self.p2);
                let tree = literal_map.tree_for(literal_blocks.current, ctx, 64);
                let byte = literal_trees[tree].decode(self.bits)? as u8;
                self.push_byte(byte);
                written += 1;
            }
            if written >= mlen {
                break;
            }

            let distance = match code.distance_hint {
                DistanceHint::ImplicitZero => self.distance_ring.last(),
                DistanceHint::Explicit => {
                    distance_blocks.tick(self.bits)?;
                    let ctx = distance_context(copy_len);
                    let tree = distance_map.tree_for(distance_blocks.current, ctx, 4);
                    let dcode = distance_trees[tree].decode(self.bits)?;
                    let (distance, update) =
                        decode_distance(self.bits, dcode, &self.distance_ring, &params)?;
                    if update {
                        self.distance_ring.push(distance);
                    }
                    distance
                }
            };

            let available = self.output.len().min(self.window_size);
            if distance as usize > available {
                return Err(Error::InvalidDistance {
                    distance,
                    available: available as u64,
                });
            }

            // The last copy of a meta-block may run up against MLEN.
            let mut remaining = copy_len as usize;
            while remaining > 0 && written < mlen {
                let byte = self.output[self.output.len() - distance as usize];
                self.push_byte(byte);
                written += 1;
                remaining -= 1;
            }
        }
        Ok(())
    }

    #[inline]
    fn push_byte(&mut self, byte: u8) {
        self.output.push(byte);
        self.p2 = self.p1;
        self.p1 = byte;
    }

    /// Refresh (p1, p2) from the output tail after a bulk copy
    fn update_context_bytes(&mut self) {
        let n = self.output.len();
        self.p1 = if n >= 1 { self.output[n - 1] } else { 0 };
        self.p2 = if n >= 2 { self.output[n - 2] } else { 0 };
    }
}

fn read_tree_group(
    bits: &mut BitReader,
    count: u32,
    alphabet_size: u16,
) -> Result<Vec<HuffmanDecoder>> {
    let mut trees = Vec::with_capacity(count as usize);
    for _ in 0..count {
        trees.push(read_prefix_code(bits, alphabet_size)?);
    }
    Ok(trees)
}

/// Stream header: WBITS, RFC 7932 section 9.1
pub(crate) fn read_window_bits(bits: &mut BitReader) -> Result<u8> {
    if !bits.read_bit()? {
        return Ok(16);
    }
    let n = bits.read_bits(3)?;
    if n != 0 {
        return Ok(17 + n as u8);
    }
    let n = bits.read_bits(3)?;
    if n == 0 {
        return Ok(17);
    }
    let wbits = 8 + n as u8;
    if wbits < 10 {
        return Err(Error::WindowTooLarge(wbits as u32));
    }
    Ok(wbits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    fn header_22(writer: &mut BitWriter) {
        writer.write_bit(true);
        writer.write_bits(5, 3);
    }

    #[test]
    fn test_window_bits_forms() {
        for (bits, expected) in [
            (vec![0b0000_0000u8], 16u8),
            (vec![0b0000_0001], 17), // 1, 000, 000
            (vec![0b0000_1011], 22), // 1, 101
            (vec![0b0000_1111], 24), // 1, 111
            (vec![0b0100_0001], 12), // 1, 000, 001
        ] {
            let mut reader = BitReader::new(&bits);
            assert_eq!(read_window_bits(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn test_empty_stream_decodes_empty() {
        // wbits=16 ('0'), ISLAST, ISEMPTY -> the canonical 0x06 stream
        assert_eq!(decompress(&[0x06]).unwrap(), b"");
    }

    #[test]
    fn test_truncated_stream() {
        assert!(matches!(decompress(&[]), Err(Error::TruncatedStream)));
        // header then nothing: EOF in the middle of the first meta-block
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        let data = writer.finish();
        assert!(decompress(&data).is_err());
    }

    #[test]
    fn test_uncompressed_meta_block() {
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        writer.write_bit(false); // ISLAST
        writer.write_bits(0, 2); // MNIBBLES -> 4 nibbles
        writer.write_bits(4, 16); // MLEN = 5
        writer.write_bit(true); // ISUNCOMPRESSED
        writer.align_to_byte();
        writer.write_bytes(b"hello");
        writer.write_bit(true); // ISLAST
        writer.write_bit(true); // ISEMPTY
        let data = writer.finish();
        assert_eq!(decompress(&data).unwrap(), b"hello");
    }

    #[test]
    fn test_metadata_block_is_skipped() {
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        // metadata: ISLAST=0, MNIBBLES=3, reserved=0, MSKIPBYTES=1, len-1=2
        writer.write_bit(false);
        writer.write_bits(3, 2);
        writer.write_bit(false);
        writer.write_bits(1, 2);
        writer.write_bits(2, 8);
        writer.align_to_byte();
        writer.write_bytes(b"XYZ");
        // then a real block
        writer.write_bit(false);
        writer.write_bits(0, 2);
        writer.write_bits(1, 16); // MLEN = 2
        writer.write_bit(true);
        writer.align_to_byte();
        writer.write_bytes(b"ok");
        writer.write_bit(true);
        writer.write_bit(true);
        let data = writer.finish();
        assert_eq!(decompress(&data).unwrap(), b"ok");
    }

    #[test]
    fn test_metadata_reserved_bit() {
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        writer.write_bit(false);
        writer.write_bits(3, 2);
        writer.write_bit(true); // reserved bit set
        let data = writer.finish();
        assert!(matches!(decompress(&data), Err(Error::ReservedBitSet)));
    }

    #[test]
    fn test_output_limit() {
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        writer.write_bit(false);
        writer.write_bits(0, 2);
        writer.write_bits(99, 16); // MLEN = 100
        writer.write_bit(true);
        writer.align_to_byte();
        writer.write_bytes(&[0u8; 100]);
        writer.write_bit(true);
        writer.write_bit(true);
        let data = writer.finish();
        assert!(matches!(
            decompress_with_limit(&data, 10),
            Err(Error::OutputLimitExceeded(10))
        ));
        assert_eq!(decompress_with_limit(&data, 100).unwrap().len(), 100);
    }

    #[test]
    fn test_invalid_distance_reported() {
        // A compressed meta-block whose only command copies from before
        // the start of the output.
        let mut writer = BitWriter::new();
        header_22(&mut writer);
        writer.write_bit(true); // ISLAST
        writer.write_bit(false); // not empty
        writer.write_bits(0, 2);
        writer.write_bits(7, 16); // MLEN = 8
        writer.write_bits(0, 1); // NBLTYPESL = 1
        writer.write_bits(0, 1); // NBLTYPESI = 1
        writer.write_bits(0, 1); // NBLTYPESD = 1
        writer.write_bits(0, 2); // NPOSTFIX
        writer.write_bits(0, 4); // NDIRECT
        writer.write_bits(0, 2); // context mode LSB6
        writer.write_bit(false); // NTREESL = 1
        writer.write_bit(false); // NTREESD = 1
        // literal tree: single symbol 'x'
        writer.write_bits(1, 2);
        writer.write_bits(0, 2);
        writer.write_bits(b'x' as u32, 8);
        // command tree: single symbol: insert 1, copy 4, explicit distance
        let sym = crate::command::pack_command_symbol(1, 2, DistanceHint::Explicit);
        writer.write_bits(1, 2);
        writer.write_bits(0, 2);
        writer.write_bits(sym as u32, 10);
        // distance tree: single symbol 3 (= fourth-last = 16)
        writer.write_bits(1, 2);
        writer.write_bits(0, 2);
        writer.write_bits(3, 6);
        // body: command (0 bits), literal (0 bits), distance (0 bits):
        // distance 16 with only 1 byte of history
        let data = writer.finish();
        assert!(matches!(
            decompress(&data),
            Err(Error::InvalidDistance { distance: 16, .. })
        ));
    }
}
