use super::{alphabet_bits, CL_DESCRIPTOR_LENGTHS, CODE_LENGTH_ORDER, MAX_CODE_LENGTH};
use crate::bits::BitReader;
use crate::error::{Error, Result};

/// Canonical Huffman decoder
///
/// A table with a single used symbol is degenerate: decoding it consumes
/// zero bits, as required for the simple one-symbol prefix code form.
pub struct HuffmanDecoder {
    /// For each bit length, the starting code and starting symbol index
    bit_info: [(u32, usize); 16],
    /// Symbols sorted by code length, then by symbol value
    symbols: Vec<u16>,
    /// Maximum code length (0 for the single-symbol table)
    max_bits: u8,
    /// The lone symbol of a degenerate table
    single: Option<u16>,
}

impl HuffmanDecoder {
    /// Build from per-symbol code lengths (0 = symbol not used)
    ///
    /// Multi-symbol tables must satisfy the Kraft equality exactly; both
    /// over- and under-subscribed length sets are rejected.
    pub fn from_code_lengths(lengths: &[u8]) -> Result<Self> {
        let mut bl_count = [0u32; 16];
        let mut max_bits = 0u8;
        let mut used = 0usize;
        let mut last_symbol = 0u16;

        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                if len > MAX_CODE_LENGTH {
                    return Err(Error::InvalidPrefixCode("code length exceeds 15"));
                }
                bl_count[len as usize] += 1;
                max_bits = max_bits.max(len);
                used += 1;
                last_symbol = sym as u16;
            }
        }

        if used == 0 {
            return Err(Error::InvalidPrefixCode("no symbols"));
        }
        if used == 1 {
            return Ok(Self {
                bit_info: [(0, 0); 16],
                symbols: vec![last_symbol],
                max_bits: 0,
                single: Some(last_symbol),
            });
        }

        // Kraft equality: sum of 2^(max - len) over used symbols must fill
        // the code space exactly.
        let mut space = 0u64;
        for bits in 1..=max_bits as usize {
            space += (bl_count[bits] as u64) << (max_bits as usize - bits);
        }
        if space != 1u64 << max_bits {
            return Err(Error::InvalidPrefixCode("Kraft equality violated"));
        }

        // First canonical code for each bit length
        let mut next_code = [0u32; 16];
        let mut code = 0u32;
        for bits in 1..=max_bits as usize {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        // Symbols sorted by code length, then by symbol value
        let mut symbols: Vec<(u16, u8)> = lengths
            .iter()
            .enumerate()
            .filter(|(_, &len)| len > 0)
            .map(|(sym, &len)| (sym as u16, len))
            .collect();
        symbols.sort_by_key(|&(sym, len)| (len, sym));
        let sorted_symbols: Vec<u16> = symbols.iter().map(|&(sym, _)| sym).collect();

        let mut bit_info = [(0u32, 0usize); 16];
        let mut symbol_idx = 0;
        for bits in 1..=15usize {
            bit_info[bits] = (next_code[bits], symbol_idx);
            symbol_idx += bl_count[bits] as usize;
        }

        Ok(Self { bit_info, symbols: sorted_symbols, max_bits, single: None })
    }

    /// Decode the next symbol from the bit stream
    pub fn decode(&self, bits: &mut BitReader) -> Result<u16> {
        if let Some(sym) = self.single {
            return Ok(sym);
        }

        let mut code = 0u32;
        for len in 1..=self.max_bits {
            code = (code << 1) | bits.read_bits(1)?;
            let (first_code, first_idx) = self.bit_info[len as usize];

            let count = if len < 15 {
                self.bit_info[len as usize + 1].1 - first_idx
            } else {
                self.symbols.len() - first_idx
            };

            if count > 0 && code >= first_code && code < first_code + count as u32 {
                let idx = first_idx + (code - first_code) as usize;
                return Ok(self.symbols[idx]);
            }
        }

        Err(Error::InvalidPrefixCode("no symbol for code"))
    }

    /// Fixed descriptor code used while reading a complex prefix code
    fn code_length_descriptor() -> Self {
        // Lengths are a compile-time constant and always valid.
        Self::from_code_lengths(&CL_DESCRIPTOR_LENGTHS)
            .expect("fixed descriptor code lengths are valid")
    }
}

/// Read one prefix code in either RFC transmission form
pub fn read_prefix_code(bits: &mut BitReader, alphabet_size: u16) -> Result<HuffmanDecoder> {
    let hskip = bits.read_bits(2)? as u8;
    if hskip == 1 {
        read_simple_code(bits, alphabet_size)
    } else {
        read_complex_code(bits, alphabet_size, hskip)
    }
}

/// Simple form: 1-4 explicit symbols with fixed length shapes
fn read_simple_code(bits: &mut BitReader, alphabet_size: u16) -> Result<HuffmanDecoder> {
    let nsym = bits.read_bits(2)? as usize + 1;
    let width = alphabet_bits(alphabet_size);

    let mut symbols = [0u16; 4];
    for slot in symbols.iter_mut().take(nsym) {
        let sym = bits.read_bits(width)? as u16;
        if sym >= alphabet_size {
            return Err(Error::InvalidPrefixCode("symbol outside alphabet"));
        }
        *slot = sym;
    }
    for i in 0..nsym {
        for j in i + 1..nsym {
            if symbols[i] == symbols[j] {
                return Err(Error::InvalidPrefixCode("duplicate symbol"));
            }
        }
    }

    let mut lengths = vec![0u8; alphabet_size as usize];
    match nsym {
        1 => lengths[symbols[0] as usize] = 1,
        2 => {
            lengths[symbols[0] as usize] = 1;
            lengths[symbols[1] as usize] = 1;
        }
        3 => {
            lengths[symbols[0] as usize] = 1;
            lengths[symbols[1] as usize] = 2;
            lengths[symbols[2] as usize] = 2;
        }
        _ => {
            // Tree-select bit: set selects the skewed [1,2,3,3] shape.
            if bits.read_bit()? {
                lengths[symbols[0] as usize] = 1;
                lengths[symbols[1] as usize] = 2;
                lengths[symbols[2] as usize] = 3;
                lengths[symbols[3] as usize] = 3;
            } else {
                for &sym in symbols.iter().take(4) {
                    lengths[sym as usize] = 2;
                }
            }
        }
    }

    HuffmanDecoder::from_code_lengths(&lengths)
}

/// Complex form: code-length codes, then run-length coded symbol lengths
fn read_complex_code(
    bits: &mut BitReader,
    alphabet_size: u16,
    hskip: u8,
) -> Result<HuffmanDecoder> {
    let descriptor = HuffmanDecoder::code_length_descriptor();

    // Phase 1: up to 18 code-length-code lengths, transmitted in a fixed
    // order with a 32-unit space budget that may end the list early.
    let mut cl_lengths = [0u8; 18];
    let mut space = 32i32;
    let mut num_codes = 0u32;
    for &sym in CODE_LENGTH_ORDER.iter().skip(hskip as usize) {
        let len = descriptor.decode(bits)? as u8;
        cl_lengths[sym] = len;
        if len != 0 {
            space -= 32 >> len;
            num_codes += 1;
            if space <= 0 {
                break;
            }
        }
    }
    if num_codes != 1 && space != 0 {
        return Err(Error::InvalidPrefixCode("code length code space"));
    }

    let cl_decoder = HuffmanDecoder::from_code_lengths(&cl_lengths)?;

    // Phase 2: symbol lengths with repeat escapes. Code 16 repeats the
    // previous non-zero length, code 17 inserts zeros; consecutive repeat
    // codes accumulate their counts in base 4 / base 8.
    let mut lengths = vec![0u8; alphabet_size as usize];
    let mut i = 0usize;
    let mut space = 32768i64;
    let mut prev_nonzero = 8u8;
    let mut repeat = 0usize;
    let mut repeat_len = 0u8;

    while i < alphabet_size as usize && space > 0 {
        let sym = cl_decoder.decode(bits)?;
        match sym {
            0..=15 => {
                lengths[i] = sym as u8;
                i += 1;
                if sym != 0 {
                    prev_nonzero = sym as u8;
                    space -= 32768 >> sym;
                }
                repeat = 0;
            }
            16 | 17 => {
                let extra_bits = (sym - 14) as u8;
                let new_len = if sym == 16 { prev_nonzero } else { 0 };
                if repeat_len != new_len {
                    repeat = 0;
                    repeat_len = new_len;
                }
                let old_repeat = repeat;
                if repeat > 0 {
                    repeat = (repeat - 2) << extra_bits;
                }
                repeat += bits.read_bits(extra_bits)? as usize + 3;
                let delta = repeat - old_repeat;
                if i + delta > alphabet_size as usize {
                    return Err(Error::InvalidPrefixCode("repeat run past alphabet"));
                }
                for _ in 0..delta {
                    lengths[i] = repeat_len;
                    i += 1;
                }
                if repeat_len != 0 {
                    space -= (delta as i64) << (15 - repeat_len);
                }
            }
            _ => return Err(Error::InvalidPrefixCode("bad code length symbol")),
        }
    }
    if space < 0 {
        return Err(Error::InvalidPrefixCode("oversubscribed lengths"));
    }

    HuffmanDecoder::from_code_lengths(&lengths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    #[test]
    fn test_single_symbol_consumes_no_bits() {
        let lengths = [0u8, 0, 5, 0];
        let decoder = HuffmanDecoder::from_code_lengths(&lengths).unwrap();
        let data = [0xFFu8];
        let mut reader = BitReader::new(&data);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 2);
        assert_eq!(reader.bits_consumed(), 0);
    }

    #[test]
    fn test_two_symbol_decode() {
        let lengths = [1u8, 1];
        let decoder = HuffmanDecoder::from_code_lengths(&lengths).unwrap();

        let data = [0b0000_0010u8];
        let mut reader = BitReader::new(&data);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 0);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 1);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_kraft_violation_rejected() {
        // Undersubscribed: two symbols at length 2 leave half the space.
        assert!(HuffmanDecoder::from_code_lengths(&[2u8, 2]).is_err());
        // Oversubscribed: three 1-bit codes.
        assert!(HuffmanDecoder::from_code_lengths(&[1u8, 1, 1]).is_err());
    }

    #[test]
    fn test_canonical_order() {
        // Lengths [2,1,3,3]: symbol 1 gets '0', 0 gets '10', 2 '110', 3 '111'
        let decoder = HuffmanDecoder::from_code_lengths(&[2u8, 1, 3, 3]).unwrap();
        // Stream: 0, 10, 110, 111 -> bit sequence 0,1,0,1,1,0,1,1,1
        let data = [0b1101_1010u8, 0b0000_0001];
        let mut reader = BitReader::new(&data);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 1);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 0);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 2);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 3);
    }

    #[test]
    fn test_read_simple_one_symbol() {
        // HSKIP=1, NSYM-1=0, symbol 65 in 8 bits
        let mut writer = BitWriter::new();
        writer.write_bits(1, 2);
        writer.write_bits(0, 2);
        writer.write_bits(65, 8);
        let data = writer.finish();
        let mut reader = BitReader::new(&data);
        let decoder = read_prefix_code(&mut reader, 256).unwrap();
        assert_eq!(decoder.decode(&mut reader).unwrap(), 65);
    }

    #[test]
    fn test_read_simple_four_symbols_tree_select() {
        // Tree-select set: lengths [1,2,3,3] over listed symbols
        let mut writer = BitWriter::new();
        writer.write_bits(1, 2);
        writer.write_bits(3, 2);
        for sym in [10u32, 20, 30, 40] {
            writer.write_bits(sym, 8);
        }
        writer.write_bit(true);
        // one symbol each: '0' -> 10, '10' -> 20, '110' -> 30, '111' -> 40
        writer.write_bits_reversed(0b0, 1);
        writer.write_bits_reversed(0b10, 2);
        writer.write_bits_reversed(0b110, 3);
        writer.write_bits_reversed(0b111, 3);
        let data = writer.finish();
        let mut reader = BitReader::new(&data);
        let decoder = read_prefix_code(&mut reader, 256).unwrap();
        assert_eq!(decoder.decode(&mut reader).unwrap(), 10);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 20);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 30);
        assert_eq!(decoder.decode(&mut reader).unwrap(), 40);
    }

    #[test]
    fn test_read_simple_rejects_duplicates() {
        let mut writer = BitWriter::new();
        writer.write_bits(1, 2);
        writer.write_bits(1, 2);
        writer.write_bits(7, 8);
        writer.write_bits(7, 8);
        let data = writer.finish();
        let mut reader = BitReader::new(&data);
        assert!(read_prefix_code(&mut reader, 256).is_err());
    }
}
