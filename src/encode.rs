//! Meta-block encode driver
//!
//! Emits either a compressed stream built from the LZ77 command sequence
//! or, when the input yields no back-references, the uncompressed fallback
//! framing that is byte-identical to the canonical encoder's lowest-quality
//! output for inputs up to 64 KiB.

use log::debug;

use crate::bits::BitWriter;
use crate::command::{
    fits_implicit, length_code, pack_command_symbol, write_lengths, CommandCode, DistanceHint,
    COPY_LENGTH_TABLE, INSERT_LENGTH_TABLE,
};
use crate::distance::{encode_distance, write_distance_extra, DistanceParams, DistanceRing};
use crate::huffman::{build_codes_from_lengths, compute_code_lengths, write_prefix_code};
use crate::lz77::{find_commands, is_all_literals, Command};

/// Meta-block payload ceiling (MLEN field)
const META_BLOCK_LIMIT: usize = 1 << 24;

/// Chunk size of the uncompressed fallback framing
const FALLBACK_CHUNK: usize = 1 << 16;

/// Encoder knobs
#[derive(Debug, Clone)]
pub struct CompressConfig {
    /// Window parameter; clamped to 10..=24
    pub window_bits: u8,
    /// Skip match finding and emit the uncompressed framing
    pub force_uncompressed: bool,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self { window_bits: 22, force_uncompressed: false }
    }
}

/// Counters reported by the CLI surface
#[derive(Debug, Clone, Default)]
pub struct CompressStats {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub meta_blocks: u64,
    pub commands: u64,
    pub literals: u64,
}

/// Compress with default settings
pub fn compress(input: &[u8]) -> Vec<u8> {
    compress_with_config(input, &CompressConfig::default())
}

pub fn compress_with_config(input: &[u8], config: &CompressConfig) -> Vec<u8> {
    compress_stats(input, config).0
}

/// Compress and report what was emitted
pub fn compress_stats(input: &[u8], config: &CompressConfig) -> (Vec<u8>, CompressStats) {
    let wbits = config.window_bits.clamp(10, 24);
    let mut stats = CompressStats { input_bytes: input.len() as u64, ..Default::default() };

    if input.is_empty() || config.force_uncompressed {
        let out = fallback(input, &mut stats);
        stats.output_bytes = out.len() as u64;
        return (out, stats);
    }

    let max_distance = (1usize << wbits) - 16;
    let commands = find_commands(input, max_distance);
    if is_all_literals(&commands) {
        debug!("no back-references found, taking the uncompressed path");
        let out = fallback(input, &mut stats);
        stats.output_bytes = out.len() as u64;
        return (out, stats);
    }

    let mut writer = BitWriter::with_capacity(input.len() / 2 + 64);
    write_window_bits(&mut writer, wbits);

    let mut ring = DistanceRing::new();
    for group in split_meta_blocks(&commands) {
        emit_compressed_block(&mut writer, input, &group, &mut ring, &mut stats);
    }

    // Terminating empty last block
    writer.write_bit(true);
    writer.write_bit(true);

    let out = writer.finish();
    debug!(
        "compressed {} bytes into {} across {} meta-blocks",
        input.len(),
        out.len(),
        stats.meta_blocks
    );
    stats.output_bytes = out.len() as u64;
    (out, stats)
}

/// Uncompressed framing: 64 KiB chunks, then an empty last block. The empty
/// input gets the one-byte stream the canonical encoder emits.
fn fallback(input: &[u8], stats: &mut CompressStats) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(input.len() + input.len() / FALLBACK_CHUNK + 8);
    if input.is_empty() {
        writer.write_bit(false); // WBITS = 16
        writer.write_bit(true); // ISLAST
        writer.write_bit(true); // ISEMPTY
        return writer.finish();
    }

    write_window_bits(&mut writer, 22);
    for chunk in input.chunks(FALLBACK_CHUNK) {
        writer.write_bit(false); // ISLAST
        writer.write_bits(0, 2); // MNIBBLES -> 4 nibbles
        writer.write_bits(chunk.len() as u32 - 1, 16);
        writer.write_bit(true); // ISUNCOMPRESSED
        writer.align_to_byte();
        writer.write_bytes(chunk);
        stats.meta_blocks += 1;
        stats.literals += chunk.len() as u64;
    }
    writer.write_bit(true); // ISLAST
    writer.write_bit(true); // ISEMPTY
    stats.meta_blocks += 1;
    writer.finish()
}

fn write_window_bits(writer: &mut BitWriter, wbits: u8) {
    match wbits {
        16 => writer.write_bit(false),
        17 => {
            writer.write_bit(true);
            writer.write_bits(0, 3);
            writer.write_bits(0, 3);
        }
        18..=24 => {
            writer.write_bit(true);
            writer.write_bits(wbits as u32 - 17, 3);
        }
        _ => {
            writer.write_bit(true);
            writer.write_bits(0, 3);
            writer.write_bits(wbits as u32 - 8, 3);
        }
    }
}

/// Group commands into meta-block sized spans; oversized literal runs are
/// split into insert-only commands at the group edges.
fn split_meta_blocks(commands: &[Command]) -> Vec<Vec<Command>> {
    let mut groups: Vec<Vec<Command>> = vec![Vec::new()];
    let mut group_len = 0usize;

    fn close(groups: &mut Vec<Vec<Command>>, group_len: &mut usize) {
        groups.push(Vec::new());
        *group_len = 0;
    }

    for &cmd in commands {
        let mut literal_start = cmd.literal_start;
        let mut insert_len = cmd.insert_len;
        loop {
            let room = META_BLOCK_LIMIT - group_len;
            if insert_len + cmd.copy_len <= room {
                groups
                    .last_mut()
                    .expect("group list never empty")
                    .push(Command { literal_start, insert_len, ..cmd });
                group_len += insert_len + cmd.copy_len;
                if group_len == META_BLOCK_LIMIT {
                    close(&mut groups, &mut group_len);
                }
                break;
            }
            // Fill the group with literals and start a fresh one.
            let take = insert_len.min(room);
            if take > 0 {
                groups.last_mut().expect("group list never empty").push(Command {
                    literal_start,
                    insert_len: take,
                    copy_len: 0,
                    distance: 0,
                });
                literal_start += take;
                insert_len -= take;
            }
            close(&mut groups, &mut group_len);
        }
    }

    if groups.last().is_some_and(|g| g.is_empty()) {
        groups.pop();
    }
    groups
}

/// Resolved per-command wire data
struct WireCommand {
    code: CommandCode,
    insert_len: u32,
    copy_len: u32,
    literal_start: usize,
    /// Explicit distance code with its extra bits, if any
    distance: Option<(u16, u32, u8)>,
}

/// Emit one compressed meta-block: a single block type per category, LSB6
/// context, one literal and one distance tree, NPOSTFIX = NDIRECT = 0.
fn emit_compressed_block(
    writer: &mut BitWriter,
    input: &[u8],
    commands: &[Command],
    ring: &mut DistanceRing,
    stats: &mut CompressStats,
) {
    let params = DistanceParams { postfix_bits: 0, direct_codes: 0 };
    let mlen: usize = commands.iter().map(|c| c.insert_len + c.copy_len).sum();
    debug_assert!(mlen >= 1 && mlen <= META_BLOCK_LIMIT);

    // Pass 1: resolve symbols and distance codes, collecting histograms.
    // The ring evolves here exactly as the decoder will evolve it.
    let mut literal_freq = [0u32; 256];
    let mut command_freq = [0u32; 704];
    let mut distance_freq = [0u32; 64];
    let mut wire = Vec::with_capacity(commands.len());

    for cmd in commands {
        for &byte in &input[cmd.literal_start..cmd.literal_start + cmd.insert_len] {
            literal_freq[byte as usize] += 1;
        }
        stats.literals += cmd.insert_len as u64;

        if cmd.copy_len == 0 {
            // Trailing literal run: a dummy copy code the decoder never
            // resolves, because MLEN is reached inside the insert phase.
            let (insert_code, _) = length_code(&INSERT_LENGTH_TABLE, cmd.insert_len as u32);
            let code = CommandCode {
                insert_code,
                copy_code: 0,
                distance_hint: DistanceHint::Explicit,
            };
            command_freq[pack_command_symbol(code.insert_code, 0, code.distance_hint) as usize] +=
                1;
            wire.push(WireCommand {
                code,
                insert_len: cmd.insert_len as u32,
                copy_len: COPY_LENGTH_TABLE[0].0,
                literal_start: cmd.literal_start,
                distance: None,
            });
            continue;
        }

        let (dcode, dextra, dextra_bits) = encode_distance(cmd.distance, ring, &params);
        let (insert_code, _) = length_code(&INSERT_LENGTH_TABLE, cmd.insert_len as u32);
        let (copy_code, _) = length_code(&COPY_LENGTH_TABLE, cmd.copy_len as u32);

        let implicit = dcode == 0 && fits_implicit(insert_code, copy_code);
        let hint = if implicit { DistanceHint::ImplicitZero } else { DistanceHint::Explicit };
        let code = CommandCode { insert_code, copy_code, distance_hint: hint };
        command_freq[pack_command_symbol(insert_code, copy_code, hint) as usize] += 1;

        let distance = if implicit {
            None
        } else {
            distance_freq[dcode as usize] += 1;
            Some((dcode, dextra, dextra_bits))
        };
        if dcode != 0 {
            ring.push(cmd.distance);
        }

        wire.push(WireCommand {
            code,
            insert_len: cmd.insert_len as u32,
            copy_len: cmd.copy_len as u32,
            literal_start: cmd.literal_start,
            distance,
        });
    }

    // Every table must be transmittable even when unused.
    if literal_freq.iter().all(|&f| f == 0) {
        literal_freq[0] = 1;
    }
    if distance_freq.iter().all(|&f| f == 0) {
        distance_freq[0] = 1;
    }

    // Header
    writer.write_bit(false); // ISLAST
    let mut nibbles = 4u8;
    while (mlen - 1) >> (4 * nibbles) != 0 {
        nibbles += 1;
    }
    writer.write_bits(nibbles as u32 - 4, 2);
    writer.write_bits(mlen as u32 - 1, nibbles * 4);
    writer.write_bit(false); // ISUNCOMPRESSED
    writer.write_bit(false); // NBLTYPESL = 1
    writer.write_bit(false); // NBLTYPESI = 1
    writer.write_bit(false); // NBLTYPESD = 1
    writer.write_bits(0, 2); // NPOSTFIX
    writer.write_bits(0, 4); // NDIRECT
    writer.write_bits(0, 2); // context mode LSB6
    writer.write_bit(false); // NTREESL = 1
    writer.write_bit(false); // NTREESD = 1

    let literal_lengths = compute_code_lengths(&literal_freq, 15);
    let command_lengths = compute_code_lengths(&command_freq, 15);
    let distance_lengths = compute_code_lengths(&distance_freq, 15);
    write_prefix_code(writer, &literal_lengths, 256);
    write_prefix_code(writer, &command_lengths, 704);
    write_prefix_code(writer, &distance_lengths, 64);

    let literal_codes = build_codes_from_lengths(&literal_lengths);
    let command_codes = build_codes_from_lengths(&command_lengths);
    let distance_codes = build_codes_from_lengths(&distance_lengths);

    // Body
    for cmd in &wire {
        let symbol =
            pack_command_symbol(cmd.code.insert_code, cmd.code.copy_code, cmd.code.distance_hint);
        let (code, len) = command_codes[symbol as usize];
        writer.write_bits_reversed(code, len);
        write_lengths(writer, &cmd.code, cmd.insert_len, cmd.copy_len);

        for &byte in &input[cmd.literal_start..cmd.literal_start + cmd.insert_len as usize] {
            let (code, len) = literal_codes[byte as usize];
            writer.write_bits_reversed(code, len);
        }

        if let Some((dcode, extra, extra_bits)) = cmd.distance {
            let (code, len) = distance_codes[dcode as usize];
            writer.write_bits_reversed(code, len);
            write_distance_extra(writer, extra, extra_bits);
        }
    }

    stats.meta_blocks += 1;
    stats.commands += wire.len() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decompress;

    #[test]
    fn test_empty_input_canonical_byte() {
        assert_eq!(compress(b""), vec![0x06]);
    }

    #[test]
    fn test_single_byte_fallback_layout() {
        // WBITS=22 header, one uncompressed meta-block of length 1, empty
        // last block: 0b 00 80 61 03
        assert_eq!(compress(b"a"), vec![0x0B, 0x00, 0x80, 0x61, 0x03]);
    }

    #[test]
    fn test_hello_world_fallback_layout() {
        let out = compress(b"Hello, World!");
        let mut expected = vec![0x0B, 0x06, 0x80];
        expected.extend_from_slice(b"Hello, World!");
        expected.push(0x03);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_fallback_chunking() {
        let input = vec![0x55u8; FALLBACK_CHUNK + 3];
        let config = CompressConfig { force_uncompressed: true, ..Default::default() };
        let (out, stats) = compress_stats(&input, &config);
        // one full chunk + 3-byte chunk + empty last block
        assert_eq!(stats.meta_blocks, 3);
        assert_eq!(decompress(&out).unwrap(), input);
    }

    #[test]
    fn test_repeated_bytes_compress() {
        let input = vec![b'A'; 100];
        let (out, stats) = compress_stats(&input, &CompressConfig::default());
        assert!(out.len() < 20, "run of 100 should shrink, got {}", out.len());
        assert!(stats.commands >= 1);
        assert_eq!(decompress(&out).unwrap(), input);
    }

    #[test]
    fn test_split_meta_blocks_boundaries() {
        // A literal run larger than one meta-block is split
        let commands = vec![Command {
            literal_start: 0,
            insert_len: META_BLOCK_LIMIT + 10,
            copy_len: 0,
            distance: 0,
        }];
        let groups = split_meta_blocks(&commands);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][0].insert_len, META_BLOCK_LIMIT);
        assert_eq!(groups[1][0].insert_len, 10);

        // A copy that no longer fits moves to the next group intact
        let commands = vec![
            Command { literal_start: 0, insert_len: META_BLOCK_LIMIT - 2, copy_len: 0, distance: 0 },
            Command { literal_start: META_BLOCK_LIMIT - 2, insert_len: 1, copy_len: 50, distance: 9 },
        ];
        let groups = split_meta_blocks(&commands);
        assert_eq!(groups.len(), 2);
        let first_len: usize = groups[0].iter().map(|c| c.insert_len + c.copy_len).sum();
        assert_eq!(first_len, META_BLOCK_LIMIT - 1);
        assert_eq!(groups[1][0].copy_len, 50);
    }

    #[test]
    fn test_window_bits_header_values() {
        for wbits in [10u8, 16, 17, 21, 22, 24] {
            let mut writer = BitWriter::new();
            write_window_bits(&mut writer, wbits);
            writer.align_to_byte();
            let data = writer.finish();
            let mut reader = crate::bits::BitReader::new(&data);
            let back = crate::decode::read_window_bits(&mut reader).unwrap();
            assert_eq!(back, wbits);
        }
    }
}
