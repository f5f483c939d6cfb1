//! Canonical Huffman table build and decode for the literals section.
//!
//! The weight-list parsing and the single-symbol table build are reproduced
//! from `HUF_readStats`/`HUF_readDTableX1_wksp` (see
//! `examples/original_source/lib/decompress/huf_decompress.c` and
//! `huf_decompress_impl.h` in the retrieved reference sources), re-expressed
//! in the owned-`Vec` style `oozextract`'s `core/huffman.rs` builds its flat
//! decode LUT in.
//!
//! Only the single-symbol (`X1`) table variant is implemented. The
//! reference decoder also ships a double-symbol (`X4`) table that decodes
//! two symbols per lookup; it is a throughput optimization with no effect
//! on the bitstream format, so this decoder always uses the X1 table (see
//! `DESIGN.md`).

use crate::bitreader::{BitReader, ReloadStatus};
use crate::error::{corruption, Result};
use crate::fse::{self, FseTable};

pub const HUF_TABLELOG_MAX: u32 = 12;
pub const HUF_TABLELOG_ABSOLUTE_MAX: u32 = 12;
const HUF_SYMBOL_VALUE_MAX: usize = 255;
const WEIGHT_FSE_TABLELOG_MAX: u32 = 6;

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    symbol: u8,
    nb_bits: u8,
}

/// A built single-symbol Huffman decode table: a flat `1 << table_log` LUT.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    table_log: u32,
    entries: Vec<Entry>,
}

impl HuffmanTable {
    /// Parses a Huffman table description (weight list, direct or
    /// FSE-compressed) from the front of `src` and returns the table plus
    /// the number of bytes consumed.
    pub fn parse(src: &[u8]) -> Result<(Self, usize)> {
        let (weights, consumed) = read_weights(src)?;
        let table = Self::from_weights(&weights)?;
        Ok((table, consumed))
    }

    fn from_weights(weights: &[u8]) -> Result<Self> {
        let nb_symbols = weights.len();
        if nb_symbols == 0 || nb_symbols - 1 > HUF_SYMBOL_VALUE_MAX {
            return Err(corruption("Huffman table has no symbols"));
        }

        // The last symbol's weight is implied: the sum over all symbols of
        // `1 << (weight - 1)` (for weight > 0) must equal the table size.
        let mut rank_count = vec![0u32; (HUF_TABLELOG_MAX + 1) as usize];
        let mut weighted_sum: u32 = 0;
        for &w in weights {
            if w as u32 > HUF_TABLELOG_MAX {
                return Err(corruption("Huffman symbol weight exceeds table log max"));
            }
            rank_count[w as usize] += 1;
            if w > 0 {
                weighted_sum += 1 << (w - 1);
            }
        }
        if weighted_sum == 0 {
            return Err(corruption("Huffman weights are all zero"));
        }
        let table_log = 32 - weighted_sum.leading_zeros();
        let table_size = 1u32 << table_log;
        let last_weight_sum = table_size - weighted_sum;
        if last_weight_sum == 0 {
            return Err(corruption("Huffman table size mismatch (no room for last symbol)"));
        }
        let last_weight = 32 - last_weight_sum.leading_zeros();
        // Re-derive the true weighted sum using a power-of-two check: the
        // implied last weight must make the remainder an exact power of two.
        if (1u32 << (last_weight.saturating_sub(1))) != last_weight_sum && last_weight != 0 {
            return Err(corruption("Huffman implied last symbol weight is inconsistent"));
        }
        rank_count[last_weight as usize] += 1;

        let mut full_weights = weights.to_vec();
        full_weights.push(last_weight as u8);

        // rank_val[w] = starting DTable index for weight w (1-indexed bit layout
        // per `HUF_readDTableX2_wksp`'s "Calculate starting value for each rank").
        let mut rank_val = vec![0u32; (table_log + 2) as usize];
        let mut next_rank_start = 0u32;
        for w in 1..=table_log {
            let current = next_rank_start;
            next_rank_start += rank_count[w as usize] << (w - 1);
            rank_val[w as usize] = current;
        }

        let mut entries = vec![Entry::default(); table_size as usize];
        for (symbol, &w) in full_weights.iter().enumerate() {
            if w == 0 {
                continue;
            }
            let length = (1u32 << w) >> 1;
            let nb_bits = (table_log + 1 - w as u32) as u8;
            let start = rank_val[w as usize];
            for u in start..start + length {
                entries[u as usize] = Entry {
                    symbol: symbol as u8,
                    nb_bits,
                };
            }
            rank_val[w as usize] += length;
        }

        Ok(HuffmanTable { table_log, entries })
    }

    pub fn table_log(&self) -> u32 {
        self.table_log
    }

    /// Decodes a single symbol, advancing `reader`.
    #[inline]
    fn decode_one(&self, reader: &mut BitReader) -> u8 {
        let val = reader.look_bits(self.table_log) as usize;
        let entry = self.entries[val];
        reader.skip_bits(entry.nb_bits as u32);
        entry.symbol
    }

    /// Decodes one Huffman-coded stream into exactly `out.len()` bytes.
    pub fn decode_stream(&self, src: &[u8], out: &mut [u8]) -> Result<()> {
        let mut reader = BitReader::new(src)?;
        let mut i = 0;
        while i < out.len() {
            if reader.reload() == ReloadStatus::Overflow {
                return Err(corruption("Huffman stream overran its bit reader"));
            }
            out[i] = self.decode_one(&mut reader);
            i += 1;
        }
        if !reader_is_consumed(&reader) {
            return Err(corruption("Huffman stream left unconsumed bits"));
        }
        Ok(())
    }

    /// Decodes the 4-stream jump-table layout used whenever a literals
    /// section's regenerated size is large enough to split across 4 parallel
    /// bitstreams (spec §4.6 / §4.3).
    pub fn decode_four_streams(&self, src: &[u8], out: &mut [u8]) -> Result<()> {
        if src.len() < 6 {
            return Err(corruption("Huffman 4-stream jump table truncated"));
        }
        let len1 = u16::from_le_bytes([src[0], src[1]]) as usize;
        let len2 = u16::from_le_bytes([src[2], src[3]]) as usize;
        let len3 = u16::from_le_bytes([src[4], src[5]]) as usize;
        let header = 6usize;
        if header + len1 + len2 + len3 > src.len() {
            return Err(corruption("Huffman 4-stream jump table overruns input"));
        }
        let len4 = src.len() - header - len1 - len2 - len3;

        let s1 = &src[header..header + len1];
        let s2 = &src[header + len1..header + len1 + len2];
        let s3 = &src[header + len1 + len2..header + len1 + len2 + len3];
        let s4 = &src[header + len1 + len2 + len3..];

        let segment_size = out.len().div_ceil(4);
        let total = out.len();
        let (o1_len, rest) = (segment_size.min(total), total.saturating_sub(segment_size));
        let (o2_len, rest) = (segment_size.min(rest), rest.saturating_sub(segment_size));
        let (o3_len, o4_len) = (segment_size.min(rest), rest.saturating_sub(segment_size));

        let (o1, tail) = out.split_at_mut(o1_len);
        let (o2, tail) = tail.split_at_mut(o2_len);
        let (o3, o4) = tail.split_at_mut(o3_len);
        debug_assert_eq!(o4.len(), o4_len);

        self.decode_stream(s1, o1)?;
        self.decode_stream(s2, o2)?;
        self.decode_stream(s3, o3)?;
        self.decode_stream(s4, o4)?;
        Ok(())
    }
}

fn reader_is_consumed(reader: &BitReader) -> bool {
    reader.is_exhausted()
}

/// Parses the weight-list header at the front of `src`: either a direct
/// nibble-packed list (header byte >= 128) or an FSE-compressed one,
/// matching `HUF_readStats`'s two code paths.
fn read_weights(src: &[u8]) -> Result<(Vec<u8>, usize)> {
    if src.is_empty() {
        return Err(corruption("Huffman header truncated"));
    }
    let header = src[0];
    if header as usize >= 128 {
        let nb_symbols = header as usize - 127;
        let bytes_needed = nb_symbols.div_ceil(2);
        if 1 + bytes_needed > src.len() {
            return Err(corruption("Huffman direct weight list truncated"));
        }
        let mut weights = Vec::with_capacity(nb_symbols);
        for i in 0..nb_symbols {
            let byte = src[1 + i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0xF };
            weights.push(nibble);
        }
        Ok((weights, 1 + bytes_needed))
    } else {
        let compressed_size = header as usize;
        if compressed_size < 2 {
            return Err(corruption("Huffman FSE-compressed weight header too short"));
        }
        if 1 + compressed_size > src.len() {
            return Err(corruption("Huffman FSE-compressed weight stream truncated"));
        }
        let payload = &src[1..1 + compressed_size];
        let (norm, max_symbol, table_log, ncount_len) = fse::read_ncount(payload, 11, WEIGHT_FSE_TABLELOG_MAX)?;
        if max_symbol > 11 {
            return Err(corruption("Huffman weight FSE alphabet too large"));
        }
        let table = FseTable::build(&norm, max_symbol, table_log)?;
        let bitstream = &payload[ncount_len..];
        let weights = fse::decompress_interleaved(&table, bitstream, HUF_SYMBOL_VALUE_MAX + 1)?;
        Ok((weights, 1 + compressed_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_flat_table(weight: u8, nb_symbols: usize) -> HuffmanTable {
        let weights = vec![weight; nb_symbols];
        HuffmanTable::from_weights(&weights).unwrap()
    }

    #[test_log::test]
    fn uniform_weights_build_a_balanced_table() {
        // 4 explicit symbols of weight 1 (weighted_sum = 4) plus one implied
        // 5th symbol; weighted_sum is a power of two, so table_log = 3
        // (table size 8), not 2 — the implied symbol always needs its own room.
        let table = build_flat_table(1, 4);
        assert_eq!(table.table_log(), 3);
        assert_eq!(table.entries.len(), 8);
    }

    #[test_log::test]
    fn direct_weight_header_parses_nibbles() {
        // header byte 127+3 = 130 -> 3 symbols, packed into 2 bytes: [0x12, 0x30]
        let src = [130u8, 0x12, 0x30];
        let (weights, consumed) = read_weights(&src).unwrap();
        assert_eq!(weights, vec![1, 2, 3]);
        assert_eq!(consumed, 3);
    }

    #[test_log::test]
    fn rejects_truncated_direct_header() {
        let src = [130u8, 0x12];
        assert!(read_weights(&src).is_err());
    }
}
