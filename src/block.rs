//! Block header parsing and type dispatch (RFC 8878 §3.1.1.2).
//!
//! Grounded on `oozextract`'s `parse_quantum_header`/`QuantumHeader`
//! dispatch shape in `extractor/mod.rs`: a 3-byte header decoded into a
//! small enum, with size limits enforced before the caller ever looks at
//! the body.

use crate::error::{corruption, Result};

pub const RAW_RLE_MAX_BLOCK_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Raw,
    Rle,
    Compressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last_block: bool,
    pub block_type: BlockType,
    pub block_size: usize,
}

impl BlockHeader {
    /// Parses the 3-byte little-endian block header at `buf[0..3]` and
    /// enforces the RFC's per-type size ceiling (`window_size`-bounded for
    /// compressed blocks, a flat 128 KiB for raw/RLE).
    pub fn parse(buf: &[u8], window_size: u64) -> Result<Self> {
        if buf.len() < 3 {
            return Err(corruption("block header truncated"));
        }
        let raw = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]);
        let last_block = (raw & 1) != 0;
        let block_type = match (raw >> 1) & 0x3 {
            0 => BlockType::Raw,
            1 => BlockType::Rle,
            2 => BlockType::Compressed,
            _ => return Err(corruption("reserved block type")),
        };
        let block_size = (raw >> 3) as usize;

        let limit = match block_type {
            BlockType::Compressed => (window_size as usize).min(RAW_RLE_MAX_BLOCK_SIZE),
            BlockType::Raw | BlockType::Rle => RAW_RLE_MAX_BLOCK_SIZE,
        };
        if block_size > limit {
            return Err(corruption("block size exceeds the format's size ceiling"));
        }

        log::trace!("block header: last={last_block} type={block_type:?} size={block_size}");
        Ok(BlockHeader {
            last_block,
            block_type,
            block_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(last: bool, block_type: u32, size: u32) -> [u8; 3] {
        let raw = (last as u32) | (block_type << 1) | (size << 3);
        [raw as u8, (raw >> 8) as u8, (raw >> 16) as u8]
    }

    #[test_log::test]
    fn parses_raw_block_header() {
        let buf = header_bytes(true, 0, 100);
        let header = BlockHeader::parse(&buf, 1 << 20).unwrap();
        assert_eq!(header.block_type, BlockType::Raw);
        assert_eq!(header.block_size, 100);
        assert!(header.last_block);
    }

    #[test_log::test]
    fn rejects_reserved_block_type() {
        let buf = header_bytes(false, 3, 0);
        assert!(BlockHeader::parse(&buf, 1 << 20).is_err());
    }

    #[test_log::test]
    fn rejects_compressed_block_over_window_size() {
        let buf = header_bytes(false, 2, 5000);
        assert!(BlockHeader::parse(&buf, 1024).is_err());
    }

    #[test_log::test]
    fn rejects_raw_block_over_128kib_even_with_huge_window() {
        let buf = header_bytes(false, 0, (RAW_RLE_MAX_BLOCK_SIZE + 1) as u32);
        assert!(BlockHeader::parse(&buf, 1 << 30).is_err());
    }
}
