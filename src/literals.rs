//! Literals section decode: raw, RLE, Huffman-compressed, and treeless
//! (Huffman-reuse) blocks (RFC 8878 §3.1.1.3.1).
//!
//! Grounded on spec §4.6 for the header layout; the Huffman paths delegate
//! to [`crate::huffman`]. Header field widths follow the reference
//! decoder's `ZSTD_getLiteralsBlockSize`-style table of size classes.

use crate::error::{corruption, Result};
use crate::huffman::HuffmanTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralsBlockType {
    Raw,
    Rle,
    Compressed,
    Treeless,
}

pub struct LiteralsSection {
    pub bytes: Vec<u8>,
    pub consumed: usize,
    /// Present when this section carried a new Huffman table (`Compressed`
    /// headers); `None` for `Raw`/`Rle`/`Treeless` sections.
    pub new_huffman_table: Option<HuffmanTable>,
}

/// Decodes one literals section from the front of `buf`. `prev_huffman`
/// supplies the previously-decoded Huffman table for `Treeless` sections.
pub fn decode(buf: &[u8], prev_huffman: Option<&HuffmanTable>) -> Result<LiteralsSection> {
    if buf.is_empty() {
        return Err(corruption("literals section header truncated"));
    }
    let first = buf[0];
    let block_type = match first & 0x3 {
        0 => LiteralsBlockType::Raw,
        1 => LiteralsBlockType::Rle,
        2 => LiteralsBlockType::Compressed,
        3 => LiteralsBlockType::Treeless,
        _ => unreachable!(),
    };
    let size_format = (first >> 2) & 0x3;

    match block_type {
        LiteralsBlockType::Raw | LiteralsBlockType::Rle => {
            let (regenerated_size, header_len) = read_small_size(buf, size_format)?;
            let payload_len = if block_type == LiteralsBlockType::Raw { regenerated_size } else { 1 };
            if buf.len() < header_len + payload_len {
                return Err(corruption("literals payload truncated"));
            }
            let bytes = if block_type == LiteralsBlockType::Raw {
                buf[header_len..header_len + regenerated_size].to_vec()
            } else {
                vec![buf[header_len]; regenerated_size]
            };
            Ok(LiteralsSection {
                bytes,
                consumed: header_len + payload_len,
                new_huffman_table: None,
            })
        }
        LiteralsBlockType::Compressed | LiteralsBlockType::Treeless => {
            let (regenerated_size, compressed_size, four_streams, header_len) =
                read_compressed_header(buf, size_format)?;
            if buf.len() < header_len + compressed_size {
                return Err(corruption("compressed literals payload truncated"));
            }
            let payload = &buf[header_len..header_len + compressed_size];
            let mut bytes = vec![0u8; regenerated_size];
            let mut new_huffman_table = None;

            match block_type {
                LiteralsBlockType::Compressed => {
                    let (table, used) = HuffmanTable::parse(payload)?;
                    let body = &payload[used..];
                    if four_streams {
                        table.decode_four_streams(body, &mut bytes)?;
                    } else {
                        table.decode_stream(body, &mut bytes)?;
                    }
                    new_huffman_table = Some(table);
                }
                LiteralsBlockType::Treeless => {
                    let table = prev_huffman
                        .ok_or_else(|| corruption("treeless literals with no prior Huffman table"))?;
                    if four_streams {
                        table.decode_four_streams(payload, &mut bytes)?;
                    } else {
                        table.decode_stream(payload, &mut bytes)?;
                    }
                }
                _ => unreachable!(),
            }

            Ok(LiteralsSection {
                bytes,
                consumed: header_len + compressed_size,
                new_huffman_table,
            })
        }
    }
}

/// Reads the `Raw`/`Rle` literals header: 1, 2 or 3 bytes depending on
/// `size_format`, carrying a 5/12/20-bit `regenerated_size`.
fn read_small_size(buf: &[u8], size_format: u8) -> Result<(usize, usize)> {
    match size_format {
        0 | 2 => {
            // 1 byte total, 5-bit size (format bit 1 is ignored for Raw/Rle
            // per RFC 8878; both 0 and 2 select the 1-byte header).
            Ok(((buf[0] >> 3) as usize, 1))
        }
        1 => {
            if buf.len() < 2 {
                return Err(corruption("literals header truncated"));
            }
            let v = (buf[0] as usize >> 4) | ((buf[1] as usize) << 4);
            Ok((v, 2))
        }
        3 => {
            if buf.len() < 3 {
                return Err(corruption("literals header truncated"));
            }
            let v = (buf[0] as usize >> 4) | ((buf[1] as usize) << 4) | ((buf[2] as usize) << 12);
            Ok((v, 3))
        }
        _ => unreachable!(),
    }
}

/// Reads the `Compressed`/`Treeless` literals header: 3, 4 or 5 bytes
/// carrying `regenerated_size`, `compressed_size` and the 1-stream/4-stream flag.
fn read_compressed_header(buf: &[u8], size_format: u8) -> Result<(usize, usize, bool, usize)> {
    match size_format {
        0 | 1 => {
            if buf.len() < 3 {
                return Err(corruption("compressed literals header truncated"));
            }
            let bits = (buf[0] as u32 >> 4) | ((buf[1] as u32) << 4) | ((buf[2] as u32) << 12);
            let regenerated_size = (bits & 0x3FF) as usize;
            let compressed_size = ((bits >> 10) & 0x3FF) as usize;
            let four_streams = size_format == 1;
            Ok((regenerated_size, compressed_size, four_streams, 3))
        }
        2 => {
            if buf.len() < 4 {
                return Err(corruption("compressed literals header truncated"));
            }
            let bits = (buf[0] as u64 >> 4)
                | ((buf[1] as u64) << 4)
                | ((buf[2] as u64) << 12)
                | ((buf[3] as u64) << 20);
            let regenerated_size = (bits & 0x3FFF) as usize;
            let compressed_size = ((bits >> 14) & 0x3FFF) as usize;
            Ok((regenerated_size, compressed_size, true, 4))
        }
        3 => {
            if buf.len() < 5 {
                return Err(corruption("compressed literals header truncated"));
            }
            let bits = (buf[0] as u64 >> 4)
                | ((buf[1] as u64) << 4)
                | ((buf[2] as u64) << 12)
                | ((buf[3] as u64) << 20)
                | ((buf[4] as u64) << 28);
            let regenerated_size = (bits & 0x3FFFF) as usize;
            let compressed_size = ((bits >> 18) & 0x3FFFF) as usize;
            Ok((regenerated_size, compressed_size, true, 5))
        }
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn decodes_raw_literals() {
        // size_format 0, 5-bit regenerated_size = 3, followed by 3 bytes.
        let buf = [(3u8 << 3), 0xAA, 0xBB, 0xCC];
        let section = decode(&buf, None).unwrap();
        assert_eq!(section.bytes, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(section.consumed, 4);
    }

    #[test_log::test]
    fn decodes_rle_literals() {
        let buf = [(5u8 << 3) | 1, 0x42];
        let section = decode(&buf, None).unwrap();
        assert_eq!(section.bytes, vec![0x42; 5]);
        assert_eq!(section.consumed, 2);
    }

    #[test_log::test]
    fn treeless_without_prior_table_errors() {
        let buf = [3u8, 0, 0];
        assert!(decode(&buf, None).is_err());
    }
}
