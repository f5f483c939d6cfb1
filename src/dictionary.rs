//! Zstd dictionary loading: a raw content-only blob, or a zstd-formatted
//! dictionary (magic + dictID + entropy tables + repeat offsets + content),
//! per RFC 8878's dictionary format appendix.
//!
//! Grounded on spec §4.10: entropy tables reuse [`crate::huffman`] and
//! [`crate::fse`] exactly as [`crate::sequences`] does for in-frame tables,
//! just without the RLE/Predefined/Repeat mode choice (a dictionary's tables
//! are always present in full, FSE-compressed form).

use crate::error::{corruption, Result};
use crate::fse::{self, FseTable};
use crate::huffman::HuffmanTable;
use crate::sequences::{RepeatOffsets, SequenceTables};

pub const ZSTD_DICT_MAGIC: u32 = 0xEC30_A437;

pub struct Dictionary {
    /// 0 for a raw (content-only) dictionary.
    pub dict_id: u32,
    pub content: Vec<u8>,
    pub huffman_table: Option<HuffmanTable>,
    pub tables: SequenceTables,
    pub repeat_offsets: RepeatOffsets,
}

impl Dictionary {
    /// Parses `buf` as a dictionary blob. A buffer that doesn't begin with
    /// the dictionary magic is treated as raw content: no entropy tables, no
    /// repeat-offset history, `dict_id` 0.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() >= 4 && u32::from_le_bytes(buf[0..4].try_into().unwrap()) == ZSTD_DICT_MAGIC {
            Self::parse_formatted(buf)
        } else {
            Ok(Dictionary {
                dict_id: 0,
                content: buf.to_vec(),
                huffman_table: None,
                tables: SequenceTables::default(),
                repeat_offsets: RepeatOffsets::default(),
            })
        }
    }

    fn parse_formatted(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(corruption("dictionary header truncated before dictID"));
        }
        let dict_id = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let mut pos = 8usize;

        let (huffman_table, used) = HuffmanTable::parse(&buf[pos..])?;
        pos += used;
        let (of_table, used) = build_fse_table(&buf[pos..], 31, 8)?;
        pos += used;
        let (ml_table, used) = build_fse_table(&buf[pos..], 52, 9)?;
        pos += used;
        let (ll_table, used) = build_fse_table(&buf[pos..], 35, 9)?;
        pos += used;

        if buf.len() < pos + 12 {
            return Err(corruption("dictionary truncated before its repeat offsets"));
        }
        let rep1 = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        let rep2 = u32::from_le_bytes(buf[pos + 4..pos + 8].try_into().unwrap());
        let rep3 = u32::from_le_bytes(buf[pos + 8..pos + 12].try_into().unwrap());
        pos += 12;
        // Per spec §9's Open Question: loaded as given, not bounds-checked
        // against the dictionary's own content size here. Only an outright
        // zero (never a legal offset) is rejected up front; anything else is
        // validated lazily the first time a sequence actually uses it.
        if rep1 == 0 || rep2 == 0 || rep3 == 0 {
            return Err(corruption("dictionary repeat offset is zero"));
        }

        log::debug!("loaded formatted dictionary: dict_id={dict_id} content_len={}", buf.len() - pos);

        Ok(Dictionary {
            dict_id,
            content: buf[pos..].to_vec(),
            huffman_table: Some(huffman_table),
            tables: SequenceTables {
                literal_length: Some(ll_table),
                offset: Some(of_table),
                match_length: Some(ml_table),
            },
            repeat_offsets: RepeatOffsets { rep1, rep2, rep3 },
        })
    }
}

fn build_fse_table(buf: &[u8], max_symbol: usize, max_table_log: u32) -> Result<(FseTable, usize)> {
    let (norm, sym, table_log, consumed) = fse::read_ncount(buf, max_symbol, max_table_log)?;
    Ok((FseTable::build(&norm, sym, table_log)?, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn unmagicked_buffer_is_treated_as_raw_content() {
        let dict = Dictionary::parse(b"just some content bytes").unwrap();
        assert_eq!(dict.dict_id, 0);
        assert_eq!(dict.content, b"just some content bytes");
        assert!(dict.huffman_table.is_none());
    }

    #[test_log::test]
    fn empty_buffer_is_an_empty_raw_dictionary() {
        let dict = Dictionary::parse(&[]).unwrap();
        assert_eq!(dict.dict_id, 0);
        assert!(dict.content.is_empty());
    }

    #[test_log::test]
    fn formatted_header_truncated_before_dict_id_errors() {
        let buf = ZSTD_DICT_MAGIC.to_le_bytes();
        assert!(Dictionary::parse(&buf).is_err());
    }
}
