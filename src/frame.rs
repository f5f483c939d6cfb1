//! Zstd frame header parsing: magic detection, skippable frames, and the
//! packed `Frame_Header_Descriptor` byte (RFC 8878 §3.1.1).
//!
//! Grounded on `oozextract`'s `extractor/mod.rs` `parse_header` dispatch
//! shape (a small owned struct built field-by-field off a cursor into the
//! input, logged at `debug` as it's parsed), re-targeted at zstd's frame
//! layout instead of Oodle's block header.

use crate::error::{corruption, Error, ErrorKind, Result};

pub const ZSTD_MAGIC_NUMBER: u32 = 0xFD2F_B528;
const SKIPPABLE_MAGIC_LOW: u32 = 0x184D_2A50;
const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D_2A5F;

pub const DEFAULT_WINDOW_LOG_MAX: u32 = 27;
const ZSTD_WINDOWLOG_MIN: u32 = 10;

/// How many more bytes are needed before a [`FrameHeader::parse`] call could
/// make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMore(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Zstd(FrameHeader),
    Skippable { magic: u32, length: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub single_segment: bool,
    pub content_checksum_flag: bool,
    pub dict_id: Option<u32>,
    pub frame_content_size: Option<u64>,
    pub window_size: u64,
}

impl FrameHeader {
    /// Parses one frame header (zstd or skippable) from the front of `buf`.
    /// Returns `Err(NeedMore)`-equivalent via `Ok(Err(..))` so callers can
    /// distinguish "need more bytes" from a hard format error.
    ///
    /// When `magicless` is set (spec §6 `Format::Zstd1Magicless`), `buf` is
    /// assumed to start directly at the `Frame_Header_Descriptor` byte, with
    /// no magic number and no skippable-frame detection (skippable frames
    /// are only recognizable by their magic).
    pub fn parse(buf: &[u8], window_log_max: u32, magicless: bool) -> Result<std::result::Result<(Frame, usize), NeedMore>> {
        if magicless {
            return Self::parse_body(buf, window_log_max, 0);
        }

        if buf.len() < 4 {
            return Ok(Err(NeedMore(4 - buf.len())));
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);

        if (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic) {
            if buf.len() < 8 {
                return Ok(Err(NeedMore(8 - buf.len())));
            }
            let length = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
            if buf.len() < 8 + length as usize {
                return Ok(Err(NeedMore(8 + length as usize - buf.len())));
            }
            return Ok(Ok((Frame::Skippable { magic, length }, 8 + length as usize)));
        }

        if magic != ZSTD_MAGIC_NUMBER {
            return Err(Error::new(ErrorKind::PrefixUnknown));
        }
        Self::parse_body(buf, window_log_max, 4)
    }

    /// Parses the `Frame_Header_Descriptor` and everything after it, with
    /// `descriptor_pos` pointing at the descriptor byte (`4` after a magic
    /// number, `0` in magicless mode).
    fn parse_body(buf: &[u8], window_log_max: u32, descriptor_pos: usize) -> Result<std::result::Result<(Frame, usize), NeedMore>> {
        if buf.len() < descriptor_pos + 1 {
            return Ok(Err(NeedMore(descriptor_pos + 1 - buf.len())));
        }
        let descriptor = buf[descriptor_pos];
        let fcs_flag = descriptor >> 6;
        let single_segment = (descriptor & 0x20) != 0;
        let reserved_bit = (descriptor & 0x08) != 0;
        let content_checksum_flag = (descriptor & 0x04) != 0;
        let dict_id_flag = descriptor & 0x03;

        if reserved_bit {
            return Err(Error::new(ErrorKind::FrameParameterUnsupported));
        }

        let mut pos = descriptor_pos + 1;
        let window_descriptor_len = if single_segment { 0 } else { 1 };
        let dict_id_len = match dict_id_flag {
            0 => 0,
            1 => 1,
            2 => 2,
            3 => 4,
            _ => unreachable!(),
        };
        let fcs_len = fcs_field_size(fcs_flag, single_segment);

        let needed = pos + window_descriptor_len + dict_id_len + fcs_len;
        if buf.len() < needed {
            return Ok(Err(NeedMore(needed - buf.len())));
        }

        let window_log = if single_segment {
            0 // derived from frame_content_size below
        } else {
            let wd = buf[pos];
            pos += 1;
            ZSTD_WINDOWLOG_MIN + ((wd >> 3) as u32)
        };
        let window_base_add = if single_segment {
            0
        } else {
            let wd = buf[pos - 1];
            let mantissa = (wd & 0x07) as u64;
            ((1u64 << window_log) / 8) * mantissa
        };

        let dict_id = if dict_id_len > 0 {
            let mut raw = [0u8; 4];
            raw[..dict_id_len].copy_from_slice(&buf[pos..pos + dict_id_len]);
            pos += dict_id_len;
            Some(u32::from_le_bytes(raw))
        } else {
            None
        };

        let frame_content_size = if fcs_len > 0 {
            let mut raw = [0u8; 8];
            raw[..fcs_len].copy_from_slice(&buf[pos..pos + fcs_len]);
            pos += fcs_len;
            let mut value = u64::from_le_bytes(raw);
            if fcs_len == 2 {
                value += 256;
            }
            Some(value)
        } else {
            None
        };

        let window_size = if single_segment {
            frame_content_size
                .ok_or_else(|| corruption("single-segment frame missing content size"))?
        } else {
            (1u64 << window_log) + window_base_add
        };

        let window_log_bound = 1u64 << window_log_max;
        if !single_segment && window_size > window_log_bound {
            return Err(Error::new(ErrorKind::FrameParameterWindowTooLarge));
        }

        log::debug!(
            "parsed frame header: single_segment={single_segment} checksum={content_checksum_flag} \
             dict_id={dict_id:?} content_size={frame_content_size:?} window_size={window_size}"
        );

        Ok(Ok((
            Frame::Zstd(FrameHeader {
                single_segment,
                content_checksum_flag,
                dict_id,
                frame_content_size,
                window_size,
            }),
            pos,
        )))
    }
}

fn fcs_field_size(fcs_flag: u8, single_segment: bool) -> usize {
    match (fcs_flag, single_segment) {
        (0, true) => 1,
        (0, false) => 0,
        (1, _) => 2,
        (2, _) => 4,
        (3, _) => 8,
        _ => unreachable!(),
    }
}

/// Walks block headers (without decoding bodies) to find the on-wire length
/// of a single frame starting at `buf[0]`, including its optional trailing
/// checksum. Used by callers that need to size a buffer before decoding.
pub fn find_frame_compressed_size(buf: &[u8], window_log_max: u32, magicless: bool) -> Result<usize> {
    let (frame, header_len) = match FrameHeader::parse(buf, window_log_max, magicless)? {
        Ok(v) => v,
        Err(NeedMore(_)) => return Err(corruption("frame header truncated")),
    };
    let header = match frame {
        Frame::Skippable { .. } => return Ok(header_len),
        Frame::Zstd(h) => h,
    };

    let mut pos = header_len;
    loop {
        if pos + 3 > buf.len() {
            return Err(corruption("block header truncated"));
        }
        let raw = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], 0]);
        let last_block = (raw & 1) != 0;
        let block_type = (raw >> 1) & 0x3;
        let block_size = (raw >> 3) as usize;
        // An RLE block's Block_Size field is the regenerated size, not the
        // on-wire payload, which is always exactly one byte (cf. `stream.rs`'s
        // `wire_len` match on `BlockType`).
        let wire_len = if block_type == 1 { 1 } else { block_size };
        pos += 3 + wire_len;
        if last_block {
            break;
        }
    }
    if header.content_checksum_flag {
        pos += 4;
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_segment_header(content_size: u8, checksum: bool) -> Vec<u8> {
        let mut buf = ZSTD_MAGIC_NUMBER.to_le_bytes().to_vec();
        let descriptor = 0x20 | if checksum { 0x04 } else { 0 };
        buf.push(descriptor);
        buf.push(content_size);
        buf
    }

    #[test_log::test]
    fn rejects_unknown_prefix() {
        let buf = [0u8, 1, 2, 3, 4];
        assert_eq!(
            FrameHeader::parse(&buf, DEFAULT_WINDOW_LOG_MAX, false).unwrap_err().kind(),
            ErrorKind::PrefixUnknown
        );
    }

    #[test_log::test]
    fn reports_need_more_on_truncated_magic() {
        let buf = [0x28u8, 0xb5];
        match FrameHeader::parse(&buf, DEFAULT_WINDOW_LOG_MAX, false).unwrap() {
            Err(NeedMore(n)) => assert_eq!(n, 2),
            other => panic!("expected NeedMore, got {other:?}"),
        }
    }

    #[test_log::test]
    fn parses_single_segment_frame_header() {
        let buf = single_segment_header(42, true);
        let (frame, consumed) = FrameHeader::parse(&buf, DEFAULT_WINDOW_LOG_MAX, false).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        match frame {
            Frame::Zstd(h) => {
                assert!(h.single_segment);
                assert!(h.content_checksum_flag);
                assert_eq!(h.frame_content_size, Some(42));
                assert_eq!(h.window_size, 42);
            }
            other => panic!("expected Zstd frame, got {other:?}"),
        }
    }

    #[test_log::test]
    fn detects_skippable_frame() {
        let mut buf = SKIPPABLE_MAGIC_LOW.to_le_bytes().to_vec();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let (frame, consumed) = FrameHeader::parse(&buf, DEFAULT_WINDOW_LOG_MAX, false).unwrap().unwrap();
        assert_eq!(consumed, 11);
        assert!(matches!(frame, Frame::Skippable { length: 3, .. }));
    }

    #[test_log::test]
    fn rejects_window_larger_than_configured_max() {
        // window_log = 10 + (wd >> 3); wd = 0xF8 -> exponent 31 -> way past any max.
        let mut buf = ZSTD_MAGIC_NUMBER.to_le_bytes().to_vec();
        buf.push(0x00); // not single-segment, no checksum, no dict id, fcs flag 0 (absent)
        buf.push(0xF8); // window descriptor
        let err = FrameHeader::parse(&buf, DEFAULT_WINDOW_LOG_MAX, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FrameParameterWindowTooLarge);
    }

    #[test_log::test]
    fn magicless_frame_parses_from_the_descriptor_byte() {
        // Same single-segment frame header as `parses_single_segment_frame_header`,
        // but with the 4-byte magic number stripped off the front.
        let buf = &single_segment_header(42, true)[4..];
        let (frame, consumed) = FrameHeader::parse(buf, DEFAULT_WINDOW_LOG_MAX, true).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        match frame {
            Frame::Zstd(h) => assert_eq!(h.frame_content_size, Some(42)),
            other => panic!("expected Zstd frame, got {other:?}"),
        }
    }
}
