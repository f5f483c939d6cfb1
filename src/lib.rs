//! A pure-Rust decoder for the Zstandard (zstd) compressed-data format
//! (RFC 8878): frame/block parsing, FSE and Huffman entropy decoding,
//! sequence execution, dictionaries, and a streaming driver with explicit
//! backpressure.
//!
//! The crate is organized bottom-up: [`bitreader`] and [`fse`] are the
//! entropy-coding primitives; [`huffman`], [`literals`] and [`sequences`]
//! decode one section of a compressed block each; [`window`] and
//! [`executor`] turn decoded sequences into output bytes; [`frame`] and
//! [`block`] parse the container framing; [`dictionary`] and [`checksum`]
//! are the two optional side-channels a frame can reference; and
//! [`context`]/[`stream`] tie all of it into the public
//! [`DecompressionContext`] API.

pub mod bitreader;
pub mod block;
pub mod checksum;
pub mod context;
pub mod dictionary;
pub mod error;
pub mod executor;
pub mod frame;
pub mod fse;
pub mod huffman;
pub mod literals;
pub mod sequences;
pub mod stream;
pub mod window;

pub use context::{
    get_decompressed_size, get_frame_header, ContentSize, DecoderParameters, Format, ParamBounds,
    ResetDirective,
};
pub use dictionary::Dictionary;
pub use error::{Error, ErrorKind, Result};
pub use frame::find_frame_compressed_size;
pub use stream::Progress;

/// The owned decoder state machine; see [`context::DecompressionContext`]
/// for its methods and [`stream`] for the streaming driver they call into.
pub use context::DecompressionContext;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test_log::test]
    fn one_shot_roundtrip_through_the_public_api() {
        let mut buf = frame::ZSTD_MAGIC_NUMBER.to_le_bytes().to_vec();
        buf.push(0x20); // single_segment, 1-byte frame content size
        buf.push(3);
        let block_header = 1u32 | (0u32 << 1) | (3u32 << 3); // last_block, Raw, size=3
        buf.extend_from_slice(&block_header.to_le_bytes()[..3]);
        buf.extend_from_slice(b"hi!");

        let mut ctx = DecompressionContext::new();
        let out = ctx.decompress(&buf).unwrap();
        assert_eq!(out, b"hi!");
        assert!(ctx.is_idle());
    }

    #[test_log::test]
    fn get_decompressed_size_reports_the_declared_content_size() {
        let mut buf = frame::ZSTD_MAGIC_NUMBER.to_le_bytes().to_vec();
        buf.push(0x20);
        buf.push(3);
        buf.extend_from_slice(&[0u8; 3]);

        match get_decompressed_size(&buf, DecoderParameters::default().window_log_max, false) {
            ContentSize::Known(size) => assert_eq!(size, 3),
            other => panic!("expected Known(3), got {other:?}"),
        }
    }
}
