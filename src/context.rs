//! The owned decompression context: parameters, attached dictionary, and the
//! per-frame entropy/window state threaded through [`crate::stream`]'s
//! driver loop.
//!
//! Grounded on `oozextract`'s `core.rs` `Core` struct — one owned
//! decode-state object methods are called against, rather than a
//! caller-managed workspace pointer (spec §9 / REDESIGN R3) — generalized
//! from Oodle's single-format state to zstd's frame/dictionary/parameter set.

use std::sync::Arc;

use crate::dictionary::Dictionary;
use crate::error::{Error, ErrorKind, Result};
use crate::frame::{Frame, FrameHeader, NeedMore, DEFAULT_WINDOW_LOG_MAX};
use crate::huffman::HuffmanTable;
use crate::sequences::{RepeatOffsets, SequenceTables};
use crate::stream::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Frames must begin with the zstd magic number.
    Zstd1,
    /// No magic number; framing is known out of band.
    Zstd1Magicless,
}

/// `{min, max, default}` for one [`DecoderParameters`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamBounds {
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderParameters {
    pub window_log_max: u32,
    pub format: Format,
    pub force_ignore_checksum: bool,
    pub ref_multiple_ddicts: bool,
}

impl Default for DecoderParameters {
    fn default() -> Self {
        DecoderParameters {
            window_log_max: DEFAULT_WINDOW_LOG_MAX,
            format: Format::Zstd1,
            force_ignore_checksum: false,
            ref_multiple_ddicts: false,
        }
    }
}

impl DecoderParameters {
    pub fn window_log_max_bounds() -> ParamBounds {
        ParamBounds { min: 10, max: 31, default: DEFAULT_WINDOW_LOG_MAX as i64 }
    }

    pub fn force_ignore_checksum_bounds() -> ParamBounds {
        ParamBounds { min: 0, max: 1, default: 0 }
    }

    pub fn ref_multiple_ddicts_bounds() -> ParamBounds {
        ParamBounds { min: 0, max: 1, default: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDirective {
    /// Keep the attached dictionary and current parameters.
    SessionOnly,
    /// Wipe the dictionary and reset parameters to their defaults too.
    SessionAndParameters,
}

/// The result of [`get_decompressed_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSize {
    Known(u64),
    Unknown,
    Error,
}

pub struct DecompressionContext {
    pub(crate) state: State,
    pub(crate) params: DecoderParameters,
    pub(crate) dictionary: Option<Arc<Dictionary>>,

    pub(crate) frame_header: Option<FrameHeader>,
    pub(crate) skip_remaining: usize,
    pub(crate) last_block: bool,
    pub(crate) pending_block_header: Option<crate::block::BlockHeader>,

    pub(crate) window: Option<crate::window::OutputWindow>,
    pub(crate) huffman_table: Option<HuffmanTable>,
    pub(crate) sequence_tables: SequenceTables,
    pub(crate) repeat_offsets: RepeatOffsets,
    pub(crate) checksum: crate::checksum::ContentChecksum,

    pub(crate) staging: Vec<u8>,
}

impl DecompressionContext {
    pub fn new() -> Self {
        DecompressionContext {
            state: State::Done,
            params: DecoderParameters::default(),
            dictionary: None,
            frame_header: None,
            skip_remaining: 0,
            last_block: false,
            pending_block_header: None,
            window: None,
            huffman_table: None,
            sequence_tables: SequenceTables::default(),
            repeat_offsets: RepeatOffsets::default(),
            checksum: crate::checksum::ContentChecksum::new(),
            staging: Vec::new(),
        }
    }

    /// True when the context sits at a frame boundary with nothing buffered
    /// — no partially-decoded frame in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Done) && self.staging.is_empty()
    }

    /// Loads a dictionary by value; the context owns the parsed tables and content.
    pub fn load_dictionary(&mut self, dict: Dictionary) {
        self.dictionary = Some(Arc::new(dict));
    }

    /// Loads a dictionary already shared behind an `Arc`, letting callers
    /// reuse one parsed dictionary across multiple contexts without copying
    /// its content or entropy tables.
    pub fn load_dictionary_ref(&mut self, dict: Arc<Dictionary>) {
        self.dictionary = Some(dict);
    }

    pub fn set_parameters(&mut self, params: DecoderParameters) {
        self.params = params;
    }

    /// Resets transient per-frame state. `SessionOnly` keeps the dictionary
    /// and parameters; `SessionAndParameters` wipes both too.
    pub fn reset(&mut self, directive: ResetDirective) {
        self.state = State::Done;
        self.frame_header = None;
        self.skip_remaining = 0;
        self.last_block = false;
        self.pending_block_header = None;
        self.window = None;
        self.huffman_table = None;
        self.sequence_tables = SequenceTables::default();
        self.repeat_offsets = RepeatOffsets::default();
        self.checksum = crate::checksum::ContentChecksum::new();
        self.staging.clear();
        if directive == ResetDirective::SessionAndParameters {
            self.params = DecoderParameters::default();
            self.dictionary = None;
        }
    }

    /// A rough worst-case byte estimate for a context configured with `params`.
    pub fn estimate_size(params: &DecoderParameters) -> usize {
        (1usize << params.window_log_max.min(31)) + 4096
    }
}

impl Default for DecompressionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses just the frame header at the front of `buf`, erroring (rather than
/// returning `NeedMore`) on a truncated input — for callers that already
/// have a whole frame in hand and just want its metadata.
pub fn get_frame_header(buf: &[u8], window_log_max: u32, magicless: bool) -> Result<FrameHeader> {
    match FrameHeader::parse(buf, window_log_max, magicless)? {
        Ok((Frame::Zstd(header), _)) => Ok(header),
        Ok((Frame::Skippable { .. }, _)) => Err(Error::with_message(
            ErrorKind::CorruptionDetected,
            "expected a zstd frame, found a skippable frame",
        )),
        Err(NeedMore(_)) => Err(Error::with_message(ErrorKind::CorruptionDetected, "frame header truncated")),
    }
}

pub use crate::frame::find_frame_compressed_size;

/// Reads a frame's declared content size without decompressing anything.
pub fn get_decompressed_size(buf: &[u8], window_log_max: u32, magicless: bool) -> ContentSize {
    match FrameHeader::parse(buf, window_log_max, magicless) {
        Ok(Ok((Frame::Zstd(header), _))) => match header.frame_content_size {
            Some(size) => ContentSize::Known(size),
            None => ContentSize::Unknown,
        },
        Ok(Ok((Frame::Skippable { .. }, _))) => ContentSize::Unknown,
        Ok(Err(NeedMore(_))) => ContentSize::Error,
        Err(_) => ContentSize::Error,
    }
}

/// A rough worst-case byte estimate for streaming a frame described by `header`.
pub fn estimate_stream_size(header: &FrameHeader) -> usize {
    header.window_size as usize + 4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn new_context_is_idle() {
        let ctx = DecompressionContext::new();
        assert!(ctx.is_idle());
    }

    #[test_log::test]
    fn reset_session_only_keeps_parameters() {
        let mut ctx = DecompressionContext::new();
        let mut params = DecoderParameters::default();
        params.window_log_max = 20;
        ctx.set_parameters(params);
        ctx.reset(ResetDirective::SessionOnly);
        assert_eq!(ctx.params.window_log_max, 20);
    }

    #[test_log::test]
    fn reset_session_and_parameters_restores_defaults() {
        let mut ctx = DecompressionContext::new();
        let mut params = DecoderParameters::default();
        params.window_log_max = 20;
        ctx.set_parameters(params);
        ctx.reset(ResetDirective::SessionAndParameters);
        assert_eq!(ctx.params.window_log_max, DEFAULT_WINDOW_LOG_MAX);
    }
}
