//! Error taxonomy for the decoder.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Errors are
//! never silently recovered from mid-frame: once a [`crate::context::DecompressionContext`]
//! returns an error it must be reset before it accepts more input (see
//! [`ErrorKind::StageWrong`]).

use std::fmt;

/// Discriminated error kind, matching the decoder's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input does not begin with a recognized magic number.
    PrefixUnknown,
    /// The frame declares a format version this decoder does not implement.
    VersionUnsupported,
    /// A reserved header bit is set, or an unsupported combination of flags was used.
    FrameParameterUnsupported,
    /// The frame's window size exceeds the configured `WindowLogMax`.
    FrameParameterWindowTooLarge,
    /// A structural inconsistency was found in the compressed stream.
    CorruptionDetected,
    /// The trailing content checksum did not match the decoded content.
    ChecksumWrong,
    /// A dictionary blob is malformed.
    DictionaryCorrupted,
    /// The frame's dictionary ID does not match any attached dictionary.
    DictionaryWrong,
    /// A one-shot call was given an output buffer smaller than the known decompressed size.
    DstSizeTooSmall,
    /// A one-shot call was given more or fewer bytes than exactly one frame occupies.
    SrcSizeWrong,
    /// An allocation failed.
    MemoryAllocation,
    /// The streaming API was used out of order, or on a context already in an error state.
    StageWrong,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::PrefixUnknown => "prefix_unknown",
            ErrorKind::VersionUnsupported => "version_unsupported",
            ErrorKind::FrameParameterUnsupported => "frame_parameter_unsupported",
            ErrorKind::FrameParameterWindowTooLarge => "frame_parameter_windowTooLarge",
            ErrorKind::CorruptionDetected => "corruption_detected",
            ErrorKind::ChecksumWrong => "checksum_wrong",
            ErrorKind::DictionaryCorrupted => "dictionary_corrupted",
            ErrorKind::DictionaryWrong => "dictionary_wrong",
            ErrorKind::DstSizeTooSmall => "dstSize_tooSmall",
            ErrorKind::SrcSizeWrong => "srcSize_wrong",
            ErrorKind::MemoryAllocation => "memory_allocation",
            ErrorKind::StageWrong => "stage_wrong",
        };
        f.write_str(s)
    }
}

/// The crate's error type: a [`ErrorKind`] plus an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {}", msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for constructing a [`ErrorKind::CorruptionDetected`] error.
pub fn corruption(message: impl Into<String>) -> Error {
    let message = message.into();
    log::debug!("corruption detected: {message}");
    Error::with_message(ErrorKind::CorruptionDetected, message)
}

/// Extension trait mirroring the teacher crate's `ErrorContext::assert_*` helpers:
/// small, composable checks that turn a boolean condition into a `Result`.
pub(crate) trait Context<T> {
    fn context(self, message: impl FnOnce() -> String) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context(self, message: impl FnOnce() -> String) -> Result<T> {
        self.ok_or_else(|| corruption(message()))
    }
}

pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(corruption(message()))
    }
}
