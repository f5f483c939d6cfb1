//! Output window: the growing buffer sequences copy literals and matches
//! into, with an optional dictionary content prefix providing back-reference
//! history before the frame's own output begins.
//!
//! The reference decoder manages this with a ring buffer sized to the
//! frame's window; `oozextract` instead manages its whole output through a
//! `Pointer`/`PointerDest` indirection layered over one big `Vec<u8>`. This
//! crate takes the simpler half of that: one `Vec<u8>` and plain `usize`
//! offsets, with no separate ring-buffer wraparound logic, since a decoder
//! that is not also asked to bound memory for indefinitely long streams gets
//! nothing from reintroducing the indirection.

use crate::error::{corruption, Result};

pub struct OutputWindow {
    /// Dictionary content (if any) followed by every byte decoded so far in
    /// the current frame.
    buf: Vec<u8>,
    /// Length of the dictionary content prefix; back-reference offsets are
    /// allowed to reach into it but flushed output never includes it.
    dict_len: usize,
    /// Index into `buf` up to which bytes have already been handed to the caller.
    flushed: usize,
}

impl OutputWindow {
    pub fn new(dict_content: &[u8]) -> Self {
        OutputWindow {
            buf: dict_content.to_vec(),
            dict_len: dict_content.len(),
            flushed: dict_content.len(),
        }
    }

    /// Total bytes produced by the current frame, excluding the dictionary prefix.
    pub fn frame_len(&self) -> usize {
        self.buf.len() - self.dict_len
    }

    pub fn push_literals(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Copies `match_length` bytes from `match_length` bytes... from
    /// `offset` bytes behind the current write cursor, per RFC 8878
    /// §3.1.1.3.2.1. When `offset < match_length` the source range overlaps
    /// the destination range, so the copy must proceed byte-by-byte (an
    /// `extend_from_within` would read bytes that haven't been written yet).
    pub fn copy_match(&mut self, offset: usize, match_length: usize) -> Result<()> {
        if offset == 0 || offset > self.buf.len() {
            return Err(corruption("match offset reaches before the start of available history"));
        }
        let start = self.buf.len() - offset;
        if offset >= match_length {
            self.buf.extend_from_within(start..start + match_length);
        } else {
            self.buf.reserve(match_length);
            for i in 0..match_length {
                let byte = self.buf[start + i];
                self.buf.push(byte);
            }
        }
        Ok(())
    }

    /// Returns the bytes produced since the last call to `take_output`,
    /// marking them as flushed.
    pub fn take_output(&mut self) -> &[u8] {
        let start = self.flushed;
        self.flushed = self.buf.len();
        &self.buf[start..]
    }

    /// Bytes produced but not yet handed to a caller, without marking them
    /// flushed — used by [`crate::stream`] to drain partially across
    /// multiple `decompress_stream` calls when the caller's output is smaller
    /// than what's pending.
    pub fn pending_output(&self) -> &[u8] {
        &self.buf[self.flushed..]
    }

    /// Marks the first `n` pending bytes as handed to the caller.
    pub fn mark_flushed(&mut self, n: usize) {
        self.flushed += n;
    }

    /// All output produced by the current frame so far, dictionary prefix excluded.
    pub fn frame_output(&self) -> &[u8] {
        &self.buf[self.dict_len..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn literals_then_nonoverlapping_match() {
        let mut w = OutputWindow::new(&[]);
        w.push_literals(b"abcd").unwrap();
        w.copy_match(4, 2).unwrap(); // copies "ab"
        assert_eq!(w.frame_output(), b"abcdab");
    }

    #[test_log::test]
    fn overlapping_match_replicates_byte_by_byte() {
        let mut w = OutputWindow::new(&[]);
        w.push_literals(b"a").unwrap();
        w.copy_match(1, 5).unwrap(); // offset < match_length: "aaaaa"
        assert_eq!(w.frame_output(), b"aaaaaa");
    }

    #[test_log::test]
    fn match_offset_into_dictionary_prefix() {
        let mut w = OutputWindow::new(b"dict");
        w.copy_match(4, 2).unwrap(); // references "di" from the dictionary
        assert_eq!(w.frame_output(), b"di");
    }

    #[test_log::test]
    fn match_offset_past_available_history_errors() {
        let mut w = OutputWindow::new(&[]);
        w.push_literals(b"ab").unwrap();
        assert!(w.copy_match(3, 1).is_err());
    }

    #[test_log::test]
    fn take_output_only_returns_new_bytes() {
        let mut w = OutputWindow::new(&[]);
        w.push_literals(b"ab").unwrap();
        assert_eq!(w.take_output(), b"ab");
        w.push_literals(b"cd").unwrap();
        assert_eq!(w.take_output(), b"cd");
    }
}
