//! Running xxh64 content checksum (RFC 8878 §3.1.1, spec §4.13), compared
//! against a frame's trailing 4-byte field once decoding finishes.
//!
//! Grounded on the real `ruzstd` decoder's own checksum support
//! (`examples/other_examples/manifests/KillingSpark-zstd-rs/Cargo.toml`
//! gates an identical `twox-hash` dependency behind its own `hash` feature);
//! this crate mirrors that shape with its `checksum` feature.

use crate::error::{Error, ErrorKind, Result};

#[cfg(feature = "checksum")]
use std::hash::Hasher;
#[cfg(feature = "checksum")]
use twox_hash::XxHash64;

pub struct ContentChecksum {
    #[cfg(feature = "checksum")]
    hasher: XxHash64,
}

impl ContentChecksum {
    pub fn new() -> Self {
        #[cfg(feature = "checksum")]
        {
            ContentChecksum { hasher: XxHash64::with_seed(0) }
        }
        #[cfg(not(feature = "checksum"))]
        {
            ContentChecksum {}
        }
    }

    /// Feeds more decoded output bytes into the running hash.
    pub fn update(&mut self, bytes: &[u8]) {
        #[cfg(feature = "checksum")]
        {
            self.hasher.write(bytes);
        }
        #[cfg(not(feature = "checksum"))]
        {
            let _ = bytes;
        }
    }

    /// Compares the running hash's low 32 bits against `expected`. With the
    /// `checksum` feature disabled, or when `force_ignore` is set, the field
    /// is treated as already consumed and never checked.
    pub fn verify(&self, expected: u32, force_ignore: bool) -> Result<()> {
        if force_ignore {
            return Ok(());
        }
        #[cfg(feature = "checksum")]
        {
            let actual = self.hasher.finish() as u32;
            if actual != expected {
                return Err(Error::new(ErrorKind::ChecksumWrong));
            }
            Ok(())
        }
        #[cfg(not(feature = "checksum"))]
        {
            let _ = expected;
            Ok(())
        }
    }
}

impl Default for ContentChecksum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg(feature = "checksum")]
mod tests {
    use super::*;

    #[test_log::test]
    fn empty_input_matches_the_well_known_xxh64_seed_zero_vector() {
        let checksum = ContentChecksum::new();
        let expected_full = 0xEF46_DB37_51D8_E999u64;
        assert!(checksum.verify(expected_full as u32, false).is_ok());
    }

    #[test_log::test]
    fn chunked_updates_match_a_single_update() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut whole = ContentChecksum::new();
        whole.update(data);

        let mut chunked = ContentChecksum::new();
        for chunk in data.chunks(7) {
            chunked.update(chunk);
        }

        assert_eq!(whole.hasher.finish(), chunked.hasher.finish());
    }

    #[test_log::test]
    fn mismatched_checksum_is_reported_as_checksum_wrong() {
        let checksum = ContentChecksum::new();
        let err = checksum.verify(0xDEAD_BEEF, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumWrong);
    }

    #[test_log::test]
    fn force_ignore_skips_verification_even_on_mismatch() {
        let checksum = ContentChecksum::new();
        assert!(checksum.verify(0xDEAD_BEEF, true).is_ok());
    }
}
