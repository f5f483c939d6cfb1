//! Sequences section: three interleaved FSE streams (literal length, offset
//! code, match length) plus the repeat-offset history (RFC 8878 §3.1.1.3.2).
//!
//! Grounded on spec §4.7 for the decode order and the repeat-offset rotation
//! table, and on [`crate::fse`] for the underlying table mechanics. The
//! predefined distributions are RFC 8878 constants, reproduced in
//! [`crate::fse::predefined`].

use crate::bitreader::{BitReader, ReloadStatus, STREAM_ACCUMULATOR_MIN};
use crate::error::{corruption, Result};
use crate::fse::{self, FseTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Predefined,
    Rle,
    FseCompressed,
    Repeat,
}

impl CompressionMode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => CompressionMode::Predefined,
            1 => CompressionMode::Rle,
            2 => CompressionMode::FseCompressed,
            3 => CompressionMode::Repeat,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sequence {
    pub literal_length: u32,
    pub match_length: u32,
    pub offset: u32,
}

/// Repeat-offset history, initialized to `(1, 4, 8)` per frame or loaded
/// from a dictionary.
#[derive(Debug, Clone, Copy)]
pub struct RepeatOffsets {
    pub rep1: u32,
    pub rep2: u32,
    pub rep3: u32,
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        RepeatOffsets { rep1: 1, rep2: 4, rep3: 8 }
    }
}

#[derive(Clone)]
pub struct SequenceTables {
    pub literal_length: Option<FseTable>,
    pub offset: Option<FseTable>,
    pub match_length: Option<FseTable>,
}

impl Default for SequenceTables {
    fn default() -> Self {
        SequenceTables {
            literal_length: None,
            offset: None,
            match_length: None,
        }
    }
}

const LL_BASE: [u32; 36] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 28, 32, 40, 48, 64,
    128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];
const LL_EXTRA: [u32; 36] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 15, 16,
];
const ML_BASE: [u32; 53] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
    28, 29, 30, 31, 32, 33, 34, 35, 37, 39, 41, 43, 47, 51, 59, 67, 83, 99, 131, 259, 515, 1027,
    2051, 4099, 8195, 16387, 32771, 65539,
];
const ML_EXTRA: [u32; 53] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 5, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
];

/// Reads the `nbSeq` header byte(s), consuming 1, 2 or 3 bytes.
fn read_nb_sequences(buf: &[u8]) -> Result<(usize, usize)> {
    if buf.is_empty() {
        return Err(corruption("sequences section header truncated"));
    }
    let first = buf[0];
    if first == 0 {
        Ok((0, 1))
    } else if first < 128 {
        Ok((first as usize, 1))
    } else if first < 255 {
        if buf.len() < 2 {
            return Err(corruption("sequences section header truncated"));
        }
        let n = ((first as usize - 128) << 8) + buf[1] as usize;
        Ok((n, 2))
    } else {
        if buf.len() < 3 {
            return Err(corruption("sequences section header truncated"));
        }
        let n = buf[1] as usize + ((buf[2] as usize) << 8) + 0x7F00;
        Ok((n, 3))
    }
}

/// Decodes the sequences section body, given `nb_seq > 0` and already-loaded
/// tables. Returns the decoded sequences.
fn decode_body(
    buf: &[u8],
    nb_seq: usize,
    ll_table: &FseTable,
    of_table: &FseTable,
    ml_table: &FseTable,
    window_log: u32,
    reps: &mut RepeatOffsets,
) -> Result<Vec<Sequence>> {
    let mut reader = BitReader::new(buf)?;
    // Encoder write order is literal-length, offset, match-length; the
    // decoder therefore inits in reverse: offset's state sits in the
    // lowest bits, literal-length's in the highest.
    let mut ll_state = ll_table.init_state(&mut reader);
    let mut of_state = of_table.init_state(&mut reader);
    let mut ml_state = ml_table.init_state(&mut reader);

    let force_extra_reload = window_log > STREAM_ACCUMULATOR_MIN;
    let mut sequences = Vec::with_capacity(nb_seq);

    for i in 0..nb_seq {
        if reader.reload() == ReloadStatus::Overflow {
            return Err(corruption("sequence bit reader overran its input"));
        }

        let of_entry = of_table.peek_entry(of_state);
        let offset_code = of_entry.symbol;
        let ll_entry = ll_table.peek_entry(ll_state);
        let ll_code = ll_entry.symbol as usize;
        let ml_entry = ml_table.peek_entry(ml_state);
        let ml_code = ml_entry.symbol as usize;

        if ll_code >= LL_BASE.len() || ml_code >= ML_BASE.len() {
            return Err(corruption("sequence code out of range"));
        }

        let offset_extra_bits = offset_code as u32;
        let offset_value = if offset_extra_bits > 0 {
            if force_extra_reload && offset_extra_bits > STREAM_ACCUMULATOR_MIN / 2 {
                // Large-window offsets can carry enough extra bits that a
                // single read would drain the register past what the other
                // two streams' upcoming reads need; split it across a reload.
                let half = offset_extra_bits / 2;
                let high = reader.read_bits(offset_extra_bits - half);
                reader.reload();
                let low = reader.read_bits(half);
                (1u64 << offset_extra_bits) + (high << half) + low
            } else {
                (1u64 << offset_extra_bits) + reader.read_bits(offset_extra_bits)
            }
        } else {
            1
        };
        // Reload between the offset group and the match-length/literal-length
        // group, matching the encoder's bit-budget assumption.
        reader.reload();

        let ml_extra = ML_EXTRA[ml_code];
        let match_length = ML_BASE[ml_code] + reader.read_bits(ml_extra) as u32;

        let ll_extra = LL_EXTRA[ll_code];
        let literal_length = LL_BASE[ll_code] + reader.read_bits(ll_extra) as u32;

        let offset = resolve_offset(offset_value, literal_length, reps)?;

        sequences.push(Sequence { literal_length, match_length, offset });

        let is_last = i + 1 == nb_seq;
        if !is_last {
            ml_state = ml_table.advance_state(ml_state, &mut reader);
            of_state = of_table.advance_state(of_state, &mut reader);
            ll_state = ll_table.advance_state(ll_state, &mut reader);
        }
    }

    if !reader.is_exhausted() {
        return Err(corruption("sequences section did not end at its bit-stream end mark"));
    }

    Ok(sequences)
}

/// Maps a decoded offset value to an actual match offset, updating the
/// repeat-offset history per spec §4.7 point 3.
fn resolve_offset(offset_value: u64, literal_length: u32, reps: &mut RepeatOffsets) -> Result<u32> {
    if offset_value > 3 {
        let actual = (offset_value - 3) as u32;
        *reps = RepeatOffsets { rep1: actual, rep2: reps.rep1, rep3: reps.rep2 };
        return Ok(actual);
    }

    let lit_zero = literal_length == 0;
    let new_rep1 = match (offset_value, lit_zero) {
        (1, false) => reps.rep1,
        (1, true) => reps.rep2,
        (2, false) => reps.rep2,
        (2, true) => reps.rep3,
        (3, false) => reps.rep3,
        (3, true) => {
            if reps.rep1 == 1 {
                return Err(corruption("repeat offset underflow (rep1 == 1)"));
            }
            reps.rep1 - 1
        }
        _ => unreachable!(),
    };
    if new_rep1 == 0 {
        return Err(corruption("decoded repeat offset is zero"));
    }

    if new_rep1 != reps.rep1 {
        *reps = RepeatOffsets { rep1: new_rep1, rep2: reps.rep1, rep3: reps.rep2 };
    }
    Ok(new_rep1)
}

/// Builds the table for one of the three symbol streams according to its
/// compression mode, consuming from `buf` as needed.
fn build_table(
    buf: &[u8],
    mode: CompressionMode,
    predefined_norm: &'static [i16],
    predefined_log: u32,
    max_symbol: usize,
    max_table_log: u32,
    repeat: Option<&FseTable>,
) -> Result<(FseTable, usize)> {
    match mode {
        CompressionMode::Predefined => Ok((FseTable::build(predefined_norm, max_symbol, predefined_log)?, 0)),
        CompressionMode::Rle => {
            if buf.is_empty() {
                return Err(corruption("RLE sequence table symbol missing"));
            }
            Ok((FseTable::build_rle(buf[0]), 1))
        }
        CompressionMode::FseCompressed => {
            let (norm, sym, table_log, consumed) = fse::read_ncount(buf, max_symbol, max_table_log)?;
            Ok((FseTable::build(&norm, sym, table_log)?, consumed))
        }
        CompressionMode::Repeat => {
            let table = repeat.ok_or_else(|| corruption("Repeat_Mode with no previously valid table"))?;
            Ok((table.clone(), 0))
        }
    }
}

/// Per-stream Accuracy_Log ceilings (spec §3): literal/match lengths top out
/// at 9, offsets at 8.
const LL_MAX_TABLE_LOG: u32 = 9;
const OF_MAX_TABLE_LOG: u32 = 8;
const ML_MAX_TABLE_LOG: u32 = 9;

/// Decodes a full sequences section: header, three tables, and the
/// sequence stream itself.
pub fn decode(
    buf: &[u8],
    window_log: u32,
    reps: &mut RepeatOffsets,
    tables: &mut SequenceTables,
) -> Result<(Vec<Sequence>, usize)> {
    let (nb_seq, mut pos) = read_nb_sequences(buf)?;
    if nb_seq == 0 {
        return Ok((Vec::new(), pos));
    }
    if buf.len() <= pos {
        return Err(corruption("sequences section missing compression-modes byte"));
    }
    let modes_byte = buf[pos];
    pos += 1;
    let ll_mode = CompressionMode::from_bits((modes_byte >> 6) & 0x3);
    let of_mode = CompressionMode::from_bits((modes_byte >> 4) & 0x3);
    let ml_mode = CompressionMode::from_bits((modes_byte >> 2) & 0x3);

    let (ll_table, used) = build_table(
        &buf[pos..],
        ll_mode,
        &fse::predefined::LITERAL_LENGTH_DISTRIBUTION,
        fse::predefined::LITERAL_LENGTH_TABLE_LOG,
        35,
        LL_MAX_TABLE_LOG,
        tables.literal_length.as_ref(),
    )?;
    pos += used;
    let (of_table, used) = build_table(
        &buf[pos..],
        of_mode,
        &fse::predefined::OFFSET_CODE_DISTRIBUTION,
        fse::predefined::OFFSET_CODE_TABLE_LOG,
        31,
        OF_MAX_TABLE_LOG,
        tables.offset.as_ref(),
    )?;
    pos += used;
    let (ml_table, used) = build_table(
        &buf[pos..],
        ml_mode,
        &fse::predefined::MATCH_LENGTH_DISTRIBUTION,
        fse::predefined::MATCH_LENGTH_TABLE_LOG,
        52,
        ML_MAX_TABLE_LOG,
        tables.match_length.as_ref(),
    )?;
    pos += used;

    log::trace!("sequence tables loaded: ll={ll_mode:?} of={of_mode:?} ml={ml_mode:?} nb_seq={nb_seq}");

    let sequences = decode_body(&buf[pos..], nb_seq, &ll_table, &of_table, &ml_table, window_log, reps)?;

    tables.literal_length = Some(ll_table);
    tables.offset = Some(of_table);
    tables.match_length = Some(ml_table);

    Ok((sequences, buf.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn nb_sequences_short_form() {
        let (n, consumed) = read_nb_sequences(&[5]).unwrap();
        assert_eq!(n, 5);
        assert_eq!(consumed, 1);
    }

    #[test_log::test]
    fn nb_sequences_zero_means_literals_only() {
        let (n, consumed) = read_nb_sequences(&[0]).unwrap();
        assert_eq!(n, 0);
        assert_eq!(consumed, 1);
    }

    #[test_log::test]
    fn nb_sequences_medium_form() {
        // 0x80 marker + one extra byte: n = (0x81-128)<<8 + 0x02 = 256+2 = 258
        let (n, consumed) = read_nb_sequences(&[0x81, 0x02]).unwrap();
        assert_eq!(n, 258);
        assert_eq!(consumed, 2);
    }

    #[test_log::test]
    fn repeat_offset_rotation_with_nonzero_literal_length() {
        let mut reps = RepeatOffsets { rep1: 10, rep2: 20, rep3: 30 };
        let offset = resolve_offset(2, 5, &mut reps).unwrap();
        assert_eq!(offset, 20);
        assert_eq!(reps.rep1, 20);
        assert_eq!(reps.rep2, 10);
        assert_eq!(reps.rep3, 30);
    }

    #[test_log::test]
    fn repeat_offset_rep1_minus_one_errors_when_rep1_is_one() {
        let mut reps = RepeatOffsets { rep1: 1, rep2: 4, rep3: 8 };
        assert!(resolve_offset(3, 0, &mut reps).is_err());
    }

    #[test_log::test]
    fn literal_offset_above_three_shifts_history() {
        let mut reps = RepeatOffsets::default();
        let offset = resolve_offset(103, 1, &mut reps).unwrap();
        assert_eq!(offset, 100);
        assert_eq!(reps.rep1, 100);
        assert_eq!(reps.rep2, 1);
        assert_eq!(reps.rep3, 4);
    }
}
