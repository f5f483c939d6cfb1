//! Sequence execution: turns decoded `(literal_length, offset, match_length)`
//! triples plus the literals buffer into actual output bytes (RFC 8878
//! §3.1.1.3.2.1). Grounded on spec §4.8's numbered execution steps; the copy
//! mechanics themselves live in [`crate::window`].

use crate::error::{corruption, Result};
use crate::sequences::Sequence;
use crate::window::OutputWindow;

/// Runs every sequence in order: copy its literal span, then its match, then
/// (after the last sequence) whatever literals remain unconsumed.
pub fn execute(sequences: &[Sequence], literals: &[u8], window: &mut OutputWindow) -> Result<()> {
    let mut lit_pos = 0usize;

    for seq in sequences {
        let lit_len = seq.literal_length as usize;
        let lit_end = lit_pos
            .checked_add(lit_len)
            .ok_or_else(|| corruption("literal length overflowed while executing a sequence"))?;
        if lit_end > literals.len() {
            return Err(corruption("sequence consumes more literals than the literals section provided"));
        }
        window.push_literals(&literals[lit_pos..lit_end])?;
        lit_pos = lit_end;

        if seq.match_length > 0 {
            window.copy_match(seq.offset as usize, seq.match_length as usize)?;
        }
    }

    if lit_pos < literals.len() {
        window.push_literals(&literals[lit_pos..])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(lit: u32, off: u32, matc: u32) -> Sequence {
        Sequence { literal_length: lit, offset: off, match_length: matc }
    }

    #[test_log::test]
    fn single_sequence_then_trailing_literals() {
        let literals = b"helloXYZ".to_vec();
        let sequences = vec![seq(5, 5, 3)]; // "hello" literal, then copy "hel" from offset 5
        let mut window = OutputWindow::new(&[]);
        execute(&sequences, &literals, &mut window).unwrap();
        assert_eq!(window.frame_output(), b"hellohelXYZ");
    }

    #[test_log::test]
    fn zero_literal_length_sequence_is_a_pure_match() {
        let literals = b"ab".to_vec();
        let sequences = vec![seq(2, 1, 3)]; // "ab" literal then "bbb" from offset 1
        let mut window = OutputWindow::new(&[]);
        execute(&sequences, &literals, &mut window).unwrap();
        assert_eq!(window.frame_output(), b"abbbb");
    }

    #[test_log::test]
    fn sequence_overrunning_literals_errors() {
        let literals = b"ab".to_vec();
        let sequences = vec![seq(3, 1, 1)];
        let mut window = OutputWindow::new(&[]);
        assert!(execute(&sequences, &literals, &mut window).is_err());
    }

    #[test_log::test]
    fn zero_match_length_is_a_pure_literal_copy() {
        let literals = b"abc".to_vec();
        let sequences = vec![seq(3, 1, 0)];
        let mut window = OutputWindow::new(&[]);
        // offset 1 with no prior output would normally be invalid, but a
        // zero-length match never dereferences it.
        execute(&sequences, &literals, &mut window).unwrap();
        assert_eq!(window.frame_output(), b"abc");
    }
}
