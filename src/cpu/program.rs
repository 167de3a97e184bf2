//! Program memory: pre-assembled 64-bit instruction words.

use crate::cpu::{MemoryError, PROGRAM_MEMORY_SIZE};
use serde::{Deserialize, Serialize};

/// Encoding returned for addresses past the end of program memory (NOP).
pub const NOP_WORD: u64 = 0;

/// Read-mostly instruction store addressed by the program counter.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMemory {
    words: Vec<u64>,
}

impl ProgramMemory {
    /// Create an empty program memory (all NOPs).
    pub fn new() -> Self {
        Self {
            words: vec![NOP_WORD; PROGRAM_MEMORY_SIZE],
        }
    }

    /// Replace the memory image with `program`, padding the rest with NOPs.
    ///
    /// Loading the same program again yields the same image.
    pub fn load(&mut self, program: &[u64]) -> Result<(), MemoryError> {
        if program.len() > PROGRAM_MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: PROGRAM_MEMORY_SIZE,
            });
        }

        self.words.fill(NOP_WORD);
        self.words[..program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Fetch the word at `addr`, or NOP when out of range.
    #[inline]
    pub fn read(&self, addr: u16) -> u64 {
        self.words.get(addr as usize).copied().unwrap_or(NOP_WORD)
    }

    /// Number of words up to and including the last non-NOP word.
    pub fn used(&self) -> usize {
        self.words
            .iter()
            .rposition(|&w| w != NOP_WORD)
            .map_or(0, |last| last + 1)
    }

    /// The memory image, truncated after the last non-NOP word.
    pub fn image(&self) -> &[u64] {
        &self.words[..self.used()]
    }
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgramMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramMemory")
            .field("used", &self.used())
            .field("total_words", &PROGRAM_MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_read() {
        let mut program = ProgramMemory::new();
        program.load(&[1, 2, 3]).unwrap();
        assert_eq!(program.read(0), 1);
        assert_eq!(program.read(2), 3);
        assert_eq!(program.read(3), NOP_WORD);
        assert_eq!(program.used(), 3);
        assert_eq!(program.image(), &[1, 2, 3]);
    }

    #[test]
    fn test_out_of_range_reads_nop() {
        let program = ProgramMemory::new();
        assert_eq!(program.read(PROGRAM_MEMORY_SIZE as u16), NOP_WORD);
        assert_eq!(program.read(u16::MAX), NOP_WORD);
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut once = ProgramMemory::new();
        once.load(&[7, 8]).unwrap();
        let mut twice = once.clone();
        twice.load(&[7, 8]).unwrap();
        assert_eq!(once, twice);

        // A shorter program replaces, not overlays, the old image.
        twice.load(&[9]).unwrap();
        assert_eq!(twice.image(), &[9]);
    }

    #[test]
    fn test_program_too_large() {
        let mut program = ProgramMemory::new();
        let big = vec![1; PROGRAM_MEMORY_SIZE + 1];
        assert_eq!(
            program.load(&big),
            Err(MemoryError::ProgramTooLarge {
                size: PROGRAM_MEMORY_SIZE + 1,
                available: PROGRAM_MEMORY_SIZE,
            })
        );
        assert_eq!(program.used(), 0);
    }
}
