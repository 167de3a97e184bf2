//! Data memory.
//!
//! 512 word cells. Addresses 0..255 form the I/O space (see [`crate::cpu::io`]),
//! addresses 256..511 the data space reached by STS/LDS/ST/LD.

use crate::cpu::DATA_MEMORY_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat data memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMemory {
    cells: Vec<u32>,
}

impl DataMemory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; DATA_MEMORY_SIZE],
        }
    }

    /// Clear all cells to zero.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Read a cell. Out-of-range addresses read as 0.
    #[inline]
    pub fn read(&self, addr: u32) -> u32 {
        self.cells.get(addr as usize).copied().unwrap_or(0)
    }

    /// Write a cell. Out-of-range addresses leave memory untouched.
    pub fn write(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let cell = self
            .cells
            .get_mut(addr as usize)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;
        *cell = value;
        Ok(())
    }

    /// Set one bit (0..32) of a cell.
    pub fn set_bit(&mut self, addr: u32, bit: u32) -> Result<(), MemoryError> {
        let mask = bit_mask(bit)?;
        let value = self.read(addr) | mask;
        self.write(addr, value)
    }

    /// Clear one bit (0..32) of a cell.
    pub fn clear_bit(&mut self, addr: u32, bit: u32) -> Result<(), MemoryError> {
        let mask = bit_mask(bit)?;
        let value = self.read(addr) & !mask;
        self.write(addr, value)
    }

    /// Dump a range of cells (for debugging).
    pub fn dump(&self, start: u32, count: usize) -> Vec<(u32, u32)> {
        let start = (start as usize).min(DATA_MEMORY_SIZE);
        let end = start.saturating_add(count).min(DATA_MEMORY_SIZE);
        (start..end).map(|i| (i as u32, self.cells[i])).collect()
    }
}

fn bit_mask(bit: u32) -> Result<u32, MemoryError> {
    1u32.checked_shl(bit).ok_or(MemoryError::BitOutOfRange(bit))
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("DataMemory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &DATA_MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {0:#x} out of range")]
    AddressOutOfRange(u32),
    /// Program is too large to fit in program memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
    /// Bit index is not below the word width.
    #[error("bit {0} out of range")]
    BitOutOfRange(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = DataMemory::new();
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10), 42);
        mem.write(511, 0xDEAD_BEEF).unwrap();
        assert_eq!(mem.read(511), 0xDEAD_BEEF);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = DataMemory::new();
        assert_eq!(mem.write(512, 1), Err(MemoryError::AddressOutOfRange(512)));
        assert_eq!(mem.read(512), 0);
        assert_eq!(mem.read(u32::MAX), 0);
        assert!(mem.dump(0, DATA_MEMORY_SIZE).iter().all(|&(_, v)| v == 0));
    }

    #[test]
    fn test_bit_helpers() {
        let mut mem = DataMemory::new();
        mem.set_bit(0x0A, 2).unwrap();
        mem.set_bit(0x0A, 0).unwrap();
        assert_eq!(mem.read(0x0A), 0b101);
        mem.clear_bit(0x0A, 2).unwrap();
        assert_eq!(mem.read(0x0A), 0b001);
        assert!(mem.set_bit(600, 0).is_err());
    }

    #[test]
    fn test_bit_index_past_word_width() {
        let mut mem = DataMemory::new();
        mem.write(0x0A, 0b10).unwrap();
        assert_eq!(mem.set_bit(0x0A, 33), Err(MemoryError::BitOutOfRange(33)));
        assert_eq!(mem.clear_bit(0x0A, 33), Err(MemoryError::BitOutOfRange(33)));
        assert_eq!(mem.read(0x0A), 0b10);

        mem.set_bit(0x0A, 31).unwrap();
        assert_eq!(mem.read(0x0A), 0x8000_0002);
    }

    #[test]
    fn test_reset() {
        let mut mem = DataMemory::new();
        mem.write(300, 9).unwrap();
        mem.reset();
        assert_eq!(mem.read(300), 0);
    }
}
