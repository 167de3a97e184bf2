//! General-purpose register file.
//!
//! 32 registers, R0..R31, each 32 bits wide. None of them has a
//! special hardware meaning.

use crate::cpu::REGISTER_COUNT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// A validated register address (0..32).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reg(u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);
    pub const R3: Reg = Reg(3);
    pub const R4: Reg = Reg(4);
    pub const R5: Reg = Reg(5);
    pub const R6: Reg = Reg(6);
    pub const R7: Reg = Reg(7);
    pub const R8: Reg = Reg(8);
    pub const R9: Reg = Reg(9);
    pub const R10: Reg = Reg(10);
    pub const R11: Reg = Reg(11);
    pub const R12: Reg = Reg(12);
    pub const R13: Reg = Reg(13);
    pub const R14: Reg = Reg(14);
    pub const R15: Reg = Reg(15);
    pub const R16: Reg = Reg(16);
    pub const R17: Reg = Reg(17);
    pub const R18: Reg = Reg(18);
    pub const R19: Reg = Reg(19);
    pub const R20: Reg = Reg(20);
    pub const R21: Reg = Reg(21);
    pub const R22: Reg = Reg(22);
    pub const R23: Reg = Reg(23);
    pub const R24: Reg = Reg(24);
    pub const R25: Reg = Reg(25);
    pub const R26: Reg = Reg(26);
    pub const R27: Reg = Reg(27);
    pub const R28: Reg = Reg(28);
    pub const R29: Reg = Reg(29);
    pub const R30: Reg = Reg(30);
    pub const R31: Reg = Reg(31);

    /// Create from a raw register address; `None` if out of range.
    pub fn new(index: u32) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Reg(index as u8))
        } else {
            None
        }
    }

    /// Register address.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterate R0..R31 in address order.
    pub fn all() -> impl Iterator<Item = Reg> {
        (0..REGISTER_COUNT as u8).map(Reg)
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    r: [u32; REGISTER_COUNT],
}

impl Registers {
    /// Create a new register file with all registers zeroed.
    pub fn new() -> Self {
        Self { r: [0; REGISTER_COUNT] }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.r = [0; REGISTER_COUNT];
    }

    /// All register values, indexed by address.
    pub fn values(&self) -> &[u32; REGISTER_COUNT] {
        &self.r
    }

    /// Overwrite the whole register file.
    pub fn restore(&mut self, values: [u32; REGISTER_COUNT]) {
        self.r = values;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Reg> for Registers {
    type Output = u32;

    fn index(&self, reg: Reg) -> &u32 {
        &self.r[reg.index()]
    }
}

impl IndexMut<Reg> for Registers {
    fn index_mut(&mut self, reg: Reg) -> &mut u32 {
        &mut self.r[reg.index()]
    }
}
