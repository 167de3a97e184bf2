//! Status register (ISNZVC).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Status flags, laid out in AVR SREG order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Status: u8 {
        /// Carry (or borrow, after a subtraction).
        const C = 1 << 0;
        /// Zero.
        const Z = 1 << 1;
        /// Negative: sign bit of the result.
        const N = 1 << 2;
        /// Two's-complement overflow.
        const V = 1 << 3;
        /// Signed: N xor V.
        const S = 1 << 4;
        /// Global interrupt enable.
        const I = 1 << 7;
    }
}

impl Status {
    /// Flags produced by the ALU.
    pub const ARITH: Status = Status::S
        .union(Status::N)
        .union(Status::Z)
        .union(Status::V)
        .union(Status::C);

    /// Replace SNZVC with the ALU's flags, leaving I untouched.
    pub fn update_arith(&mut self, flags: Status) {
        *self = (*self - Status::ARITH) | (flags & Status::ARITH);
    }

    /// Is the global interrupt enable set?
    pub fn interrupts_enabled(self) -> bool {
        self.contains(Status::I)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Status::I, 'I'),
            (Status::S, 'S'),
            (Status::N, 'N'),
            (Status::Z, 'Z'),
            (Status::V, 'V'),
            (Status::C, 'C'),
        ] {
            let shown = if self.contains(flag) { name } else { '-' };
            write!(f, "{}", shown)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_arith_preserves_interrupt_flag() {
        let mut sr = Status::I | Status::C;
        sr.update_arith(Status::Z | Status::I);
        assert_eq!(sr, Status::I | Status::Z);

        let mut sr = Status::empty();
        sr.update_arith(Status::N | Status::S);
        assert_eq!(sr, Status::N | Status::S);
    }

    #[test]
    fn test_display() {
        assert_eq!((Status::I | Status::Z).to_string(), "I--Z--");
        assert_eq!(Status::empty().to_string(), "------");
    }
}
