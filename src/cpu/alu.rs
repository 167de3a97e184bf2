//! Arithmetic logic unit.
//!
//! A pure function of (operation, a, b). Arithmetic is carried out in 64 bits
//! so the carry (or borrow) out of bit 31 lands in bit 32.
//!
//! Overflow occurs:
//! - on addition, when A and B share a sign and the result has the other one:
//!   `V = (A[31] == B[31]) && (A[31] != R[31])`
//! - on subtraction, when A and B differ in sign and the result has B's sign:
//!   `V = (A[31] != B[31]) && (B[31] == R[31])`
//!
//! S is always N xor V, so e.g. -100 - 50 in eight bits wraps to a positive
//! pattern but S still reads as negative.

use crate::cpu::Status;
use serde::{Deserialize, Serialize};

const SIGN_BIT: u32 = 1 << 31;
const CARRY_BIT: u64 = 1 << 32;

/// Operations the ALU can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Or,
    And,
    Xor,
    Add,
    Sub,
}

/// Compute `op(a, b)`, returning the result and its SNZVC flags.
///
/// The returned flags never contain I; merge them with
/// [`Status::update_arith`].
pub fn alu(op: AluOp, a: u32, b: u32) -> (u32, Status) {
    let (result, carry, overflow) = match op {
        AluOp::Or => (a | b, false, false),
        AluOp::And => (a & b, false, false),
        AluOp::Xor => (a ^ b, false, false),
        AluOp::Add => {
            let wide = a as u64 + b as u64;
            let result = wide as u32;
            let overflow = sign(a) == sign(b) && sign(result) != sign(a);
            (result, wide & CARRY_BIT != 0, overflow)
        }
        AluOp::Sub => {
            let wide = (a as u64).wrapping_sub(b as u64);
            let result = wide as u32;
            let overflow = sign(a) != sign(b) && sign(result) == sign(b);
            (result, wide & CARRY_BIT != 0, overflow)
        }
    };

    let mut flags = Status::empty();
    let negative = sign(result);
    flags.set(Status::N, negative);
    flags.set(Status::Z, result == 0);
    flags.set(Status::V, overflow);
    flags.set(Status::C, carry);
    flags.set(Status::S, negative ^ overflow);
    (result, flags)
}

#[inline]
fn sign(value: u32) -> bool {
    value & SIGN_BIT != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sub_wraps_with_borrow() {
        let (result, flags) = alu(AluOp::Sub, 0, 1);
        assert_eq!(result, 0xFFFF_FFFF);
        assert!(flags.contains(Status::C));
        assert!(flags.contains(Status::N));
        assert!(!flags.contains(Status::V));
        assert!(flags.contains(Status::S));
        assert!(!flags.contains(Status::Z));
    }

    #[test]
    fn test_add_carry_and_zero() {
        let (result, flags) = alu(AluOp::Add, 0xFFFF_FFFF, 1);
        assert_eq!(result, 0);
        assert_eq!(flags, Status::C | Status::Z);
    }

    #[test]
    fn test_add_signed_overflow() {
        // i32::MAX + 1 flips the sign without a carry out.
        let (result, flags) = alu(AluOp::Add, 0x7FFF_FFFF, 1);
        assert_eq!(result, 0x8000_0000);
        assert_eq!(flags, Status::N | Status::V);
        assert!(!flags.contains(Status::S));
    }

    #[test]
    fn test_sub_signed_overflow() {
        // i32::MIN - 1 wraps to a positive value; S still reports "less than".
        let (result, flags) = alu(AluOp::Sub, 0x8000_0000, 1);
        assert_eq!(result, 0x7FFF_FFFF);
        assert_eq!(flags, Status::V | Status::S);
    }

    #[test]
    fn test_compare_equal_sets_zero_only() {
        let (_, flags) = alu(AluOp::Sub, 8, 8);
        assert_eq!(flags, Status::Z);
    }

    #[test]
    fn test_bitwise_results() {
        assert_eq!(alu(AluOp::Or, 0b1010, 0b0101).0, 0b1111);
        assert_eq!(alu(AluOp::And, 0b1010, 0b0110).0, 0b0010);
        let (result, flags) = alu(AluOp::Xor, 0xFFFF_FFFF, 0x7FFF_FFFF);
        assert_eq!(result, 0x8000_0000);
        assert_eq!(flags, Status::N | Status::S);
    }

    #[test]
    fn test_flags_never_touch_interrupt_enable() {
        for op in [AluOp::Or, AluOp::And, AluOp::Xor, AluOp::Add, AluOp::Sub] {
            let (_, flags) = alu(op, 0x8000_0000, 0x8000_0000);
            assert!(!flags.contains(Status::I));
        }
    }

    proptest! {
        #[test]
        fn prop_add_matches_twos_complement(a: u32, b: u32) {
            let (result, flags) = alu(AluOp::Add, a, b);
            let (wrapped, carry) = a.overflowing_add(b);
            let (_, overflow) = (a as i32).overflowing_add(b as i32);
            prop_assert_eq!(result, wrapped);
            prop_assert_eq!(flags.contains(Status::C), carry);
            prop_assert_eq!(flags.contains(Status::V), overflow);
            prop_assert_eq!(flags.contains(Status::N), (result as i32) < 0);
        }

        #[test]
        fn prop_sub_matches_twos_complement(a: u32, b: u32) {
            let (result, flags) = alu(AluOp::Sub, a, b);
            let (_, overflow) = (a as i32).overflowing_sub(b as i32);
            prop_assert_eq!(result, a.wrapping_sub(b));
            prop_assert_eq!(flags.contains(Status::C), a < b);
            prop_assert_eq!(flags.contains(Status::V), overflow);
            // S is the true signed comparison, whatever the wrap did.
            prop_assert_eq!(flags.contains(Status::S), (a as i32) < (b as i32));
        }

        #[test]
        fn prop_signed_is_n_xor_v(a: u32, b: u32, op_index in 0usize..5) {
            let op = [AluOp::Or, AluOp::And, AluOp::Xor, AluOp::Add, AluOp::Sub][op_index];
            let (result, flags) = alu(op, a, b);
            prop_assert_eq!(
                flags.contains(Status::S),
                flags.contains(Status::N) ^ flags.contains(Status::V)
            );
            prop_assert_eq!(flags.contains(Status::Z), result == 0);
        }

        #[test]
        fn prop_bitwise_clears_v_and_c(a: u32, b: u32, op_index in 0usize..3) {
            let op = [AluOp::Or, AluOp::And, AluOp::Xor][op_index];
            let (_, flags) = alu(op, a, b);
            prop_assert!(!flags.intersects(Status::V | Status::C));
        }

        #[test]
        fn prop_sub_then_add_restores(a: u32, b: u32) {
            let (difference, _) = alu(AluOp::Sub, a, b);
            let (restored, _) = alu(AluOp::Add, difference, b);
            prop_assert_eq!(restored, a);
        }
    }
}
