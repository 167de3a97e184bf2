//! # mcu32 Emulator
//!
//! An emulator of a small 32-bit AVR-style microcontroller core.
//!
//! The core runs 64-bit instruction words from a 256-word program memory
//! through a FETCH/DECODE/EXECUTE state machine, with 32 registers, an
//! ISNZVC status register, memory-mapped I/O ports B, C and D, and
//! pin-change interrupts that save the full processor context on the stack.

pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, DecodeError, Instruction, Outcome, Port, Reg, Snapshot, Status};
pub use asm::{assemble, disassemble, AssemblerError, Program};
