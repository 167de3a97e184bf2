//! CPU emulation for a small 32-bit AVR-style core.
//!
//! This module implements the complete processor model:
//! - 32 general-purpose 32-bit registers (R0..R31) and an ISNZVC status register
//! - 256-word program memory of 64-bit instruction words
//! - 512-cell data memory whose low half is memory-mapped I/O
//! - a 1024-word hardware stack shared by calls and interrupts
//! - three pin-change interrupt sources on I/O ports B, C and D

pub mod alu;
pub mod status;
pub mod registers;
pub mod memory;
pub mod program;
pub mod stack;
pub mod io;
pub mod decode;
pub mod interrupt;
pub mod execute;
pub mod snapshot;

pub use alu::{alu, AluOp};
pub use status::Status;
pub use registers::{Reg, Registers};
pub use memory::{DataMemory, MemoryError};
pub use program::ProgramMemory;
pub use stack::{Stack, StackError};
pub use io::Port;
pub use decode::{decode, encode, DecodeError, Instruction, Opcode, Operands, RawInstruction};
pub use interrupt::{Context, Source};
pub use execute::{Cpu, CpuState, Outcome};
pub use snapshot::Snapshot;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// Number of instruction words in program memory.
pub const PROGRAM_MEMORY_SIZE: usize = 256;

/// Number of cells in data memory (I/O space plus data space).
pub const DATA_MEMORY_SIZE: usize = 512;

/// Start of the data space addressed by STS/LDS/ST/LD.
pub const DATA_OFFSET: u32 = 256;

/// Number of words the hardware stack can hold.
pub const STACK_SIZE: usize = 1024;

/// Reset vector.
pub const RESET_VECTOR: u16 = 0x00;
