//! Assembler and disassembler for mcu32 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program image plus label table)
//! - A disassembler (instruction words → readable text)
//! - The built-in LED toggle demo

pub mod assembler;
pub mod disasm;
mod expr;

pub use assembler::{assemble, AssemblerError, Program};
pub use disasm::{disassemble, disassemble_instruction, listing};
pub use expr::{parse_number, ExprError};

/// Source of the built-in demo: a button on PB5 toggles an LED on PB0.
pub const DEMO_SOURCE: &str = include_str!("../../demos/led_toggle.asm");

/// Assemble the built-in demo.
pub fn demo() -> Result<Program, AssemblerError> {
    assemble(DEMO_SOURCE)
}
