//! Disassembler.
//!
//! Converts instruction words back to assembly text the assembler accepts.

use crate::asm::Program;
use crate::cpu::decode::{decode, Instruction, Opcode, Operands};
use crate::cpu::io;
use std::fmt;

/// Disassemble a single instruction word to text.
pub fn disassemble_instruction(word: u64) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!("??? ; {:#018x}", word),
    }
}

/// Disassemble a slice of instruction words.
pub fn disassemble(words: &[u64]) -> String {
    let mut output = String::new();
    for (addr, &word) in words.iter().enumerate() {
        let line = disassemble_instruction(word);
        output.push_str(&format!("{:03x}: {:<24} ; {:#018x}\n", addr, line, word));
    }
    output
}

/// Disassemble an assembled program, with its labels.
pub fn listing(program: &Program) -> String {
    let mut output = String::new();
    for (addr, &word) in program.words.iter().enumerate() {
        for label in program.labels_at(addr as u16) {
            output.push_str(&format!("{}:\n", label));
        }
        let line = disassemble_instruction(word);
        output.push_str(&format!("{:03x}:     {:<24} ; {:#018x}\n", addr, line, word));
    }
    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let raw = instr.fields();
    let opcode = instr.opcode();
    let mnemonic = opcode.mnemonic();

    match opcode.operands() {
        Operands::None => mnemonic.to_string(),
        Operands::Reg => format!("{} R{}", mnemonic, raw.op1),
        Operands::RegReg => format!("{} R{}, R{}", mnemonic, raw.op1, raw.op2),
        Operands::RegImm => format!("{} R{}, {}", mnemonic, raw.op1, format_constant(raw.op2)),
        Operands::RegAddr => {
            format!("{} R{}, {}", mnemonic, raw.op1, format_address(opcode, raw.op2))
        }
        Operands::AddrReg => {
            format!("{} {}, R{}", mnemonic, format_address(opcode, raw.op1 as u32), raw.op2)
        }
        Operands::Target => format!("{} {:#05x}", mnemonic, raw.op1),
    }
}

/// I/O addresses print by register name; data addresses in hex.
fn format_address(opcode: Opcode, addr: u32) -> String {
    let named = match opcode {
        Opcode::In | Opcode::Out => io::register_name(addr),
        _ => None,
    };
    match named {
        Some(name) => name.to_string(),
        None => format!("{:#04x}", addr),
    }
}

fn format_constant(value: u32) -> String {
    if value < 10 {
        value.to_string()
    } else {
        format!("{:#x}", value)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_instruction(self))
    }
}
