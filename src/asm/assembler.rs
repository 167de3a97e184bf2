//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LED1    EQU 0           ; Define a constant
//!         ORG RESET_vect  ; Set origin address (gaps are NOP-filled)
//!         JMP main
//! main:                   ; Define a label
//!         LDI R16, (1 << LED1)
//!         OUT DDRB, R16
//!         JMP main
//! ```
//!
//! Mnemonics, registers and symbols are case-insensitive. The I/O register
//! names, the PCIEx/PCIFx bit names and the interrupt vectors are predefined.

use crate::asm::expr::{self, ExprError};
use crate::cpu::decode::{Opcode, Operands, RawInstruction};
use crate::cpu::interrupt::Source;
use crate::cpu::io::{self, PCIE0, PCIE1, PCIE2, PCIF0, PCIF1, PCIF2};
use crate::cpu::program::NOP_WORD;
use crate::cpu::{PROGRAM_MEMORY_SIZE, REGISTER_COUNT, RESET_VECTOR};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// An assembled program image with its label table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub words: Vec<u64>,
    pub labels: BTreeMap<String, u16>,
}

impl Program {
    /// Address of a label (case-insensitive).
    pub fn label(&self, name: &str) -> Option<u16> {
        self.labels
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(name))
            .map(|(_, &addr)| addr)
    }

    /// Labels defined exactly at `addr`.
    pub fn labels_at(&self, addr: u16) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(move |(_, &a)| a == addr)
            .map(|(name, _)| name.as_str())
    }

    /// Name of the routine containing `addr`: the closest label at or
    /// before it.
    pub fn routine_at(&self, addr: u16) -> Option<&str> {
        if addr as usize >= self.words.len() {
            return None;
        }
        self.labels
            .iter()
            .filter(|(_, &a)| a <= addr)
            .max_by_key(|(_, &a)| a)
            .map(|(name, _)| name.as_str())
    }
}

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<Program, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An instruction collected by pass 1.
struct Pending<'a> {
    line: usize,
    addr: usize,
    opcode: Opcode,
    operands: Vec<&'a str>,
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Symbol table, keyed by upper-case name.
    symbols: HashMap<String, u32>,
    /// Labels as written in the source.
    labels: BTreeMap<String, u16>,
}

impl Assembler {
    fn new() -> Self {
        let mut symbols = HashMap::new();
        for (name, addr) in io::REGISTER_NAMES {
            symbols.insert(name.to_string(), addr);
        }
        for (name, bit) in [
            ("PCIE0", PCIE0),
            ("PCIE1", PCIE1),
            ("PCIE2", PCIE2),
            ("PCIF0", PCIF0),
            ("PCIF1", PCIF1),
            ("PCIF2", PCIF2),
        ] {
            symbols.insert(name.to_string(), bit);
        }
        symbols.insert("RESET_VECT".to_string(), RESET_VECTOR as u32);
        for source in Source::ALL {
            symbols.insert(format!("{}_VECT", source.name()), source.vector() as u32);
        }

        Self {
            current_addr: 0,
            symbols,
            labels: BTreeMap::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        // Pass 1: addresses, labels and constants
        let mut pending = Vec::new();
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1, &mut pending)?;
        }

        // Pass 2: encode with every symbol known
        let mut words = Vec::new();
        for instr in &pending {
            let word = self.encode(instr)?;
            words.resize(instr.addr, NOP_WORD);
            words.push(word);
        }

        log::debug!(
            "assembled {} words, {} labels",
            words.len(),
            self.labels.len()
        );
        Ok(Program {
            words,
            labels: std::mem::take(&mut self.labels),
        })
    }

    fn process_line<'a>(
        &mut self,
        line: &'a str,
        line_num: usize,
        pending: &mut Vec<Pending<'a>>,
    ) -> Result<(), AssemblerError> {
        // Remove comments
        let mut text = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        // Label definitions
        while let Some(colon_idx) = text.find(':') {
            let label = text[..colon_idx].trim();
            if !expr::is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            self.define(label, self.current_addr as u32, line_num)?;
            self.labels.insert(label.to_string(), self.current_addr as u16);
            text = text[colon_idx + 1..].trim();
        }

        if text.is_empty() {
            return Ok(());
        }

        let (first, rest) = split_word(text);
        let (second, tail) = split_word(rest);

        if second.eq_ignore_ascii_case("EQU") {
            if !expr::is_identifier(first) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid constant name '{}'", first),
                });
            }
            let value = self.evaluate(tail, line_num)?;
            return self.define(first, value, line_num);
        }

        if first.eq_ignore_ascii_case("ORG") {
            let origin = self.evaluate(rest, line_num)? as usize;
            if origin < self.current_addr {
                return Err(AssemblerError::OriginBackwards {
                    line: line_num,
                    origin,
                    current: self.current_addr,
                });
            }
            if origin > PROGRAM_MEMORY_SIZE {
                return Err(AssemblerError::ProgramTooLarge {
                    line: line_num,
                    size: origin,
                    available: PROGRAM_MEMORY_SIZE,
                });
            }
            self.current_addr = origin;
            return Ok(());
        }

        let opcode = Opcode::from_mnemonic(first).ok_or_else(|| AssemblerError::UnknownMnemonic {
            line: line_num,
            mnemonic: first.to_string(),
        })?;

        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };
        let expected = opcode.operands().count();
        if operands.len() != expected {
            return Err(AssemblerError::OperandCount {
                line: line_num,
                mnemonic: opcode.mnemonic().to_string(),
                expected,
                found: operands.len(),
            });
        }

        if self.current_addr >= PROGRAM_MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge {
                line: line_num,
                size: self.current_addr + 1,
                available: PROGRAM_MEMORY_SIZE,
            });
        }

        pending.push(Pending {
            line: line_num,
            addr: self.current_addr,
            opcode,
            operands,
        });
        self.current_addr += 1;
        Ok(())
    }

    fn define(&mut self, name: &str, value: u32, line_num: usize) -> Result<(), AssemblerError> {
        let key = name.to_uppercase();
        if self.symbols.contains_key(&key) {
            return Err(AssemblerError::DuplicateSymbol {
                line: line_num,
                name: name.to_string(),
            });
        }
        self.symbols.insert(key, value);
        Ok(())
    }

    fn encode(&self, instr: &Pending) -> Result<u64, AssemblerError> {
        let line = instr.line;
        let ops = &instr.operands;

        let (op1, op2) = match instr.opcode.operands() {
            Operands::None => (0, 0),
            Operands::Reg => (parse_register(ops[0], line)? as u16, 0),
            Operands::RegReg => (
                parse_register(ops[0], line)? as u16,
                parse_register(ops[1], line)?,
            ),
            Operands::RegImm | Operands::RegAddr => (
                parse_register(ops[0], line)? as u16,
                self.evaluate(ops[1], line)?,
            ),
            Operands::AddrReg => (
                self.evaluate_u16(ops[0], line)?,
                parse_register(ops[1], line)?,
            ),
            Operands::Target => (self.evaluate_u16(ops[0], line)?, 0),
        };

        Ok(RawInstruction::new(instr.opcode as u16, op1, op2).pack())
    }

    fn evaluate(&self, text: &str, line_num: usize) -> Result<u32, AssemblerError> {
        expr::evaluate(text, |name| self.symbols.get(&name.to_uppercase()).copied()).map_err(
            |err| match err {
                ExprError::Syntax(message) => AssemblerError::SyntaxError {
                    line: line_num,
                    message,
                },
                ExprError::Undefined(name) => AssemblerError::UndefinedSymbol {
                    line: line_num,
                    name,
                },
            },
        )
    }

    fn evaluate_u16(&self, text: &str, line_num: usize) -> Result<u16, AssemblerError> {
        let value = self.evaluate(text, line_num)?;
        u16::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
            line: line_num,
            value,
            max: u16::MAX as u32,
        })
    }
}

/// Split off the first whitespace-separated word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}

fn parse_register(operand: &str, line_num: usize) -> Result<u32, AssemblerError> {
    let invalid = || AssemblerError::InvalidRegister {
        line: line_num,
        operand: operand.to_string(),
    };

    let digits = operand
        .strip_prefix('R')
        .or_else(|| operand.strip_prefix('r'))
        .ok_or_else(invalid)?;
    let index: u32 = digits.parse().map_err(|_| invalid())?;
    if (index as usize) < REGISTER_COUNT {
        Ok(index)
    } else {
        Err(invalid())
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined symbol on line {line}: {name}")]
    UndefinedSymbol { line: usize, name: String },

    #[error("symbol defined twice on line {line}: {name}")]
    DuplicateSymbol { line: usize, name: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("value out of range on line {line}: {value:#x} (max {max:#x})")]
    ValueOutOfRange { line: usize, value: u32, max: u32 },

    #[error("invalid register on line {line}: {operand}")]
    InvalidRegister { line: usize, operand: String },

    #[error("ORG {origin:#x} on line {line} is below the current address {current:#x}")]
    OriginBackwards {
        line: usize,
        origin: usize,
        current: usize,
    },

    #[error("program too large on line {line}: {size} words (max {available})")]
    ProgramTooLarge {
        line: usize,
        size: usize,
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{decode, Instruction, Reg};

    fn decoded(program: &Program) -> Vec<Instruction> {
        program.words.iter().map(|&w| decode(w).unwrap()).collect()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDI R16, 5
            addi r16, 0x10
            OUT PORTB, R16
            IN R17, PINB
            SEI
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(
            decoded(&program),
            vec![
                Instruction::Ldi { dst: Reg::R16, value: 5 },
                Instruction::Addi { dst: Reg::R16, value: 0x10 },
                Instruction::Out { addr: 0x01, src: Reg::R16 },
                Instruction::In { dst: Reg::R17, addr: 0x02 },
                Instruction::Sei,
            ]
        );
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            JMP finish
            NOP
        finish: BREQ start
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.label("start"), Some(0));
        assert_eq!(program.label("FINISH"), Some(2));
        assert_eq!(
            decoded(&program),
            vec![
                Instruction::Jmp { target: 2 },
                Instruction::Nop,
                Instruction::Breq { target: 0 },
            ]
        );
    }

    #[test]
    fn test_equ_and_expressions() {
        let source = r#"
            LED1    EQU 0
            BUTTON1 EQU 5
            flags   EQU (1 << LED1) | (1 << BUTTON1)
                    ANDI R16, ~(1 << LED1)
                    LDI R17, flags
                    LDI R18, (1 << PCIE0)
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(
            decoded(&program),
            vec![
                Instruction::Andi { dst: Reg::R16, value: 0xFFFF_FFFE },
                Instruction::Ldi { dst: Reg::R17, value: 0x21 },
                Instruction::Ldi { dst: Reg::R18, value: 1 },
            ]
        );
    }

    #[test]
    fn test_org_pads_with_nop() {
        let source = r#"
            ORG RESET_vect
            JMP main
            ORG PCINT2_vect
            RETI
            ORG 8
        main:
            SEI
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.words.len(), 9);
        assert_eq!(program.words[6], encode_word(Instruction::Reti));
        assert_eq!(program.words[7], 0);
        assert_eq!(program.label("main"), Some(8));
        assert_eq!(program.words[0], encode_word(Instruction::Jmp { target: 8 }));
    }

    fn encode_word(instr: Instruction) -> u64 {
        crate::cpu::encode(&instr)
    }

    #[test]
    fn test_routine_at() {
        let source = r#"
        first:
            NOP
            NOP
        second:
            RET
        "#;
        let program = assemble(source).unwrap();
        assert_eq!(program.routine_at(1), Some("first"));
        assert_eq!(program.routine_at(2), Some("second"));
        assert_eq!(program.routine_at(3), None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("FOO R1"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("NOP\nJMP nowhere"),
            Err(AssemblerError::UndefinedSymbol { line: 2, .. })
        ));
        assert!(matches!(
            assemble("LDI R32, 1"),
            Err(AssemblerError::InvalidRegister { .. })
        ));
        assert!(matches!(
            assemble("LDI 16, 1"),
            Err(AssemblerError::InvalidRegister { .. })
        ));
        assert!(matches!(
            assemble("ADD R1"),
            Err(AssemblerError::OperandCount { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            assemble("ORG 4\nNOP\nORG 2"),
            Err(AssemblerError::OriginBackwards { line: 3, .. })
        ));
        assert!(matches!(
            assemble("JMP 0x10000"),
            Err(AssemblerError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            assemble("x EQU 1\nX EQU 2"),
            Err(AssemblerError::DuplicateSymbol { line: 2, .. })
        ));
        assert!(matches!(
            assemble("ORG 255\nNOP\nNOP"),
            Err(AssemblerError::ProgramTooLarge { line: 3, .. })
        ));
    }
}
