//! Instruction decoder.
//!
//! An instruction word is 64 bits wide and always carries three fields:
//! - bits 63..48: opcode
//! - bits 47..32: op1 (destination register, I/O address or jump target)
//! - bits 31..0:  op2 (source register, constant or memory address)
//!
//! [`RawInstruction`] is the only place that knows this layout; everything
//! else works on the decoded [`Instruction`].

use crate::cpu::Reg;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three fields of an instruction word, not yet interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawInstruction {
    pub opcode: u16,
    pub op1: u16,
    pub op2: u32,
}

impl RawInstruction {
    pub const fn new(opcode: u16, op1: u16, op2: u32) -> Self {
        Self { opcode, op1, op2 }
    }

    /// Split an instruction word into its fields.
    pub const fn unpack(word: u64) -> Self {
        Self {
            opcode: (word >> 48) as u16,
            op1: (word >> 32) as u16,
            op2: word as u32,
        }
    }

    /// Join the fields back into an instruction word.
    pub const fn pack(self) -> u64 {
        (self.opcode as u64) << 48 | (self.op1 as u64) << 32 | self.op2 as u64
    }

    /// Interpret the fields as an instruction.
    pub fn decode(self) -> Result<Instruction, DecodeError> {
        let opcode =
            Opcode::from_u16(self.opcode).ok_or(DecodeError::InvalidOpcode(self.opcode))?;
        let r1 = || register(opcode, self.op1 as u32);
        let r2 = || register(opcode, self.op2);
        let target = self.op1;
        let value = self.op2;

        let instruction = match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::Ldi => Instruction::Ldi { dst: r1()?, value },
            Opcode::Mov => Instruction::Mov { dst: r1()?, src: r2()? },
            Opcode::Out => Instruction::Out { addr: self.op1, src: r2()? },
            Opcode::In => Instruction::In { dst: r1()?, addr: self.op2 },
            Opcode::Sts => Instruction::Sts { addr: self.op1, src: r2()? },
            Opcode::Lds => Instruction::Lds { dst: r1()?, addr: self.op2 },
            Opcode::Clr => Instruction::Clr { dst: r1()? },
            Opcode::Ori => Instruction::Ori { dst: r1()?, value },
            Opcode::Andi => Instruction::Andi { dst: r1()?, value },
            Opcode::Xori => Instruction::Xori { dst: r1()?, value },
            Opcode::Or => Instruction::Or { dst: r1()?, src: r2()? },
            Opcode::And => Instruction::And { dst: r1()?, src: r2()? },
            Opcode::Xor => Instruction::Xor { dst: r1()?, src: r2()? },
            Opcode::Addi => Instruction::Addi { dst: r1()?, value },
            Opcode::Subi => Instruction::Subi { dst: r1()?, value },
            Opcode::Add => Instruction::Add { dst: r1()?, src: r2()? },
            Opcode::Sub => Instruction::Sub { dst: r1()?, src: r2()? },
            Opcode::Inc => Instruction::Inc { dst: r1()? },
            Opcode::Dec => Instruction::Dec { dst: r1()? },
            Opcode::Cpi => Instruction::Cpi { dst: r1()?, value },
            Opcode::Cp => Instruction::Cp { dst: r1()?, src: r2()? },
            Opcode::Jmp => Instruction::Jmp { target },
            Opcode::Breq => Instruction::Breq { target },
            Opcode::Brne => Instruction::Brne { target },
            Opcode::Brge => Instruction::Brge { target },
            Opcode::Brgt => Instruction::Brgt { target },
            Opcode::Brle => Instruction::Brle { target },
            Opcode::Brlt => Instruction::Brlt { target },
            Opcode::Call => Instruction::Call { target },
            Opcode::Ret => Instruction::Ret,
            Opcode::Reti => Instruction::Reti,
            Opcode::Push => Instruction::Push { src: r1()? },
            Opcode::Pop => Instruction::Pop { dst: r1()? },
            Opcode::Lsl => Instruction::Lsl { dst: r1()? },
            Opcode::Lsr => Instruction::Lsr { dst: r1()? },
            Opcode::Sei => Instruction::Sei,
            Opcode::Cli => Instruction::Cli,
            Opcode::St => Instruction::St { ptr: r1()?, src: r2()? },
            Opcode::Ld => Instruction::Ld { dst: r1()?, ptr: r2()? },
            Opcode::Stio => Instruction::Stio { ptr: r1()?, src: r2()? },
            Opcode::Ldio => Instruction::Ldio { dst: r1()?, ptr: r2()? },
        };

        Ok(instruction)
    }
}

fn register(opcode: Opcode, index: u32) -> Result<Reg, DecodeError> {
    Reg::new(index).ok_or(DecodeError::InvalidRegister { opcode, index })
}

/// Opcode values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Opcode {
    Nop = 0x00,
    Ldi = 0x01,
    Mov = 0x02,
    Out = 0x03,
    In = 0x04,
    Sts = 0x05,
    Lds = 0x06,
    Clr = 0x07,
    Ori = 0x08,
    Andi = 0x09,
    Xori = 0x0A,
    Or = 0x0B,
    And = 0x0C,
    Xor = 0x0D,
    Addi = 0x0E,
    Subi = 0x0F,
    Add = 0x10,
    Sub = 0x11,
    Inc = 0x12,
    Dec = 0x13,
    Cpi = 0x14,
    Cp = 0x15,
    Jmp = 0x16,
    Breq = 0x17,
    Brne = 0x18,
    Brge = 0x19,
    Brgt = 0x1A,
    Brle = 0x1B,
    Brlt = 0x1C,
    Call = 0x1D,
    Ret = 0x1E,
    Reti = 0x1F,
    Push = 0x20,
    Pop = 0x21,
    Lsl = 0x22,
    Lsr = 0x23,
    Sei = 0x24,
    Cli = 0x25,
    St = 0x26,
    Ld = 0x27,
    Stio = 0x28,
    Ldio = 0x29,
}

/// How an opcode uses its operand fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operands.
    None,
    /// op1 = register.
    Reg,
    /// op1 = register, op2 = register.
    RegReg,
    /// op1 = register, op2 = constant.
    RegImm,
    /// op1 = register, op2 = memory address.
    RegAddr,
    /// op1 = memory address, op2 = register.
    AddrReg,
    /// op1 = program address.
    Target,
}

impl Operands {
    /// Number of operands written in assembly.
    pub fn count(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::Reg | Operands::Target => 1,
            _ => 2,
        }
    }
}

impl Opcode {
    pub const ALL: [Opcode; 42] = [
        Opcode::Nop,
        Opcode::Ldi,
        Opcode::Mov,
        Opcode::Out,
        Opcode::In,
        Opcode::Sts,
        Opcode::Lds,
        Opcode::Clr,
        Opcode::Ori,
        Opcode::Andi,
        Opcode::Xori,
        Opcode::Or,
        Opcode::And,
        Opcode::Xor,
        Opcode::Addi,
        Opcode::Subi,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Cpi,
        Opcode::Cp,
        Opcode::Jmp,
        Opcode::Breq,
        Opcode::Brne,
        Opcode::Brge,
        Opcode::Brgt,
        Opcode::Brle,
        Opcode::Brlt,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Reti,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Lsl,
        Opcode::Lsr,
        Opcode::Sei,
        Opcode::Cli,
        Opcode::St,
        Opcode::Ld,
        Opcode::Stio,
        Opcode::Ldio,
    ];

    /// Look up an opcode by its numeric value.
    pub fn from_u16(value: u16) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|&op| op as u16 == value)
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Ldi => "LDI",
            Opcode::Mov => "MOV",
            Opcode::Out => "OUT",
            Opcode::In => "IN",
            Opcode::Sts => "STS",
            Opcode::Lds => "LDS",
            Opcode::Clr => "CLR",
            Opcode::Ori => "ORI",
            Opcode::Andi => "ANDI",
            Opcode::Xori => "XORI",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Xor => "XOR",
            Opcode::Addi => "ADDI",
            Opcode::Subi => "SUBI",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Cpi => "CPI",
            Opcode::Cp => "CP",
            Opcode::Jmp => "JMP",
            Opcode::Breq => "BREQ",
            Opcode::Brne => "BRNE",
            Opcode::Brge => "BRGE",
            Opcode::Brgt => "BRGT",
            Opcode::Brle => "BRLE",
            Opcode::Brlt => "BRLT",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Reti => "RETI",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Lsl => "LSL",
            Opcode::Lsr => "LSR",
            Opcode::Sei => "SEI",
            Opcode::Cli => "CLI",
            Opcode::St => "ST",
            Opcode::Ld => "LD",
            Opcode::Stio => "STIO",
            Opcode::Ldio => "LDIO",
        }
    }

    /// Operand shape of this opcode.
    pub fn operands(self) -> Operands {
        match self {
            Opcode::Nop | Opcode::Ret | Opcode::Reti | Opcode::Sei | Opcode::Cli => Operands::None,

            Opcode::Clr
            | Opcode::Inc
            | Opcode::Dec
            | Opcode::Push
            | Opcode::Pop
            | Opcode::Lsl
            | Opcode::Lsr => Operands::Reg,

            Opcode::Mov
            | Opcode::Or
            | Opcode::And
            | Opcode::Xor
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Cp
            | Opcode::St
            | Opcode::Ld
            | Opcode::Stio
            | Opcode::Ldio => Operands::RegReg,

            Opcode::Ldi
            | Opcode::Ori
            | Opcode::Andi
            | Opcode::Xori
            | Opcode::Addi
            | Opcode::Subi
            | Opcode::Cpi => Operands::RegImm,

            Opcode::In | Opcode::Lds => Operands::RegAddr,
            Opcode::Out | Opcode::Sts => Operands::AddrReg,

            Opcode::Jmp
            | Opcode::Breq
            | Opcode::Brne
            | Opcode::Brge
            | Opcode::Brgt
            | Opcode::Brle
            | Opcode::Brlt
            | Opcode::Call => Operands::Target,
        }
    }
}

/// Decoded instruction.
///
/// Register operands are always valid register addresses; anything else
/// is rejected by [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Data Transfer ====================

    /// No operation
    Nop,
    /// dst := value
    Ldi { dst: Reg, value: u32 },
    /// dst := src
    Mov { dst: Reg, src: Reg },
    /// io[addr] := src (toggles PORTx when addr is a PINx register)
    Out { addr: u16, src: Reg },
    /// dst := io[addr]
    In { dst: Reg, addr: u32 },
    /// data[addr] := src
    Sts { addr: u16, src: Reg },
    /// dst := data[addr]
    Lds { dst: Reg, addr: u32 },
    /// dst := 0
    Clr { dst: Reg },
    /// data[ptr] := src
    St { ptr: Reg, src: Reg },
    /// dst := data[ptr]
    Ld { dst: Reg, ptr: Reg },
    /// io[ptr] := src
    Stio { ptr: Reg, src: Reg },
    /// dst := io[ptr]
    Ldio { dst: Reg, ptr: Reg },

    // ==================== Logic & Arithmetic ====================

    Ori { dst: Reg, value: u32 },
    Andi { dst: Reg, value: u32 },
    Xori { dst: Reg, value: u32 },
    Or { dst: Reg, src: Reg },
    And { dst: Reg, src: Reg },
    Xor { dst: Reg, src: Reg },
    Addi { dst: Reg, value: u32 },
    Subi { dst: Reg, value: u32 },
    Add { dst: Reg, src: Reg },
    Sub { dst: Reg, src: Reg },
    Inc { dst: Reg },
    Dec { dst: Reg },
    /// Compare with constant (flags only)
    Cpi { dst: Reg, value: u32 },
    /// Compare registers (flags only)
    Cp { dst: Reg, src: Reg },
    /// Shift left one bit, flags unaffected
    Lsl { dst: Reg },
    /// Shift right one bit, flags unaffected
    Lsr { dst: Reg },

    // ==================== Control Flow ====================

    Jmp { target: u16 },
    /// Branch if Z
    Breq { target: u16 },
    /// Branch if !Z
    Brne { target: u16 },
    /// Branch if !S
    Brge { target: u16 },
    /// Branch if !S && !Z
    Brgt { target: u16 },
    /// Branch if S || Z
    Brle { target: u16 },
    /// Branch if S
    Brlt { target: u16 },
    Call { target: u16 },
    Ret,
    /// Return from interrupt, restoring the saved context
    Reti,
    Push { src: Reg },
    Pop { dst: Reg },
    /// Enable interrupts globally
    Sei,
    /// Disable interrupts globally
    Cli,
}

impl Instruction {
    /// The opcode of this instruction.
    pub fn opcode(&self) -> Opcode {
        self.parts().0
    }

    /// The raw fields this instruction encodes to.
    pub fn fields(&self) -> RawInstruction {
        let (opcode, op1, op2) = self.parts();
        RawInstruction::new(opcode as u16, op1, op2)
    }

    fn parts(&self) -> (Opcode, u16, u32) {
        let r1 = |reg: &Reg| reg.index() as u16;
        let r2 = |reg: &Reg| reg.index() as u32;

        match self {
            Instruction::Nop => (Opcode::Nop, 0, 0),
            Instruction::Ldi { dst, value } => (Opcode::Ldi, r1(dst), *value),
            Instruction::Mov { dst, src } => (Opcode::Mov, r1(dst), r2(src)),
            Instruction::Out { addr, src } => (Opcode::Out, *addr, r2(src)),
            Instruction::In { dst, addr } => (Opcode::In, r1(dst), *addr),
            Instruction::Sts { addr, src } => (Opcode::Sts, *addr, r2(src)),
            Instruction::Lds { dst, addr } => (Opcode::Lds, r1(dst), *addr),
            Instruction::Clr { dst } => (Opcode::Clr, r1(dst), 0),
            Instruction::St { ptr, src } => (Opcode::St, r1(ptr), r2(src)),
            Instruction::Ld { dst, ptr } => (Opcode::Ld, r1(dst), r2(ptr)),
            Instruction::Stio { ptr, src } => (Opcode::Stio, r1(ptr), r2(src)),
            Instruction::Ldio { dst, ptr } => (Opcode::Ldio, r1(dst), r2(ptr)),
            Instruction::Ori { dst, value } => (Opcode::Ori, r1(dst), *value),
            Instruction::Andi { dst, value } => (Opcode::Andi, r1(dst), *value),
            Instruction::Xori { dst, value } => (Opcode::Xori, r1(dst), *value),
            Instruction::Or { dst, src } => (Opcode::Or, r1(dst), r2(src)),
            Instruction::And { dst, src } => (Opcode::And, r1(dst), r2(src)),
            Instruction::Xor { dst, src } => (Opcode::Xor, r1(dst), r2(src)),
            Instruction::Addi { dst, value } => (Opcode::Addi, r1(dst), *value),
            Instruction::Subi { dst, value } => (Opcode::Subi, r1(dst), *value),
            Instruction::Add { dst, src } => (Opcode::Add, r1(dst), r2(src)),
            Instruction::Sub { dst, src } => (Opcode::Sub, r1(dst), r2(src)),
            Instruction::Inc { dst } => (Opcode::Inc, r1(dst), 0),
            Instruction::Dec { dst } => (Opcode::Dec, r1(dst), 0),
            Instruction::Cpi { dst, value } => (Opcode::Cpi, r1(dst), *value),
            Instruction::Cp { dst, src } => (Opcode::Cp, r1(dst), r2(src)),
            Instruction::Lsl { dst } => (Opcode::Lsl, r1(dst), 0),
            Instruction::Lsr { dst } => (Opcode::Lsr, r1(dst), 0),
            Instruction::Jmp { target } => (Opcode::Jmp, *target, 0),
            Instruction::Breq { target } => (Opcode::Breq, *target, 0),
            Instruction::Brne { target } => (Opcode::Brne, *target, 0),
            Instruction::Brge { target } => (Opcode::Brge, *target, 0),
            Instruction::Brgt { target } => (Opcode::Brgt, *target, 0),
            Instruction::Brle { target } => (Opcode::Brle, *target, 0),
            Instruction::Brlt { target } => (Opcode::Brlt, *target, 0),
            Instruction::Call { target } => (Opcode::Call, *target, 0),
            Instruction::Ret => (Opcode::Ret, 0, 0),
            Instruction::Reti => (Opcode::Reti, 0, 0),
            Instruction::Push { src } => (Opcode::Push, r1(src), 0),
            Instruction::Pop { dst } => (Opcode::Pop, r1(dst), 0),
            Instruction::Sei => (Opcode::Sei, 0, 0),
            Instruction::Cli => (Opcode::Cli, 0, 0),
        }
    }
}

/// Decode a 64-bit instruction word.
pub fn decode(word: u64) -> Result<Instruction, DecodeError> {
    RawInstruction::unpack(word).decode()
}

/// Encode an instruction to a 64-bit word.
pub fn encode(instr: &Instruction) -> u64 {
    instr.fields().pack()
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#06x}")]
    InvalidOpcode(u16),

    #[error("invalid register R{index} for {}", .opcode.mnemonic())]
    InvalidRegister { opcode: Opcode, index: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_word_is_nop() {
        assert_eq!(decode(0).unwrap(), Instruction::Nop);
    }

    #[test]
    fn test_field_layout() {
        let raw = RawInstruction::unpack(0x0001_0010_0000_0005);
        assert_eq!(raw, RawInstruction::new(0x01, 16, 5));
        assert_eq!(raw.decode().unwrap(), Instruction::Ldi { dst: Reg::R16, value: 5 });
        assert_eq!(raw.pack(), 0x0001_0010_0000_0005);
    }

    #[test]
    fn test_encode_known_words() {
        let out = Instruction::Out { addr: 0x01, src: Reg::R17 };
        assert_eq!(encode(&out), 0x0003_0001_0000_0011);

        let jmp = Instruction::Jmp { target: 0x21 };
        assert_eq!(encode(&jmp), 0x0016_0021_0000_0000);
    }

    #[test]
    fn test_invalid_opcode() {
        let word = RawInstruction::new(0x2A, 0, 0).pack();
        assert_eq!(decode(word), Err(DecodeError::InvalidOpcode(0x2A)));
        assert_eq!(decode(u64::MAX), Err(DecodeError::InvalidOpcode(0xFFFF)));
    }

    #[test]
    fn test_invalid_register() {
        let word = RawInstruction::new(Opcode::Mov as u16, 3, 32).pack();
        assert_eq!(
            decode(word),
            Err(DecodeError::InvalidRegister { opcode: Opcode::Mov, index: 32 })
        );

        // Targets and addresses are not registers.
        let word = RawInstruction::new(Opcode::Jmp as u16, 200, 0).pack();
        assert_eq!(decode(word), Ok(Instruction::Jmp { target: 200 }));
    }

    #[test]
    fn test_unused_fields_are_ignored() {
        let word = RawInstruction::new(Opcode::Ret as u16, 0xFFFF, 0xFFFF_FFFF).pack();
        assert_eq!(decode(word), Ok(Instruction::Ret));
    }

    #[test]
    fn test_opcode_tables_agree() {
        for (i, op) in Opcode::ALL.into_iter().enumerate() {
            assert_eq!(op as u16, i as u16);
            assert_eq!(Opcode::from_u16(op as u16), Some(op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("breq"), Some(Opcode::Breq));
        assert_eq!(Opcode::from_mnemonic("HLT"), None);
    }

    proptest! {
        #[test]
        fn prop_decoded_words_reencode_stably(word: u64) {
            if let Ok(instr) = decode(word) {
                let reencoded = encode(&instr);
                prop_assert_eq!(decode(reencoded), Ok(instr));
                prop_assert_eq!(RawInstruction::unpack(reencoded).opcode, instr.opcode() as u16);
            }
        }

        #[test]
        fn prop_valid_opcodes_decode(index in 0usize..42, op1 in 0u16..32, op2 in 0u32..32) {
            let opcode = Opcode::ALL[index];
            let raw = RawInstruction::new(opcode as u16, op1, op2);
            prop_assert_eq!(raw.decode().map(|i| i.opcode()), Ok(opcode));
        }
    }
}
