//! Control unit.
//!
//! Implements the fetch-decode-execute cycle, all instruction behaviors and
//! interrupt dispatch. One call to [`Cpu::tick`] advances one sub-state;
//! [`Cpu::step`] runs a whole instruction cycle.

use crate::cpu::decode::{Instruction, RawInstruction, DecodeError};
use crate::cpu::interrupt::{self, Context, EdgeDetector, Source};
use crate::cpu::io::PCIFR;
use crate::cpu::{
    alu, AluOp, DataMemory, MemoryError, Port, ProgramMemory, Reg, Registers, Snapshot, Stack,
    StackError, Status, DATA_OFFSET, RESET_VECTOR,
};
use serde::{Deserialize, Serialize};

/// Sub-state of the instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    Fetch,
    Decode,
    Execute,
}

impl CpuState {
    /// Encoding used when the state is saved on the stack.
    pub fn to_word(self) -> u32 {
        match self {
            CpuState::Fetch => 0,
            CpuState::Decode => 1,
            CpuState::Execute => 2,
        }
    }

    pub fn from_word(word: u32) -> Option<CpuState> {
        match word {
            0 => Some(CpuState::Fetch),
            1 => Some(CpuState::Decode),
            2 => Some(CpuState::Execute),
            _ => None,
        }
    }
}

/// What a completed execute phase did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The instruction ran normally.
    Executed(Instruction),
    /// The instruction ran, then an interrupt was dispatched.
    Interrupted { instruction: Instruction, source: Source },
    /// The instruction word could not be decoded; the machine was reset.
    Reset(DecodeError),
}

/// The processor.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// General-purpose registers.
    pub regs: Registers,
    /// Status register.
    pub sr: Status,
    /// Data memory, including the I/O registers.
    pub mem: DataMemory,
    /// Program memory.
    pub program: ProgramMemory,
    /// Hardware stack.
    pub stack: Stack,
    pc: u16,
    ir: u64,
    /// Address the instruction register was fetched from.
    mar: u16,
    latch: RawInstruction,
    state: CpuState,
    edges: EdgeDetector,
    /// External pin levels supplied by the host, per port.
    inputs: [u32; 3],
    /// Completed instruction cycles (for profiling).
    cycles: u64,
}

impl Cpu {
    /// Create a new CPU with zeroed state and an empty program.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            sr: Status::empty(),
            mem: DataMemory::new(),
            program: ProgramMemory::new(),
            stack: Stack::new(),
            pc: RESET_VECTOR,
            ir: 0,
            mar: 0,
            latch: RawInstruction::default(),
            state: CpuState::Fetch,
            edges: EdgeDetector::new(),
            inputs: [0; 3],
            cycles: 0,
        }
    }

    /// Reset the CPU: registers, flags, data memory and stack are cleared
    /// and execution restarts at the reset vector. The loaded program is
    /// kept, as are the host's pin inputs.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.sr = Status::empty();
        self.mem.reset();
        self.stack.reset();
        self.pc = RESET_VECTOR;
        self.ir = 0;
        self.mar = 0;
        self.latch = RawInstruction::default();
        self.state = CpuState::Fetch;
        self.edges.reset();
        self.cycles = 0;
    }

    /// Load a program into program memory.
    pub fn load_program(&mut self, program: &[u64]) -> Result<(), MemoryError> {
        self.program.load(program)
    }

    /// Advance one sub-state of the instruction cycle.
    ///
    /// Returns `Some` once an execute phase completes.
    pub fn tick(&mut self) -> Option<Outcome> {
        let outcome = match self.state {
            CpuState::Fetch => {
                self.ir = self.program.read(self.pc);
                self.mar = self.pc;
                self.pc = self.pc.wrapping_add(1);
                self.state = CpuState::Decode;
                None
            }
            CpuState::Decode => {
                self.latch = RawInstruction::unpack(self.ir);
                self.state = CpuState::Execute;
                None
            }
            CpuState::Execute => match self.latch.decode() {
                Ok(instruction) => {
                    log::trace!("{:#05x}: {}", self.mar, instruction);
                    self.execute(instruction);
                    self.state = CpuState::Fetch;
                    self.cycles += 1;
                    Some(match self.check_for_irq() {
                        Some(source) => Outcome::Interrupted { instruction, source },
                        None => Outcome::Executed(instruction),
                    })
                }
                Err(err) => {
                    log::warn!("{} at {:#05x}, resetting", err, self.mar);
                    self.reset();
                    return Some(Outcome::Reset(err));
                }
            },
        };

        self.sync_io();
        self.edges.sample(&mut self.mem);
        outcome
    }

    /// Run sub-states until one instruction has executed.
    pub fn step(&mut self) -> Outcome {
        loop {
            if let Some(outcome) = self.tick() {
                return outcome;
            }
        }
    }

    /// Run at most `max_instructions` instruction cycles.
    ///
    /// Returns the number of cycles run.
    pub fn run(&mut self, max_instructions: u64) -> u64 {
        for _ in 0..max_instructions {
            self.step();
        }
        max_instructions
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) {
        match instr {
            // ==================== Data Transfer ====================

            Instruction::Nop => {}

            Instruction::Ldi { dst, value } => self.regs[dst] = value,

            Instruction::Mov { dst, src } => self.regs[dst] = self.regs[src],

            Instruction::Out { addr, src } => {
                let addr = addr as u32;
                let value = self.regs[src];
                match Port::from_pin_address(addr) {
                    Some(port) => {
                        let toggled = self.mem.read(port.port()) ^ value;
                        self.store(port.port(), toggled);
                    }
                    None => self.store(addr, value),
                }
            }

            Instruction::In { dst, addr } => self.regs[dst] = self.mem.read(addr),

            Instruction::Sts { addr, src } => {
                let value = self.regs[src];
                self.store(DATA_OFFSET + addr as u32, value);
            }

            Instruction::Lds { dst, addr } => {
                self.regs[dst] = self.mem.read(DATA_OFFSET.saturating_add(addr));
            }

            Instruction::Clr { dst } => self.regs[dst] = 0,

            Instruction::St { ptr, src } => {
                let addr = DATA_OFFSET.saturating_add(self.regs[ptr]);
                let value = self.regs[src];
                self.store(addr, value);
            }

            Instruction::Ld { dst, ptr } => {
                self.regs[dst] = self.mem.read(DATA_OFFSET.saturating_add(self.regs[ptr]));
            }

            Instruction::Stio { ptr, src } => {
                let value = self.regs[src];
                self.store(self.regs[ptr], value);
            }

            Instruction::Ldio { dst, ptr } => self.regs[dst] = self.mem.read(self.regs[ptr]),

            // ==================== Logic & Arithmetic ====================

            Instruction::Ori { dst, value } => self.alu_into(AluOp::Or, dst, value),
            Instruction::Andi { dst, value } => self.alu_into(AluOp::And, dst, value),
            Instruction::Xori { dst, value } => self.alu_into(AluOp::Xor, dst, value),
            Instruction::Or { dst, src } => self.alu_into(AluOp::Or, dst, self.regs[src]),
            Instruction::And { dst, src } => self.alu_into(AluOp::And, dst, self.regs[src]),
            Instruction::Xor { dst, src } => self.alu_into(AluOp::Xor, dst, self.regs[src]),
            Instruction::Addi { dst, value } => self.alu_into(AluOp::Add, dst, value),
            Instruction::Subi { dst, value } => self.alu_into(AluOp::Sub, dst, value),
            Instruction::Add { dst, src } => self.alu_into(AluOp::Add, dst, self.regs[src]),
            Instruction::Sub { dst, src } => self.alu_into(AluOp::Sub, dst, self.regs[src]),
            Instruction::Inc { dst } => self.alu_into(AluOp::Add, dst, 1),
            Instruction::Dec { dst } => self.alu_into(AluOp::Sub, dst, 1),

            Instruction::Cpi { dst, value } => self.compare(self.regs[dst], value),
            Instruction::Cp { dst, src } => self.compare(self.regs[dst], self.regs[src]),

            Instruction::Lsl { dst } => self.regs[dst] <<= 1,
            Instruction::Lsr { dst } => self.regs[dst] >>= 1,

            // ==================== Control Flow ====================

            Instruction::Jmp { target } => self.pc = target,

            Instruction::Breq { target } => self.branch_if(target, self.flag(Status::Z)),
            Instruction::Brne { target } => self.branch_if(target, !self.flag(Status::Z)),
            Instruction::Brge { target } => self.branch_if(target, !self.flag(Status::S)),
            Instruction::Brgt { target } => {
                let taken = !self.flag(Status::S) && !self.flag(Status::Z);
                self.branch_if(target, taken);
            }
            Instruction::Brle { target } => {
                let taken = self.flag(Status::S) || self.flag(Status::Z);
                self.branch_if(target, taken);
            }
            Instruction::Brlt { target } => self.branch_if(target, self.flag(Status::S)),

            Instruction::Call { target } => {
                self.push(self.pc as u32);
                self.pc = target;
            }

            Instruction::Ret => self.pc = self.stack.pop() as u16,

            Instruction::Reti => self.return_from_interrupt(),

            Instruction::Push { src } => self.push(self.regs[src]),

            Instruction::Pop { dst } => self.regs[dst] = self.stack.pop(),

            Instruction::Sei => self.sr.insert(Status::I),

            Instruction::Cli => self.sr.remove(Status::I),
        }
    }

    fn alu_into(&mut self, op: AluOp, dst: Reg, b: u32) {
        let (result, flags) = alu(op, self.regs[dst], b);
        self.regs[dst] = result;
        self.sr.update_arith(flags);
    }

    fn compare(&mut self, a: u32, b: u32) {
        let (_, flags) = alu(AluOp::Sub, a, b);
        self.sr.update_arith(flags);
    }

    fn flag(&self, flag: Status) -> bool {
        self.sr.contains(flag)
    }

    fn branch_if(&mut self, target: u16, taken: bool) {
        if taken {
            self.pc = target;
        }
    }

    fn push(&mut self, value: u32) {
        if let Err(err) = self.stack.push(value) {
            log::warn!("{} at {:#05x}", err, self.mar);
        }
    }

    fn store(&mut self, addr: u32, value: u32) {
        if let Err(err) = self.mem.write(addr, value) {
            log::debug!("{} at {:#05x}", err, self.mar);
        }
    }

    // ==================== Interrupts ====================

    /// Dispatch the highest-priority pending interrupt, if I allows it.
    fn check_for_irq(&mut self) -> Option<Source> {
        if !self.sr.interrupts_enabled() {
            return None;
        }
        let source = interrupt::pending(&self.mem)?;

        // The request stays pending until its context is on the stack.
        if let Err(err) = self.generate_interrupt(source) {
            log::warn!("{} while saving context for {}, left pending", err, source.name());
            return None;
        }
        let _ = self.mem.clear_bit(PCIFR, source.flag_bit());
        Some(source)
    }

    /// Save the context, mask interrupts and jump to the source's vector.
    fn generate_interrupt(&mut self, source: Source) -> Result<(), StackError> {
        let context = self.context();
        context.push_onto(&mut self.stack)?;
        self.sr.remove(Status::I);
        self.pc = source.vector();
        log::debug!(
            "interrupt {}: vector={:#04x} return={:#05x} sp={}",
            source.name(),
            source.vector(),
            context.pc,
            self.stack.sp()
        );
        Ok(())
    }

    fn return_from_interrupt(&mut self) {
        let context = Context::pop_from(&mut self.stack);
        log::debug!("return from interrupt to {:#05x}", context.pc);
        self.restore(context);
        self.sr.insert(Status::I);
    }

    /// The state an interrupt saves and RETI restores.
    pub fn context(&self) -> Context {
        Context {
            pc: self.pc,
            ir: self.ir,
            sr: self.sr,
            opcode: self.latch.opcode,
            op1: self.latch.op1,
            op2: self.latch.op2,
            state: self.state,
            history: self.edges.history(),
            regs: *self.regs.values(),
        }
    }

    fn restore(&mut self, context: Context) {
        self.pc = context.pc;
        self.ir = context.ir;
        self.sr = context.sr;
        self.latch = RawInstruction::new(context.opcode, context.op1, context.op2);
        self.state = context.state;
        self.edges.restore(context.history);
        self.regs.restore(context.regs);
    }

    // ==================== Host I/O ====================

    /// Latch the external input levels of a port.
    ///
    /// They become visible in PINx at the end of the current sub-state.
    pub fn set_input(&mut self, port: Port, value: u32) {
        self.inputs[port.index()] = value;
    }

    /// Levels the core drives onto a port's pins (PORTx & DDRx).
    pub fn port_output(&self, port: Port) -> u32 {
        self.mem.read(port.port()) & self.mem.read(port.ddr())
    }

    /// Copy the host's pin inputs into the PINx registers.
    fn sync_io(&mut self) {
        for port in Port::ALL {
            let _ = self.mem.write(port.pin(), self.inputs[port.index()]);
        }
    }

    // ==================== Accessors ====================

    /// Address of the next instruction to fetch.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Instruction register.
    pub fn ir(&self) -> u64 {
        self.ir
    }

    /// Address of the most recently fetched instruction.
    pub fn last_fetch(&self) -> u16 {
        self.mar
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Instruction cycles completed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Diagnostic dump of the visible machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("sr", &self.sr)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}
