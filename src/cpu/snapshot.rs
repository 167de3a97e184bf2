//! Diagnostic dump of the visible machine state.

use crate::cpu::io::{PCICR, PCIFR};
use crate::cpu::{decode, Cpu, CpuState, Port, Source, Status, REGISTER_COUNT};
use serde::Serialize;
use std::fmt;

/// Direction, output and input registers of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSnapshot {
    pub port: Port,
    pub ddr: u32,
    pub output: u32,
    pub input: u32,
    pub mask: u32,
}

/// Point-in-time copy of registers, flags and I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub pc: u16,
    pub last_fetch: u16,
    pub ir: u64,
    pub state: CpuState,
    pub sr: Status,
    pub regs: [u32; REGISTER_COUNT],
    pub ports: Vec<PortSnapshot>,
    pub pcicr: u32,
    pub pcifr: u32,
    pub stack_depth: usize,
    pub cycles: u64,
}

impl Snapshot {
    pub fn capture(cpu: &Cpu) -> Self {
        let ports = Port::ALL
            .into_iter()
            .zip(Source::ALL)
            .map(|(port, source)| PortSnapshot {
                port,
                ddr: cpu.mem.read(port.ddr()),
                output: cpu.mem.read(port.port()),
                input: cpu.mem.read(port.pin()),
                mask: cpu.mem.read(source.mask_register()),
            })
            .collect();

        Self {
            pc: cpu.pc(),
            last_fetch: cpu.last_fetch(),
            ir: cpu.ir(),
            state: cpu.state(),
            sr: cpu.sr,
            regs: *cpu.regs.values(),
            ports,
            pcicr: cpu.mem.read(PCICR),
            pcifr: cpu.mem.read(PCIFR),
            stack_depth: cpu.stack.len(),
            cycles: cpu.cycles(),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = match decode::decode(self.ir) {
            Ok(instr) => instr.to_string(),
            Err(err) => format!("<{}>", err),
        };

        writeln!(f, "State:      {:?}", self.state)?;
        writeln!(f, "PC:         {:#05x}", self.pc)?;
        writeln!(f, "IR:         {:#018x} ({} @ {:#05x})", self.ir, current, self.last_fetch)?;
        writeln!(f, "SR:         {} ({:#04x})", self.sr, self.sr.bits())?;
        writeln!(f, "Cycles:     {}", self.cycles)?;
        writeln!(f, "Stack:      {} words", self.stack_depth)?;
        writeln!(f)?;

        for (row, chunk) in self.regs.chunks(4).enumerate() {
            for (col, value) in chunk.iter().enumerate() {
                write!(f, "R{:<2} = {:#010x}  ", row * 4 + col, value)?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;

        for p in &self.ports {
            writeln!(
                f,
                "Port {:?}:  DDR={:#010x} PORT={:#010x} PIN={:#010x} MASK={:#010x}",
                p.port, p.ddr, p.output, p.input, p.mask
            )?;
        }
        writeln!(f, "PCICR:      {:#05b}", self.pcicr)?;
        write!(f, "PCIFR:      {:#05b}", self.pcifr)
    }
}
