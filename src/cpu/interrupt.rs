//! Pin-change interrupts.
//!
//! Each port has one interrupt source. Every sub-state the edge detector
//! compares the port's PINx register with the value it saw last time; any
//! changed bit that is selected in PCMSKx raises the source's flag in PCIFR.
//! The control unit dispatches a flagged source at the end of an execute
//! phase when both I and the source's PCICR bit are set.

use crate::cpu::io::{PCICR, PCIE0, PCIF0, PCIFR, PCMSK0};
use crate::cpu::{CpuState, DataMemory, Port, Stack, StackError, Status, REGISTER_COUNT};
use serde::{Deserialize, Serialize};

/// Number of words [`Context::push_onto`] places on the stack.
pub const CONTEXT_WORDS: usize = 11 + REGISTER_COUNT;

/// An interrupt source, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Pin change on port B.
    PcInt0,
    /// Pin change on port C.
    PcInt1,
    /// Pin change on port D.
    PcInt2,
}

impl Source {
    /// All sources, highest priority first.
    pub const ALL: [Source; 3] = [Source::PcInt0, Source::PcInt1, Source::PcInt2];

    pub fn index(self) -> u32 {
        match self {
            Source::PcInt0 => 0,
            Source::PcInt1 => 1,
            Source::PcInt2 => 2,
        }
    }

    /// The port this source monitors.
    pub fn port(self) -> Port {
        Port::ALL[self.index() as usize]
    }

    /// Program address the source jumps to.
    pub fn vector(self) -> u16 {
        0x02 + 2 * self.index() as u16
    }

    /// Enable bit in PCICR.
    pub fn enable_bit(self) -> u32 {
        PCIE0 + self.index()
    }

    /// Pending bit in PCIFR.
    pub fn flag_bit(self) -> u32 {
        PCIF0 + self.index()
    }

    /// Address of the PCMSKx register.
    pub fn mask_register(self) -> u32 {
        PCMSK0 + self.index()
    }

    pub fn name(self) -> &'static str {
        match self {
            Source::PcInt0 => "PCINT0",
            Source::PcInt1 => "PCINT1",
            Source::PcInt2 => "PCINT2",
        }
    }
}

/// Remembers the last sampled input of every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeDetector {
    previous: [u32; 3],
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.previous = [0; 3];
    }

    /// Last sampled value per port, in [`Port::ALL`] order.
    pub fn history(&self) -> [u32; 3] {
        self.previous
    }

    pub fn restore(&mut self, history: [u32; 3]) {
        self.previous = history;
    }

    /// Sample every port and raise the pending flag of each source whose
    /// monitored pins changed.
    pub fn sample(&mut self, mem: &mut DataMemory) {
        for source in Source::ALL {
            let slot = source.index() as usize;
            let current = mem.read(source.port().pin());
            let mask = mem.read(source.mask_register());

            if (current ^ self.previous[slot]) & mask != 0 {
                // PCIFR is always in range.
                let _ = mem.set_bit(PCIFR, source.flag_bit());
            }
            self.previous[slot] = current;
        }
    }
}

/// The highest-priority source that is both flagged and enabled.
///
/// Does not look at the global I flag.
pub fn pending(mem: &DataMemory) -> Option<Source> {
    let flags = mem.read(PCIFR);
    let enabled = mem.read(PCICR);

    Source::ALL.into_iter().find(|source| {
        flags & (1 << source.flag_bit()) != 0 && enabled & (1 << source.enable_bit()) != 0
    })
}

/// Everything visible about the processor that an interrupt must preserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub pc: u16,
    pub ir: u64,
    pub sr: Status,
    pub opcode: u16,
    pub op1: u16,
    pub op2: u32,
    pub state: CpuState,
    pub history: [u32; 3],
    pub regs: [u32; REGISTER_COUNT],
}

impl Context {
    /// Push the context in its fixed order:
    /// PC, IR high, IR low, SR, opcode, op1, op2, state,
    /// edge history (B, C, D), then R0..R31.
    ///
    /// Pushes nothing unless the whole context fits.
    pub fn push_onto(&self, stack: &mut Stack) -> Result<(), StackError> {
        if stack.free() < CONTEXT_WORDS {
            return Err(StackError::Full {
                capacity: stack.capacity(),
            });
        }
        stack.push(self.pc as u32)?;
        stack.push((self.ir >> 32) as u32)?;
        stack.push(self.ir as u32)?;
        stack.push(self.sr.bits() as u32)?;
        stack.push(self.opcode as u32)?;
        stack.push(self.op1 as u32)?;
        stack.push(self.op2)?;
        stack.push(self.state.to_word())?;
        for &h in &self.history {
            stack.push(h)?;
        }
        for &r in &self.regs {
            stack.push(r)?;
        }
        Ok(())
    }

    /// Pop a context in exactly the reverse order of [`Context::push_onto`].
    pub fn pop_from(stack: &mut Stack) -> Context {
        let mut regs = [0; REGISTER_COUNT];
        for r in regs.iter_mut().rev() {
            *r = stack.pop();
        }
        let mut history = [0; 3];
        for h in history.iter_mut().rev() {
            *h = stack.pop();
        }
        let state = CpuState::from_word(stack.pop()).unwrap_or(CpuState::Fetch);
        let op2 = stack.pop();
        let op1 = stack.pop() as u16;
        let opcode = stack.pop() as u16;
        let sr = Status::from_bits_truncate(stack.pop() as u8);
        let ir_low = stack.pop() as u64;
        let ir_high = stack.pop() as u64;
        let pc = stack.pop() as u16;

        Context {
            pc,
            ir: ir_high << 32 | ir_low,
            sr,
            opcode,
            op1,
            op2,
            state,
            history,
            regs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::io::{PCMSK1, PINB, PINC};

    fn sample_context() -> Context {
        let mut regs = [0; REGISTER_COUNT];
        for (i, r) in regs.iter_mut().enumerate() {
            *r = 0x100 + i as u32;
        }
        Context {
            pc: 0x42,
            ir: 0x0012_0010_DEAD_BEEF,
            sr: Status::I | Status::Z | Status::C,
            opcode: 0x12,
            op1: 0x10,
            op2: 0xDEAD_BEEF,
            state: CpuState::Fetch,
            history: [1, 2, 3],
            regs,
        }
    }

    #[test]
    fn test_source_layout() {
        assert_eq!(Source::PcInt0.vector(), 0x02);
        assert_eq!(Source::PcInt1.vector(), 0x04);
        assert_eq!(Source::PcInt2.vector(), 0x06);
        assert_eq!(Source::PcInt1.port(), Port::C);
        assert_eq!(Source::PcInt2.mask_register(), 0x12);
    }

    #[test]
    fn test_edge_raises_flag_only_for_masked_bits() {
        let mut mem = DataMemory::new();
        let mut edges = EdgeDetector::new();
        mem.write(PCMSK0, 0b0010_0000).unwrap();

        // Unmasked pin change: nothing.
        mem.write(PINB, 0b0000_0001).unwrap();
        edges.sample(&mut mem);
        assert_eq!(mem.read(PCIFR), 0);

        // Masked pin change sets PCIF0.
        mem.write(PINB, 0b0010_0001).unwrap();
        edges.sample(&mut mem);
        assert_eq!(mem.read(PCIFR), 1 << PCIF0);

        // Steady input does not clear or re-raise anything.
        mem.write(PCIFR, 0).unwrap();
        edges.sample(&mut mem);
        assert_eq!(mem.read(PCIFR), 0);

        // Falling edge counts too.
        mem.write(PINB, 0b0000_0001).unwrap();
        edges.sample(&mut mem);
        assert_eq!(mem.read(PCIFR), 1 << PCIF0);
        assert_eq!(edges.history()[0], 0b0000_0001);
    }

    #[test]
    fn test_ports_are_independent() {
        let mut mem = DataMemory::new();
        let mut edges = EdgeDetector::new();
        mem.write(PCMSK1, 0xFF).unwrap();
        mem.write(PINC, 0x04).unwrap();
        edges.sample(&mut mem);
        assert_eq!(mem.read(PCIFR), 1 << Source::PcInt1.flag_bit());
    }

    #[test]
    fn test_pending_needs_enable_and_uses_priority() {
        let mut mem = DataMemory::new();
        mem.write(PCIFR, 0b110).unwrap();
        assert_eq!(pending(&mem), None);

        mem.write(PCICR, 0b111).unwrap();
        assert_eq!(pending(&mem), Some(Source::PcInt1));

        mem.write(PCIFR, 0b111).unwrap();
        assert_eq!(pending(&mem), Some(Source::PcInt0));
    }

    #[test]
    fn test_context_round_trip() {
        let context = sample_context();
        let mut stack = Stack::new();
        stack.push(0xAAAA).unwrap();

        context.push_onto(&mut stack).unwrap();
        assert_eq!(stack.len(), 1 + CONTEXT_WORDS);

        assert_eq!(Context::pop_from(&mut stack), context);
        assert_eq!(stack.pop(), 0xAAAA);
    }

    #[test]
    fn test_context_push_order() {
        let context = sample_context();
        let mut stack = Stack::new();
        context.push_onto(&mut stack).unwrap();

        let words: Vec<u32> = stack.iter().collect();
        // Most recent first: R31 on top, PC at the bottom.
        assert_eq!(words[0], context.regs[31]);
        assert_eq!(words[REGISTER_COUNT - 1], context.regs[0]);
        assert_eq!(&words[REGISTER_COUNT..REGISTER_COUNT + 3], &[3, 2, 1]);
        assert_eq!(words[REGISTER_COUNT + 3], CpuState::Fetch.to_word());
        assert_eq!(words[REGISTER_COUNT + 4], 0xDEAD_BEEF);
        assert_eq!(words[REGISTER_COUNT + 7], context.sr.bits() as u32);
        assert_eq!(words[REGISTER_COUNT + 8], 0xDEAD_BEEF);
        assert_eq!(words[REGISTER_COUNT + 9], 0x0012_0010);
        assert_eq!(words[CONTEXT_WORDS - 1], 0x42);
    }

    #[test]
    fn test_context_push_is_all_or_nothing() {
        let mut stack = Stack::with_capacity(CONTEXT_WORDS);
        stack.push(0xAAAA).unwrap();
        let result = sample_context().push_onto(&mut stack);
        assert_eq!(result, Err(StackError::Full { capacity: CONTEXT_WORDS }));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop(), 0xAAAA);

        sample_context().push_onto(&mut stack).unwrap();
        assert!(stack.is_full());
    }
}
