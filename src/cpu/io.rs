//! Memory-mapped I/O register map.
//!
//! The low end of data memory models the device registers:
//!
//! | Address | Register | Purpose                                  |
//! |---------|----------|------------------------------------------|
//! | 0x00    | DDRB     | direction of port B (1 = output)         |
//! | 0x01    | PORTB    | output levels of port B                  |
//! | 0x02    | PINB     | sampled input levels of port B           |
//! | 0x03-05 | *C       | same for port C                          |
//! | 0x06-08 | *D       | same for port D                          |
//! | 0x09    | PCICR    | pin-change interrupt enable, one bit/port|
//! | 0x0A    | PCIFR    | pin-change interrupt pending flags       |
//! | 0x10-12 | PCMSK0-2 | per-port pin monitoring masks            |
//!
//! Writing a PINx register through OUT toggles the matching PORTx bits.

use serde::{Deserialize, Serialize};

pub const DDRB: u32 = 0x00;
pub const PORTB: u32 = 0x01;
pub const PINB: u32 = 0x02;
pub const DDRC: u32 = 0x03;
pub const PORTC: u32 = 0x04;
pub const PINC: u32 = 0x05;
pub const DDRD: u32 = 0x06;
pub const PORTD: u32 = 0x07;
pub const PIND: u32 = 0x08;

pub const PCICR: u32 = 0x09;
pub const PCIFR: u32 = 0x0A;

pub const PCMSK0: u32 = 0x10;
pub const PCMSK1: u32 = 0x11;
pub const PCMSK2: u32 = 0x12;

/// Enable bits in PCICR.
pub const PCIE0: u32 = 0;
pub const PCIE1: u32 = 1;
pub const PCIE2: u32 = 2;

/// Pending bits in PCIFR.
pub const PCIF0: u32 = 0;
pub const PCIF1: u32 = 1;
pub const PCIF2: u32 = 2;

/// Named I/O registers, in address order.
pub const REGISTER_NAMES: [(&str, u32); 14] = [
    ("DDRB", DDRB),
    ("PORTB", PORTB),
    ("PINB", PINB),
    ("DDRC", DDRC),
    ("PORTC", PORTC),
    ("PINC", PINC),
    ("DDRD", DDRD),
    ("PORTD", PORTD),
    ("PIND", PIND),
    ("PCICR", PCICR),
    ("PCIFR", PCIFR),
    ("PCMSK0", PCMSK0),
    ("PCMSK1", PCMSK1),
    ("PCMSK2", PCMSK2),
];

/// Name of the I/O register at `addr`, if it has one.
pub fn register_name(addr: u32) -> Option<&'static str> {
    REGISTER_NAMES
        .iter()
        .find(|&&(_, a)| a == addr)
        .map(|&(name, _)| name)
}

/// A 32-pin I/O port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    B,
    C,
    D,
}

impl Port {
    pub const ALL: [Port; 3] = [Port::B, Port::C, Port::D];

    /// Position in [`Port::ALL`].
    pub fn index(self) -> usize {
        match self {
            Port::B => 0,
            Port::C => 1,
            Port::D => 2,
        }
    }

    /// Data direction register address.
    pub fn ddr(self) -> u32 {
        DDRB + 3 * self.index() as u32
    }

    /// Output register address.
    pub fn port(self) -> u32 {
        PORTB + 3 * self.index() as u32
    }

    /// Input register address.
    pub fn pin(self) -> u32 {
        PINB + 3 * self.index() as u32
    }

    /// The port whose input register lives at `addr`.
    pub fn from_pin_address(addr: u32) -> Option<Port> {
        Port::ALL.into_iter().find(|p| p.pin() == addr)
    }

    /// Parse a port letter (case-insensitive).
    pub fn from_letter(letter: &str) -> Option<Port> {
        match letter.to_ascii_uppercase().as_str() {
            "B" => Some(Port::B),
            "C" => Some(Port::C),
            "D" => Some(Port::D),
            _ => None,
        }
    }
}
