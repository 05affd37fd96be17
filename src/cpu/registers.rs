//! SAP-1 registers.
//!
//! The machine has six 4-bit registers, all with identical behavior:
//! - PC: program counter
//! - MAR: memory address register
//! - IR: instruction register (holds the opcode nibble)
//! - A: accumulator, ALU left operand
//! - B: ALU right operand
//! - OUT: output display register

use std::fmt;
use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};

/// A single 4-bit register.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    value: Nibble,
}

impl Register {
    /// Create a register holding zero.
    pub const fn new() -> Self {
        Self { value: Nibble::ZERO }
    }

    /// Latch a value.
    #[inline]
    pub fn load(&mut self, value: Nibble) {
        self.value = value;
    }

    /// Current value.
    #[inline]
    pub fn read(&self) -> Nibble {
        self.value
    }

    /// Add one, wrapping mod 16.
    #[inline]
    pub fn increment(&mut self) {
        self.value = self.value.wrapping_inc();
    }

    /// Clear to zero.
    #[inline]
    pub fn clear(&mut self) {
        self.value = Nibble::ZERO;
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.value)
    }
}

/// The register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter
    pub pc: Register,

    /// Memory address register
    pub mar: Register,

    /// Instruction register
    pub ir: Register,

    /// Accumulator
    pub a: Register,

    /// ALU operand register
    pub b: Register,

    /// Output register
    pub out: Register,
}

impl Registers {
    /// Create a register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.pc.clear();
        self.mar.clear();
        self.ir.clear();
        self.a.clear();
        self.b.clear();
        self.out.clear();
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={:X} MAR={:X} IR={:X} A={:X} B={:X} OUT={:X}",
            self.pc.read(),
            self.mar.read(),
            self.ir.read(),
            self.a.read(),
            self.b.read(),
            self.out.read(),
        )
    }
}
