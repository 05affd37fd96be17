//! Arithmetic/logic unit.
//!
//! Combinational add and subtract over two nibbles. Flags are recomputed
//! on every [`Alu::compute`] call; the computer only calls it when the
//! ALU drives the bus, so plain register loads never touch the flags.

use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};

/// Zero and carry flags from the most recent computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    /// The result was zero.
    pub zero: bool,
    /// Addition overflowed past 15, or subtraction borrowed.
    pub carry: bool,
}

/// The ALU with its flag latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alu {
    flags: Flags,
    result: Nibble,
}

impl Alu {
    /// Create an ALU with cleared flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `a + b` or `a - b` and latch the flags.
    ///
    /// For subtraction, carry means borrow (`a < b`) and the result wraps
    /// by adding 16.
    pub fn compute(&mut self, a: Nibble, b: Nibble, subtract: bool) -> Nibble {
        let (a, b) = (a.value(), b.value());
        let (raw, carry) = if subtract {
            (a as i16 - b as i16, a < b)
        } else {
            let sum = a as i16 + b as i16;
            (sum, sum > 15)
        };

        let result = Nibble::from_i64(raw as i64);
        self.flags = Flags { zero: result.is_zero(), carry };
        self.result = result;
        result
    }

    /// Flags from the last computation.
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Result of the last computation.
    #[inline]
    pub fn result(&self) -> Nibble {
        self.result
    }

    /// Clear flags and result.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
