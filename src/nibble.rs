//! The 4-bit machine word.
//!
//! Every value that lives on the bus, in a register, or in RAM is a
//! [`Nibble`]. All constructors mask to the low four bits, so a stored
//! value can never leave the range 0..=15.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A 4-bit value in the range 0..=15.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Nibble(u8);

impl Nibble {
    /// Number of bits in a nibble.
    pub const WIDTH: u32 = 4;

    /// Bit mask selecting the nibble.
    pub const MASK: u8 = 0xF;

    /// The value 0.
    pub const ZERO: Nibble = Nibble(0);

    /// The value 15.
    pub const MAX: Nibble = Nibble(0xF);

    /// Create a nibble, discarding everything above bit 3.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self(value & Self::MASK)
    }

    /// Create a nibble from any integer with two's-complement wrap.
    ///
    /// `-1` becomes 15, `16` becomes 0.
    #[inline]
    pub fn from_i64(value: i64) -> Self {
        Self(value.rem_euclid(16) as u8)
    }

    /// The raw value.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The value as an index into a 16-cell array.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Add one, wrapping 15 back to 0.
    #[inline]
    pub const fn wrapping_inc(self) -> Self {
        Self::new(self.0.wrapping_add(1))
    }

    /// Whether this nibble is zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Test a single bit (0 = least significant).
    #[inline]
    pub const fn bit(self, n: u32) -> bool {
        n < Self::WIDTH && (self.0 >> n) & 1 == 1
    }

    /// Iterate over all sixteen nibble values in ascending order.
    pub fn all() -> impl Iterator<Item = Nibble> {
        (0..=Self::MASK).map(Nibble)
    }
}

impl From<u8> for Nibble {
    #[inline]
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Nibble> for u8 {
    #[inline]
    fn from(value: Nibble) -> Self {
        value.0
    }
}

impl fmt::Debug for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X} ({:04b})", self.0, self.0)
    }
}

impl fmt::Display for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::Binary for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.0, f)
    }
}
