//! The shared 4-bit bus.
//!
//! Every transfer between components goes through this single value.
//! It is not latched: a later write in the same tick replaces an
//! earlier one.

use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};

/// The single shared bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    value: Nibble,
}

impl Bus {
    /// Create a bus carrying zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a value onto the bus.
    #[inline]
    pub fn write(&mut self, value: Nibble) {
        self.value = value;
    }

    /// Current bus value.
    #[inline]
    pub fn read(&self) -> Nibble {
        self.value
    }
}
