//! CPU emulation for the SAP-1.
//!
//! This module implements the complete machine:
//! - a single shared 4-bit bus
//! - six 4-bit registers: PC, MAR, IR, A, B, OUT
//! - 16 four-bit memory cells
//! - an add/subtract ALU with zero and carry flags
//! - a microcoded control unit with eight steps per instruction

pub mod alu;
pub mod bus;
pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use alu::{Alu, Flags};
pub use bus::Bus;
pub use memory::{Ram, MemoryError, MEMORY_SIZE};
pub use registers::{Register, Registers};
pub use decode::{ControlUnit, Opcode, Signal, SignalSet};
pub use execute::Computer;
