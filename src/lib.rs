//! # SAP-1 Emulator
//!
//! A 4-bit von Neumann computer in the style of the SAP-1 teaching
//! machine: one shared bus, six registers, sixteen nibbles of memory,
//! an add/subtract ALU and a microcoded control unit. A two-pass
//! assembler turns mnemonic source into memory images.

pub mod nibble;
pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use nibble::Nibble;
pub use cpu::{Computer, ControlUnit, Flags, MemoryError, Opcode, Ram, Signal, SignalSet};
pub use asm::{assemble, disassemble, AssemblyError, ImageError, Program, load_image, save_image};
