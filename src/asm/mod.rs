//! Assembler and disassembler for SAP-1 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → 16-nibble memory image)
//! - A disassembler (memory image → readable text)
//! - Loading and saving memory image files

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblyError, Program};
pub use disasm::{disassemble, disassemble_at};
pub use image::{load_image, parse_image, save_image, ImageError};
