//! SAP-1 memory subsystem.
//!
//! Sixteen 4-bit cells, addressed by a nibble. Program and data share
//! the same cells, so a write is visible to the very next fetch.

use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory cells.
pub const MEMORY_SIZE: usize = 16;

/// 16-word × 4-bit RAM.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ram {
    cells: [Nibble; MEMORY_SIZE],
}

impl Ram {
    /// Create a memory with all cells zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a cell.
    #[inline]
    pub fn read(&self, addr: Nibble) -> Nibble {
        self.cells[addr.index()]
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: Nibble, value: Nibble) {
        self.cells[addr.index()] = value;
    }

    /// All cells in address order.
    pub fn cells(&self) -> &[Nibble; MEMORY_SIZE] {
        &self.cells
    }

    /// Load a program starting at address 0.
    ///
    /// Cells past the end of `program` keep their contents. Each word is
    /// masked to four bits. Nothing is written if the program does not fit.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge { size: program.len() });
        }

        for (cell, &word) in self.cells.iter_mut().zip(program) {
            *cell = Nibble::new(word);
        }

        log::debug!("loaded {} words into RAM", program.len());
        Ok(())
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells = [Nibble::ZERO; MEMORY_SIZE];
    }

    /// Dump a range of cells as (address, value) pairs.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Nibble)> {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: String = self.cells.iter().map(|c| format!("{:X}", c)).collect();
        f.debug_struct("Ram").field("cells", &hex).finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds memory size 16")]
    ProgramTooLarge { size: usize },
}
