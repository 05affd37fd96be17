//! Disassembler for SAP-1 memory images.
//!
//! Walks memory linearly from address 0. Code and data are not
//! distinguished, so DATA cells show up as whatever opcode they encode.

use crate::cpu::Opcode;
use crate::nibble::Nibble;

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of nibbles consumed. An operand that
/// would lie past the end of `cells` is shown as `?`.
pub fn disassemble_at(cells: &[Nibble], addr: usize) -> (String, usize) {
    let Some(&raw) = cells.get(addr) else {
        return ("???".to_string(), 1);
    };

    let opcode = Opcode::from_nibble(raw);
    if !opcode.takes_operand() {
        return (opcode.mnemonic().to_string(), 1);
    }

    match cells.get(addr + 1) {
        Some(operand) => (format!("{} {}", opcode.mnemonic(), operand), 2),
        None => (format!("{} ?", opcode.mnemonic()), 1),
    }
}

/// Disassemble a whole image to a listing.
pub fn disassemble(cells: &[Nibble]) -> String {
    let mut output = String::new();
    output.push_str("; SAP-1 Disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut addr = 0;
    while addr < cells.len() {
        let (text, width) = disassemble_at(cells, addr);
        let raw: Vec<String> = cells[addr..addr + width]
            .iter()
            .map(|n| format!("{:X}", n))
            .collect();
        output.push_str(&format!("{:X}: {:<8} ; {}\n", addr, text, raw.join(" ")));
        addr += width;
    }

    output
}
