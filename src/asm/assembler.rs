//! Two-pass assembler for SAP-1 programs.
//!
//! Syntax:
//! ```text
//! // Comment
//! ; Also a comment
//! LOOP:           // Define a label
//!     OUT         // One nibble
//!     ADD ONE     // Two nibbles: opcode, then operand
//!     JMP LOOP
//! ONE: DATA 1     // Raw nibble
//! ```
//!
//! Pass 1 strips comments, records label addresses and sizes every line.
//! Pass 2 emits opcodes and resolves operands, so labels may be used
//! before they are defined. The output is always a full 16-nibble image.

use std::collections::BTreeMap;
use crate::cpu::{Opcode, MEMORY_SIZE};
use crate::nibble::Nibble;
use thiserror::Error;

/// Assemble source code into a memory image.
pub fn assemble(source: &str) -> Result<Program, AssemblyError> {
    Assembler::new().assemble(source)
}

/// An assembled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// The memory image; unused cells are zero.
    pub code: [Nibble; MEMORY_SIZE],
    /// Label name (upper-cased) to address.
    pub labels: BTreeMap<String, usize>,
    /// Number of nibbles emitted.
    pub size: usize,
}

impl Program {
    /// The image as raw bytes, ready for `Ram::load_program`.
    pub fn to_bytes(&self) -> [u8; MEMORY_SIZE] {
        self.code.map(u8::from)
    }
}

/// A source line that survived pass 1.
struct SourceLine<'a> {
    /// Instruction text with label and comment removed.
    text: &'a str,
    /// 1-based line number in the original source.
    line: usize,
}

/// The assembler state.
struct Assembler<'a> {
    /// Symbol table (label -> address).
    labels: BTreeMap<String, usize>,
    /// Lines to emit in pass 2.
    lines: Vec<SourceLine<'a>>,
}

impl<'a> Assembler<'a> {
    fn new() -> Self {
        Self {
            labels: BTreeMap::new(),
            lines: Vec::new(),
        }
    }

    fn assemble(mut self, source: &'a str) -> Result<Program, AssemblyError> {
        // Pass 1: labels and addresses
        let mut addr = 0;
        for (line_num, raw) in source.lines().enumerate() {
            let mut text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }

            if let Some((label, rest)) = split_label(text) {
                self.labels.insert(label.to_uppercase(), addr);
                text = rest.trim();
                if text.is_empty() {
                    continue;
                }
            }

            addr += line_width(text);
            self.lines.push(SourceLine { text, line: line_num + 1 });
        }

        // Pass 2: emit
        let mut code = [Nibble::ZERO; MEMORY_SIZE];
        let mut addr = 0;
        for line in &self.lines {
            if addr >= MEMORY_SIZE {
                return Err(AssemblyError::ProgramTooLarge { line: line.line });
            }
            for nibble in self.emit_line(line, addr)? {
                code[addr] = nibble;
                addr += 1;
            }
        }

        log::debug!("assembled {} nibbles, labels: {:?}", addr, self.labels);

        Ok(Program {
            code,
            labels: self.labels,
            size: addr,
        })
    }

    /// Encode one line, placed at `addr`, as one or two nibbles.
    fn emit_line(&self, line: &SourceLine<'_>, addr: usize) -> Result<Vec<Nibble>, AssemblyError> {
        let mut tokens = line.text.split_whitespace();
        let mnemonic = tokens.next().unwrap_or_default();
        let operand = tokens.next();

        if mnemonic.eq_ignore_ascii_case("DATA") {
            let value = operand.and_then(parse_literal).ok_or_else(|| {
                AssemblyError::InvalidData {
                    line: line.line,
                    value: operand.unwrap_or_default().to_string(),
                }
            })?;
            return Ok(vec![value]);
        }

        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| {
            AssemblyError::UnknownInstruction {
                line: line.line,
                mnemonic: mnemonic.to_uppercase(),
            }
        })?;

        if !opcode.takes_operand() {
            return Ok(vec![opcode.code()]);
        }
        if addr + 1 >= MEMORY_SIZE {
            return Err(AssemblyError::ProgramTooLarge { line: line.line });
        }

        let token = operand.ok_or_else(|| AssemblyError::MissingOperand {
            line: line.line,
            mnemonic: opcode.mnemonic().to_string(),
        })?;
        let value = self.resolve(token).ok_or_else(|| AssemblyError::InvalidOperand {
            line: line.line,
            operand: token.to_string(),
        })?;

        Ok(vec![opcode.code(), value])
    }

    /// A label address, else a literal.
    fn resolve(&self, token: &str) -> Option<Nibble> {
        match self.labels.get(&token.to_uppercase()) {
            Some(&addr) => Some(Nibble::from_i64(addr as i64)),
            None => parse_literal(token),
        }
    }
}

/// Cut the line at the first `//` or `;`.
fn strip_comment(line: &str) -> &str {
    let end = [line.find("//"), line.find(';')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

/// Split `NAME: rest` into its parts. The name must be word characters.
fn split_label(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let label = &text[..colon];
    let is_word = !label.is_empty()
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_word.then(|| (label, &text[colon + 1..]))
}

/// Nibbles a line occupies. Unknown mnemonics count as one; pass 2
/// reports them.
fn line_width(text: &str) -> usize {
    let mnemonic = text.split_whitespace().next().unwrap_or_default();
    Opcode::from_mnemonic(mnemonic).map_or(1, |op| op.width() as usize)
}

/// Parse a decimal or `0x` hex literal, masked to four bits.
fn parse_literal(token: &str) -> Option<Nibble> {
    let value = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => token.parse::<i64>().ok()?,
    };
    Some(Nibble::from_i64(value))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("program too large: exceeded 16 nibbles at line {line}")]
    ProgramTooLarge { line: usize },

    #[error("unknown instruction '{mnemonic}' at line {line}")]
    UnknownInstruction { line: usize, mnemonic: String },

    #[error("missing operand for {mnemonic} at line {line}")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("invalid operand '{operand}' at line {line}")]
    InvalidOperand { line: usize, operand: String },

    #[error("invalid DATA value '{value}' at line {line}")]
    InvalidData { line: usize, value: String },
}

impl AssemblyError {
    /// The 1-based source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            AssemblyError::ProgramTooLarge { line }
            | AssemblyError::UnknownInstruction { line, .. }
            | AssemblyError::MissingOperand { line, .. }
            | AssemblyError::InvalidOperand { line, .. }
            | AssemblyError::InvalidData { line, .. } => *line,
        }
    }
}
