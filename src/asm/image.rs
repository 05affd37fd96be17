//! Memory image files.
//!
//! A simple text format:
//! - One hex nibble per line, optionally prefixed with `0x`
//! - `;` starts a comment
//! - Blank lines are ignored
//!
//! Nibbles fill memory from address 0.

use std::path::Path;
use std::io::Write;
use crate::cpu::MEMORY_SIZE;
use crate::nibble::Nibble;
use thiserror::Error;

/// Parse image text.
pub fn parse_image(text: &str) -> Result<Vec<Nibble>, ImageError> {
    let mut image = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let trimmed = line.split(';').next().unwrap_or_default().trim();
        if trimmed.is_empty() {
            continue;
        }

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let value = u8::from_str_radix(digits, 16).map_err(|_| ImageError::Parse {
            line: line_num + 1,
            message: format!("expected a hex nibble, found '{}'", trimmed),
        })?;
        if value > Nibble::MASK {
            return Err(ImageError::Parse {
                line: line_num + 1,
                message: format!("value {:#X} does not fit in 4 bits", value),
            });
        }

        image.push(Nibble::new(value));
    }

    if image.len() > MEMORY_SIZE {
        return Err(ImageError::TooLarge { size: image.len() });
    }

    Ok(image)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<Nibble>, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_image(&text)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &[Nibble]) -> Result<(), ImageError> {
    if image.len() > MEMORY_SIZE {
        return Err(ImageError::TooLarge { size: image.len() });
    }

    let mut file = std::fs::File::create(path.as_ref())?;

    writeln!(file, "; SAP-1 memory image")?;
    writeln!(file, "; {} nibbles", image.len())?;
    writeln!(file)?;

    for (addr, nibble) in image.iter().enumerate() {
        writeln!(file, "{:X} ; {:X}", nibble, addr)?;
    }

    Ok(())
}

/// Errors that can occur reading or writing image files.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("image has {size} nibbles, memory holds 16")]
    TooLarge { size: usize },
}
