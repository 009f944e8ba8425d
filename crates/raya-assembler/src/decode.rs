//! Bytecode decoding and disassembly
//!
//! Reads back the packed stream produced by the generator. Used by the
//! verifier, by tests and for human-readable dumps.

use crate::opcode::Opcode;
use std::fmt;
use thiserror::Error;

/// Decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),
}

/// Cursor over a packed instruction stream
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a reader positioned at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let value = *self
            .buffer
            .get(self.position)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        self.position += 1;
        Ok(value)
    }

    /// Read a narrow (signed byte) operand
    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.read_u8().map(|b| b as i8)
    }

    /// Read a 32-bit signed integer (little-endian)
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self
            .buffer
            .get(self.position..self.position + 4)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.position += 4;
        Ok(value)
    }

    /// Read one full instruction
    pub fn read_instruction(&mut self) -> Result<DecodedInstr, DecodeError> {
        let offset = self.position;
        let tag = self.read_u8()?;
        let (opcode, wide) =
            Opcode::from_tag(tag).ok_or(DecodeError::InvalidOpcode(tag, offset))?;

        let mut operands = Vec::with_capacity(opcode.operand_count());
        for _ in 0..opcode.operand_count() {
            let value = if wide {
                self.read_i32()?
            } else {
                i32::from(self.read_i8()?)
            };
            operands.push(value);
        }

        Ok(DecodedInstr {
            offset,
            opcode,
            wide,
            operands,
            size: self.position - offset,
        })
    }
}

/// One instruction read back from a code stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstr {
    /// Byte offset of the tag
    pub offset: usize,
    /// Decoded opcode
    pub opcode: Opcode,
    /// Whether the wide encoding was used
    pub wide: bool,
    /// Operand values, sign-extended
    pub operands: Vec<i32>,
    /// Encoded length in bytes
    pub size: usize,
}

impl DecodedInstr {
    /// Absolute byte target of a jump or unwind-handler instruction.
    ///
    /// Offsets are relative to the end of the instruction, so the result may
    /// be negative or past the code for corrupt input.
    pub fn jump_target(&self) -> Option<i64> {
        if !self.opcode.has_jump_field() {
            return None;
        }
        let offset = *self.operands.last()?;
        Some((self.offset + self.size) as i64 + i64::from(offset))
    }
}

impl fmt::Display for DecodedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}: {}", self.offset, self.opcode)?;
        if self.wide {
            f.write_str(".w")?;
        }
        let jump = self.jump_target();
        let shown = if jump.is_some() {
            &self.operands[..self.operands.len() - 1]
        } else {
            &self.operands[..]
        };
        for value in shown {
            write!(f, " {}", value)?;
        }
        if let (Some(target), Some(offset)) = (jump, self.operands.last()) {
            write!(f, " {:+} -> {}", offset, target)?;
        }
        Ok(())
    }
}

/// Decode every instruction of a function body
pub fn decode_function(code: &[u8]) -> Result<Vec<DecodedInstr>, DecodeError> {
    let mut reader = BytecodeReader::new(code);
    let mut instructions = Vec::new();
    while reader.has_more() {
        instructions.push(reader.read_instruction()?);
    }
    Ok(instructions)
}

/// Render a function body one instruction per line
pub fn disassemble(code: &[u8]) -> Result<String, DecodeError> {
    let mut out = String::new();
    for instr in decode_function(code)? {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    Ok(out)
}
