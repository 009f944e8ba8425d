//! Instruction records and the narrow/wide packer
//!
//! A record starts out sized for its wide encoding and unpacked. [`InstrRecord::pack`]
//! picks one width for the whole instruction: narrow when every operand fits
//! in a signed byte, wide otherwise.

use crate::error::{AsmError, AsmResult};
use crate::instr::{Instr, Operands};
use crate::label::Label;
use crate::opcode::{Opcode, MAX_OPERANDS};

/// Largest encoded instruction: wide tag plus four 32-bit operands
pub const MAX_INSTR_SIZE: usize = 1 + 4 * MAX_OPERANDS;

/// Check whether a value fits the narrow (signed 8-bit) operand slot
pub fn fits_narrow(value: i64) -> bool {
    i8::try_from(value).is_ok()
}

/// Link from a jump instruction to its target label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLink {
    /// Target label
    pub label: Label,
    /// Byte offset of the jump field within the packed instruction
    pub field_offset: usize,
}

/// In-memory form of one instruction
#[derive(Debug, Clone)]
pub struct InstrRecord {
    opcode: Opcode,
    operands: Operands,
    packed: [u8; MAX_INSTR_SIZE],
    size: usize,
    position: usize,
    wide: bool,
    is_packed: bool,
    line: u32,
    statement: u32,
    jump: Option<JumpLink>,
}

impl InstrRecord {
    /// Create an unpacked record, provisionally sized for the wide encoding
    pub fn new(instr: &Instr, line: u32, statement: u32) -> Self {
        let opcode = instr.opcode();
        Self {
            opcode,
            operands: instr.operands(),
            packed: [0; MAX_INSTR_SIZE],
            size: opcode.wide_size(),
            position: 0,
            wide: true,
            is_packed: false,
            line,
            statement,
            jump: None,
        }
    }

    /// Opcode of the record
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Operand values, jump slot included
    pub fn operands(&self) -> &[i64] {
        self.operands.as_slice()
    }

    /// Current encoded size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte position assigned by layout
    pub fn position(&self) -> usize {
        self.position
    }

    /// Assign the byte position
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Source line at emission
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Statement index at emission
    pub fn statement(&self) -> u32 {
        self.statement
    }

    /// Whether the wide encoding is in use
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    /// Whether [`pack`](Self::pack) has run
    pub fn is_packed(&self) -> bool {
        self.is_packed
    }

    /// Jump link, for jump records
    pub fn jump(&self) -> Option<JumpLink> {
        self.jump
    }

    /// Link the record to a target label
    pub fn set_jump(&mut self, link: JumpLink) {
        self.jump = Some(link);
    }

    /// Whether layout has to patch a jump field in this record
    pub fn is_jump(&self) -> bool {
        self.jump.is_some()
    }

    /// Packed bytes (meaningful once [`pack`](Self::pack) has run)
    pub fn bytes(&self) -> &[u8] {
        &self.packed[..self.size]
    }

    /// Serialize the record, returning its final length.
    ///
    /// Fails only when an operand does not fit even a 32-bit slot.
    pub fn pack(&mut self) -> AsmResult<usize> {
        let wide = !self.operands.as_slice().iter().all(|&v| fits_narrow(v));

        self.packed[0] = self.opcode.tag(wide);
        let mut len = 1;
        for &value in self.operands.as_slice() {
            if wide {
                let value = i32::try_from(value).map_err(|_| AsmError::OperandOutOfRange {
                    opcode: self.opcode.name(),
                    value,
                })?;
                self.packed[len..len + 4].copy_from_slice(&value.to_le_bytes());
                len += 4;
            } else {
                self.packed[len] = value as i8 as u8;
                len += 1;
            }
        }

        self.size = len;
        self.wide = wide;
        self.is_packed = true;

        // The jump field is always the last operand
        if let Some(jump) = &mut self.jump {
            jump.field_offset = len - if wide { 4 } else { 1 };
        }
        Ok(len)
    }

    /// Store the jump distance.
    ///
    /// Before packing only the operand is updated, so the next [`pack`](Self::pack)
    /// can choose the width. After packing the field is rewritten in place with the
    /// width already chosen; a narrow field that no longer fits is a layout bug and
    /// panics.
    pub fn set_jump_offset(&mut self, offset: i64) -> AsmResult<()> {
        let Some(jump) = self.jump else {
            panic!("{} at byte {} is not a linked jump", self.opcode, self.position);
        };
        let position = self.position;
        let out_of_range = || AsmError::JumpOutOfRange { offset, position };

        if !self.is_packed {
            i32::try_from(offset).map_err(|_| out_of_range())?;
            self.operands.set_last(offset);
            return Ok(());
        }

        let field = jump.field_offset;
        if self.wide {
            let value = i32::try_from(offset).map_err(|_| out_of_range())?;
            self.packed[field..field + 4].copy_from_slice(&value.to_le_bytes());
        } else {
            assert!(
                fits_narrow(offset),
                "narrow jump offset {} of {} at byte {} overflowed after layout",
                offset,
                self.opcode,
                self.position
            );
            self.packed[field] = offset as i8 as u8;
        }
        self.operands.set_last(offset);
        Ok(())
    }
}
