//! Structural verification of assembled functions
//!
//! Decodes the code stream and checks that every offset the function exposes
//! (jump targets, label offsets, line table and source location entries) lands
//! on an instruction boundary, and that register and local operands stay
//! inside the declared frame.

use crate::decode::{decode_function, DecodeError, DecodedInstr};
use crate::opcode::OperandKind;
use crate::output::CompiledFunction;
use rustc_hash::FxHashSet;

/// Bytecode verification errors
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Stored instruction count disagrees with the decoded stream
    #[error("Instruction count mismatch: recorded {recorded}, decoded {decoded}")]
    InstructionCount { recorded: usize, decoded: usize },

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget { target: i64, offset: usize },

    /// Label does not point at an instruction boundary
    #[error("Label {label} points inside an instruction (offset {offset})")]
    InvalidLabelOffset { label: usize, offset: u32 },

    /// Line table entry is out of order or not on a boundary
    #[error("Invalid line table entry {index} at offset {offset}")]
    InvalidLineEntry { index: usize, offset: u32 },

    /// Source location table does not mirror the instruction stream
    #[error("Source location entry {index} at offset {offset} does not match the instruction stream")]
    InvalidSourceLocation { index: usize, offset: u32 },

    /// Register operand outside the frame
    #[error("Invalid register reference: r{register} (frame size {max}) at offset {offset}")]
    InvalidRegister { register: i64, max: u32, offset: usize },

    /// Local variable operand outside the frame
    #[error("Invalid local variable reference: index {index} (max {max}) at offset {offset}")]
    InvalidLocalRef { index: i64, max: u32, offset: usize },

    /// Call passes more arguments than the frame reserves
    #[error("Call with {argc} arguments exceeds declared maximum {max} at offset {offset}")]
    TooManyArguments { argc: i64, max: u32, offset: usize },
}

/// Verify a single function's bytecode
pub fn verify_function(function: &CompiledFunction) -> Result<(), VerifyError> {
    let instructions = decode_function(&function.code)?;
    if instructions.len() != function.instruction_count {
        return Err(VerifyError::InstructionCount {
            recorded: function.instruction_count,
            decoded: instructions.len(),
        });
    }

    let code_end = function.code.len();
    let boundaries: FxHashSet<usize> = instructions.iter().map(|i| i.offset).collect();
    let is_target = |offset: usize| offset == code_end || boundaries.contains(&offset);

    for instr in &instructions {
        if let Some(target) = instr.jump_target() {
            let valid = usize::try_from(target).map_or(false, |t| is_target(t));
            if !valid {
                return Err(VerifyError::InvalidJumpTarget {
                    target,
                    offset: instr.offset,
                });
            }
        }
        verify_frame_refs(instr, function)?;
    }

    for (label, &offset) in function.label_offsets.iter().enumerate() {
        if !is_target(offset as usize) {
            return Err(VerifyError::InvalidLabelOffset { label, offset });
        }
    }

    verify_line_table(function, &boundaries)?;
    verify_source_locations(function, &instructions)?;

    Ok(())
}

fn verify_frame_refs(instr: &DecodedInstr, function: &CompiledFunction) -> Result<(), VerifyError> {
    let kinds = instr.opcode.operands();
    for (i, (&kind, &value)) in kinds.iter().zip(&instr.operands).enumerate() {
        let value = i64::from(value);
        match kind {
            OperandKind::Register => {
                // Argument vectors occupy argc consecutive registers
                let span = match i.checked_sub(1).map(|p| (kinds[p], instr.operands[p])) {
                    Some((OperandKind::Count, argc)) => i64::from(argc),
                    _ => 1,
                };
                if value < 0 || value + span > i64::from(function.register_count) {
                    return Err(VerifyError::InvalidRegister {
                        register: value,
                        max: function.register_count,
                        offset: instr.offset,
                    });
                }
            }
            OperandKind::Local => {
                // Scoped locals with a non-zero depth index an enclosing frame
                let outer = instr
                    .opcode
                    .slot_of(OperandKind::Scope)
                    .map_or(false, |slot| instr.operands[slot] != 0);
                if outer {
                    continue;
                }
                if value < 0 || value >= i64::from(function.local_count) {
                    return Err(VerifyError::InvalidLocalRef {
                        index: value,
                        max: function.local_count,
                        offset: instr.offset,
                    });
                }
            }
            OperandKind::Count => {
                if value < 0 || value > i64::from(function.max_call_args) {
                    return Err(VerifyError::TooManyArguments {
                        argc: value,
                        max: function.max_call_args,
                        offset: instr.offset,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn verify_line_table(
    function: &CompiledFunction,
    boundaries: &FxHashSet<usize>,
) -> Result<(), VerifyError> {
    let mut previous: Option<u32> = None;
    for (index, entry) in function.line_table.iter().enumerate() {
        let ordered = previous.map_or(true, |p| p < entry.offset);
        if !ordered || !boundaries.contains(&(entry.offset as usize)) {
            return Err(VerifyError::InvalidLineEntry {
                index,
                offset: entry.offset,
            });
        }
        previous = Some(entry.offset);
    }
    Ok(())
}

fn verify_source_locations(
    function: &CompiledFunction,
    instructions: &[DecodedInstr],
) -> Result<(), VerifyError> {
    let Some(table) = &function.source_locations else {
        return Ok(());
    };
    for (index, entry) in table.iter().enumerate() {
        let matches = instructions
            .get(index)
            .map_or(false, |i| i.offset == entry.offset as usize);
        if !matches {
            return Err(VerifyError::InvalidSourceLocation {
                index,
                offset: entry.offset,
            });
        }
    }
    if table.len() != instructions.len() {
        return Err(VerifyError::InvalidSourceLocation {
            index: table.len(),
            offset: function.code.len() as u32,
        });
    }
    Ok(())
}
