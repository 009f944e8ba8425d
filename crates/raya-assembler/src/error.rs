//! Assembly errors

use thiserror::Error;

/// Result type for assembly
pub type AsmResult<T> = Result<T, AsmError>;

/// Recoverable assembly failures.
///
/// These reflect program shapes the wire format cannot express. Internal
/// invariant violations (double label resolution, unresolved labels, narrow
/// jump overflow) panic instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    /// An operand does not fit even the wide slot
    #[error("Operand {value} of {opcode} does not fit in a 32-bit slot")]
    OperandOutOfRange { opcode: &'static str, value: i64 },

    /// A jump distance does not fit even the wide slot
    #[error("Jump offset {offset} at byte {position} does not fit in a 32-bit slot")]
    JumpOutOfRange { offset: i64, position: usize },

    /// Code offsets do not fit `u32`
    #[error("Function code too large ({size} bytes)")]
    CodeTooLarge { size: usize },
}
