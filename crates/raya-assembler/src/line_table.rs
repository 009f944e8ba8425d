//! Debug tables mapping code offsets back to the source

use crate::packer::InstrRecord;
use serde::{Deserialize, Serialize};

/// Current position in the source being lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number (1-indexed, 0 when unknown)
    pub line: u32,
    /// Column number (1-indexed, 0 when unknown)
    pub column: u32,
}

/// Start of a run of instructions sharing one (line, statement) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatementEntry {
    /// Bytecode offset within the function's code
    pub offset: u32,
    /// Source line
    pub line: u32,
    /// Statement index
    pub statement: u32,
}

/// Per-instruction source location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocationEntry {
    /// Bytecode offset of the instruction
    pub offset: u32,
    /// Source line
    pub line: u32,
    /// Source column
    pub column: u32,
}

impl SourceLocationEntry {
    /// Placeholder recorded at emission; the offset is filled in at finalization
    pub fn pending(location: SourceLocation) -> Self {
        Self {
            offset: 0,
            line: location.line,
            column: location.column,
        }
    }
}

/// Build the coalesced line/statement table from laid-out records.
///
/// One entry is produced per change of the (line, statement) pair, so offsets
/// are strictly increasing.
pub fn build_line_table(records: &[InstrRecord]) -> Vec<LineStatementEntry> {
    let mut table: Vec<LineStatementEntry> = Vec::new();
    for record in records {
        let changed = table
            .last()
            .map_or(true, |e| e.line != record.line() || e.statement != record.statement());
        if changed {
            table.push(LineStatementEntry {
                offset: record.position() as u32,
                line: record.line(),
                statement: record.statement(),
            });
        }
    }
    table
}

/// Find the entry covering `offset` (largest entry offset <= `offset`)
pub fn lookup(table: &[LineStatementEntry], offset: u32) -> Option<&LineStatementEntry> {
    match table.partition_point(|e| e.offset <= offset) {
        0 => None,
        idx => Some(&table[idx - 1]),
    }
}
