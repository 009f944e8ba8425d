//! Compiled function output consumed by the interpreter

use crate::label::Label;
use crate::line_table::{self, LineStatementEntry, SourceLocationEntry};
use serde::{Deserialize, Serialize};

/// Final artifact of assembling one function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledFunction {
    /// Function name
    pub name: String,
    /// Packed instruction stream
    pub code: Vec<u8>,
    /// Number of instructions in `code`
    pub instruction_count: usize,
    /// Register frame size (high-water mark of the allocator)
    pub register_count: u32,
    /// Number of local variable slots
    pub local_count: u32,
    /// Largest argument count of any call in the function
    pub max_call_args: u32,
    /// Coalesced (offset, line, statement) table
    pub line_table: Vec<LineStatementEntry>,
    /// Per-instruction (offset, line, column) table, when requested
    pub source_locations: Option<Vec<SourceLocationEntry>>,
    /// Final byte offset of every label, indexed by label
    pub label_offsets: Vec<u32>,
}

impl CompiledFunction {
    /// Byte offset a label resolved to
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.label_offsets.get(label.index()).copied()
    }

    /// Line/statement entry covering a bytecode offset
    pub fn lookup_line(&self, offset: u32) -> Option<&LineStatementEntry> {
        line_table::lookup(&self.line_table, offset)
    }

    /// Detailed source location of the instruction starting at `offset`
    pub fn source_location(&self, offset: u32) -> Option<&SourceLocationEntry> {
        let table = self.source_locations.as_ref()?;
        table
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|i| &table[i])
    }
}
