//! Assembler options.

use serde::{Deserialize, Serialize};

/// Options controlling what the assembler emits alongside the code.
///
/// Deserializable from an `[assembler]` manifest table; missing keys fall back
/// to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerOptions {
    /// Emit a `Debug` marker whenever the source line changes and before every return.
    pub debug_mode: bool,
    /// Build the per-instruction (offset, line, column) table.
    pub source_locations: bool,
    /// Fuse `StoreReg r` followed by `LoadReg r` / `MoveReg r, x`.
    pub peephole: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            source_locations: false,
            peephole: true,
        }
    }
}

impl AssemblerOptions {
    /// Default options: peephole on, debug tables off
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle stepping markers
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Toggle the per-instruction source location table
    pub fn with_source_locations(mut self, enabled: bool) -> Self {
        self.source_locations = enabled;
        self
    }

    /// Toggle store/load fusion
    pub fn with_peephole(mut self, enabled: bool) -> Self {
        self.peephole = enabled;
        self
    }
}
