//! Linear virtual register allocation
//!
//! Registers are handed out in increasing order and never reused within a
//! function. The high-water mark sizes the interpreter's register frame.

use crate::instr::Reg;

/// Monotonic register counter for one function
#[derive(Debug, Default, Clone)]
pub struct RegisterAllocator {
    next: u32,
}

impl RegisterAllocator {
    /// Create an allocator starting at `r0`
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next unused register
    pub fn allocate(&mut self) -> Reg {
        self.allocate_block(1)
    }

    /// Reserve `count` contiguous registers (call argument staging), returning the first.
    ///
    /// Panics if the register space is exhausted.
    pub fn allocate_block(&mut self, count: u32) -> Reg {
        let first = Reg(self.next);
        self.next = self.next.checked_add(count).unwrap_or_else(|| {
            panic!(
                "register space exhausted: {} registers in use, {} more requested",
                self.next, count
            )
        });
        first
    }

    /// Total number of registers the function needs
    pub fn final_count(&self) -> u32 {
        self.next
    }
}
