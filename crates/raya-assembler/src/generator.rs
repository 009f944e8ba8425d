//! Per-function bytecode generator
//!
//! The compiler front end lowers a function by calling [`BytecodeGenerator::emit`]
//! once per operation, allocating registers and labels as it goes. Instructions
//! are buffered unpacked; [`BytecodeGenerator::finish`] lays them out, picks
//! each instruction's width, patches jumps and builds the debug tables.

use crate::config::AssemblerOptions;
use crate::error::{AsmError, AsmResult};
use crate::instr::{Instr, Reg};
use crate::label::{Label, LabelTable};
use crate::layout::{compress_instructions, label_position};
use crate::line_table::{build_line_table, SourceLocation, SourceLocationEntry};
use crate::opcode::OperandKind;
use crate::output::CompiledFunction;
use crate::packer::InstrRecord;
use crate::regalloc::RegisterAllocator;
use log::{debug, trace};

/// Builds the bytecode of one function
pub struct BytecodeGenerator {
    name: String,
    options: AssemblerOptions,
    instructions: Vec<InstrRecord>,
    labels: LabelTable,
    registers: RegisterAllocator,
    /// Pending per-instruction locations, parallel to `instructions`
    source_locations: Option<Vec<SourceLocationEntry>>,
    location: SourceLocation,
    statement: u32,
    /// Last emitted operation, for peephole fusion. Cleared at label definitions.
    last_instr: Option<Instr>,
    unwind_handler: Option<Label>,
    local_count: u32,
    max_call_args: u32,
}

impl BytecodeGenerator {
    /// Start assembling the function `name`
    pub fn new(name: impl Into<String>, options: AssemblerOptions) -> Self {
        Self {
            name: name.into(),
            options,
            instructions: Vec::new(),
            labels: LabelTable::new(),
            registers: RegisterAllocator::new(),
            source_locations: options.source_locations.then(Vec::new),
            location: SourceLocation::default(),
            statement: 0,
            last_instr: None,
            unwind_handler: None,
            local_count: 0,
            max_call_args: 0,
        }
    }

    /// Name of the function being assembled
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options this generator was created with
    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Source position attributed to subsequently emitted instructions
    pub fn set_location(&mut self, line: u32, column: u32) {
        self.location = SourceLocation { line, column };
    }

    /// Current source position
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Start a new statement, returning its index
    pub fn begin_statement(&mut self) -> u32 {
        self.statement += 1;
        self.statement
    }

    /// Index of the current statement
    pub fn statement(&self) -> u32 {
        self.statement
    }

    /// Allocate a fresh register
    pub fn new_register(&mut self) -> Reg {
        self.registers.allocate()
    }

    /// Reserve `count` consecutive registers, e.g. for call arguments
    pub fn new_register_block(&mut self, count: u32) -> Reg {
        self.registers.allocate_block(count)
    }

    /// Registers allocated so far
    pub fn register_count(&self) -> u32 {
        self.registers.final_count()
    }

    /// Declare the frame's local slot count and a lower bound on call arguments
    pub fn set_frame_info(&mut self, local_count: u32, max_call_args: u32) {
        self.local_count = local_count;
        self.max_call_args = self.max_call_args.max(max_call_args);
    }

    /// Allocate an unresolved label
    pub fn new_label(&mut self) -> Label {
        self.labels.new_label()
    }

    /// Resolve `label` to the next instruction emitted.
    ///
    /// Control can arrive here from elsewhere, so no peephole may fuse across it.
    /// Panics if the label is already resolved.
    pub fn define_label(&mut self, label: Label) {
        self.labels.resolve(label, self.instructions.len());
        self.last_instr = None;
    }

    /// Allocate a label resolved at the current position (loop heads)
    pub fn here(&mut self) -> Label {
        let label = self.new_label();
        self.define_label(label);
        label
    }

    /// Number of instructions emitted so far
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Emit one operation.
    ///
    /// Returns the index of the appended instruction, or `None` when the
    /// peephole pass dropped it.
    pub fn emit(&mut self, instr: Instr) -> Option<usize> {
        let instr = if self.options.peephole {
            self.fuse(instr)?
        } else {
            instr
        };

        if self.options.debug_mode && !matches!(instr, Instr::Debug { .. }) {
            let line = self.location.line;
            let before_return = instr.opcode().is_return();
            let line_changed = self.instructions.last().map_or(true, |last| last.line() != line);
            if line_changed || before_return {
                trace!("{}: debug marker for line {} (return: {})", self.name, line, before_return);
                self.add_instruction(Instr::Debug { line, before_return });
            }
        }

        Some(self.add_instruction(instr))
    }

    /// Install `handler` as the active exception handler (`None` clears it).
    ///
    /// Nothing is emitted if the handler is already active.
    pub fn set_unwind_handler(&mut self, handler: Option<Label>) {
        if self.unwind_handler == handler {
            return;
        }
        self.unwind_handler = handler;
        match handler {
            Some(handler) => self.emit(Instr::SetUnwindHandler { handler }),
            None => self.emit(Instr::ClearUnwindHandler),
        };
    }

    /// Currently installed exception handler
    pub fn unwind_handler(&self) -> Option<Label> {
        self.unwind_handler
    }

    /// Peephole rewrite against the previous operation
    fn fuse(&self, instr: Instr) -> Option<Instr> {
        match (self.last_instr, instr) {
            (Some(Instr::StoreReg { reg: stored }), Instr::LoadReg { reg }) if stored == reg => {
                trace!("{}: dropped LOAD_REG {} after STORE_REG", self.name, reg);
                None
            }
            (Some(Instr::StoreReg { reg: stored }), Instr::MoveReg { src, dst }) if stored == src => {
                trace!("{}: MOVE_REG {} -> {} rewritten as STORE_REG", self.name, src, dst);
                Some(Instr::StoreReg { reg: dst })
            }
            _ => Some(instr),
        }
    }

    fn add_instruction(&mut self, instr: Instr) -> usize {
        let index = self.instructions.len();
        let opcode = instr.opcode();
        let mut record = InstrRecord::new(&instr, self.location.line, self.statement);
        if let Some(label) = instr.jump_target() {
            // Records start wide; the field offset is fixed up again when packed
            let field_offset = opcode.wide_size() - 4;
            self.labels.mark_as_jump(&mut record, label, field_offset);
        }
        if opcode.is_call() {
            if let Some(slot) = opcode.slot_of(OperandKind::Count) {
                // argc comes from a u32 field
                let argc = record.operands()[slot] as u32;
                self.max_call_args = self.max_call_args.max(argc);
            }
        }

        self.instructions.push(record);
        if let Some(table) = &mut self.source_locations {
            table.push(SourceLocationEntry::pending(self.location));
        }
        self.last_instr = Some(instr);
        index
    }

    /// Lay out the buffered instructions and produce the finished function.
    ///
    /// Panics if any allocated label was never resolved.
    pub fn finish(mut self) -> AsmResult<CompiledFunction> {
        if let Some((label, _)) = self.labels.iter().find(|(_, target)| target.is_none()) {
            panic!("label {} of {} was never resolved", label, self.name);
        }

        let code_size = compress_instructions(&mut self.instructions, &self.labels)?;
        if u32::try_from(code_size).is_err() {
            return Err(AsmError::CodeTooLarge { size: code_size });
        }

        let mut code = Vec::with_capacity(code_size);
        for record in &self.instructions {
            code.extend_from_slice(record.bytes());
        }

        let line_table = build_line_table(&self.instructions);

        let source_locations = self.source_locations.take().map(|mut table| {
            for (entry, record) in table.iter_mut().zip(&self.instructions) {
                entry.offset = record.position() as u32;
            }
            table
        });

        let label_offsets = self
            .labels
            .iter()
            .map(|(label, _)| label_position(&self.instructions, &self.labels, label, code_size) as u32)
            .collect();

        let wide = self.instructions.iter().filter(|r| r.is_wide()).count();
        debug!(
            "assembled {}: {} instructions ({} narrow, {} wide), {} bytes, {} registers, {} line entries",
            self.name,
            self.instructions.len(),
            self.instructions.len() - wide,
            wide,
            code_size,
            self.registers.final_count(),
            line_table.len()
        );

        Ok(CompiledFunction {
            name: self.name,
            code,
            instruction_count: self.instructions.len(),
            register_count: self.registers.final_count(),
            local_count: self.local_count,
            max_call_args: self.max_call_args,
            line_table,
            source_locations,
            label_offsets,
        })
    }
}
