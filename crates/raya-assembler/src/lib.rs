//! Raya Bytecode Assembler
//!
//! This crate turns the linear instruction sequence produced by the compiler
//! front end into the compact register-based bytecode executed by the
//! interpreter. Each instruction is packed narrow (signed byte operands) or
//! wide (32-bit little-endian operands), jumps are resolved through labels in
//! a two-pass layout, and per-function line/statement and source location
//! tables are emitted for the debugger.
//!
//! ```ignore
//! let mut builder = BytecodeGenerator::new("main", AssemblerOptions::default());
//! let r0 = builder.new_register();
//! builder.emit(Instr::StoreReg { reg: r0 });
//! builder.emit(Instr::Return);
//! let function = builder.finish()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Assembler options
pub mod config;
/// Decoding and disassembly
pub mod decode;
/// Error types
pub mod error;
/// Per-function emitter and finalizer
pub mod generator;
/// Abstract operations
pub mod instr;
/// Jump labels
pub mod label;
/// Two-pass layout
pub mod layout;
/// Line and source location tables
pub mod line_table;
/// Opcode definitions
pub mod opcode;
/// Compiled function output
pub mod output;
/// Instruction records and packing
pub mod packer;
/// Register allocation
pub mod regalloc;
/// Bytecode verification
pub mod verify;

pub use config::AssemblerOptions;
pub use decode::{decode_function, disassemble, BytecodeReader, DecodeError, DecodedInstr};
pub use error::{AsmError, AsmResult};
pub use generator::BytecodeGenerator;
pub use instr::{BinaryOp, CompareOp, ConstRef, Instr, NameRef, Reg, UnaryOp};
pub use label::{Label, LabelTable};
pub use line_table::{LineStatementEntry, SourceLocation, SourceLocationEntry};
pub use opcode::{Opcode, OperandKind};
pub use output::CompiledFunction;
pub use packer::InstrRecord;
pub use regalloc::RegisterAllocator;
pub use verify::{verify_function, VerifyError};
