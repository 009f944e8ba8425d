//! Abstract operations handed to the assembler by the lowering pass

use crate::label::Label;
use crate::opcode::{Opcode, MAX_OPERANDS};
use std::fmt;

/// Virtual register index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl Reg {
    /// Register number
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Opaque reference into the surrounding compiler's constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstRef(pub u32);

/// Opaque reference into the surrounding compiler's string/name table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameRef(pub u32);

/// Binary operators: `acc = lhs op rhs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
}

/// Comparison operators: `acc = lhs cmp rhs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Unary operators applied to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// unary `-`
    Minus,
    /// unary `+`
    Plus,
    /// `~`
    Complement,
    /// `++`
    Increment,
    /// `--`
    Decrement,
    /// `typeof`
    TypeOf,
}

/// One abstract operation.
///
/// Each variant carries exactly the immediates its opcode needs. Jump variants
/// carry the [`Label`] of their target; the byte distance is filled in at
/// layout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// No operation
    Nop,
    /// Stepping marker. `before_return` tells the interpreter a return follows.
    Debug { line: u32, before_return: bool },

    /// acc = reg
    LoadReg { reg: Reg },
    /// reg = acc
    StoreReg { reg: Reg },
    /// dst = src
    MoveReg { src: Reg, dst: Reg },

    /// acc = constant pool entry
    LoadConst { constant: ConstRef },
    /// acc = small integer
    LoadInt { value: i32 },
    /// acc = 0
    LoadZero,
    /// acc = undefined
    LoadUndefined,
    /// acc = null
    LoadNull,
    /// acc = true
    LoadTrue,
    /// acc = false
    LoadFalse,

    /// acc = local slot
    LoadLocal { index: u32 },
    /// local slot = acc
    StoreLocal { index: u32 },
    /// acc = local of the frame `scope` levels out
    LoadScopedLocal { index: u32, scope: u32 },
    /// local of the frame `scope` levels out = acc
    StoreScopedLocal { index: u32, scope: u32 },

    /// acc = name lookup
    LoadName { name: NameRef },
    /// name = acc
    StoreName { name: NameRef },
    /// acc = base.name
    LoadProperty { base: Reg, name: NameRef },
    /// base.name = acc
    StoreProperty { base: Reg, name: NameRef },
    /// acc = base[acc]
    LoadElement { base: Reg },
    /// base[index] = acc
    StoreElement { base: Reg, index: Reg },

    /// acc = lhs op rhs
    Binary { op: BinaryOp, lhs: Reg, rhs: Reg },
    /// acc = lhs cmp rhs
    Compare { op: CompareOp, lhs: Reg, rhs: Reg },
    /// acc = op acc
    Unary { op: UnaryOp },

    /// acc = func(argv[0..argc])
    CallValue { func: Reg, argc: u32, argv: Reg },
    /// acc = base.name(argv[0..argc])
    CallProperty { base: Reg, name: NameRef, argc: u32, argv: Reg },
    /// acc = name(argv[0..argc])
    CallName { name: NameRef, argc: u32, argv: Reg },
    /// acc = new func(argv[0..argc])
    Construct { func: Reg, argc: u32, argv: Reg },

    /// Unconditional jump
    Jump { target: Label },
    /// Jump if acc is truthy
    JumpTrue { target: Label },
    /// Jump if acc is falsy
    JumpFalse { target: Label },
    /// Jump unless an exception is pending
    JumpNoException { target: Label },
    /// Return acc
    Return,

    /// Install the exception handler at `handler`
    SetUnwindHandler { handler: Label },
    /// Remove the active exception handler
    ClearUnwindHandler,
    /// Resume unwinding after a finally block
    UnwindDispatch,
    /// Throw acc
    ThrowException,
    /// acc = pending exception
    GetException,
    /// pending exception = acc
    SetException,
}

impl Instr {
    /// Opcode this operation encodes to
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Debug { .. } => Opcode::Debug,
            Self::LoadReg { .. } => Opcode::LoadReg,
            Self::StoreReg { .. } => Opcode::StoreReg,
            Self::MoveReg { .. } => Opcode::MoveReg,
            Self::LoadConst { .. } => Opcode::LoadConst,
            Self::LoadInt { .. } => Opcode::LoadInt,
            Self::LoadZero => Opcode::LoadZero,
            Self::LoadUndefined => Opcode::LoadUndefined,
            Self::LoadNull => Opcode::LoadNull,
            Self::LoadTrue => Opcode::LoadTrue,
            Self::LoadFalse => Opcode::LoadFalse,
            Self::LoadLocal { .. } => Opcode::LoadLocal,
            Self::StoreLocal { .. } => Opcode::StoreLocal,
            Self::LoadScopedLocal { .. } => Opcode::LoadScopedLocal,
            Self::StoreScopedLocal { .. } => Opcode::StoreScopedLocal,
            Self::LoadName { .. } => Opcode::LoadName,
            Self::StoreName { .. } => Opcode::StoreName,
            Self::LoadProperty { .. } => Opcode::LoadProperty,
            Self::StoreProperty { .. } => Opcode::StoreProperty,
            Self::LoadElement { .. } => Opcode::LoadElement,
            Self::StoreElement { .. } => Opcode::StoreElement,
            Self::Binary { op, .. } => match op {
                BinaryOp::Add => Opcode::Add,
                BinaryOp::Sub => Opcode::Sub,
                BinaryOp::Mul => Opcode::Mul,
                BinaryOp::Div => Opcode::Div,
                BinaryOp::Mod => Opcode::Mod,
                BinaryOp::BitAnd => Opcode::BitAnd,
                BinaryOp::BitOr => Opcode::BitOr,
                BinaryOp::BitXor => Opcode::BitXor,
                BinaryOp::Shl => Opcode::Shl,
                BinaryOp::Shr => Opcode::Shr,
                BinaryOp::UShr => Opcode::UShr,
            },
            Self::Compare { op, .. } => match op {
                CompareOp::Eq => Opcode::CmpEq,
                CompareOp::Ne => Opcode::CmpNe,
                CompareOp::StrictEq => Opcode::CmpStrictEq,
                CompareOp::StrictNe => Opcode::CmpStrictNe,
                CompareOp::Lt => Opcode::CmpLt,
                CompareOp::Le => Opcode::CmpLe,
                CompareOp::Gt => Opcode::CmpGt,
                CompareOp::Ge => Opcode::CmpGe,
            },
            Self::Unary { op } => match op {
                UnaryOp::Not => Opcode::UNot,
                UnaryOp::Minus => Opcode::UMinus,
                UnaryOp::Plus => Opcode::UPlus,
                UnaryOp::Complement => Opcode::UCompl,
                UnaryOp::Increment => Opcode::Increment,
                UnaryOp::Decrement => Opcode::Decrement,
                UnaryOp::TypeOf => Opcode::TypeOf,
            },
            Self::CallValue { .. } => Opcode::CallValue,
            Self::CallProperty { .. } => Opcode::CallProperty,
            Self::CallName { .. } => Opcode::CallName,
            Self::Construct { .. } => Opcode::Construct,
            Self::Jump { .. } => Opcode::Jump,
            Self::JumpTrue { .. } => Opcode::JumpTrue,
            Self::JumpFalse { .. } => Opcode::JumpFalse,
            Self::JumpNoException { .. } => Opcode::JumpNoException,
            Self::Return => Opcode::Ret,
            Self::SetUnwindHandler { .. } => Opcode::SetUnwindHandler,
            Self::ClearUnwindHandler => Opcode::ClearUnwindHandler,
            Self::UnwindDispatch => Opcode::UnwindDispatch,
            Self::ThrowException => Opcode::ThrowException,
            Self::GetException => Opcode::GetException,
            Self::SetException => Opcode::SetException,
        }
    }

    /// Label this operation jumps to, if any
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Self::Jump { target }
            | Self::JumpTrue { target }
            | Self::JumpFalse { target }
            | Self::JumpNoException { target } => Some(*target),
            Self::SetUnwindHandler { handler } => Some(*handler),
            _ => None,
        }
    }

    /// Immediate operand values in encoding order.
    ///
    /// The jump offset slot is emitted as 0 and patched during layout.
    pub fn operands(&self) -> Operands {
        let reg = |r: &Reg| i64::from(r.0);
        match self {
            Self::Debug { line, before_return } => {
                Operands::from_slice(&[i64::from(*line), i64::from(*before_return)])
            }
            Self::LoadReg { reg: r } | Self::StoreReg { reg: r } => Operands::from_slice(&[reg(r)]),
            Self::MoveReg { src, dst } => Operands::from_slice(&[reg(src), reg(dst)]),
            Self::LoadConst { constant } => Operands::from_slice(&[i64::from(constant.0)]),
            Self::LoadInt { value } => Operands::from_slice(&[i64::from(*value)]),
            Self::LoadLocal { index } | Self::StoreLocal { index } => {
                Operands::from_slice(&[i64::from(*index)])
            }
            Self::LoadScopedLocal { index, scope } | Self::StoreScopedLocal { index, scope } => {
                Operands::from_slice(&[i64::from(*index), i64::from(*scope)])
            }
            Self::LoadName { name } | Self::StoreName { name } => {
                Operands::from_slice(&[i64::from(name.0)])
            }
            Self::LoadProperty { base, name } | Self::StoreProperty { base, name } => {
                Operands::from_slice(&[reg(base), i64::from(name.0)])
            }
            Self::LoadElement { base } => Operands::from_slice(&[reg(base)]),
            Self::StoreElement { base, index } => Operands::from_slice(&[reg(base), reg(index)]),
            Self::Binary { lhs, rhs, .. } | Self::Compare { lhs, rhs, .. } => {
                Operands::from_slice(&[reg(lhs), reg(rhs)])
            }
            Self::CallValue { func, argc, argv } | Self::Construct { func, argc, argv } => {
                Operands::from_slice(&[reg(func), i64::from(*argc), reg(argv)])
            }
            Self::CallProperty { base, name, argc, argv } => {
                Operands::from_slice(&[reg(base), i64::from(name.0), i64::from(*argc), reg(argv)])
            }
            Self::CallName { name, argc, argv } => {
                Operands::from_slice(&[i64::from(name.0), i64::from(*argc), reg(argv)])
            }
            Self::Jump { .. }
            | Self::JumpTrue { .. }
            | Self::JumpFalse { .. }
            | Self::JumpNoException { .. }
            | Self::SetUnwindHandler { .. } => Operands::from_slice(&[0]),
            Self::Nop
            | Self::LoadZero
            | Self::LoadUndefined
            | Self::LoadNull
            | Self::LoadTrue
            | Self::LoadFalse
            | Self::Unary { .. }
            | Self::Return
            | Self::ClearUnwindHandler
            | Self::UnwindDispatch
            | Self::ThrowException
            | Self::GetException
            | Self::SetException => Operands::new(),
        }
    }
}

/// Fixed-capacity operand list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operands {
    values: [i64; MAX_OPERANDS],
    len: usize,
}

impl Operands {
    /// Empty operand list
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy up to four operands
    pub fn from_slice(values: &[i64]) -> Self {
        assert!(values.len() <= MAX_OPERANDS, "too many operands: {}", values.len());
        let mut operands = Self::new();
        operands.values[..values.len()].copy_from_slice(values);
        operands.len = values.len();
        operands
    }

    /// Number of operands
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no operands
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Operands in encoding order
    pub fn as_slice(&self) -> &[i64] {
        &self.values[..self.len]
    }

    /// Overwrite the last slot (the jump offset of a jump instruction)
    pub fn set_last(&mut self, value: i64) {
        assert!(self.len > 0, "no operand slot to patch");
        self.values[self.len - 1] = value;
    }
}
