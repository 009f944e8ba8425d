//! Opcodes for the Raya accumulator bytecode
//!
//! Every instruction starts with a one-byte tag. Tags below `0x80` select the
//! narrow encoding (one signed byte per operand); the same tag with
//! [`WIDE_BIT`] set selects the wide encoding (four little-endian bytes per
//! operand). Width is chosen per instruction, never per operand.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Markers, register traffic, constants, locals
//! - 0x10-0x17: Names, properties, elements
//! - 0x18-0x27: Binary arithmetic and bitwise ops
//! - 0x28-0x37: Comparison and unary ops
//! - 0x38-0x3F: Calls
//! - 0x40-0x47: Jumps and return
//! - 0x48-0x4F: Exception handling

/// High bit of the tag byte marking the wide encoding
pub const WIDE_BIT: u8 = 0x80;

/// Maximum number of operands any instruction carries
pub const MAX_OPERANDS: usize = 4;

/// Kind of value held by an operand slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// Virtual register index
    Register,
    /// Local variable slot
    Local,
    /// Number of scopes to walk outwards
    Scope,
    /// Constant pool reference
    Constant,
    /// Interned name reference
    Name,
    /// Signed immediate
    Immediate,
    /// Call argument count
    Count,
    /// Source line
    Line,
    /// 0/1 flag
    Flag,
    /// Relative jump distance, measured from the end of the instruction
    JumpOffset,
}

use OperandKind::*;

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Markers, Register Traffic, Constants, Locals (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Stepping marker (line, before_return)
    Debug = 0x01,
    /// acc = rA
    LoadReg = 0x02,
    /// rA = acc
    StoreReg = 0x03,
    /// rB = rA
    MoveReg = 0x04,
    /// acc = constants[A]
    LoadConst = 0x05,
    /// acc = A (signed immediate)
    LoadInt = 0x06,
    /// acc = 0
    LoadZero = 0x07,
    /// acc = undefined
    LoadUndefined = 0x08,
    /// acc = null
    LoadNull = 0x09,
    /// acc = true
    LoadTrue = 0x0A,
    /// acc = false
    LoadFalse = 0x0B,
    /// acc = locals[A]
    LoadLocal = 0x0C,
    /// locals[A] = acc
    StoreLocal = 0x0D,
    /// acc = scope(B).locals[A]
    LoadScopedLocal = 0x0E,
    /// scope(B).locals[A] = acc
    StoreScopedLocal = 0x0F,

    // ===== Names, Properties, Elements (0x10-0x17) =====
    /// acc = lookup(names[A])
    LoadName = 0x10,
    /// names[A] = acc
    StoreName = 0x11,
    /// acc = rA.names[B]
    LoadProperty = 0x12,
    /// rA.names[B] = acc
    StoreProperty = 0x13,
    /// acc = rA[acc]
    LoadElement = 0x14,
    /// rA[rB] = acc
    StoreElement = 0x15,

    // ===== Binary Ops (0x18-0x27): acc = rA op rB =====
    /// Addition
    Add = 0x18,
    /// Subtraction
    Sub = 0x19,
    /// Multiplication
    Mul = 0x1A,
    /// Division
    Div = 0x1B,
    /// Remainder
    Mod = 0x1C,
    /// Bitwise and
    BitAnd = 0x1D,
    /// Bitwise or
    BitOr = 0x1E,
    /// Bitwise xor
    BitXor = 0x1F,
    /// Left shift
    Shl = 0x20,
    /// Signed right shift
    Shr = 0x21,
    /// Unsigned right shift
    UShr = 0x22,

    // ===== Comparison (0x28-0x2F): acc = rA cmp rB =====
    /// Loose equality
    CmpEq = 0x28,
    /// Loose inequality
    CmpNe = 0x29,
    /// Strict equality
    CmpStrictEq = 0x2A,
    /// Strict inequality
    CmpStrictNe = 0x2B,
    /// Less than
    CmpLt = 0x2C,
    /// Less or equal
    CmpLe = 0x2D,
    /// Greater than
    CmpGt = 0x2E,
    /// Greater or equal
    CmpGe = 0x2F,

    // ===== Unary Ops (0x30-0x37): acc = op acc =====
    /// Logical not
    UNot = 0x30,
    /// Negation
    UMinus = 0x31,
    /// Numeric conversion
    UPlus = 0x32,
    /// Bitwise complement
    UCompl = 0x33,
    /// acc + 1
    Increment = 0x34,
    /// acc - 1
    Decrement = 0x35,
    /// typeof acc
    TypeOf = 0x36,

    // ===== Calls (0x38-0x3F) =====
    /// acc = rA(argv[0..argc])
    CallValue = 0x38,
    /// acc = rA.names[B](argv[0..argc])
    CallProperty = 0x39,
    /// acc = names[A](argv[0..argc])
    CallName = 0x3A,
    /// acc = new rA(argv[0..argc])
    Construct = 0x3B,

    // ===== Jumps & Return (0x40-0x47) =====
    /// PC += offset
    Jump = 0x40,
    /// if acc then PC += offset
    JumpTrue = 0x41,
    /// if !acc then PC += offset
    JumpFalse = 0x42,
    /// if no exception is pending then PC += offset
    JumpNoException = 0x43,
    /// return acc
    Ret = 0x44,

    // ===== Exception Handling (0x48-0x4F) =====
    /// handler = PC + offset
    SetUnwindHandler = 0x48,
    /// handler = none
    ClearUnwindHandler = 0x49,
    /// Continue unwinding to the enclosing handler, if any
    UnwindDispatch = 0x4A,
    /// throw acc
    ThrowException = 0x4B,
    /// acc = pending exception
    GetException = 0x4C,
    /// pending exception = acc
    SetException = 0x4D,
}

impl Opcode {
    /// Convert a byte (with the wide bit cleared) to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Debug),
            0x02 => Some(Self::LoadReg),
            0x03 => Some(Self::StoreReg),
            0x04 => Some(Self::MoveReg),
            0x05 => Some(Self::LoadConst),
            0x06 => Some(Self::LoadInt),
            0x07 => Some(Self::LoadZero),
            0x08 => Some(Self::LoadUndefined),
            0x09 => Some(Self::LoadNull),
            0x0A => Some(Self::LoadTrue),
            0x0B => Some(Self::LoadFalse),
            0x0C => Some(Self::LoadLocal),
            0x0D => Some(Self::StoreLocal),
            0x0E => Some(Self::LoadScopedLocal),
            0x0F => Some(Self::StoreScopedLocal),
            0x10 => Some(Self::LoadName),
            0x11 => Some(Self::StoreName),
            0x12 => Some(Self::LoadProperty),
            0x13 => Some(Self::StoreProperty),
            0x14 => Some(Self::LoadElement),
            0x15 => Some(Self::StoreElement),
            0x18 => Some(Self::Add),
            0x19 => Some(Self::Sub),
            0x1A => Some(Self::Mul),
            0x1B => Some(Self::Div),
            0x1C => Some(Self::Mod),
            0x1D => Some(Self::BitAnd),
            0x1E => Some(Self::BitOr),
            0x1F => Some(Self::BitXor),
            0x20 => Some(Self::Shl),
            0x21 => Some(Self::Shr),
            0x22 => Some(Self::UShr),
            0x28 => Some(Self::CmpEq),
            0x29 => Some(Self::CmpNe),
            0x2A => Some(Self::CmpStrictEq),
            0x2B => Some(Self::CmpStrictNe),
            0x2C => Some(Self::CmpLt),
            0x2D => Some(Self::CmpLe),
            0x2E => Some(Self::CmpGt),
            0x2F => Some(Self::CmpGe),
            0x30 => Some(Self::UNot),
            0x31 => Some(Self::UMinus),
            0x32 => Some(Self::UPlus),
            0x33 => Some(Self::UCompl),
            0x34 => Some(Self::Increment),
            0x35 => Some(Self::Decrement),
            0x36 => Some(Self::TypeOf),
            0x38 => Some(Self::CallValue),
            0x39 => Some(Self::CallProperty),
            0x3A => Some(Self::CallName),
            0x3B => Some(Self::Construct),
            0x40 => Some(Self::Jump),
            0x41 => Some(Self::JumpTrue),
            0x42 => Some(Self::JumpFalse),
            0x43 => Some(Self::JumpNoException),
            0x44 => Some(Self::Ret),
            0x48 => Some(Self::SetUnwindHandler),
            0x49 => Some(Self::ClearUnwindHandler),
            0x4A => Some(Self::UnwindDispatch),
            0x4B => Some(Self::ThrowException),
            0x4C => Some(Self::GetException),
            0x4D => Some(Self::SetException),
            _ => None,
        }
    }

    /// Split a tag byte into its opcode and wide flag
    pub fn from_tag(tag: u8) -> Option<(Self, bool)> {
        Self::from_u8(tag & !WIDE_BIT).map(|op| (op, tag & WIDE_BIT != 0))
    }

    /// Convert opcode to its narrow tag byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Tag byte for the given encoding width
    pub fn tag(self, wide: bool) -> u8 {
        if wide {
            self.to_u8() | WIDE_BIT
        } else {
            self.to_u8()
        }
    }

    /// Operand slots of this opcode, in encoding order
    pub fn operands(self) -> &'static [OperandKind] {
        match self {
            Self::Nop
            | Self::LoadZero
            | Self::LoadUndefined
            | Self::LoadNull
            | Self::LoadTrue
            | Self::LoadFalse
            | Self::UNot
            | Self::UMinus
            | Self::UPlus
            | Self::UCompl
            | Self::Increment
            | Self::Decrement
            | Self::TypeOf
            | Self::Ret
            | Self::ClearUnwindHandler
            | Self::UnwindDispatch
            | Self::ThrowException
            | Self::GetException
            | Self::SetException => &[],

            Self::Debug => &[Line, Flag],

            Self::LoadReg | Self::StoreReg | Self::LoadElement => &[Register],
            Self::MoveReg | Self::StoreElement => &[Register, Register],

            Self::LoadConst => &[Constant],
            Self::LoadInt => &[Immediate],

            Self::LoadLocal | Self::StoreLocal => &[Local],
            Self::LoadScopedLocal | Self::StoreScopedLocal => &[Local, Scope],

            Self::LoadName | Self::StoreName => &[Name],
            Self::LoadProperty | Self::StoreProperty => &[Register, Name],

            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::BitAnd
            | Self::BitOr
            | Self::BitXor
            | Self::Shl
            | Self::Shr
            | Self::UShr
            | Self::CmpEq
            | Self::CmpNe
            | Self::CmpStrictEq
            | Self::CmpStrictNe
            | Self::CmpLt
            | Self::CmpLe
            | Self::CmpGt
            | Self::CmpGe => &[Register, Register],

            Self::CallValue | Self::Construct => &[Register, Count, Register],
            Self::CallProperty => &[Register, Name, Count, Register],
            Self::CallName => &[Name, Count, Register],

            Self::Jump
            | Self::JumpTrue
            | Self::JumpFalse
            | Self::JumpNoException
            | Self::SetUnwindHandler => &[JumpOffset],
        }
    }

    /// Number of operand slots
    pub fn operand_count(self) -> usize {
        self.operands().len()
    }

    /// Whether the last operand is a jump offset that must be patched at layout
    pub fn has_jump_field(self) -> bool {
        self.operands().last() == Some(&JumpOffset)
    }

    /// Index of the first operand slot of `kind`
    pub fn slot_of(self, kind: OperandKind) -> Option<usize> {
        self.operands().iter().position(|&k| k == kind)
    }

    /// Encoded size with four bytes per operand
    pub fn wide_size(self) -> usize {
        1 + 4 * self.operand_count()
    }

    /// Get the opcode name (for debugging/disassembly)
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Debug => "DEBUG",
            Self::LoadReg => "LOAD_REG",
            Self::StoreReg => "STORE_REG",
            Self::MoveReg => "MOVE_REG",
            Self::LoadConst => "LOAD_CONST",
            Self::LoadInt => "LOAD_INT",
            Self::LoadZero => "LOAD_ZERO",
            Self::LoadUndefined => "LOAD_UNDEFINED",
            Self::LoadNull => "LOAD_NULL",
            Self::LoadTrue => "LOAD_TRUE",
            Self::LoadFalse => "LOAD_FALSE",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadScopedLocal => "LOAD_SCOPED_LOCAL",
            Self::StoreScopedLocal => "STORE_SCOPED_LOCAL",
            Self::LoadName => "LOAD_NAME",
            Self::StoreName => "STORE_NAME",
            Self::LoadProperty => "LOAD_PROPERTY",
            Self::StoreProperty => "STORE_PROPERTY",
            Self::LoadElement => "LOAD_ELEMENT",
            Self::StoreElement => "STORE_ELEMENT",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::BitAnd => "BIT_AND",
            Self::BitOr => "BIT_OR",
            Self::BitXor => "BIT_XOR",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::UShr => "USHR",
            Self::CmpEq => "CMP_EQ",
            Self::CmpNe => "CMP_NE",
            Self::CmpStrictEq => "CMP_STRICT_EQ",
            Self::CmpStrictNe => "CMP_STRICT_NE",
            Self::CmpLt => "CMP_LT",
            Self::CmpLe => "CMP_LE",
            Self::CmpGt => "CMP_GT",
            Self::CmpGe => "CMP_GE",
            Self::UNot => "UNOT",
            Self::UMinus => "UMINUS",
            Self::UPlus => "UPLUS",
            Self::UCompl => "UCOMPL",
            Self::Increment => "INCREMENT",
            Self::Decrement => "DECREMENT",
            Self::TypeOf => "TYPEOF",
            Self::CallValue => "CALL_VALUE",
            Self::CallProperty => "CALL_PROPERTY",
            Self::CallName => "CALL_NAME",
            Self::Construct => "CONSTRUCT",
            Self::Jump => "JUMP",
            Self::JumpTrue => "JUMP_TRUE",
            Self::JumpFalse => "JUMP_FALSE",
            Self::JumpNoException => "JUMP_NO_EXCEPTION",
            Self::Ret => "RET",
            Self::SetUnwindHandler => "SET_UNWIND_HANDLER",
            Self::ClearUnwindHandler => "CLEAR_UNWIND_HANDLER",
            Self::UnwindDispatch => "UNWIND_DISPATCH",
            Self::ThrowException => "THROW_EXCEPTION",
            Self::GetException => "GET_EXCEPTION",
            Self::SetException => "SET_EXCEPTION",
        }
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(self) -> bool {
        matches!(
            self,
            Self::CallValue | Self::CallProperty | Self::CallName | Self::Construct
        )
    }

    /// Check if this opcode is a return instruction
    pub fn is_return(self) -> bool {
        matches!(self, Self::Ret)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
