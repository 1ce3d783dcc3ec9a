//! Instructions: opcode, operands, and opcode-specific payload.

use crate::function::BlockId;
use crate::types::Type;
use crate::value::{Operand, ValueId};

/// Integer comparison predicate, matching LLVM's `icmp` condition codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IcmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Floating-point comparison predicate, matching LLVM's `fcmp` condition
/// codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FcmpPred {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Une,
    Ugt,
    Uge,
    Ult,
    Ule,
}

/// Call-site flags that alter ABI lowering independent of the callee's
/// declared signature.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CallFlags {
    /// Force the system calling convention, irrespective of the callee's
    /// declared CC (used for libc/intrinsic calls).
    pub external_abi: bool,
    /// Callee accepts variable arguments; follow the platform's variadic
    /// rules when lowering.
    pub vararg: bool,
}

/// The opcode of an instruction. Terminators are `Ret`, `RetVoid`, `Br`,
/// `CondBr`, `Switch`, and `Unreachable`; every other opcode may appear
/// anywhere in a block's body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    Icmp(IcmpPred),
    Fcmp(FcmpPred),
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToSi,
    FpToUi,
    SiToFp,
    UiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
    Load,
    Store,
    Gep,
    ExtractValue,
    InsertValue,
    Phi,
    Call,
    Select,
    Ret,
    RetVoid,
    Br,
    CondBr,
    Switch,
    Unreachable,
    Alloca,
    Memcpy,
    Memmove,
    Memset,
    Trap,
}

impl Opcode {
    /// Is this one of the six terminator opcodes?
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Ret
                | Opcode::RetVoid
                | Opcode::Br
                | Opcode::CondBr
                | Opcode::Switch
                | Opcode::Unreachable
        )
    }
}

/// An incoming edge of a `phi` instruction: the value carried in from
/// `from_block`.
#[derive(Debug, Clone)]
pub struct PhiEdge<'a> {
    pub from_block: BlockId,
    pub value: Operand<'a>,
}

/// A `switch` case: a scrutinee value mapped to a target block.
#[derive(Debug, Clone, Copy)]
pub struct SwitchCase {
    pub value: i64,
    pub target: BlockId,
}

/// Opcode-specific data that doesn't fit the uniform operand list.
#[derive(Debug, Clone, Default)]
pub struct InstPayload<'a> {
    /// `extractvalue`/`insertvalue` index path.
    pub indices: Vec<u32>,
    /// `call` site flags.
    pub call_flags: CallFlags,
    /// `phi` incoming edges.
    pub phi_edges: Vec<PhiEdge<'a>>,
    /// `switch` case table (default is `default_block` on the instruction).
    pub switch_cases: Vec<SwitchCase>,
    /// Free-form diagnostic note, never read by codegen.
    pub note: Option<Box<str>>,
}

/// A single IR instruction.
#[derive(Debug, Clone)]
pub struct Instruction<'a> {
    pub opcode: Opcode,
    /// `ValueId::NONE` when the instruction produces no value (stores,
    /// `ret_void`, etc).
    pub dest: ValueId,
    /// Result type; `Type::Void` when `dest` is none.
    pub result_ty: &'a Type<'a>,
    pub operands: Vec<Operand<'a>>,
    /// Terminator-only: direct successor for `br`, `unreachable` (none).
    pub target: Option<BlockId>,
    /// `condbr`-only: the not-taken successor.
    pub else_target: Option<BlockId>,
    /// `switch`-only: fallthrough when no case matches.
    pub default_target: Option<BlockId>,
    /// `call`-only: external declaration's name.
    pub callee: Option<String>,
    pub payload: InstPayload<'a>,
}

impl<'a> Instruction<'a> {
    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }
}
