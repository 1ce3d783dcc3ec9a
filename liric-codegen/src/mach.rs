//! The target-agnostic machine function model instruction selection lowers
//! into: pseudo-instructions that still reference virtual registers, plus a
//! structured terminator per block so the encoder never has to rediscover
//! control flow from a flat instruction stream.
//!
//! Register/spill selection in this engine is deliberately simple: every
//! live virtual register gets exactly one stack slot (see
//! `regalloc::assign_slots`), and each target's encoder loads operands from
//! their slots into a small set of scratch physical registers, computes,
//! and stores the result back. This is a real, if conservative, point in
//! the register/spill selection design space — a baseline/non-optimizing
//! tier would make the same call — and it keeps
//! each target's encoder focused on instruction-encoding fidelity rather
//! than on live-range bookkeeping. See `DESIGN.md` for the fuller rationale.

use std::collections::HashMap;

use liric_ir::{FcmpPred, IcmpPred};

/// An operand of a pseudo-instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum MArg {
    /// A virtual register, numbered identically to the originating IR's
    /// `ValueId` so diagnostics can point straight back at the IR.
    Vreg(u32),
    Imm(i64),
    FImm(f64),
    /// A function or data symbol referenced by name (calls, global
    /// addresses).
    Sym(String),
}

/// A pseudo-opcode. Most map 1:1 to the IR opcode that produced them;
/// control-flow-fusing and ABI-specific forms are spelled out explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum MOp {
    MovImm,
    MovReg,
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
    /// Produces a 0/1 value in the target's ABI-preferred boolean form.
    Icmp(IcmpPred),
    Fcmp(FcmpPred),
    /// Load/store to the address named by the single `Vreg`/`Sym` argument.
    Load { width: u8 },
    Store { width: u8 },
    /// `call name(args...)`; `dest` is `None` for a void callee.
    Call { name: String, external_abi: bool },
    /// Sign/zero-extend or truncate the first argument to the dest width.
    Trunc,
    ZExt,
    SExt,
    Bitcast,
    FpTrunc,
    FpExt,
    FpToSi,
    FpToUi,
    SiToFp,
    UiToFp,
    PtrToInt,
    IntToPtr,
    /// Computed address: base `Vreg`/`Sym` plus a constant byte offset.
    Gep { offset: i64 },
    Select,
    Alloca { size: u64, align: u64 },
    Memcpy { len: u64 },
    Memmove { len: u64 },
    Memset { len: u64 },
    Trap,
    Unreachable,
}

/// A pseudo-instruction referencing virtual registers.
#[derive(Debug, Clone)]
pub struct MInst {
    pub op: MOp,
    pub dest: Option<u32>,
    pub args: Vec<MArg>,
}

/// A fused compare-and-branch: emitted instead of a separate `Icmp`/`Fcmp`
/// + conditional-jump pair when the comparison has exactly one use (the
/// branch itself). See `isel::find_fused_source`.
#[derive(Debug, Clone)]
pub struct FusedCmpBr {
    /// Condition-code shape; for a fused `fcmp` this is the nearest-shaped
    /// integer predicate (see `isel::fcmp_as_icmp_shape`) and `fpred`
    /// carries the real IEEE-754 predicate the encoder must dispatch on.
    pub pred: IcmpPred,
    /// `Some` iff this comparison was an `fcmp`; the encoder must use a
    /// float compare (`ucomisd`/`ucomiss` on x86_64) and the NaN-aware
    /// condition codes `fpred` implies, never the plain integer path.
    pub fpred: Option<FcmpPred>,
    pub lhs: MArg,
    pub rhs: MArg,
}

/// The terminator of a machine block, mirroring the IR's closed terminator
/// set.
#[derive(Debug, Clone)]
pub enum MTerm {
    Ret(Option<MArg>),
    Jump(usize),
    /// A plain conditional branch on a materialized boolean vreg.
    CondBr {
        cond: MArg,
        then_blk: usize,
        else_blk: usize,
    },
    /// A condbr whose condition was fused with the preceding comparison.
    FusedCondBr {
        cmp: FusedCmpBr,
        then_blk: usize,
        else_blk: usize,
    },
    Switch {
        scrutinee: MArg,
        cases: Vec<(i64, usize)>,
        default: usize,
    },
    Unreachable,
}

/// One lowered basic block: straight-line pseudo-instructions plus exactly
/// one terminator.
#[derive(Debug, Clone, Default)]
pub struct MBlock {
    pub insts: Vec<MInst>,
    pub term: Option<MTerm>,
}

/// A fully lowered function, ready for register/spill assignment and
/// encoding.
#[derive(Debug, Clone)]
pub struct MachineFunction {
    pub name: String,
    pub num_params: u32,
    pub blocks: Vec<MBlock>,
    /// Every vreg number used anywhere in the function, for
    /// `regalloc::assign_slots` to size the spill area.
    pub vreg_count: u32,
    /// Byte offset (from the frame base) assigned to each vreg's spill
    /// slot, filled in by `regalloc::assign_slots`.
    pub slots: Vec<i32>,
    /// Stack-relative offset of each `alloca`'s backing storage, keyed by
    /// the `alloca` instruction's dest vreg. Disjoint from `slots`, which
    /// only ever holds an 8-byte pointer/scalar per vreg.
    pub alloca_slots: HashMap<u32, i32>,
    pub frame_size: i32,
}

impl MachineFunction {
    pub fn new(name: impl Into<String>, num_params: u32) -> Self {
        MachineFunction {
            name: name.into(),
            num_params,
            blocks: Vec::new(),
            vreg_count: 0,
            slots: Vec::new(),
            alloca_slots: HashMap::new(),
            frame_size: 0,
        }
    }

    pub fn create_block(&mut self) -> usize {
        self.blocks.push(MBlock::default());
        self.blocks.len() - 1
    }

    pub fn slot_of(&self, vreg: u32) -> i32 {
        self.slots[vreg as usize]
    }
}
