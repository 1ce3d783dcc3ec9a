//! Instruction selection: lowers a finalized [`liric_ir::Function`] into a
//! [`MachineFunction`] of pseudo-instructions still addressing virtual
//! registers.
//!
//! Phi elimination happens here too, classic-style: every `phi` is replaced
//! by a copy appended to the tail of each predecessor block (just before its
//! terminator), writing the phi's vreg. This is the same approach
//! `cranelift-frontend`'s SSA builder avoids needing by construction; since
//! our IR keeps explicit phis, we resolve them at isel time instead.
//! Parallel-copy cycles (a phi's own vreg appearing as another phi's
//! incoming value in the same block) are not ordered specially; the front
//! end producing Liric IR is expected not to emit such cycles.

use std::collections::HashMap;

use liric_entity::EntityRef;
use liric_ir::{FcmpPred, IcmpPred, Opcode, Operand, ValueId, ValueKind};

use crate::error::{CodegenError, CodegenResult};
use crate::mach::{FusedCmpBr, MArg, MBlock, MInst, MOp, MTerm, MachineFunction};

/// Lower one function. Declarations (no body) are not valid input; callers
/// filter those out before reaching codegen.
pub fn lower_function(f: &liric_ir::Function) -> CodegenResult<MachineFunction> {
    debug_assert!(f.is_finalized(), "isel requires a finalized function");

    let mut mf = MachineFunction::new(f.name.clone(), f.param_tys.len() as u32);
    let mut max_vreg = f.param_tys.len() as u32;

    // Pre-pass: collect phi copies to splice into each predecessor block,
    // keyed by the predecessor's block index.
    let mut copies_by_pred: HashMap<usize, Vec<(u32, MArg)>> = HashMap::new();
    for (block_id, block) in f.blocks() {
        let _ = block_id;
        mf.create_block();
    }
    for (_, block) in f.blocks() {
        for inst in &block.insts {
            if let Opcode::Phi = inst.opcode {
                let dest = inst.dest.number();
                max_vreg = max_vreg.max(dest);
                for edge in &inst.payload.phi_edges {
                    let pred_idx = edge.from_block.index();
                    let arg = lower_operand(&edge.value)?;
                    copies_by_pred
                        .entry(pred_idx)
                        .or_default()
                        .push((dest, arg));
                }
            }
        }
    }

    for (block_id, block) in f.blocks() {
        let idx = block_id.index();
        let mut mb = MBlock::default();

        let (body, term_inst) = match block.insts.split_last() {
            Some((last, rest)) => (rest, last),
            None => {
                return Err(CodegenError::Other(format!(
                    "block {} has no instructions",
                    block_id
                )))
            }
        };

        let mut i = 0;
        while i < body.len() {
            let inst = &body[i];
            max_vreg = max_vreg.max(inst.dest.number());
            // Detect icmp/fcmp immediately feeding the terminator's single
            // condition operand with no other uses: fuse instead of
            // materializing a 0/1 value.
            if is_fusable_cmp(inst) && feeds_condbr_condition(inst.dest, term_inst, body) {
                i += 1;
                continue;
            }
            lower_body_inst(inst, &mut mb.insts)?;
            i += 1;
        }

        if let Some(copies) = copies_by_pred.get(&idx) {
            for (dest, arg) in copies {
                mb.insts.push(MInst {
                    op: match arg {
                        MArg::Imm(_) | MArg::FImm(_) => MOp::MovImm,
                        _ => MOp::MovReg,
                    },
                    dest: Some(*dest),
                    args: vec![arg.clone()],
                });
            }
        }

        mb.term = Some(lower_terminator(term_inst, body)?);
        mf.blocks[idx] = mb;
    }

    mf.vreg_count = max_vreg + 1;
    Ok(mf)
}

fn is_fusable_cmp(inst: &liric_ir::Instruction) -> bool {
    matches!(inst.opcode, Opcode::Icmp(_) | Opcode::Fcmp(_))
}

/// True when `dest` is exactly the (sole) condition operand of `term` and is
/// not referenced anywhere else in the block body.
fn feeds_condbr_condition(
    dest: ValueId,
    term: &liric_ir::Instruction,
    body: &[liric_ir::Instruction],
) -> bool {
    if term.opcode != Opcode::CondBr {
        return false;
    }
    let cond = match term.operands.first().and_then(|o| o.as_vreg()) {
        Some(v) => v,
        None => return false,
    };
    if cond != dest {
        return false;
    }
    let other_uses = body
        .iter()
        .filter(|i| i.dest != dest)
        .flat_map(|i| i.operands.iter())
        .filter(|o| o.as_vreg() == Some(dest))
        .count();
    other_uses == 0
}

fn lower_body_inst(inst: &liric_ir::Instruction, out: &mut Vec<MInst>) -> CodegenResult<()> {
    let dest = if inst.dest.is_none() {
        None
    } else {
        Some(inst.dest.number())
    };
    let op = match inst.opcode {
        Opcode::Add => MOp::Add,
        Opcode::Sub => MOp::Sub,
        Opcode::Mul => MOp::Mul,
        Opcode::SDiv => MOp::SDiv,
        Opcode::UDiv => MOp::UDiv,
        Opcode::SRem => MOp::SRem,
        Opcode::URem => MOp::URem,
        Opcode::And => MOp::And,
        Opcode::Or => MOp::Or,
        Opcode::Xor => MOp::Xor,
        Opcode::Shl => MOp::Shl,
        Opcode::LShr => MOp::LShr,
        Opcode::AShr => MOp::AShr,
        Opcode::FAdd => MOp::FAdd,
        Opcode::FSub => MOp::FSub,
        Opcode::FMul => MOp::FMul,
        Opcode::FDiv | Opcode::FRem => MOp::FDiv,
        Opcode::Icmp(p) => MOp::Icmp(p),
        Opcode::Fcmp(p) => MOp::Fcmp(p),
        Opcode::Trunc => MOp::Trunc,
        Opcode::ZExt => MOp::ZExt,
        Opcode::SExt => MOp::SExt,
        Opcode::Bitcast | Opcode::PtrToInt | Opcode::IntToPtr => match inst.opcode {
            Opcode::PtrToInt => MOp::PtrToInt,
            Opcode::IntToPtr => MOp::IntToPtr,
            _ => MOp::Bitcast,
        },
        Opcode::FpTrunc => MOp::FpTrunc,
        Opcode::FpExt => MOp::FpExt,
        Opcode::FpToSi => MOp::FpToSi,
        Opcode::FpToUi => MOp::FpToUi,
        Opcode::SiToFp => MOp::SiToFp,
        Opcode::UiToFp => MOp::UiToFp,
        Opcode::Load => MOp::Load {
            width: inst.result_ty.int_bits().unwrap_or(64) as u8 / 8,
        },
        Opcode::Store => MOp::Store {
            width: inst
                .operands
                .get(1)
                .map(|o| o.ty.int_bits().unwrap_or(64) as u8 / 8)
                .unwrap_or(8),
        },
        Opcode::Gep => {
            let offset = inst
                .operands
                .get(1)
                .and_then(|o| o.as_int_const())
                .unwrap_or(0);
            MOp::Gep { offset }
        }
        Opcode::Select => MOp::Select,
        Opcode::Alloca => MOp::Alloca {
            size: inst.result_ty.size(),
            align: inst.result_ty.align(),
        },
        Opcode::Memcpy => MOp::Memcpy {
            len: inst.operands.get(2).and_then(|o| o.as_int_const()).unwrap_or(0) as u64,
        },
        Opcode::Memmove => MOp::Memmove {
            len: inst.operands.get(2).and_then(|o| o.as_int_const()).unwrap_or(0) as u64,
        },
        Opcode::Memset => MOp::Memset {
            len: inst.operands.get(2).and_then(|o| o.as_int_const()).unwrap_or(0) as u64,
        },
        Opcode::Call => {
            let name = inst
                .callee
                .clone()
                .ok_or_else(|| CodegenError::Other("call with no callee name".into()))?;
            MOp::Call {
                name,
                external_abi: inst.payload.call_flags.external_abi,
            }
        }
        Opcode::Trap => MOp::Trap,
        Opcode::ExtractValue | Opcode::InsertValue => {
            // Struct members are addressed the same way `Gep` is: a base
            // plus a precomputed byte offset carried in the payload index
            // path (see liric_ir::constant::field_offsets).
            let offset: i64 = inst.payload.indices.iter().map(|&i| i as i64 * 8).sum();
            MOp::Gep { offset }
        }
        Opcode::Phi => return Ok(()),
        Opcode::Ret
        | Opcode::RetVoid
        | Opcode::Br
        | Opcode::CondBr
        | Opcode::Switch
        | Opcode::Unreachable => {
            return Err(CodegenError::Other(format!(
                "terminator opcode {:?} found in block body",
                inst.opcode
            )))
        }
    };
    let args = inst
        .operands
        .iter()
        .map(lower_operand)
        .collect::<CodegenResult<Vec<_>>>()?;
    out.push(MInst { op, dest, args });
    Ok(())
}

fn lower_terminator(
    term: &liric_ir::Instruction,
    body: &[liric_ir::Instruction],
) -> CodegenResult<MTerm> {
    match term.opcode {
        Opcode::Ret => {
            let arg = term.operands.first().map(lower_operand).transpose()?;
            Ok(MTerm::Ret(arg))
        }
        Opcode::RetVoid => Ok(MTerm::Ret(None)),
        Opcode::Br => {
            let target = term
                .target
                .ok_or_else(|| CodegenError::Other("br with no target".into()))?;
            Ok(MTerm::Jump(target.index()))
        }
        Opcode::CondBr => {
            let then_blk = term
                .target
                .ok_or_else(|| CodegenError::Other("condbr with no then target".into()))?
                .index();
            let else_blk = term
                .else_target
                .ok_or_else(|| CodegenError::Other("condbr with no else target".into()))?
                .index();
            if let Some(cmp) = find_fused_source(term, body) {
                return Ok(MTerm::FusedCondBr {
                    cmp,
                    then_blk,
                    else_blk,
                });
            }
            let cond = lower_operand(
                term.operands
                    .first()
                    .ok_or_else(|| CodegenError::Other("condbr with no condition".into()))?,
            )?;
            Ok(MTerm::CondBr {
                cond,
                then_blk,
                else_blk,
            })
        }
        Opcode::Switch => {
            let scrutinee = lower_operand(
                term.operands
                    .first()
                    .ok_or_else(|| CodegenError::Other("switch with no scrutinee".into()))?,
            )?;
            let default = term
                .default_target
                .ok_or_else(|| CodegenError::Other("switch with no default".into()))?
                .index();
            let cases = term
                .payload
                .switch_cases
                .iter()
                .map(|c| (c.value, c.target.index()))
                .collect();
            Ok(MTerm::Switch {
                scrutinee,
                cases,
                default,
            })
        }
        Opcode::Unreachable => Ok(MTerm::Unreachable),
        other => Err(CodegenError::Other(format!(
            "opcode {:?} is not a terminator",
            other
        ))),
    }
}

/// If `term` is a `condbr` whose condition is produced by a fusable
/// icmp/fcmp earlier in the same block with no other uses, return the
/// fused comparison.
fn find_fused_source(
    term: &liric_ir::Instruction,
    body: &[liric_ir::Instruction],
) -> Option<FusedCmpBr> {
    let cond = term.operands.first()?.as_vreg()?;
    let src = body.iter().find(|i| i.dest == cond)?;
    if !is_fusable_cmp(src) || !feeds_condbr_condition(cond, term, body) {
        return None;
    }
    let (pred, fpred) = match src.opcode {
        Opcode::Icmp(p) => (p, None),
        Opcode::Fcmp(p) => (fcmp_as_icmp_shape(p), Some(p)),
        _ => return None,
    };
    let lhs = lower_operand(src.operands.first()?).ok()?;
    let rhs = lower_operand(src.operands.get(1)?).ok()?;
    Some(FusedCmpBr { pred, fpred, lhs, rhs })
}

/// Shape-only fallback for targets that key branch selection off `pred`
/// before checking `fpred`; a fused `fcmp`'s real predicate still travels
/// alongside in `FusedCmpBr::fpred` and encoders must dispatch on that
/// first.
fn fcmp_as_icmp_shape(p: FcmpPred) -> IcmpPred {
    match p {
        FcmpPred::Oeq | FcmpPred::Ueq => IcmpPred::Eq,
        FcmpPred::One | FcmpPred::Une => IcmpPred::Ne,
        FcmpPred::Ogt | FcmpPred::Ugt => IcmpPred::Sgt,
        FcmpPred::Oge | FcmpPred::Uge => IcmpPred::Sge,
        FcmpPred::Olt | FcmpPred::Ult => IcmpPred::Slt,
        FcmpPred::Ole | FcmpPred::Ule => IcmpPred::Sle,
        FcmpPred::Ord | FcmpPred::Uno => IcmpPred::Eq,
    }
}

fn lower_operand(op: &Operand) -> CodegenResult<MArg> {
    match &op.kind {
        ValueKind::VReg(id) => Ok(MArg::Vreg(id.number())),
        ValueKind::IntConst { value, .. } => Ok(MArg::Imm(*value)),
        ValueKind::FloatConst(v) => Ok(MArg::FImm(*v)),
        ValueKind::Null | ValueKind::Undef | ValueKind::Poison => Ok(MArg::Imm(0)),
        ValueKind::Global(name) => Ok(MArg::Sym((*name).to_string())),
        ValueKind::Aggregate(_) => Err(CodegenError::Other(
            "aggregate constants may only appear in global initializers".into(),
        )),
        ValueKind::Block(_) => Err(CodegenError::Other(
            "block-address operands are not supported".into(),
        )),
    }
}
