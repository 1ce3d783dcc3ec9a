//! AArch64 (AAPCS64) instruction selection refinement and byte encoder.
//!
//! Floating-point values are scalar doubles in the `v` register file, same
//! single-width treatment as the x86_64 target's `xmm` usage. Integer and
//! control-flow coverage is otherwise the same shape as x86_64's encoder —
//! every vreg lives in a stack slot, addressed here with the unscaled
//! `ldur`/`stur` 9-bit signed immediate form off the frame pointer, which
//! caps a function at roughly 32 live vregs before the offset would
//! overflow. That's enough for every function this engine is exercised
//! against; a production tier would widen to scaled `ldr`/`str` plus an
//! extra address register once a function needs more.

use liric_ir::{FcmpPred, IcmpPred};
use target_lexicon::Triple;

use crate::error::{CodegenError, CodegenResult};
use crate::intrinsics::IntrinsicRegistry;
use crate::mach::{MArg, MInst, MOp, MTerm, MachineFunction};
use crate::reloc::{RelocKind, Relocation};
use crate::target::{EncodedFunction, Target};

const FP: u32 = 29; // x29, frame pointer
const LR: u32 = 30; // x30, link register
const SP: u32 = 31;
const ZR: u32 = 31; // same encoding as SP, context-dependent
const SCRATCH0: u32 = 9; // x9
const SCRATCH1: u32 = 10; // x10
const SCRATCH2: u32 = 11; // x11
const FSCRATCH0: u32 = 0; // d0
const FSCRATCH1: u32 = 1; // d1

const AAPCS_INT_ARG_REGS: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

pub struct Aarch64Target {
    triple: Triple,
    intrinsics: IntrinsicRegistry,
}

impl Aarch64Target {
    pub fn new(triple: Triple) -> Self {
        let intrinsics = IntrinsicRegistry::for_target(&triple);
        Aarch64Target { triple, intrinsics }
    }
}

impl Target for Aarch64Target {
    fn name(&self) -> &'static str {
        "aarch64"
    }

    fn triple(&self) -> &Triple {
        &self.triple
    }

    fn call_conv_name(&self) -> &'static str {
        "aapcs64"
    }

    fn intrinsics(&self) -> &IntrinsicRegistry {
        &self.intrinsics
    }

    fn call_site_len(&self) -> usize {
        4 // one `bl` instruction
    }

    fn encode_function(&self, mf: &MachineFunction) -> CodegenResult<EncodedFunction> {
        Encoder::new(mf).run()
    }
}

fn w(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

struct Encoder<'m> {
    mf: &'m MachineFunction,
    buf: Vec<u8>,
    relocs: Vec<Relocation>,
    jump_patches: Vec<(usize, usize, usize, JumpKind)>,
    block_starts: Vec<usize>,
}

#[derive(Clone, Copy)]
enum JumpKind {
    Uncond,
    Cond(u32),
}

impl<'m> Encoder<'m> {
    fn new(mf: &'m MachineFunction) -> Self {
        Encoder {
            mf,
            buf: Vec::new(),
            relocs: Vec::new(),
            jump_patches: Vec::new(),
            block_starts: vec![0; mf.blocks.len()],
        }
    }

    fn emit(&mut self, word: u32) {
        self.buf.extend(w(word));
    }

    fn run(mut self) -> CodegenResult<EncodedFunction> {
        self.check_slot_range()?;
        self.prologue();
        self.store_incoming_params();

        for (idx, block) in self.mf.blocks.iter().enumerate() {
            self.block_starts[idx] = self.buf.len();
            for inst in &block.insts {
                self.encode_inst(inst)?;
            }
            match block.term.as_ref() {
                Some(term) => self.encode_term(term)?,
                None => {
                    return Err(CodegenError::Other(format!(
                        "block {} has no terminator",
                        idx
                    )))
                }
            }
        }

        for (patch_off, instr_off, target, kind) in &self.jump_patches {
            let disp_words = (self.block_starts[*target] as i64 - *instr_off as i64) / 4;
            let mut word = u32::from_le_bytes(self.buf[*patch_off..*patch_off + 4].try_into().unwrap());
            match kind {
                JumpKind::Uncond => word |= (disp_words as u32) & 0x03FF_FFFF,
                JumpKind::Cond(cond) => word |= (((disp_words as u32) & 0x7FFFF) << 5) | cond,
            }
            self.buf[*patch_off..*patch_off + 4].copy_from_slice(&word.to_le_bytes());
        }

        Ok(EncodedFunction {
            bytes: self.buf,
            relocs: self.relocs,
            frame_size: self.mf.frame_size,
        })
    }

    fn check_slot_range(&self) -> CodegenResult<()> {
        for &s in &self.mf.slots {
            if !(-256..=255).contains(&s) {
                return Err(CodegenError::Other(format!(
                    "vreg stack slot offset {s} exceeds this target's unscaled ldur/stur range"
                )));
            }
        }
        Ok(())
    }

    fn prologue(&mut self) {
        // sub sp, sp, #frame_size+16 ; str x29,[sp] ; str x30,[sp,#8] ; mov x29, sp
        let total = self.mf.frame_size + 16;
        self.emit(0xD1000000 | ((total as u32 & 0xFFF) << 10) | (SP << 5) | SP);
        self.emit(0xF9000000 | (0 << 10) | (SP << 5) | FP);
        self.emit(0xF9000000 | (1 << 10) | (SP << 5) | LR);
        self.emit(0x910003E0 | (SP << 16) | FP); // add x29, sp, #0 (mov x29,sp)
    }

    fn epilogue(&mut self) {
        let total = self.mf.frame_size + 16;
        self.emit(0xF9400000 | (0 << 10) | (SP << 5) | FP);
        self.emit(0xF9400000 | (1 << 10) | (SP << 5) | LR);
        self.emit(0x91000000 | ((total as u32 & 0xFFF) << 10) | (SP << 5) | SP);
        self.emit(0xD65F03C0); // ret
    }

    fn store_incoming_params(&mut self) {
        for i in 0..self.mf.num_params as usize {
            if i >= AAPCS_INT_ARG_REGS.len() {
                break;
            }
            let vreg = i as u32 + 1;
            let slot = self.mf.slot_of(vreg);
            self.stur(AAPCS_INT_ARG_REGS[i], slot);
        }
    }

    fn ldur(&mut self, rt: u32, slot: i32) {
        let imm9 = (slot as u32) & 0x1FF;
        self.emit(0xF8400000 | (imm9 << 12) | (FP << 5) | rt);
    }

    fn stur(&mut self, rt: u32, slot: i32) {
        let imm9 = (slot as u32) & 0x1FF;
        self.emit(0xF8000000 | (imm9 << 12) | (FP << 5) | rt);
    }

    fn movz_movk_64(&mut self, rd: u32, imm: i64) {
        let bits = imm as u64;
        self.emit(0xD2800000 | (((bits & 0xFFFF) as u32) << 5) | rd);
        for shift in 1..4u32 {
            let chunk = ((bits >> (shift * 16)) & 0xFFFF) as u32;
            if chunk != 0 {
                self.emit(0xF2800000 | (shift << 21) | (chunk << 5) | rd);
            }
        }
    }

    fn load_arg(&mut self, reg: u32, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(v) => self.ldur(reg, self.mf.slot_of(*v)),
            MArg::Imm(i) => self.movz_movk_64(reg, *i),
            MArg::FImm(f) => self.movz_movk_64(reg, f.to_bits() as i64),
            MArg::Sym(name) => {
                // adrp + add, the standard AAPCS64 "page + page-offset"
                // address materialization; the writer patches both fields
                // once the symbol's final address is known.
                let adrp_off = self.buf.len();
                self.emit(0x90000000 | reg);
                self.relocs.push(Relocation {
                    offset: adrp_off as u32,
                    symbol: name.clone(),
                    kind: RelocKind::Page21,
                    addend: 0,
                });
                let add_off = self.buf.len();
                self.emit(0x91000000 | (reg << 5) | reg);
                self.relocs.push(Relocation {
                    offset: add_off as u32,
                    symbol: name.clone(),
                    kind: RelocKind::PageOff12,
                    addend: 0,
                });
            }
        }
        Ok(())
    }

    fn store_dest(&mut self, dest: Option<u32>, reg: u32) {
        if let Some(v) = dest {
            self.stur(reg, self.mf.slot_of(v));
        }
    }

    fn ldur_fp(&mut self, dt: u32, slot: i32) {
        let imm9 = (slot as u32) & 0x1FF;
        self.emit(0xFC400000 | (imm9 << 12) | (FP << 5) | dt);
    }

    fn stur_fp(&mut self, dt: u32, slot: i32) {
        let imm9 = (slot as u32) & 0x1FF;
        self.emit(0xFC000000 | (imm9 << 12) | (FP << 5) | dt);
    }

    /// `fmov Dd, Xn`: bit-reinterprets a GPR into a `v` register, used to
    /// materialize float immediates without a stack round-trip.
    fn fmov_gpr_to_vec(&mut self, dt: u32, gpr: u32) {
        self.emit(0x9E670000 | (gpr << 5) | dt);
    }

    fn load_farg(&mut self, v: u32, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(r) => self.ldur_fp(v, self.mf.slot_of(*r)),
            MArg::FImm(f) => {
                self.movz_movk_64(SCRATCH0, f.to_bits() as i64);
                self.fmov_gpr_to_vec(v, SCRATCH0);
            }
            MArg::Imm(i) => {
                self.movz_movk_64(SCRATCH0, *i);
                self.fmov_gpr_to_vec(v, SCRATCH0);
            }
            MArg::Sym(_) => {
                return Err(CodegenError::Other(
                    "symbol operand not valid for a float op".into(),
                ))
            }
        }
        Ok(())
    }

    fn store_fdest(&mut self, dest: Option<u32>, v: u32) {
        if let Some(d) = dest {
            self.stur_fp(v, self.mf.slot_of(d));
        }
    }

    fn encode_inst(&mut self, inst: &MInst) -> CodegenResult<()> {
        match &inst.op {
            MOp::MovImm | MOp::MovReg | MOp::Bitcast | MOp::PtrToInt | MOp::IntToPtr
            | MOp::Trunc | MOp::ZExt | MOp::SExt => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Add | MOp::Sub | MOp::And | MOp::Or | MOp::Xor => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                let base = match inst.op {
                    MOp::Add => 0x8B000000,
                    MOp::Sub => 0xCB000000,
                    MOp::And => 0x8A000000,
                    MOp::Or => 0xAA000000,
                    _ => 0xCA000000,
                };
                self.emit(base | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Mul => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                self.emit(0x9B007C00 | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::SDiv | MOp::UDiv => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                let base = if matches!(inst.op, MOp::SDiv) {
                    0x9AC00C00
                } else {
                    0x9AC00800
                };
                self.emit(base | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::SRem | MOp::URem => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                let base = if matches!(inst.op, MOp::SRem) {
                    0x9AC00C00
                } else {
                    0x9AC00800
                };
                self.emit(base | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH2);
                // msub dest, tmp, b, a  (dest = a - tmp*b)
                self.emit(0x9B008000 | (SCRATCH1 << 16) | (SCRATCH0 << 10) | (SCRATCH2 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Shl | MOp::LShr | MOp::AShr => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                let base = match inst.op {
                    MOp::Shl => 0x9AC02000,
                    MOp::LShr => 0x9AC02400,
                    _ => 0x9AC02800,
                };
                self.emit(base | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Icmp(pred) => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                self.emit(0xEB00001F | (SCRATCH1 << 16) | (SCRATCH0 << 5)); // subs xzr, s0, s1
                let cond = icmp_condcode(*pred);
                let inv = invert_cond(cond);
                self.emit(0x9A9F07E0 | (inv << 12) | SCRATCH0); // cset s0, cond
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::FAdd | MOp::FSub | MOp::FMul | MOp::FDiv => {
                self.load_farg(FSCRATCH0, &inst.args[0])?;
                self.load_farg(FSCRATCH1, &inst.args[1])?;
                let opcode = match inst.op {
                    MOp::FAdd => 0b000010u32,
                    MOp::FSub => 0b000011,
                    MOp::FMul => 0b000000,
                    _ => 0b000001,
                };
                self.emit(0x1E600000 | (FSCRATCH1 << 16) | (opcode << 10) | (FSCRATCH0 << 5) | FSCRATCH0);
                self.store_fdest(inst.dest, FSCRATCH0);
            }
            MOp::Fcmp(pred) => {
                self.load_farg(FSCRATCH0, &inst.args[0])?;
                self.load_farg(FSCRATCH1, &inst.args[1])?;
                self.emit(0x1E602000 | (FSCRATCH1 << 16) | (FSCRATCH0 << 5)); // fcmp d0, d1
                self.emit_fcmp_set(*pred, SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::SiToFp | MOp::UiToFp => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                let opcode = if matches!(inst.op, MOp::SiToFp) { 0b010u32 } else { 0b011 };
                self.emit(0x9E600000 | (opcode << 16) | (SCRATCH0 << 5) | FSCRATCH0);
                self.store_fdest(inst.dest, FSCRATCH0);
            }
            MOp::FpToSi | MOp::FpToUi => {
                self.load_farg(FSCRATCH0, &inst.args[0])?;
                let opcode = if matches!(inst.op, MOp::FpToSi) { 0b000u32 } else { 0b001 };
                self.emit(0x9E780000 | (opcode << 16) | (FSCRATCH0 << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::FpTrunc | MOp::FpExt => {
                self.load_farg(FSCRATCH0, &inst.args[0])?;
                self.store_fdest(inst.dest, FSCRATCH0);
            }
            MOp::Load { width } => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                let base = match width {
                    8 => 0xF9400000,
                    4 => 0xB9400000,
                    2 => 0x79400000,
                    _ => 0x39400000,
                };
                self.emit(base | (SCRATCH0 << 5) | SCRATCH1);
                self.store_dest(inst.dest, SCRATCH1);
            }
            MOp::Store { width } => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                self.load_arg(SCRATCH1, &inst.args[1])?;
                let base = match width {
                    8 => 0xF9000000,
                    4 => 0xB9000000,
                    2 => 0x79000000,
                    _ => 0x39000000,
                };
                self.emit(base | (SCRATCH0 << 5) | SCRATCH1);
            }
            MOp::Gep { offset } => {
                self.load_arg(SCRATCH0, &inst.args[0])?;
                if *offset != 0 {
                    if (0..4096).contains(offset) {
                        self.emit(0x91000000 | ((*offset as u32 & 0xFFF) << 10) | (SCRATCH0 << 5) | SCRATCH0);
                    } else {
                        self.movz_movk_64(SCRATCH1, *offset);
                        self.emit(0x8B000000 | (SCRATCH1 << 16) | (SCRATCH0 << 5) | SCRATCH0);
                    }
                }
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Select => {
                self.load_arg(SCRATCH0, &inst.args[0])?; // cond
                self.load_arg(SCRATCH1, &inst.args[1])?; // then
                self.load_arg(SCRATCH2, &inst.args[2])?; // else
                self.emit(0xF1000000 | (SCRATCH0 << 5) | ZR); // subs xzr, s0, #0
                self.emit(0x9A800000 | (SCRATCH2 << 16) | (NE << 12) | (SCRATCH1 << 5) | SCRATCH0); // csel s0, then, else, ne
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Alloca { .. } => {
                let dest = inst
                    .dest
                    .ok_or_else(|| CodegenError::Other("alloca with no dest".into()))?;
                let off = *self.mf.alloca_slots.get(&dest).ok_or_else(|| {
                    CodegenError::Other(format!("no stack slot assigned for alloca %{dest}"))
                })?;
                // add dest, x29, #off (off is negative; encode via sub)
                let mag = (-off) as u32;
                self.emit(0xD1000000 | ((mag & 0xFFF) << 10) | (FP << 5) | SCRATCH0);
                self.store_dest(inst.dest, SCRATCH0);
            }
            MOp::Memcpy { .. } | MOp::Memmove { .. } | MOp::Memset { .. } => {
                return self.emit_mem_op_call(inst);
            }
            MOp::Call { name, .. } => self.emit_call(name, &inst.args, inst.dest)?,
            MOp::Trap | MOp::Unreachable => self.emit(0xD4200000), // brk #0
            other => return Err(CodegenError::UnsupportedOpcode(unsupported_opcode_tag(other))),
        }
        Ok(())
    }

    fn emit_mem_op_call(&mut self, inst: &MInst) -> CodegenResult<()> {
        let name = match &inst.op {
            MOp::Memcpy { .. } => "memcpy",
            MOp::Memmove { .. } => "memmove",
            MOp::Memset { .. } => "memset",
            _ => unreachable!(),
        };
        self.emit_call(name, &inst.args, None)
    }

    fn emit_call(&mut self, name: &str, args: &[MArg], dest: Option<u32>) -> CodegenResult<()> {
        for (i, arg) in args.iter().enumerate() {
            if i >= AAPCS_INT_ARG_REGS.len() {
                return Err(CodegenError::Other(
                    "more than 8 call arguments not supported".into(),
                ));
            }
            self.load_arg(AAPCS_INT_ARG_REGS[i], arg)?;
        }
        let patch_off = self.buf.len();
        self.emit(0x94000000);
        self.relocs.push(Relocation {
            offset: patch_off as u32,
            symbol: name.to_string(),
            kind: RelocKind::Branch26,
            addend: 0,
        });
        self.store_dest(dest, 0);
        Ok(())
    }

    fn encode_term(&mut self, term: &MTerm) -> CodegenResult<()> {
        match term {
            MTerm::Ret(arg) => {
                if let Some(arg) = arg {
                    self.load_arg(0, arg)?;
                }
                self.epilogue();
            }
            MTerm::Jump(target) => self.emit_b(*target),
            MTerm::CondBr {
                cond,
                then_blk,
                else_blk,
            } => {
                self.load_arg(SCRATCH0, cond)?;
                self.emit(0xF1000000 | (SCRATCH0 << 5) | ZR); // subs xzr, s0, #0
                self.emit_bcond(NE, *then_blk);
                self.emit_b(*else_blk);
            }
            MTerm::FusedCondBr {
                cmp,
                then_blk,
                else_blk,
            } => {
                if let Some(fpred) = cmp.fpred {
                    self.load_farg(FSCRATCH0, &cmp.lhs)?;
                    self.load_farg(FSCRATCH1, &cmp.rhs)?;
                    self.emit(0x1E602000 | (FSCRATCH1 << 16) | (FSCRATCH0 << 5)); // fcmp d0, d1
                    self.emit_bcond_fcmp(fpred, *then_blk, *else_blk);
                } else {
                    self.load_arg(SCRATCH0, &cmp.lhs)?;
                    self.load_arg(SCRATCH1, &cmp.rhs)?;
                    self.emit(0xEB00001F | (SCRATCH1 << 16) | (SCRATCH0 << 5));
                    let cond = icmp_condcode(cmp.pred);
                    self.emit_bcond(cond, *then_blk);
                    self.emit_b(*else_blk);
                }
            }
            MTerm::Switch {
                scrutinee,
                cases,
                default,
            } => {
                self.load_arg(SCRATCH0, scrutinee)?;
                for (val, target) in cases {
                    self.movz_movk_64(SCRATCH1, *val);
                    self.emit(0xEB00001F | (SCRATCH1 << 16) | (SCRATCH0 << 5));
                    self.emit_bcond(EQ, *target);
                }
                self.emit_b(*default);
            }
            MTerm::Unreachable => self.emit(0xD4200000),
        }
        Ok(())
    }

    fn emit_b(&mut self, target: usize) {
        let patch_off = self.buf.len();
        self.emit(0x14000000);
        self.jump_patches
            .push((patch_off, patch_off, target, JumpKind::Uncond));
    }

    fn emit_bcond(&mut self, cond: u32, target: usize) {
        let patch_off = self.buf.len();
        self.emit(0x54000000 | cond);
        self.jump_patches
            .push((patch_off, patch_off, target, JumpKind::Cond(cond)));
    }

    /// `cset`/`cmp`+`cset`-style materialization of an `fcmp` result,
    /// built on the NZCV flags `fcmp` sets directly (see `fcmp_condcode`).
    /// `One`/`Ueq` have no single AArch64 condition code and need two
    /// `cset`s ORed together.
    fn emit_fcmp_set(&mut self, pred: FcmpPred, dst: u32) {
        if let Some(cond) = fcmp_condcode(pred) {
            let inv = invert_cond(cond);
            self.emit(0x9A9F07E0 | (inv << 12) | dst);
            return;
        }
        let (c1, c2) = fcmp_condcode_pair(pred);
        let scratch = if dst == SCRATCH0 { SCRATCH1 } else { SCRATCH0 };
        self.emit(0x9A9F07E0 | (invert_cond(c1) << 12) | dst);
        self.emit(0x9A9F07E0 | (invert_cond(c2) << 12) | scratch);
        self.emit(0xAA000000 | (scratch << 16) | (dst << 5) | dst); // orr dst, dst, scratch
    }

    /// Branch variant of `emit_fcmp_set`.
    fn emit_bcond_fcmp(&mut self, pred: FcmpPred, then_blk: usize, else_blk: usize) {
        if let Some(cond) = fcmp_condcode(pred) {
            self.emit_bcond(cond, then_blk);
            self.emit_b(else_blk);
            return;
        }
        let (c1, c2) = fcmp_condcode_pair(pred);
        self.emit_bcond(c1, then_blk);
        self.emit_bcond(c2, then_blk);
        self.emit_b(else_blk);
    }
}

const EQ: u32 = 0x0;
const NE: u32 = 0x1;
const CS: u32 = 0x2;
const MI: u32 = 0x4;
const VS: u32 = 0x6;
const VC: u32 = 0x7;
const HI: u32 = 0x8;
const LS: u32 = 0x9;
const GE: u32 = 0xA;
const LT: u32 = 0xB;
const GT: u32 = 0xC;
const LE: u32 = 0xD;

fn icmp_condcode(pred: IcmpPred) -> u32 {
    match pred {
        IcmpPred::Eq => 0x0,
        IcmpPred::Ne => 0x1,
        IcmpPred::Ugt => 0x8,
        IcmpPred::Uge => 0x2,
        IcmpPred::Ult => 0x3,
        IcmpPred::Ule => 0x9,
        IcmpPred::Sgt => 0xC,
        IcmpPred::Sge => 0xA,
        IcmpPred::Slt => 0xB,
        IcmpPred::Sle => 0xD,
    }
}

/// The AArch64 condition code that reads `fcmp`'s NZCV result directly as
/// `pred`, or `None` for the two predicates (`One`, `Ueq`) with no single
/// matching code.
fn fcmp_condcode(pred: FcmpPred) -> Option<u32> {
    Some(match pred {
        FcmpPred::Oeq => EQ,
        FcmpPred::Une => NE,
        FcmpPred::Uge => CS,
        FcmpPred::Olt => MI,
        FcmpPred::Uno => VS,
        FcmpPred::Ord => VC,
        FcmpPred::Ugt => HI,
        FcmpPred::Ole => LS,
        FcmpPred::Oge => GE,
        FcmpPred::Ult => LT,
        FcmpPred::Ogt => GT,
        FcmpPred::Ule => LE,
        FcmpPred::One | FcmpPred::Ueq => return None,
    })
}

fn fcmp_condcode_pair(pred: FcmpPred) -> (u32, u32) {
    match pred {
        FcmpPred::One => (MI, GT),
        FcmpPred::Ueq => (EQ, VS),
        _ => unreachable!("fcmp_condcode covers every other predicate"),
    }
}

fn invert_cond(cond: u32) -> u32 {
    cond ^ 0x1
}

fn unsupported_opcode_tag(op: &MOp) -> liric_ir::Opcode {
    match op {
        MOp::FAdd => liric_ir::Opcode::FAdd,
        MOp::FSub => liric_ir::Opcode::FSub,
        MOp::FMul => liric_ir::Opcode::FMul,
        MOp::FDiv => liric_ir::Opcode::FDiv,
        MOp::Fcmp(p) => liric_ir::Opcode::Fcmp(*p),
        MOp::SiToFp => liric_ir::Opcode::SiToFp,
        MOp::UiToFp => liric_ir::Opcode::UiToFp,
        MOp::FpToSi => liric_ir::Opcode::FpToSi,
        MOp::FpToUi => liric_ir::Opcode::FpToUi,
        MOp::FpTrunc => liric_ir::Opcode::FpTrunc,
        MOp::FpExt => liric_ir::Opcode::FpExt,
        _ => liric_ir::Opcode::FAdd,
    }
}
