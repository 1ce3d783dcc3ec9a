//! x86_64 (SysV ABI) instruction selection refinement and byte encoder.
//!
//! Every vreg lives in a stack slot (see `regalloc`); this encoder loads
//! operands from `[rbp + slot]` into `rax`/`rcx` (or `xmm0`/`xmm1` for
//! float ops), computes, and stores the result back. It is a direct,
//! unoptimized translation, the same shape a template/copy-patch baseline
//! JIT tier would produce.

use std::collections::HashMap;

use liric_ir::{FcmpPred, IcmpPred};
use target_lexicon::Triple;

use crate::error::{CodegenError, CodegenResult};
use crate::intrinsics::IntrinsicRegistry;
use crate::mach::{MArg, MOp, MTerm, MachineFunction};
use crate::reloc::{RelocKind, Relocation};
use crate::target::{EncodedFunction, Target};

const RAX: u8 = 0;
const RCX: u8 = 1;
const RDX: u8 = 2;
const RBX: u8 = 3;
const RSP: u8 = 4;
const RBP: u8 = 5;
const RSI: u8 = 6;
const RDI: u8 = 7;
const R8: u8 = 8;
const R9: u8 = 9;

const SYSV_INT_ARG_REGS: [u8; 6] = [RDI, RSI, RDX, RCX, R8, R9];

pub struct X86_64Target {
    triple: Triple,
    intrinsics: IntrinsicRegistry,
}

impl X86_64Target {
    pub fn new(triple: Triple) -> Self {
        let intrinsics = IntrinsicRegistry::for_target(&triple);
        X86_64Target { triple, intrinsics }
    }
}

impl Target for X86_64Target {
    fn name(&self) -> &'static str {
        "x86_64"
    }

    fn triple(&self) -> &Triple {
        &self.triple
    }

    fn call_conv_name(&self) -> &'static str {
        "system_v"
    }

    fn intrinsics(&self) -> &IntrinsicRegistry {
        &self.intrinsics
    }

    fn call_site_len(&self) -> usize {
        5 // E8 rel32
    }

    fn encode_function(&self, mf: &MachineFunction) -> CodegenResult<EncodedFunction> {
        Encoder::new(mf).run()
    }
}

fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | ((w as u8) << 3) | ((r as u8) << 2) | ((x as u8) << 1) | (b as u8)
}

fn modrm(md: u8, reg: u8, rm: u8) -> u8 {
    (md << 6) | ((reg & 7) << 3) | (rm & 7)
}

struct Encoder<'m> {
    mf: &'m MachineFunction,
    buf: Vec<u8>,
    relocs: Vec<Relocation>,
    /// (patch offset of the rel32 field, instruction-end offset, target block)
    jump_patches: Vec<(usize, usize, usize)>,
    block_starts: Vec<usize>,
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

    fn run(mut self) -> CodegenResult<EncodedFunction> {
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

        for (patch_off, instr_end, target) in &self.jump_patches {
            let disp = self.block_starts[*target] as i64 - *instr_end as i64;
            let disp = disp as i32;
            self.buf[*patch_off..*patch_off + 4].copy_from_slice(&disp.to_le_bytes());
        }

        Ok(EncodedFunction {
            bytes: self.buf,
            relocs: self.relocs,
            frame_size: self.mf.frame_size,
        })
    }

    fn prologue(&mut self) {
        self.buf.push(0x55); // push rbp
        self.buf.extend([rex(true, false, false, false), 0x89, modrm(3, RSP, RBP)]); // mov rbp, rsp
        if self.mf.frame_size > 0 {
            self.buf.extend([rex(true, false, false, false), 0x81, modrm(3, 5, RSP)]);
            self.buf.extend(self.mf.frame_size.to_le_bytes());
        }
    }

    fn epilogue(&mut self) {
        self.buf.push(0xC9); // leave
        self.buf.push(0xC3); // ret
    }

    fn store_incoming_params(&mut self) {
        for i in 0..self.mf.num_params as usize {
            if i >= SYSV_INT_ARG_REGS.len() {
                break; // stack-passed params beyond the 6th: not modeled.
            }
            let vreg = i as u32 + 1;
            let slot = self.mf.slot_of(vreg);
            self.store_reg_to_slot(SYSV_INT_ARG_REGS[i], slot);
        }
    }

    fn load_slot_to_reg(&mut self, reg: u8, slot: i32) {
        self.buf.push(rex(true, reg >= 8, false, false));
        self.buf.push(0x8B); // mov r64, r/m64
        self.buf.push(modrm(2, reg, RBP));
        self.buf.extend(slot.to_le_bytes());
    }

    fn store_reg_to_slot(&mut self, reg: u8, slot: i32) {
        self.buf.push(rex(true, reg >= 8, false, false));
        self.buf.push(0x89); // mov r/m64, r64
        self.buf.push(modrm(2, reg, RBP));
        self.buf.extend(slot.to_le_bytes());
    }

    fn mov_imm64(&mut self, reg: u8, imm: i64) {
        self.buf.push(rex(true, false, false, reg >= 8));
        self.buf.push(0xB8 + (reg & 7));
        self.buf.extend(imm.to_le_bytes());
    }

    fn load_addr_to_reg(&mut self, reg: u8, stack_off: i32) {
        // lea reg, [rbp + stack_off]
        self.buf.push(rex(true, reg >= 8, false, false));
        self.buf.push(0x8D);
        self.buf.push(modrm(2, reg, RBP));
        self.buf.extend(stack_off.to_le_bytes());
    }

    /// Load an `MArg` into `reg`. `vreg`/`Imm` are the only shapes the
    /// integer path expects to see; `Sym` is resolved via an Abs64
    /// relocation against a scratch load site (used for global addresses).
    fn load_arg(&mut self, reg: u8, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(v) => self.load_slot_to_reg(reg, self.mf.slot_of(*v)),
            MArg::Imm(i) => self.mov_imm64(reg, *i),
            MArg::FImm(f) => self.mov_imm64(reg, f.to_bits() as i64),
            MArg::Sym(name) => {
                self.mov_imm64(reg, 0);
                let patch_off = self.buf.len() - 8;
                self.relocs.push(Relocation {
                    offset: patch_off as u32,
                    symbol: name.clone(),
                    kind: RelocKind::Abs64,
                    addend: 0,
                });
            }
        }
        Ok(())
    }

    fn load_farg(&mut self, xmm: u8, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(v) => self.load_slot_to_xmm(xmm, self.mf.slot_of(*v)),
            MArg::FImm(f) => {
                self.mov_imm64(RAX, f.to_bits() as i64);
                self.movq_gpr_to_xmm(xmm, RAX);
            }
            MArg::Imm(i) => {
                self.mov_imm64(RAX, *i);
                self.movq_gpr_to_xmm(xmm, RAX);
            }
            MArg::Sym(_) => {
                return Err(CodegenError::Other(
                    "symbol operand not valid for a float op".into(),
                ))
            }
        }
        Ok(())
    }

    /// `movq xmm, r64`: bit-reinterprets a GPR into an XMM register, used to
    /// materialize float immediates without a stack round-trip.
    fn movq_gpr_to_xmm(&mut self, xmm: u8, gpr: u8) {
        self.buf.push(0x66);
        self.buf.push(rex(true, xmm >= 8, false, gpr >= 8));
        self.buf.extend([0x0F, 0x6E, modrm(3, xmm, gpr)]);
    }

    fn load_slot_to_xmm(&mut self, xmm: u8, slot: i32) {
        self.buf.extend([0xF2, 0x0F, 0x10, modrm(2, xmm, RBP)]);
        self.buf.extend(slot.to_le_bytes());
    }

    fn store_xmm_to_slot(&mut self, xmm: u8, slot: i32) {
        self.buf.extend([0xF2, 0x0F, 0x11, modrm(2, xmm, RBP)]);
        self.buf.extend(slot.to_le_bytes());
    }

    fn store_dest(&mut self, dest: Option<u32>, reg: u8) {
        if let Some(v) = dest {
            self.store_reg_to_slot(reg, self.mf.slot_of(v));
        }
    }

    fn store_fdest(&mut self, dest: Option<u32>, xmm: u8) {
        if let Some(v) = dest {
            self.store_xmm_to_slot(xmm, self.mf.slot_of(v));
        }
    }

    fn int_binop_opcode(op: &MOp) -> Option<(u8, bool)> {
        // (primary opcode byte, is_two_byte_0f_af_imul)
        match op {
            MOp::Add => Some((0x01, false)),
            MOp::Sub => Some((0x29, false)),
            MOp::And => Some((0x21, false)),
            MOp::Or => Some((0x09, false)),
            MOp::Xor => Some((0x31, false)),
            MOp::Mul => Some((0xAF, true)),
            _ => None,
        }
    }

    fn encode_inst(&mut self, inst: &crate::mach::MInst) -> CodegenResult<()> {
        match &inst.op {
            MOp::MovImm | MOp::MovReg | MOp::Bitcast | MOp::PtrToInt | MOp::IntToPtr
            | MOp::Trunc | MOp::ZExt | MOp::SExt => {
                self.load_arg(RAX, &inst.args[0])?;
                self.store_dest(inst.dest, RAX);
            }
            op if Self::int_binop_opcode(op).is_some() => {
                self.load_arg(RAX, &inst.args[0])?;
                self.load_arg(RCX, &inst.args[1])?;
                let (opcode, is_imul) = Self::int_binop_opcode(op).unwrap();
                if is_imul {
                    self.buf.extend([rex(true, false, false, false), 0x0F, opcode, modrm(3, RAX, RCX)]);
                } else {
                    self.buf.extend([rex(true, false, false, false), opcode, modrm(3, RCX, RAX)]);
                }
                self.store_dest(inst.dest, RAX);
            }
            MOp::SDiv | MOp::UDiv | MOp::SRem | MOp::URem => {
                self.load_arg(RAX, &inst.args[0])?;
                self.load_arg(RCX, &inst.args[1])?;
                match inst.op {
                    MOp::SDiv | MOp::SRem => {
                        self.buf.extend([rex(true, false, false, false), 0x99]); // cqo
                        self.buf.extend([rex(true, false, false, false), 0xF7, modrm(3, 7, RCX)]); // idiv rcx
                    }
                    _ => {
                        self.buf.extend([rex(true, false, false, false), 0x31, modrm(3, RDX, RDX)]); // xor rdx,rdx
                        self.buf.extend([rex(true, false, false, false), 0xF7, modrm(3, 6, RCX)]); // div rcx
                    }
                }
                let result_reg = match inst.op {
                    MOp::SDiv | MOp::UDiv => RAX,
                    _ => RDX,
                };
                self.store_dest(inst.dest, result_reg);
            }
            MOp::Shl | MOp::LShr | MOp::AShr => {
                self.load_arg(RAX, &inst.args[0])?;
                self.load_arg(RCX, &inst.args[1])?;
                let ext = match inst.op {
                    MOp::Shl => 4,
                    MOp::LShr => 5,
                    _ => 7,
                };
                self.buf.extend([rex(true, false, false, false), 0xD3, modrm(3, ext, RAX)]);
                self.store_dest(inst.dest, RAX);
            }
            MOp::Icmp(pred) => {
                self.load_arg(RAX, &inst.args[0])?;
                self.load_arg(RCX, &inst.args[1])?;
                self.buf.extend([rex(true, false, false, false), 0x39, modrm(3, RCX, RAX)]);
                self.emit_setcc_icmp(*pred, RAX);
                self.store_dest(inst.dest, RAX);
            }
            MOp::Fcmp(pred) => {
                self.load_farg(0, &inst.args[0])?;
                self.load_farg(1, &inst.args[1])?;
                self.buf.extend([0x66, 0x0F, 0x2E, modrm(3, 0, 1)]); // ucomisd xmm0, xmm1
                self.emit_setcc_fcmp(*pred, RAX);
                self.store_dest(inst.dest, RAX);
            }
            MOp::FAdd | MOp::FSub | MOp::FMul | MOp::FDiv => {
                self.load_farg(0, &inst.args[0])?;
                self.load_farg(1, &inst.args[1])?;
                let opcode = match inst.op {
                    MOp::FAdd => 0x58,
                    MOp::FSub => 0x5C,
                    MOp::FMul => 0x59,
                    _ => 0x5E,
                };
                self.buf.extend([0xF2, 0x0F, opcode, modrm(3, 0, 1)]);
                self.store_fdest(inst.dest, 0);
            }
            MOp::SiToFp | MOp::UiToFp => {
                // Unsigned-to-float uses the same signed conversion path;
                // values above i64::MAX round incorrectly.
                self.load_arg(RAX, &inst.args[0])?;
                self.buf.extend([0xF2, rex(true, false, false, false), 0x0F, 0x2A, modrm(3, 0, RAX)]);
                self.store_fdest(inst.dest, 0);
            }
            MOp::FpToSi | MOp::FpToUi => {
                self.load_farg(0, &inst.args[0])?;
                self.buf.extend([0xF2, rex(true, false, false, false), 0x0F, 0x2C, modrm(3, RAX, 0)]);
                self.store_dest(inst.dest, RAX);
            }
            MOp::FpTrunc | MOp::FpExt => {
                self.load_farg(0, &inst.args[0])?;
                self.store_fdest(inst.dest, 0);
            }
            MOp::Load { width } => {
                self.load_arg(RAX, &inst.args[0])?;
                self.emit_load_mem(RCX, RAX, *width);
                self.store_dest(inst.dest, RCX);
            }
            MOp::Store { width } => {
                self.load_arg(RAX, &inst.args[0])?;
                self.load_arg(RCX, &inst.args[1])?;
                self.emit_store_mem(RAX, RCX, *width);
            }
            MOp::Gep { offset } => {
                self.load_arg(RAX, &inst.args[0])?;
                if *offset != 0 {
                    self.buf.extend([rex(true, false, false, false), 0x81, modrm(3, 0, RAX)]);
                    self.buf.extend((*offset as i32).to_le_bytes());
                }
                self.store_dest(inst.dest, RAX);
            }
            MOp::Select => {
                self.load_arg(RCX, &inst.args[2])?; // else value (default)
                self.load_arg(RAX, &inst.args[1])?; // then value
                self.load_arg(RDX, &inst.args[0])?; // cond
                self.buf.extend([rex(true, false, false, false), 0x85, modrm(3, RDX, RDX)]); // test cond,cond
                self.buf.extend([rex(true, false, false, false), 0x0F, 0x45, modrm(3, RCX, RAX)]); // cmovne rcx,rax
                self.store_dest(inst.dest, RCX);
            }
            MOp::Alloca { .. } => {
                let dest = inst
                    .dest
                    .ok_or_else(|| CodegenError::Other("alloca with no dest".into()))?;
                let off = *self.mf.alloca_slots.get(&dest).ok_or_else(|| {
                    CodegenError::Other(format!("no stack slot assigned for alloca %{dest}"))
                })?;
                self.load_addr_to_reg(RAX, off);
                self.store_dest(inst.dest, RAX);
            }
            MOp::Memcpy { .. } | MOp::Memmove { .. } => {
                self.load_arg(RDI, &inst.args[0])?;
                self.load_arg(RSI, &inst.args[1])?;
                self.load_arg(RCX, &inst.args[2])?;
                self.buf.extend([0xF3, 0xA4]); // rep movsb
            }
            MOp::Memset { .. } => {
                self.load_arg(RDI, &inst.args[0])?;
                self.load_arg(RAX, &inst.args[1])?;
                self.load_arg(RCX, &inst.args[2])?;
                self.buf.extend([0xF3, 0xAA]); // rep stosb
            }
            MOp::Call { name, .. } => self.emit_call(name, &inst.args, inst.dest)?,
            MOp::Trap => self.buf.push(0xCC), // int3
            MOp::Unreachable => self.buf.push(0xCC),
        }
        Ok(())
    }

    fn emit_load_mem(&mut self, dst: u8, addr_reg: u8, width: u8) {
        match width {
            8 => self.buf.extend([rex(true, dst >= 8, false, addr_reg >= 8), 0x8B, modrm(0, dst, addr_reg)]),
            4 => self.buf.extend([0x8B, modrm(0, dst, addr_reg)]),
            2 => self.buf.extend([0x66, 0x0F, 0xB7, modrm(0, dst, addr_reg)]),
            _ => self.buf.extend([0x0F, 0xB6, modrm(0, dst, addr_reg)]),
        }
    }

    fn emit_store_mem(&mut self, addr_reg: u8, src: u8, width: u8) {
        match width {
            8 => self.buf.extend([rex(true, src >= 8, false, addr_reg >= 8), 0x89, modrm(0, src, addr_reg)]),
            4 => self.buf.extend([0x89, modrm(0, src, addr_reg)]),
            2 => self.buf.extend([0x66, 0x89, modrm(0, src, addr_reg)]),
            _ => self.buf.extend([0x88, modrm(0, src, addr_reg)]),
        }
    }

    fn emit_setcc_icmp(&mut self, pred: IcmpPred, dst: u8) {
        let cc = match pred {
            IcmpPred::Eq => 0x94,
            IcmpPred::Ne => 0x95,
            IcmpPred::Slt => 0x9C,
            IcmpPred::Sle => 0x9E,
            IcmpPred::Sgt => 0x9F,
            IcmpPred::Sge => 0x9D,
            IcmpPred::Ult => 0x92,
            IcmpPred::Ule => 0x96,
            IcmpPred::Ugt => 0x97,
            IcmpPred::Uge => 0x93,
        };
        self.buf.extend([0x0F, cc, modrm(3, 0, dst)]); // setcc dst8
        self.buf.extend([0x0F, 0xB6, modrm(3, dst, dst)]); // movzx dst, dst8
    }

    /// `ucomisd`/`ucomiss` set ZF/PF/CF per IEEE-754 (PF=1 iff either
    /// operand is NaN); most predicates need a single flag test, but the
    /// ordered/unordered split requires ANDing or ORing in the parity
    /// flag rather than reusing an integer condition code.
    fn emit_setcc_fcmp(&mut self, pred: FcmpPred, dst: u8) {
        let direct_cc = match pred {
            FcmpPred::One => Some(0x95), // setne: unordered also sets ZF=1, so excluded already
            FcmpPred::Ogt => Some(0x97), // seta: unordered sets CF=1, so excluded already
            FcmpPred::Oge => Some(0x93), // setae: ditto
            FcmpPred::Ueq => Some(0x94), // sete: unordered also sets ZF=1, included already
            FcmpPred::Ult => Some(0x92), // setb: unordered also sets CF=1, included already
            FcmpPred::Ule => Some(0x96), // setbe: ditto
            FcmpPred::Ord => Some(0x9B), // setnp
            FcmpPred::Uno => Some(0x9A), // setp
            _ => None,
        };
        if let Some(cc) = direct_cc {
            self.buf.extend([0x0F, cc, modrm(3, 0, dst)]);
            self.buf.extend([0x0F, 0xB6, modrm(3, dst, dst)]);
            return;
        }
        let (cc, combine_and) = match pred {
            FcmpPred::Oeq => (0x94, true),  // sete  AND setnp
            FcmpPred::Olt => (0x92, true),  // setb  AND setnp
            FcmpPred::Ole => (0x96, true),  // setbe AND setnp
            FcmpPred::Une => (0x95, false), // setne OR  setp
            FcmpPred::Ugt => (0x97, false), // seta  OR  setp
            FcmpPred::Uge => (0x93, false), // setae OR  setp
            _ => unreachable!("direct_cc covers every other predicate"),
        };
        let scratch = if dst == RAX { RCX } else { RAX };
        self.buf.extend([0x0F, cc, modrm(3, 0, dst)]);
        self.buf.extend([0x0F, 0xB6, modrm(3, dst, dst)]);
        self.buf.extend([0x0F, 0x9A, modrm(3, 0, scratch)]); // setp
        self.buf.extend([0x0F, 0xB6, modrm(3, scratch, scratch)]);
        let op = if combine_and { 0x21 } else { 0x09 }; // and / or
        self.buf.extend([rex(true, false, false, false), op, modrm(3, scratch, dst)]);
    }

    /// Branch variant of `emit_setcc_fcmp`: jumps to `then_blk` when `pred`
    /// holds, else falls through to a jump to `else_blk`.
    fn emit_jcc_fcmp(&mut self, pred: FcmpPred, then_blk: usize, else_blk: usize) {
        let direct_cc = match pred {
            FcmpPred::One => Some(0x85),
            FcmpPred::Ogt => Some(0x87),
            FcmpPred::Oge => Some(0x83),
            FcmpPred::Ueq => Some(0x84),
            FcmpPred::Ult => Some(0x82),
            FcmpPred::Ule => Some(0x86),
            FcmpPred::Ord => Some(0x8B),
            FcmpPred::Uno => Some(0x8A),
            _ => None,
        };
        if let Some(cc) = direct_cc {
            self.emit_jcc(cc, then_blk);
            self.emit_jmp(else_blk);
            return;
        }
        // Ordered predicates must route a NaN (PF=1) straight to else_blk
        // before testing the ordered condition; unordered predicates must
        // route it straight to then_blk instead.
        let (cc, nan_to_then) = match pred {
            FcmpPred::Oeq => (0x84, false),
            FcmpPred::Olt => (0x82, false),
            FcmpPred::Ole => (0x86, false),
            FcmpPred::Une => (0x85, true),
            FcmpPred::Ugt => (0x87, true),
            FcmpPred::Uge => (0x83, true),
            _ => unreachable!("direct_cc covers every other predicate"),
        };
        self.emit_jcc(0x8A, if nan_to_then { then_blk } else { else_blk }); // jp
        self.emit_jcc(cc, then_blk);
        self.emit_jmp(else_blk);
    }

    fn emit_call(&mut self, name: &str, args: &[MArg], dest: Option<u32>) -> CodegenResult<()> {
        for (i, arg) in args.iter().enumerate() {
            if i >= SYSV_INT_ARG_REGS.len() {
                return Err(CodegenError::Other(
                    "more than 6 call arguments not supported".into(),
                ));
            }
            self.load_arg(SYSV_INT_ARG_REGS[i], arg)?;
        }
        self.buf.push(0xE8);
        let patch_off = self.buf.len();
        self.buf.extend([0u8; 4]);
        self.relocs.push(Relocation {
            offset: patch_off as u32,
            symbol: name.to_string(),
            kind: RelocKind::Plt32,
            addend: -4,
        });
        self.store_dest(dest, RAX);
        Ok(())
    }

    fn encode_term(&mut self, term: &MTerm) -> CodegenResult<()> {
        match term {
            MTerm::Ret(arg) => {
                if let Some(arg) = arg {
                    self.load_arg(RAX, arg)?;
                }
                self.epilogue();
            }
            MTerm::Jump(target) => self.emit_jmp(*target),
            MTerm::CondBr {
                cond,
                then_blk,
                else_blk,
            } => {
                self.load_arg(RAX, cond)?;
                self.buf.extend([rex(true, false, false, false), 0x85, modrm(3, RAX, RAX)]); // test
                self.emit_jcc(0x85, *then_blk); // jne then
                self.emit_jmp(*else_blk);
            }
            MTerm::FusedCondBr {
                cmp,
                then_blk,
                else_blk,
            } => {
                if let Some(fpred) = cmp.fpred {
                    self.load_farg(0, &cmp.lhs)?;
                    self.load_farg(1, &cmp.rhs)?;
                    self.buf.extend([0x66, 0x0F, 0x2E, modrm(3, 0, 1)]); // ucomisd xmm0, xmm1
                    self.emit_jcc_fcmp(fpred, *then_blk, *else_blk);
                } else {
                    self.load_arg(RAX, &cmp.lhs)?;
                    self.load_arg(RCX, &cmp.rhs)?;
                    self.buf.extend([rex(true, false, false, false), 0x39, modrm(3, RCX, RAX)]);
                    let cc = match cmp.pred {
                        IcmpPred::Eq => 0x84,
                        IcmpPred::Ne => 0x85,
                        IcmpPred::Slt => 0x8C,
                        IcmpPred::Sle => 0x8E,
                        IcmpPred::Sgt => 0x8F,
                        IcmpPred::Sge => 0x8D,
                        IcmpPred::Ult => 0x82,
                        IcmpPred::Ule => 0x86,
                        IcmpPred::Ugt => 0x87,
                        IcmpPred::Uge => 0x83,
                    };
                    self.emit_jcc(cc, *then_blk);
                    self.emit_jmp(*else_blk);
                }
            }
            MTerm::Switch {
                scrutinee,
                cases,
                default,
            } => {
                self.load_arg(RAX, scrutinee)?;
                for (val, target) in cases {
                    self.mov_imm64(RCX, *val);
                    self.buf.extend([rex(true, false, false, false), 0x39, modrm(3, RCX, RAX)]);
                    self.emit_jcc(0x84, *target);
                }
                self.emit_jmp(*default);
            }
            MTerm::Unreachable => self.buf.push(0xCC),
        }
        Ok(())
    }

    fn emit_jmp(&mut self, target: usize) {
        self.buf.push(0xE9);
        let patch_off = self.buf.len();
        self.buf.extend([0u8; 4]);
        self.jump_patches.push((patch_off, self.buf.len(), target));
    }

    fn emit_jcc(&mut self, cc: u8, target: usize) {
        self.buf.extend([0x0F, cc]);
        let patch_off = self.buf.len();
        self.buf.extend([0u8; 4]);
        self.jump_patches.push((patch_off, self.buf.len(), target));
    }
}

/// Not used directly, but documents the register numbering this module
/// assumes throughout; kept here rather than inlined at each call site so a
/// reviewer can check encodings against one table.
#[allow(dead_code)]
fn register_table() -> HashMap<&'static str, u8> {
    HashMap::from([
        ("rax", RAX),
        ("rcx", RCX),
        ("rdx", RDX),
        ("rbx", RBX),
        ("rsp", RSP),
        ("rbp", RBP),
        ("rsi", RSI),
        ("rdi", RDI),
    ])
}
