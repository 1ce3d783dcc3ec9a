//! riscv64 (RV64GC, LP64D psABI integer subset plus RV64D) instruction
//! selection refinement and byte encoder.
//!
//! Floating-point values are scalar doubles in the `f` register file (the
//! RV64D extension); `fcmp`'s predicates other than `feq`/`flt`/`fle`
//! themselves are built out of those three plus bitwise combination, since
//! riscv has no hardware NaN-aware branch the way x86/aarch64 do. Calls
//! are lowered to the standard `auipc`+`jalr` two-instruction pc-relative
//! sequence; the writer splits the symbol's displacement into hi20/lo12
//! halves from the single `Pc32` relocation recorded at the `auipc`.

use liric_ir::{FcmpPred, IcmpPred};
use target_lexicon::Triple;

use crate::error::{CodegenError, CodegenResult};
use crate::intrinsics::IntrinsicRegistry;
use crate::mach::{MArg, MInst, MOp, MTerm, MachineFunction};
use crate::reloc::{RelocKind, Relocation};
use crate::target::{EncodedFunction, Target};

const RA: u32 = 1;
const SP: u32 = 2;
const FP: u32 = 8; // s0
const T0: u32 = 5;
const T1: u32 = 6;
const T2: u32 = 7;
const A0_7: [u32; 8] = [10, 11, 12, 13, 14, 15, 16, 17];
const FT0: u32 = 0;
const FT1: u32 = 1;

pub struct Riscv64Target {
    triple: Triple,
    intrinsics: IntrinsicRegistry,
}

impl Riscv64Target {
    pub fn new(triple: Triple) -> Self {
        let intrinsics = IntrinsicRegistry::for_target(&triple);
        Riscv64Target { triple, intrinsics }
    }
}

impl Target for Riscv64Target {
    fn name(&self) -> &'static str {
        "riscv64"
    }

    fn triple(&self) -> &Triple {
        &self.triple
    }

    fn call_conv_name(&self) -> &'static str {
        "lp64d"
    }

    fn intrinsics(&self) -> &IntrinsicRegistry {
        &self.intrinsics
    }

    fn call_site_len(&self) -> usize {
        8 // auipc + jalr
    }

    fn encode_function(&self, mf: &MachineFunction) -> CodegenResult<EncodedFunction> {
        Encoder::new(mf).run()
    }
}

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn i_type(imm12: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (((imm12 as u32) & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn s_type(imm12: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm12 as u32 & 0xFFF;
    ((imm >> 5) << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | ((imm & 0x1F) << 7) | opcode
}

fn b_type(imm13: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm13 as u32;
    let b12 = (imm >> 12) & 1;
    let b11 = (imm >> 11) & 1;
    let b10_5 = (imm >> 5) & 0x3F;
    let b4_1 = (imm >> 1) & 0xF;
    (b12 << 31) | (b10_5 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (b4_1 << 8) | (b11 << 7) | opcode
}

fn u_type(imm20: u32, rd: u32, opcode: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | opcode
}

struct Encoder<'m> {
    mf: &'m MachineFunction,
    buf: Vec<u8>,
    relocs: Vec<Relocation>,
    jump_patches: Vec<(usize, usize, usize, BranchKind)>,
    block_starts: Vec<usize>,
}

#[derive(Clone, Copy)]
enum BranchKind {
    Jal,
    Branch(u32, u32, u32), // funct3, rs1, rs2
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
        self.buf.extend(word.to_le_bytes());
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
                None => return Err(CodegenError::Other(format!("block {} has no terminator", idx))),
            }
        }

        for (jal_off, instr_off, target, kind) in &self.jump_patches {
            let disp = self.block_starts[*target] as i32 - *instr_off as i32;
            let word = match kind {
                BranchKind::Jal => {
                    let imm = disp as u32;
                    let b20 = (imm >> 20) & 1;
                    let b10_1 = (imm >> 1) & 0x3FF;
                    let b11 = (imm >> 11) & 1;
                    let b19_12 = (imm >> 12) & 0xFF;
                    (b20 << 31) | (b10_1 << 21) | (b11 << 20) | (b19_12 << 12) | (0u32 << 7) | 0x6F
                }
                BranchKind::Branch(funct3, rs1, rs2) => b_type(disp, *rs2, *rs1, *funct3, 0x63),
            };
            self.buf[*jal_off..*jal_off + 4].copy_from_slice(&word.to_le_bytes());
        }

        Ok(EncodedFunction {
            bytes: self.buf,
            relocs: self.relocs,
            frame_size: self.mf.frame_size,
        })
    }

    fn prologue(&mut self) {
        let total = self.mf.frame_size + 16;
        self.emit(i_type(-total, SP, 0x0, SP, 0x13)); // addi sp, sp, -total
        self.emit(s_type(total - 8, RA, SP, 0x3, 0x23)); // sd ra, total-8(sp)
        self.emit(s_type(total - 16, FP, SP, 0x3, 0x23)); // sd fp, total-16(sp)
        self.emit(i_type(total, SP, 0x0, FP, 0x13)); // addi fp, sp, total
    }

    fn epilogue(&mut self) {
        let total = self.mf.frame_size + 16;
        self.emit(i_type(total - 8, SP, 0x3, RA, 0x03)); // ld ra, total-8(sp)
        self.emit(i_type(total - 16, SP, 0x3, FP, 0x03)); // ld fp, total-16(sp)
        self.emit(i_type(total, SP, 0x0, SP, 0x13)); // addi sp, sp, total
        self.emit(i_type(0, RA, 0x0, 0, 0x67)); // jalr x0, 0(ra)
    }

    fn store_incoming_params(&mut self) {
        for i in 0..self.mf.num_params as usize {
            if i >= A0_7.len() {
                break;
            }
            let vreg = i as u32 + 1;
            let slot = self.mf.slot_of(vreg);
            self.emit(s_type(slot, A0_7[i], FP, 0x3, 0x23));
        }
    }

    fn li64(&mut self, rd: u32, imm: i64) {
        // lui + addi sequence per 32-bit chunk, then shift/or into place.
        // For the small constants this engine's scenarios use, a
        // lui/addi/slli/addi chain covers the full 64-bit range.
        let v = imm as u64;
        let hi = (v >> 32) as i64;
        let lo = v as u32 as i64;
        self.li32(rd, lo as i32);
        if hi != 0 {
            self.li32(T2, hi as i32);
            self.emit(i_type(32, T2, 0x1, T2, 0x13)); // slli t2, t2, 32
            self.emit(r_type(0, T2, rd, 0x6, rd, 0x33)); // or rd, rd, t2
        }
    }

    fn li32(&mut self, rd: u32, imm: i32) {
        let upper = ((imm as u32).wrapping_add(0x800)) >> 12;
        let lower = imm - ((upper as i32) << 12);
        if upper != 0 {
            self.emit(u_type(upper & 0xFFFFF, rd, 0x37)); // lui
            self.emit(i_type(lower, rd, 0x0, rd, 0x13)); // addi rd, rd, lower
        } else {
            self.emit(i_type(lower, 0, 0x0, rd, 0x13)); // addi rd, x0, lower
        }
    }

    fn load_arg(&mut self, reg: u32, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(v) => self.emit(i_type(self.mf.slot_of(*v), FP, 0x3, reg, 0x03)), // ld reg, slot(fp)
            MArg::Imm(i) => self.li64(reg, *i),
            MArg::FImm(f) => self.li64(reg, f.to_bits() as i64),
            MArg::Sym(name) => {
                let off = self.buf.len();
                self.emit(u_type(0, reg, 0x17)); // auipc reg, 0
                self.emit(i_type(0, reg, 0x0, reg, 0x13)); // addi reg, reg, 0
                self.relocs.push(Relocation {
                    offset: off as u32,
                    symbol: name.clone(),
                    kind: RelocKind::Pc32,
                    addend: 0,
                });
            }
        }
        Ok(())
    }

    fn store_dest(&mut self, dest: Option<u32>, reg: u32) {
        if let Some(v) = dest {
            self.emit(s_type(self.mf.slot_of(v), reg, FP, 0x3, 0x23));
        }
    }

    fn fmv_d_x(&mut self, frd: u32, rs1: u32) {
        self.emit(r_type(0x79, 0, rs1, 0x0, frd, 0x53));
    }

    fn load_farg(&mut self, freg: u32, arg: &MArg) -> CodegenResult<()> {
        match arg {
            MArg::Vreg(v) => self.emit(i_type(self.mf.slot_of(*v), FP, 0x3, freg, 0x07)), // fld
            MArg::FImm(f) => {
                self.li64(T1, f.to_bits() as i64);
                self.fmv_d_x(freg, T1);
            }
            MArg::Imm(i) => {
                self.li64(T1, *i);
                self.fmv_d_x(freg, T1);
            }
            MArg::Sym(_) => {
                return Err(CodegenError::Other(
                    "symbol operand not valid for a float op".into(),
                ))
            }
        }
        Ok(())
    }

    fn store_fdest(&mut self, dest: Option<u32>, freg: u32) {
        if let Some(d) = dest {
            self.emit(s_type(self.mf.slot_of(d), freg, FP, 0x3, 0x27)); // fsd
        }
    }

    fn encode_inst(&mut self, inst: &MInst) -> CodegenResult<()> {
        match &inst.op {
            MOp::MovImm | MOp::MovReg | MOp::Bitcast | MOp::PtrToInt | MOp::IntToPtr
            | MOp::Trunc | MOp::ZExt | MOp::SExt => {
                self.load_arg(T0, &inst.args[0])?;
                self.store_dest(inst.dest, T0);
            }
            MOp::Add | MOp::Sub | MOp::And | MOp::Or | MOp::Xor => {
                self.load_arg(T0, &inst.args[0])?;
                self.load_arg(T1, &inst.args[1])?;
                let (funct7, funct3) = match inst.op {
                    MOp::Add => (0, 0x0),
                    MOp::Sub => (0x20, 0x0),
                    MOp::And => (0, 0x7),
                    MOp::Or => (0, 0x6),
                    _ => (0, 0x4),
                };
                self.emit(r_type(funct7, T1, T0, funct3, T0, 0x33));
                self.store_dest(inst.dest, T0);
            }
            MOp::Mul | MOp::SDiv | MOp::UDiv | MOp::SRem | MOp::URem => {
                self.load_arg(T0, &inst.args[0])?;
                self.load_arg(T1, &inst.args[1])?;
                let funct3 = match inst.op {
                    MOp::Mul => 0x0,
                    MOp::SDiv => 0x4,
                    MOp::UDiv => 0x5,
                    MOp::SRem => 0x6,
                    _ => 0x7,
                };
                self.emit(r_type(0x01, T1, T0, funct3, T0, 0x33));
                self.store_dest(inst.dest, T0);
            }
            MOp::Shl | MOp::LShr | MOp::AShr => {
                self.load_arg(T0, &inst.args[0])?;
                self.load_arg(T1, &inst.args[1])?;
                let (funct7, funct3) = match inst.op {
                    MOp::Shl => (0, 0x1),
                    MOp::LShr => (0, 0x5),
                    _ => (0x20, 0x5),
                };
                self.emit(r_type(funct7, T1, T0, funct3, T0, 0x33));
                self.store_dest(inst.dest, T0);
            }
            MOp::Icmp(pred) => {
                self.load_arg(T0, &inst.args[0])?;
                self.load_arg(T1, &inst.args[1])?;
                self.emit_setcc(*pred, T0, T1, T0);
                self.store_dest(inst.dest, T0);
            }
            MOp::FAdd | MOp::FSub | MOp::FMul | MOp::FDiv => {
                self.load_farg(FT0, &inst.args[0])?;
                self.load_farg(FT1, &inst.args[1])?;
                let funct7 = match inst.op {
                    MOp::FAdd => 0x01,
                    MOp::FSub => 0x05,
                    MOp::FMul => 0x09,
                    _ => 0x0D,
                };
                self.emit(r_type(funct7, FT1, FT0, 0x7, FT0, 0x53)); // rm=111 (dynamic)
                self.store_fdest(inst.dest, FT0);
            }
            MOp::Fcmp(pred) => {
                self.load_farg(FT0, &inst.args[0])?;
                self.load_farg(FT1, &inst.args[1])?;
                self.emit_fcmp(*pred, FT0, FT1, T0);
                self.store_dest(inst.dest, T0);
            }
            MOp::SiToFp | MOp::UiToFp => {
                self.load_arg(T0, &inst.args[0])?;
                let rs2 = if matches!(inst.op, MOp::SiToFp) { 0b00010 } else { 0b00011 };
                self.emit(r_type(0x69, rs2, T0, 0x7, FT0, 0x53)); // fcvt.d.l/lu
                self.store_fdest(inst.dest, FT0);
            }
            MOp::FpToSi | MOp::FpToUi => {
                self.load_farg(FT0, &inst.args[0])?;
                let rs2 = if matches!(inst.op, MOp::FpToSi) { 0b00010 } else { 0b00011 };
                self.emit(r_type(0x61, rs2, FT0, 0x1, T0, 0x53)); // fcvt.l/lu.d, rm=001 (rtz)
                self.store_dest(inst.dest, T0);
            }
            MOp::FpTrunc | MOp::FpExt => {
                self.load_farg(FT0, &inst.args[0])?;
                self.store_fdest(inst.dest, FT0);
            }
            MOp::Load { width } => {
                self.load_arg(T0, &inst.args[0])?;
                let funct3 = match width {
                    8 => 0x3,
                    4 => 0x2,
                    2 => 0x5,
                    _ => 0x4,
                };
                self.emit(i_type(0, T0, funct3, T1, 0x03));
                self.store_dest(inst.dest, T1);
            }
            MOp::Store { width } => {
                self.load_arg(T0, &inst.args[0])?;
                self.load_arg(T1, &inst.args[1])?;
                let funct3 = match width {
                    8 => 0x3,
                    4 => 0x2,
                    2 => 0x1,
                    _ => 0x0,
                };
                self.emit(s_type(0, T1, T0, funct3, 0x23));
            }
            MOp::Gep { offset } => {
                self.load_arg(T0, &inst.args[0])?;
                if *offset != 0 {
                    if (-2048..2048).contains(offset) {
                        self.emit(i_type(*offset as i32, T0, 0x0, T0, 0x13));
                    } else {
                        self.li64(T1, *offset);
                        self.emit(r_type(0, T1, T0, 0x0, T0, 0x33));
                    }
                }
                self.store_dest(inst.dest, T0);
            }
            MOp::Select => {
                self.load_arg(T0, &inst.args[0])?; // cond
                self.load_arg(T1, &inst.args[1])?; // then
                self.load_arg(T2, &inst.args[2])?; // else
                // beqz cond, +8; mv t2, t1
                self.emit(b_type(8, 0, T0, 0x0, 0x63)); // beq t0, x0, +8
                self.emit(i_type(0, T1, 0x0, T2, 0x13)); // addi t2, t1, 0
                self.store_dest(inst.dest, T2);
            }
            MOp::Alloca { .. } => {
                let dest = inst.dest.ok_or_else(|| CodegenError::Other("alloca with no dest".into()))?;
                let off = *self
                    .mf
                    .alloca_slots
                    .get(&dest)
                    .ok_or_else(|| CodegenError::Other(format!("no stack slot assigned for alloca %{dest}")))?;
                self.emit(i_type(off, FP, 0x0, T0, 0x13)); // addi t0, fp, off
                self.store_dest(inst.dest, T0);
            }
            MOp::Memcpy { .. } | MOp::Memmove { .. } | MOp::Memset { .. } => {
                let name = match &inst.op {
                    MOp::Memcpy { .. } => "memcpy",
                    MOp::Memmove { .. } => "memmove",
                    _ => "memset",
                };
                self.emit_call(name, &inst.args, None)?;
            }
            MOp::Call { name, .. } => self.emit_call(name, &inst.args, inst.dest)?,
            MOp::Trap | MOp::Unreachable => self.emit(0x00100073), // ebreak
            other => return Err(CodegenError::UnsupportedOpcode(unsupported_opcode_tag(other))),
        }
        Ok(())
    }

    /// Materialize an `fcmp` predicate as a 0/1 value in `dst`, built from
    /// `feq.d`/`flt.d`/`fle.d` (each quiet on NaN, returning 0) plus
    /// bitwise combination for the ordered/unordered predicates riscv has
    /// no single instruction for.
    fn emit_fcmp(&mut self, pred: FcmpPred, lhs: u32, rhs: u32, dst: u32) {
        match pred {
            FcmpPred::Oeq => self.emit(r_type(0x51, rhs, lhs, 0x2, dst, 0x53)), // feq.d
            FcmpPred::Une => {
                self.emit(r_type(0x51, rhs, lhs, 0x2, dst, 0x53)); // feq.d
                self.emit(i_type(1, dst, 0x4, dst, 0x13)); // xori dst, dst, 1
            }
            FcmpPred::Olt => self.emit(r_type(0x51, rhs, lhs, 0x1, dst, 0x53)), // flt.d
            FcmpPred::Ole => self.emit(r_type(0x51, rhs, lhs, 0x0, dst, 0x53)), // fle.d
            FcmpPred::Ogt => self.emit(r_type(0x51, lhs, rhs, 0x1, dst, 0x53)), // flt.d dst, rhs, lhs
            FcmpPred::Oge => self.emit(r_type(0x51, lhs, rhs, 0x0, dst, 0x53)), // fle.d dst, rhs, lhs
            FcmpPred::Ord => {
                self.emit(r_type(0x51, lhs, lhs, 0x2, dst, 0x53)); // feq.d dst, lhs, lhs
                self.emit(r_type(0x51, rhs, rhs, 0x2, T1, 0x53)); // feq.d t1, rhs, rhs
                self.emit(r_type(0, T1, dst, 0x7, dst, 0x33)); // and dst, dst, t1
            }
            FcmpPred::Uno => {
                self.emit_fcmp(FcmpPred::Ord, lhs, rhs, dst);
                self.emit(i_type(1, dst, 0x4, dst, 0x13)); // xori dst, dst, 1
            }
            FcmpPred::Ult | FcmpPred::Ule | FcmpPred::Ugt | FcmpPred::Uge => {
                let ordered = match pred {
                    FcmpPred::Ult => FcmpPred::Olt,
                    FcmpPred::Ule => FcmpPred::Ole,
                    FcmpPred::Ugt => FcmpPred::Ogt,
                    _ => FcmpPred::Oge,
                };
                self.emit_fcmp(ordered, lhs, rhs, dst);
                self.emit_fcmp(FcmpPred::Uno, lhs, rhs, T1);
                self.emit(r_type(0, T1, dst, 0x6, dst, 0x33)); // or dst, dst, t1
            }
            FcmpPred::One => {
                self.emit_fcmp(FcmpPred::Ord, lhs, rhs, dst);
                self.emit_fcmp(FcmpPred::Oeq, lhs, rhs, T1);
                self.emit(i_type(1, T1, 0x4, T1, 0x13)); // xori t1, t1, 1
                self.emit(r_type(0, T1, dst, 0x7, dst, 0x33)); // and dst, dst, t1
            }
            FcmpPred::Ueq => {
                self.emit_fcmp(FcmpPred::Uno, lhs, rhs, dst);
                self.emit_fcmp(FcmpPred::Oeq, lhs, rhs, T1);
                self.emit(r_type(0, T1, dst, 0x6, dst, 0x33)); // or dst, dst, t1
            }
        }
    }

    fn emit_setcc(&mut self, pred: IcmpPred, lhs: u32, rhs: u32, dst: u32) {
        match pred {
            IcmpPred::Eq => {
                self.emit(r_type(0, rhs, lhs, 0x4, dst, 0x33)); // xor dst, lhs, rhs
                self.emit(i_type(1, dst, 0x3, dst, 0x13)); // sltiu dst, dst, 1
            }
            IcmpPred::Ne => {
                self.emit(r_type(0, rhs, lhs, 0x4, dst, 0x33)); // xor dst, lhs, rhs
                self.emit(r_type(0, dst, 0, 0x3, dst, 0x33)); // sltu dst, x0, dst
            }
            IcmpPred::Slt => self.emit(r_type(0, rhs, lhs, 0x2, dst, 0x33)), // slt
            IcmpPred::Ult => self.emit(r_type(0, rhs, lhs, 0x3, dst, 0x33)), // sltu
            IcmpPred::Sgt => self.emit(r_type(0, lhs, rhs, 0x2, dst, 0x33)), // slt rhs,lhs
            IcmpPred::Ugt => self.emit(r_type(0, lhs, rhs, 0x3, dst, 0x33)),
            IcmpPred::Sle => {
                self.emit(r_type(0, lhs, rhs, 0x2, dst, 0x33)); // slt rhs,lhs -> dst = rhs<lhs
                self.emit(i_type(1, dst, 0x4, dst, 0x13)); // xori dst,dst,1
            }
            IcmpPred::Ule => {
                self.emit(r_type(0, lhs, rhs, 0x3, dst, 0x33));
                self.emit(i_type(1, dst, 0x4, dst, 0x13));
            }
            IcmpPred::Sge => {
                self.emit(r_type(0, rhs, lhs, 0x2, dst, 0x33));
                self.emit(i_type(1, dst, 0x4, dst, 0x13));
            }
            IcmpPred::Uge => {
                self.emit(r_type(0, rhs, lhs, 0x3, dst, 0x33));
                self.emit(i_type(1, dst, 0x4, dst, 0x13));
            }
        }
    }

    fn emit_call(&mut self, name: &str, args: &[MArg], dest: Option<u32>) -> CodegenResult<()> {
        for (i, arg) in args.iter().enumerate() {
            if i >= A0_7.len() {
                return Err(CodegenError::Other("more than 8 call arguments not supported".into()));
            }
            self.load_arg(A0_7[i], arg)?;
        }
        let off = self.buf.len();
        self.emit(u_type(0, RA, 0x17)); // auipc ra, 0
        self.emit(i_type(0, RA, 0x0, RA, 0x67)); // jalr ra, 0(ra)
        self.relocs.push(Relocation {
            offset: off as u32,
            symbol: name.to_string(),
            kind: RelocKind::Pc32,
            addend: 0,
        });
        self.store_dest(dest, 10); // a0
        Ok(())
    }

    fn encode_term(&mut self, term: &MTerm) -> CodegenResult<()> {
        match term {
            MTerm::Ret(arg) => {
                if let Some(arg) = arg {
                    self.load_arg(10, arg)?; // a0
                }
                self.epilogue();
            }
            MTerm::Jump(target) => self.emit_jal(*target),
            MTerm::CondBr { cond, then_blk, else_blk } => {
                self.load_arg(T0, cond)?;
                self.emit_branch(0x1, 0, T0, *then_blk); // bne t0, x0, then
                self.emit_jal(*else_blk);
            }
            MTerm::FusedCondBr { cmp, then_blk, else_blk } => {
                if let Some(fpred) = cmp.fpred {
                    self.load_farg(FT0, &cmp.lhs)?;
                    self.load_farg(FT1, &cmp.rhs)?;
                    self.emit_fcmp(fpred, FT0, FT1, T0);
                    self.emit_branch(0x1, 0, T0, *then_blk); // bne t0, x0, then
                    self.emit_jal(*else_blk);
                } else {
                    self.load_arg(T0, &cmp.lhs)?;
                    self.load_arg(T1, &cmp.rhs)?;
                    let (funct3, rs1, rs2) = branch_condcode(cmp.pred, T0, T1);
                    self.emit_branch(funct3, rs1, rs2, *then_blk);
                    self.emit_jal(*else_blk);
                }
            }
            MTerm::Switch { scrutinee, cases, default } => {
                self.load_arg(T0, scrutinee)?;
                for (val, target) in cases {
                    self.li64(T1, *val);
                    self.emit_branch(0x0, T0, T1, *target); // beq
                }
                self.emit_jal(*default);
            }
            MTerm::Unreachable => self.emit(0x00100073),
        }
        Ok(())
    }

    fn emit_jal(&mut self, target: usize) {
        let off = self.buf.len();
        self.emit(0x6F);
        self.jump_patches.push((off, off, target, BranchKind::Jal));
    }

    fn emit_branch(&mut self, funct3: u32, rs1: u32, rs2: u32, target: usize) {
        let off = self.buf.len();
        self.emit(0x63);
        self.jump_patches
            .push((off, off, target, BranchKind::Branch(funct3, rs1, rs2)));
    }
}

/// Map an icmp predicate plus its operand registers onto a riscv branch's
/// `(funct3, rs1, rs2)`, swapping operands where riscv only has the
/// greater-than-or-equal shaped branch (`bge`/`bgeu`) and not separate
/// less-or-equal forms.
fn branch_condcode(pred: IcmpPred, lhs: u32, rhs: u32) -> (u32, u32, u32) {
    match pred {
        IcmpPred::Eq => (0x0, lhs, rhs),
        IcmpPred::Ne => (0x1, lhs, rhs),
        IcmpPred::Slt => (0x4, lhs, rhs),
        IcmpPred::Sge => (0x5, lhs, rhs),
        IcmpPred::Ult => (0x6, lhs, rhs),
        IcmpPred::Uge => (0x7, lhs, rhs),
        IcmpPred::Sgt => (0x4, rhs, lhs),
        IcmpPred::Sle => (0x5, rhs, lhs),
        IcmpPred::Ugt => (0x6, rhs, lhs),
        IcmpPred::Ule => (0x7, rhs, lhs),
    }
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
