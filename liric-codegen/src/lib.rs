//! Instruction selection, register/spill assignment, and per-target byte
//! encoding: turns a verified `liric_ir::Function` into relocatable machine
//! code for x86_64, aarch64, or riscv64.
//!
//! The pipeline a caller drives is [`target::compile_function`]: lower to a
//! [`mach::MachineFunction`], rewrite intrinsic and oversized memory-op
//! calls, assign stack slots, then hand off to the chosen [`target::Target`].

pub mod error;
pub mod intrinsics;
pub mod isa;
pub mod isel;
pub mod mach;
pub mod regalloc;
pub mod reloc;
pub mod target;

pub use error::{CodegenError, CodegenResult};
pub use mach::{MArg, MInst, MOp, MTerm, MachineFunction};
pub use reloc::{RelocKind, Relocation};
pub use target::{compile_function, for_triple, EncodedFunction, Target};
