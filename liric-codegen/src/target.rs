//! The target descriptor: the seam between the target-agnostic IR-to-
//! machine-function lowering in this crate and each ISA's own instruction
//! selection refinements and byte encoder.

use target_lexicon::Triple;

use crate::error::CodegenResult;
use crate::intrinsics::IntrinsicRegistry;
use crate::mach::MachineFunction;
use crate::reloc::Relocation;
use crate::{isel, regalloc};

/// The encoded form of one function: raw bytes plus the relocations an
/// object writer or JIT installer must apply once final addresses are
/// known.
#[derive(Debug, Clone, Default)]
pub struct EncodedFunction {
    pub bytes: Vec<u8>,
    pub relocs: Vec<Relocation>,
    pub frame_size: i32,
}

/// A compilation target: encapsulates everything target-specific about
/// turning a lowered, register-assigned `MachineFunction` into bytes.
///
/// `liric-jit` and `liric-object` each hold a `Box<dyn Target>` chosen by
/// the active `target-lexicon::Triple` and drive the whole function
/// through [`compile_function`]; they never touch `isel`/`regalloc`
/// directly.
pub trait Target {
    fn name(&self) -> &'static str;

    fn triple(&self) -> &Triple;

    /// The ABI's calling-convention name, used only for diagnostics.
    fn call_conv_name(&self) -> &'static str;

    fn intrinsics(&self) -> &IntrinsicRegistry;

    /// Encode a register-assigned machine function to bytes. Implementors
    /// may also run additional target-specific peephole folding (e.g.
    /// immediate-operand folding) before emitting instructions.
    fn encode_function(&self, mf: &MachineFunction) -> CodegenResult<EncodedFunction>;

    /// Byte length of a `call`/`bl`-style direct branch encoding, used by
    /// the object builder to size the text section before any function is
    /// actually encoded.
    fn call_site_len(&self) -> usize;
}

/// Select instructions, assign stack slots, rewrite intrinsic call names,
/// and encode: the full per-function pipeline a target's caller drives.
pub fn compile_function(
    target: &dyn Target,
    f: &liric_ir::Function,
    for_object: bool,
) -> CodegenResult<EncodedFunction> {
    let mut mf = isel::lower_function(f)?;
    rewrite_intrinsic_calls(&mut mf, target.intrinsics(), for_object)?;
    rewrite_oversized_mem_ops(&mut mf);
    regalloc::assign_slots(&mut mf);
    target.encode_function(&mf)
}

/// `memcpy`/`memmove`/`memset` calls whose constant length is over the
/// inline threshold are rewritten to a libc call here, before the target's
/// encoder ever sees them; everything at or under the threshold is left
/// alone for the encoder to expand inline.
fn rewrite_oversized_mem_ops(mf: &mut MachineFunction) {
    use crate::intrinsics::INLINE_MEM_OP_THRESHOLD as THRESHOLD;
    use crate::mach::MOp;
    for block in &mut mf.blocks {
        for inst in &mut block.insts {
            let (len, libc_name) = match &inst.op {
                MOp::Memcpy { len } => (*len, "memcpy"),
                MOp::Memmove { len } => (*len, "memmove"),
                MOp::Memset { len } => (*len, "memset"),
                _ => continue,
            };
            if len > THRESHOLD {
                inst.op = MOp::Call {
                    name: libc_name.to_string(),
                    external_abi: true,
                };
            }
        }
    }
}

fn rewrite_intrinsic_calls(
    mf: &mut MachineFunction,
    registry: &IntrinsicRegistry,
    for_object: bool,
) -> CodegenResult<()> {
    for block in &mut mf.blocks {
        for inst in &mut block.insts {
            if let crate::mach::MOp::Call { name, .. } = &mut inst.op {
                *name = registry.resolve_callee(name, for_object)?;
            }
        }
    }
    Ok(())
}

/// Build the target descriptor for `triple`, or `None` if the architecture
/// isn't one of the three this crate implements.
pub fn for_triple(triple: &Triple) -> Option<Box<dyn Target>> {
    use target_lexicon::Architecture;
    match triple.architecture {
        Architecture::X86_64 => Some(Box::new(crate::isa::x86_64::X86_64Target::new(triple.clone()))),
        Architecture::Aarch64(_) => {
            Some(Box::new(crate::isa::aarch64::Aarch64Target::new(triple.clone())))
        }
        Architecture::Riscv64(_) => {
            Some(Box::new(crate::isa::riscv64::Riscv64Target::new(triple.clone())))
        }
        _ => None,
    }
}
