/// Errors raised while lowering an IR function or encoding a machine
/// function, before a `liric-jit`/`liric-object` caller wraps them into the
/// session-level taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("opcode {0:?} is not supported on this target")]
    UnsupportedOpcode(liric_ir::Opcode),

    #[error("intrinsic `{0}` has no blob/libc mapping for this target")]
    UnresolvedIntrinsic(String),

    #[error("builtin intrinsic `{0}` is only callable from a JIT, not an object build")]
    BuiltinInObjectBuild(String),

    #[error("scratch encode buffer of {cap} bytes is too small ({needed} needed)")]
    BufferTooSmall { cap: usize, needed: usize },

    #[error("{0}")]
    Other(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;
