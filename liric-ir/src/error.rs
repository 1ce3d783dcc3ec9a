/// Construction- and finalization-time errors raised by the IR layer.
///
/// These are the `{argument, ...}`-shaped failures that bubble up through
/// `liric-jit`'s session API; the IR crate itself only ever needs a subset
/// of the full compile-session error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// An instruction's operand types don't match its opcode's signature.
    #[error("type mismatch in {opcode}: {detail}")]
    TypeMismatch { opcode: String, detail: String },

    /// A virtual register was assigned more than once, violating SSA.
    #[error("value {0} is defined more than once")]
    MultipleDefinition(String),

    /// A use does not dominate its definition's reachable uses.
    #[error("use of {value} in block {block} is not dominated by its definition")]
    NotDominated { value: String, block: String },

    /// A block does not end in a terminator, or a non-terminator follows one.
    #[error("block {0} is not well-formed: {1}")]
    MalformedBlock(String, &'static str),

    /// A phi/incoming-block reference names a block that doesn't exist.
    #[error("block {0} referenced but never defined")]
    UnknownBlock(String),

    /// A constant-aggregate byte range or relocation falls outside the type's
    /// layout size.
    #[error("constant relocation at offset {offset} exceeds aggregate size {size}")]
    RelocationOutOfBounds { offset: u64, size: u64 },

    /// A value from a different module was used in this one.
    #[error("value belongs to a different module")]
    ForeignValue,

    /// Merging two modules found the same symbol defined in both.
    #[error("{0} is defined in both modules being merged")]
    DuplicateDefinition(String),
}

pub type IrResult<T> = Result<T, IrError>;
