//! Errors raised while building an in-memory object result or writing it to
//! a concrete container format.

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("codegen failed for {symbol}: {source}")]
    Codegen {
        symbol: String,
        #[source]
        source: liric_codegen::CodegenError,
    },

    #[error("code section exceeds the 4 MiB budget ({0} bytes)")]
    CodeTooLarge(usize),

    #[error("data section exceeds the 1 MiB budget ({0} bytes)")]
    DataTooLarge(usize),

    #[error("relocation at offset {offset} targets unknown symbol {symbol}")]
    UnknownRelocationSymbol { offset: u64, symbol: String },

    #[error("data relocation at offset {offset} does not fit within the data section ({size} bytes)")]
    DataRelocationOutOfBounds { offset: u64, size: usize },

    #[error("underlying object writer failed: {0}")]
    Writer(#[from] object::write::Error),

    #[error("{0} is not supported for this container format")]
    Unsupported(&'static str),

    #[error("entry symbol {0} was never defined")]
    MissingEntrySymbol(String),
}

pub type ObjectResult<T> = Result<T, ObjectError>;
