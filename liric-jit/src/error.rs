//! The session error taxonomy: four recoverable kinds plus the two that
//! invalidate the function or session currently in progress.

use std::fmt;

/// Broad category of a session-level failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// A caller-supplied argument was malformed (bad opcode/type pairing,
    /// out-of-range index, ...).
    Argument,
    /// An operation that only makes sense under one compile strategy was
    /// attempted under the other (e.g. `lookup_symbol` before any
    /// `end_update` under ir-mode).
    ModeConflict,
    /// The session wasn't in the state the operation requires (e.g.
    /// `emit` outside `IN_BLOCK`).
    State,
    /// A named function, block, or symbol doesn't exist.
    NotFound,
    /// Instruction selection or encoding failed.
    Backend,
    /// Source text failed to parse.
    Parse,
    /// A construct this engine doesn't implement (see non-goals).
    Unsupported,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionErrorKind::Argument => "argument",
            SessionErrorKind::ModeConflict => "mode-conflict",
            SessionErrorKind::State => "state",
            SessionErrorKind::NotFound => "not-found",
            SessionErrorKind::Backend => "backend",
            SessionErrorKind::Parse => "parse",
            SessionErrorKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        SessionError {
            kind,
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Argument, message)
    }

    pub fn mode_conflict(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::ModeConflict, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::State, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::NotFound, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Backend, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Parse, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Unsupported, message)
    }
}

impl From<liric_ir::IrError> for SessionError {
    fn from(e: liric_ir::IrError) -> Self {
        SessionError::argument(e.to_string())
    }
}

impl From<liric_codegen::CodegenError> for SessionError {
    fn from(e: liric_codegen::CodegenError) -> Self {
        SessionError::backend(e.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
