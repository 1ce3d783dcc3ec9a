//! Incremental compile session and W^X JIT installer: the in-process
//! half of the engine's two output paths, the other being ahead-of-time
//! object emission.

pub mod error;
pub mod installer;
pub mod session;

pub use error::{SessionError, SessionErrorKind, SessionResult};
pub use installer::JitInstaller;
pub use session::{CompileSession, CompileStrategy, FunctionSpec, InstDesc, OperandDesc};
