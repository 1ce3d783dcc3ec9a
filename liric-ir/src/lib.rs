//! Arena-allocated typed SSA IR: types, values, functions, globals, and the
//! module that owns them all, plus the per-module symbol interner.
//!
//! This crate never performs codegen or I/O; it only constructs and
//! validates in-memory structure. `liric-codegen` reads a finalized
//! `Function` to select instructions and encode bytes; `liric-object`/
//! `liric-jit` read a `Module` to drive the backend pipeline.

pub mod constant;
pub mod error;
pub mod function;
pub mod global;
pub mod inst;
pub mod module;
pub mod symbol;
pub mod types;
pub mod value;
mod verify;

pub use error::{IrError, IrResult};
pub use function::{BasicBlock, BlockId, Function};
pub use global::{DataReloc, Global};
pub use inst::{CallFlags, FcmpPred, IcmpPred, InstPayload, Instruction, Opcode, PhiEdge, SwitchCase};
pub use module::Module;
pub use symbol::{SymbolId, SymbolInterner};
pub use types::Type;
pub use value::{AggregateConst, ConstReloc, Operand, ValueId, ValueKind};
