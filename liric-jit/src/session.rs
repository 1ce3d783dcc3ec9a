//! The incremental compile session: `begin_function` / `begin_block` /
//! `emit` / `seal_block` / `end_function`, driving the state machine:
//!
//! ```text
//!   IDLE ── begin_function ──► IN_FUNC
//!   IN_FUNC ── begin_block ──► IN_BLOCK
//!   IN_BLOCK ── emit ──► IN_BLOCK
//!   IN_BLOCK ── emit(terminator) ──► IN_FUNC
//!   IN_FUNC ── begin_block ──► IN_BLOCK          (switch blocks)
//!   IN_FUNC ── end_function ──► IDLE             (runs target pipeline)
//!   IN_FUNC ── dump_ir ──► ERR                    (rejected; only in IDLE)
//!   ANY ── fatal error ──► IDLE with error code
//! ```

use std::collections::HashSet;

use liric_entity::EntityRef;
use liric_ir::{
    CallFlags, Function, InstPayload, Instruction, Module, Opcode, Operand, PhiEdge, SwitchCase,
    Type, ValueId,
};

use crate::error::{SessionError, SessionResult};
use crate::installer::JitInstaller;
use liric_codegen::Target;

/// Which of the two build strategies a session runs under.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompileStrategy {
    /// `end_function` immediately selects, encodes, and JIT-installs the
    /// just-finished function; every other defined function in the module
    /// is temporarily hidden as a declaration so it isn't re-emitted.
    DirectPass,
    /// Every function stays a definition; installation is deferred until
    /// [`CompileSession::commit`] is called explicitly.
    IrMode,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SessionState {
    Idle,
    InFunc,
    InBlock,
}

/// Signature and name of a function about to be opened with
/// `begin_function`.
pub struct FunctionSpec<'a> {
    pub name: String,
    pub ret_ty: &'a Type<'a>,
    pub param_tys: Vec<&'a Type<'a>>,
    pub vararg: bool,
}

/// One operand of an [`InstDesc`], paired with its type at the call site
/// (mirroring the wire-level instruction descriptor's
/// `{kind, payload, type}` shape from the external interfaces section,
/// expressed as a typed Rust enum instead of a byte encoding since this is
/// an in-process builder API, not a serialized wire format).
#[derive(Clone)]
pub enum OperandDesc<'a> {
    VReg(ValueId),
    ImmI64(i64),
    ImmF64(f64),
    Block(liric_ir::BlockId),
    Global(&'a str),
    Null,
    Undef,
}

/// A fully-described instruction to append to the block currently open for
/// building.
pub struct InstDesc<'a> {
    pub opcode: Opcode,
    pub result_ty: &'a Type<'a>,
    /// `None` auto-assigns a fresh vreg when the opcode produces a value.
    pub dest: Option<ValueId>,
    pub operands: Vec<(OperandDesc<'a>, &'a Type<'a>)>,
    pub target: Option<liric_ir::BlockId>,
    pub else_target: Option<liric_ir::BlockId>,
    pub default_target: Option<liric_ir::BlockId>,
    pub switch_cases: Vec<(i64, liric_ir::BlockId)>,
    pub callee: Option<String>,
    pub call_flags: CallFlags,
    pub indices: Vec<u32>,
    pub phi_edges: Vec<(liric_ir::BlockId, OperandDesc<'a>, &'a Type<'a>)>,
    pub note: Option<String>,
}

impl<'a> InstDesc<'a> {
    pub fn new(opcode: Opcode, result_ty: &'a Type<'a>) -> Self {
        InstDesc {
            opcode,
            result_ty,
            dest: None,
            operands: Vec::new(),
            target: None,
            else_target: None,
            default_target: None,
            switch_cases: Vec::new(),
            callee: None,
            call_flags: CallFlags::default(),
            indices: Vec::new(),
            phi_edges: Vec::new(),
            note: None,
        }
    }

    pub fn with_operand(mut self, desc: OperandDesc<'a>, ty: &'a Type<'a>) -> Self {
        self.operands.push((desc, ty));
        self
    }

    pub fn with_target(mut self, target: liric_ir::BlockId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_else_target(mut self, target: liric_ir::BlockId) -> Self {
        self.else_target = Some(target);
        self
    }

    pub fn with_callee(mut self, name: impl Into<String>) -> Self {
        self.callee = Some(name.into());
        self
    }
}

fn resolve_operand<'a>(desc: OperandDesc<'a>, ty: &'a Type<'a>) -> Operand<'a> {
    match desc {
        OperandDesc::VReg(id) => Operand::vreg(ty, id),
        OperandDesc::ImmI64(v) => Operand::int_const(ty, v),
        OperandDesc::ImmF64(v) => Operand::float_const(ty, v),
        OperandDesc::Block(b) => Operand {
            ty,
            kind: liric_ir::ValueKind::Block(b),
        },
        OperandDesc::Global(name) => Operand {
            ty,
            kind: liric_ir::ValueKind::Global(name),
        },
        OperandDesc::Null => Operand::null(ty),
        OperandDesc::Undef => Operand::undef(ty),
    }
}

/// A session wraps a module and a JIT installer and exposes the
/// incremental builder described in the component design. `'a` is the
/// arena lifetime shared with the module it builds into.
pub struct CompileSession<'a> {
    pub module: Module<'a>,
    installer: JitInstaller,
    strategy: CompileStrategy,
    state: SessionState,
    current_function: Option<String>,
    current_block: Option<liric_ir::BlockId>,
    sealed: HashSet<liric_ir::BlockId>,
    hidden: Vec<String>,
    last_symbol: Option<String>,
}

impl<'a> CompileSession<'a> {
    pub fn new(module: Module<'a>, installer: JitInstaller, strategy: CompileStrategy) -> Self {
        CompileSession {
            module,
            installer,
            strategy,
            state: SessionState::Idle,
            current_function: None,
            current_block: None,
            sealed: HashSet::new(),
            hidden: Vec::new(),
            last_symbol: None,
        }
    }

    pub fn installer(&self) -> &JitInstaller {
        &self.installer
    }

    pub fn installer_mut(&mut self) -> &mut JitInstaller {
        &mut self.installer
    }

    fn require_state(&self, expected: SessionState, op: &str) -> SessionResult<()> {
        if self.state != expected {
            return Err(SessionError::state(format!(
                "{op} requires state {expected:?}, session is in {:?}",
                self.state
            )));
        }
        Ok(())
    }

    pub fn begin_function(&mut self, spec: FunctionSpec<'a>) -> SessionResult<()> {
        self.require_state(SessionState::Idle, "begin_function")?;
        if self.module.function(&spec.name).is_none() {
            self.module.add_function(Function::new(
                spec.name.clone(),
                spec.ret_ty,
                spec.param_tys,
                spec.vararg,
            ));
        }
        self.current_function = Some(spec.name);
        self.state = SessionState::InFunc;
        Ok(())
    }

    fn current_fn_mut(&mut self) -> SessionResult<&mut Function<'a>> {
        let name = self
            .current_function
            .clone()
            .ok_or_else(|| SessionError::state("no function is currently open"))?;
        self.module
            .function_mut(&name)
            .ok_or_else(|| SessionError::not_found(format!("function {name} not found")))
    }

    /// Open `id` for building (or create a fresh block when `None`).
    pub fn begin_block(&mut self, id: Option<liric_ir::BlockId>) -> SessionResult<liric_ir::BlockId> {
        if self.state != SessionState::InFunc && self.state != SessionState::Idle {
            return Err(SessionError::state(
                "begin_block requires an open function".to_string(),
            ));
        }
        if self.state == SessionState::Idle {
            return Err(SessionError::state("no function is currently open"));
        }
        if let Some(id) = id {
            if self.sealed.contains(&id) {
                return Err(SessionError::state(format!(
                    "block {id} is sealed and cannot be reopened"
                )));
            }
        }
        let f = self.current_fn_mut()?;
        let id = match id {
            Some(id) => {
                if id.index() >= f.num_blocks() {
                    return Err(SessionError::not_found(format!("block {id} does not exist")));
                }
                id
            }
            None => f.create_block(),
        };
        self.current_block = Some(id);
        self.state = SessionState::InBlock;
        Ok(id)
    }

    pub fn emit(&mut self, desc: InstDesc<'a>) -> SessionResult<ValueId> {
        self.require_state(SessionState::InBlock, "emit")?;
        let block = self.current_block.expect("InBlock implies current_block");
        let is_terminator = desc.opcode.is_terminator();
        let produces_value = !matches!(
            desc.opcode,
            Opcode::Store
                | Opcode::Ret
                | Opcode::RetVoid
                | Opcode::Br
                | Opcode::CondBr
                | Opcode::Switch
                | Opcode::Unreachable
                | Opcode::Trap
                | Opcode::Memcpy
                | Opcode::Memmove
                | Opcode::Memset
        ) && !(desc.opcode == Opcode::Call && matches!(desc.result_ty, Type::Void));

        let operands: Vec<Operand<'a>> = desc
            .operands
            .into_iter()
            .map(|(d, ty)| resolve_operand(d, ty))
            .collect();
        let phi_edges: Vec<PhiEdge<'a>> = desc
            .phi_edges
            .into_iter()
            .map(|(from_block, d, ty)| PhiEdge {
                from_block,
                value: resolve_operand(d, ty),
            })
            .collect();
        let switch_cases: Vec<SwitchCase> = desc
            .switch_cases
            .into_iter()
            .map(|(value, target)| SwitchCase { value, target })
            .collect();

        let f = self.current_fn_mut()?;
        let dest = match desc.dest {
            Some(id) => id,
            None if produces_value => f.alloc_vreg(),
            None => ValueId::NONE,
        };

        let inst = Instruction {
            opcode: desc.opcode,
            dest,
            result_ty: desc.result_ty,
            operands,
            target: desc.target,
            else_target: desc.else_target,
            default_target: desc.default_target,
            callee: desc.callee,
            payload: InstPayload {
                indices: desc.indices,
                call_flags: desc.call_flags,
                phi_edges,
                switch_cases,
                note: desc.note.map(|s| s.into_boxed_str()),
            },
        };
        f.push_inst(block, inst)?;

        if is_terminator {
            self.current_block = None;
            self.state = SessionState::InFunc;
        }
        Ok(dest)
    }

    pub fn seal_block(&mut self, id: liric_ir::BlockId) -> SessionResult<()> {
        if self.state == SessionState::Idle {
            return Err(SessionError::state("no function is currently open"));
        }
        let f = self.current_fn_mut()?;
        if id.index() >= f.num_blocks() {
            return Err(SessionError::not_found(format!("block {id} does not exist")));
        }
        if !f.block(id).is_well_formed() {
            return Err(SessionError::state(format!(
                "block {id} cannot be sealed before it is terminated"
            )));
        }
        self.sealed.insert(id);
        Ok(())
    }

    /// Finalize the current function, validate SSA/dominance, and (in
    /// `DirectPass` mode) immediately run instruction selection, encoding,
    /// and JIT installation. Returns the function name as the session's
    /// new "last symbol".
    pub fn end_function(&mut self, target: &dyn Target) -> SessionResult<String> {
        self.require_state(SessionState::InFunc, "end_function")?;
        let name = self
            .current_function
            .clone()
            .ok_or_else(|| SessionError::state("no function is currently open"))?;

        let f = self
            .module
            .function_mut(&name)
            .ok_or_else(|| SessionError::not_found(format!("function {name} not found")))?;
        f.finalize()?;

        match self.strategy {
            CompileStrategy::DirectPass => {
                let hidden = self.module.hide_other_definitions(&name);
                let result = (|| -> SessionResult<()> {
                    let f = self.module.function(&name).expect("just finalized");
                    let encoded = liric_codegen::compile_function(target, f, false)?;
                    self.installer.begin_update();
                    self.installer.define_function(&name, &encoded)?;
                    self.installer.end_update()?;
                    Ok(())
                })();
                self.module.unhide_definitions(&hidden);
                result?;
            }
            CompileStrategy::IrMode => {
                // Installation deferred to `commit`.
            }
        }

        self.state = SessionState::Idle;
        self.current_function = None;
        self.last_symbol = Some(name.clone());
        Ok(name)
    }

    /// `ir-mode` only: select, encode, and install every defined function
    /// not yet installed, in one update transaction.
    pub fn commit(&mut self, target: &dyn Target) -> SessionResult<()> {
        self.require_state(SessionState::Idle, "commit")?;
        self.installer.begin_update();
        let result = (|| -> SessionResult<()> {
            for f in self.module.functions() {
                if f.is_declaration || self.installer.has_symbol(&f.name) {
                    continue;
                }
                let encoded = liric_codegen::compile_function(target, f, false)?;
                self.installer.define_function(&f.name, &encoded)?;
            }
            Ok(())
        })();
        self.installer.end_update()?;
        result
    }

    pub fn add_symbol(&mut self, name: &str, addr: *const ()) {
        self.installer.add_symbol(name, addr);
    }

    pub fn lookup_symbol(&mut self, name: &str) -> Option<*const ()> {
        self.installer.lookup(name)
    }

    /// A lightweight textual dump of the current module, for `--dump-ir`.
    /// Only callable in `IDLE` (mirrors the `ir_print` restriction in the
    /// state machine).
    pub fn dump_ir(&self) -> SessionResult<String> {
        if self.state != SessionState::Idle {
            return Err(SessionError::mode_conflict(
                "dump_ir is only allowed between functions (IDLE state)".to_string(),
            ));
        }
        let mut out = String::new();
        for f in self.module.functions() {
            if f.is_declaration {
                out.push_str(&format!("declare {}(...)\n", f.name));
                continue;
            }
            out.push_str(&format!("define {}(...) {{\n", f.name));
            for (id, block) in f.blocks() {
                out.push_str(&format!("{id}:\n"));
                for inst in &block.insts {
                    out.push_str(&format!("  {:?}\n", inst.opcode));
                }
            }
            out.push_str("}\n");
        }
        Ok(out)
    }

    pub fn last_symbol(&self) -> Option<&str> {
        self.last_symbol.as_deref()
    }

    pub fn end_session(self) -> JitInstaller {
        self.installer
    }
}
