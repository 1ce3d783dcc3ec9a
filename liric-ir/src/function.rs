//! Functions and basic blocks.

use crate::error::{IrError, IrResult};
use crate::inst::Instruction;
use crate::types::Type;
use crate::value::ValueId;
use crate::verify;
use liric_entity::{entity_impl, EntityRef, PrimaryMap};

/// Dense, monotonically increasing identity of a basic block within one
/// function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// A basic block: an ordered, append-only sequence of instructions bound to
/// exactly one function.
///
/// The spec allows a block to be created dangling and bound to its function
/// on first use; since Liric's only block-creation entry point is
/// `Function::create_block`, every block is bound at birth and this is
/// always trivially satisfied (see `DESIGN.md`, "block-function binding").
#[derive(Debug, Clone)]
pub struct BasicBlock<'a> {
    pub id: BlockId,
    pub insts: Vec<Instruction<'a>>,
}

impl<'a> BasicBlock<'a> {
    fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            insts: Vec::new(),
        }
    }

    /// A block is well-formed when non-empty and its last instruction (and
    /// only its last) is a terminator.
    pub fn is_well_formed(&self) -> bool {
        match self.insts.split_last() {
            None => false,
            Some((last, rest)) => last.is_terminator() && rest.iter().all(|i| !i.is_terminator()),
        }
    }
}

/// A function: parameters, return type, and (unless a declaration) a body
/// of basic blocks.
#[derive(Debug)]
pub struct Function<'a> {
    pub name: String,
    pub ret_ty: &'a Type<'a>,
    pub param_tys: Vec<&'a Type<'a>>,
    pub vararg: bool,
    /// Declarations have no blocks and compile to an external symbol.
    pub is_declaration: bool,
    blocks: PrimaryMap<BlockId, BasicBlock<'a>>,
    next_vreg: u32,
    finalized: bool,
}

impl<'a> Function<'a> {
    /// Create a function definition (blocks to be added by the caller).
    ///
    /// Parameters occupy vreg numbers `1..=param_tys.len()`; vreg
    /// allocation for instruction results continues from there.
    pub fn new(
        name: impl Into<String>,
        ret_ty: &'a Type<'a>,
        param_tys: Vec<&'a Type<'a>>,
        vararg: bool,
    ) -> Self {
        let next_vreg = param_tys.len() as u32 + 1;
        Function {
            name: name.into(),
            ret_ty,
            param_tys,
            vararg,
            is_declaration: false,
            blocks: PrimaryMap::new(),
            next_vreg,
            finalized: false,
        }
    }

    /// Create a declaration-only function (no body; compiles to an external
    /// symbol reference).
    pub fn new_declaration(
        name: impl Into<String>,
        ret_ty: &'a Type<'a>,
        param_tys: Vec<&'a Type<'a>>,
        vararg: bool,
    ) -> Self {
        let mut f = Self::new(name, ret_ty, param_tys, vararg);
        f.is_declaration = true;
        f.finalized = true;
        f
    }

    /// Value id naming the `i`-th parameter (0-based).
    pub fn param_value(&self, i: usize) -> ValueId {
        assert!(i < self.param_tys.len());
        ValueId::from_number(i as u32 + 1)
    }

    /// Allocate a fresh virtual register for an instruction result.
    pub fn alloc_vreg(&mut self) -> ValueId {
        let id = ValueId::from_number(self.next_vreg);
        self.next_vreg += 1;
        id
    }

    /// Create a new, empty basic block bound to this function.
    pub fn create_block(&mut self) -> BlockId {
        let id = self.blocks.push(BasicBlock::new(BlockId::new(0)));
        self.blocks[id].id = id;
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock<'a> {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock<'a> {
        &mut self.blocks[id]
    }

    /// Iterate over blocks in creation order (dense, monotonic ids).
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock<'a>)> {
        self.blocks.iter()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Append an instruction to `block`. Rejected once the block already
    /// ends in a terminator.
    pub fn push_inst(&mut self, block: BlockId, inst: Instruction<'a>) -> IrResult<()> {
        let b = self.block_mut(block);
        if let Some(last) = b.insts.last() {
            if last.is_terminator() {
                return Err(IrError::MalformedBlock(
                    format!("{}", block),
                    "instruction follows a terminator",
                ));
            }
        }
        b.insts.push(inst);
        Ok(())
    }

    /// Validate well-formedness and SSA dominance, and lock the function
    /// against further mutation. Mirrors `end_function`'s finalization step
    /// before it can be handed to the codegen pipeline.
    pub fn finalize(&mut self) -> IrResult<()> {
        if self.is_declaration {
            return Ok(());
        }
        for (id, b) in self.blocks.iter() {
            if !b.is_well_formed() {
                return Err(IrError::MalformedBlock(
                    format!("{}", id),
                    "block does not end in exactly one terminator",
                ));
            }
        }
        verify::check_targets_exist(self)?;
        verify::check_ssa_dominance(self)?;
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
