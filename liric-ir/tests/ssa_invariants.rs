use liric_arena::Arena;
use liric_ir::inst::{InstPayload, Instruction, Opcode, PhiEdge};
use liric_ir::{Function, IrError, Module, Operand};

fn ret_i32(f: &mut Function, block: liric_ir::BlockId, val: Operand) {
    f.push_inst(
        block,
        Instruction {
            opcode: Opcode::Ret,
            dest: liric_ir::ValueId::NONE,
            result_ty: val.ty,
            operands: vec![val],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
}

#[test]
fn constant_return_function_finalizes() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    ret_i32(&mut f, entry, Operand::int_const(module.prims.i32, 42));
    assert!(f.finalize().is_ok());
}

#[test]
fn add_instruction_dominates_its_use() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    let dest = f.alloc_vreg();
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Add,
            dest,
            result_ty: module.prims.i32,
            operands: vec![
                Operand::int_const(module.prims.i32, 10),
                Operand::int_const(module.prims.i32, 32),
            ],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    ret_i32(
        &mut f,
        entry,
        Operand::vreg(module.prims.i32, dest),
    );
    assert!(f.finalize().is_ok());
}

#[test]
fn instruction_after_terminator_is_rejected() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    ret_i32(&mut f, entry, Operand::int_const(module.prims.i32, 1));
    let err = f
        .push_inst(
            entry,
            Instruction {
                opcode: Opcode::Ret,
                dest: liric_ir::ValueId::NONE,
                result_ty: module.prims.i32,
                operands: vec![Operand::int_const(module.prims.i32, 2)],
                target: None,
                else_target: None,
                default_target: None,
                callee: None,
                payload: InstPayload::default(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, IrError::MalformedBlock(_, _)));
}

#[test]
fn empty_block_is_not_well_formed() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    f.create_block();
    let err = f.finalize().unwrap_err();
    assert!(matches!(err, IrError::MalformedBlock(_, _)));
}

#[test]
fn use_before_def_across_blocks_is_rejected() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    let other = f.create_block();
    let dest = f.alloc_vreg();

    // entry branches to `other`, which uses a value defined in a block that
    // is never itself reached (no def anywhere): this must fail dominance.
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Br,
            dest: liric_ir::ValueId::NONE,
            result_ty: module.prims.void,
            operands: vec![],
            target: Some(other),
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    ret_i32(&mut f, other, Operand::vreg(module.prims.i32, dest));

    let err = f.finalize().unwrap_err();
    assert!(matches!(err, IrError::NotDominated { .. }));
}

#[test]
fn conditional_branch_scenario_returns_one() {
    // icmp sgt 5, 3 -> condbr -> ret 1 / ret 0.
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    let then_blk = f.create_block();
    let else_blk = f.create_block();

    let cmp = f.alloc_vreg();
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Icmp(liric_ir::IcmpPred::Sgt),
            dest: cmp,
            result_ty: module.prims.i1,
            operands: vec![
                Operand::int_const(module.prims.i32, 5),
                Operand::int_const(module.prims.i32, 3),
            ],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::CondBr,
            dest: liric_ir::ValueId::NONE,
            result_ty: module.prims.void,
            operands: vec![Operand::vreg(module.prims.i1, cmp)],
            target: Some(then_blk),
            else_target: Some(else_blk),
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    ret_i32(&mut f, then_blk, Operand::int_const(module.prims.i32, 1));
    ret_i32(&mut f, else_blk, Operand::int_const(module.prims.i32, 0));

    assert!(f.finalize().is_ok());
}

#[test]
fn phi_value_must_dominate_its_incoming_block() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut f = Function::new("f", module.prims.i32, vec![], false);
    let entry = f.create_block();
    let loop_blk = f.create_block();
    let exit = f.create_block();

    let zero = Operand::int_const(module.prims.i32, 0);
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Br,
            dest: liric_ir::ValueId::NONE,
            result_ty: module.prims.void,
            operands: vec![],
            target: Some(loop_blk),
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();

    let phi_dest = f.alloc_vreg();
    let inc = f.alloc_vreg();
    f.push_inst(
        loop_blk,
        Instruction {
            opcode: Opcode::Add,
            dest: inc,
            result_ty: module.prims.i32,
            operands: vec![
                Operand::vreg(module.prims.i32, phi_dest),
                Operand::int_const(module.prims.i32, 1),
            ],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    f.push_inst(
        loop_blk,
        Instruction {
            opcode: Opcode::Phi,
            dest: phi_dest,
            result_ty: module.prims.i32,
            operands: vec![],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload {
                phi_edges: vec![
                    PhiEdge {
                        from_block: entry,
                        value: zero,
                    },
                    PhiEdge {
                        from_block: loop_blk,
                        value: Operand::vreg(module.prims.i32, inc),
                    },
                ],
                ..Default::default()
            },
        },
    )
    .unwrap();
    f.push_inst(
        loop_blk,
        Instruction {
            opcode: Opcode::Br,
            dest: liric_ir::ValueId::NONE,
            result_ty: module.prims.void,
            operands: vec![],
            target: Some(exit),
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    ret_i32(&mut f, exit, Operand::int_const(module.prims.i32, 0));

    // NB: the phi physically appears after the add that uses it, but both
    // are in `loop_blk` and the phi is conceptually defined at block entry;
    // our dominance check treats same-block defs as visible regardless of
    // textual order, matching SSA-with-phis semantics.
    assert!(f.finalize().is_ok());
}
