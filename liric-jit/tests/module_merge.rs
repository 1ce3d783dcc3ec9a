//! Two modules built independently, merged into one, then JIT-installed
//! together: a declaration in one module is resolved by the matching
//! definition in the other at merge time, not at call-resolution time.

#![cfg(target_arch = "x86_64")]

use std::str::FromStr;

use liric_arena::Arena;
use liric_ir::{Function, InstPayload, Instruction, Module, Opcode, Operand};
use liric_jit::{CompileSession, CompileStrategy, JitInstaller};
use target_lexicon::Triple;

fn target() -> Box<dyn liric_codegen::Target> {
    let triple = Triple::from_str("x86_64-unknown-linux-gnu").unwrap();
    liric_codegen::for_triple(&triple).expect("x86_64 target is always available")
}

#[test]
fn cross_module_merge_resolves_declaration_to_definition() {
    let arena = Arena::new();

    // Module A: `helper` is only declared here; `merged_main` forwards its
    // argument to it and returns the result.
    let mut module_a = Module::new(&arena);
    let i32_ty = module_a.prims.i32;
    let void_ty = module_a.prims.void;

    module_a.add_function(Function::new_declaration(
        "helper",
        i32_ty,
        vec![i32_ty],
        false,
    ));

    let mut main_fn = Function::new("merged_main", i32_ty, vec![i32_ty], false);
    let entry = main_fn.create_block();
    let call_dest = main_fn.alloc_vreg();
    main_fn
        .push_inst(
            entry,
            Instruction {
                opcode: Opcode::Call,
                dest: call_dest,
                result_ty: i32_ty,
                operands: vec![Operand::vreg(i32_ty, main_fn.param_value(0))],
                target: None,
                else_target: None,
                default_target: None,
                callee: Some("helper".to_string()),
                payload: InstPayload::default(),
            },
        )
        .unwrap();
    main_fn
        .push_inst(
            entry,
            Instruction {
                opcode: Opcode::Ret,
                dest: liric_ir::ValueId::NONE,
                result_ty: void_ty,
                operands: vec![Operand::vreg(i32_ty, call_dest)],
                target: None,
                else_target: None,
                default_target: None,
                callee: None,
                payload: InstPayload::default(),
            },
        )
        .unwrap();
    main_fn.finalize().unwrap();
    module_a.add_function(main_fn);

    // Module B: the actual definition of `helper`, built independently.
    let mut module_b = Module::new(&arena);
    let mut helper_fn = Function::new("helper", i32_ty, vec![i32_ty], false);
    let helper_entry = helper_fn.create_block();
    let sum = helper_fn.alloc_vreg();
    helper_fn
        .push_inst(
            helper_entry,
            Instruction {
                opcode: Opcode::Add,
                dest: sum,
                result_ty: i32_ty,
                operands: vec![
                    Operand::vreg(i32_ty, helper_fn.param_value(0)),
                    Operand::int_const(i32_ty, 100),
                ],
                target: None,
                else_target: None,
                default_target: None,
                callee: None,
                payload: InstPayload::default(),
            },
        )
        .unwrap();
    helper_fn
        .push_inst(
            helper_entry,
            Instruction {
                opcode: Opcode::Ret,
                dest: liric_ir::ValueId::NONE,
                result_ty: void_ty,
                operands: vec![Operand::vreg(i32_ty, sum)],
                target: None,
                else_target: None,
                default_target: None,
                callee: None,
                payload: InstPayload::default(),
            },
        )
        .unwrap();
    helper_fn.finalize().unwrap();
    module_b.add_function(helper_fn);

    module_a.merge(module_b).expect("helper definition replaces the declaration");
    assert!(!module_a.function("helper").unwrap().is_declaration);

    let installer = JitInstaller::new().unwrap();
    let mut session = CompileSession::new(module_a, installer, CompileStrategy::IrMode);
    let target = target();
    session.commit(target.as_ref()).unwrap();

    let addr = session.lookup_symbol("merged_main").expect("merged_main installed");
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(addr) };
    assert_eq!(f(5), 105);
    assert_eq!(f(-10), 90);
}

#[test]
fn merging_two_definitions_of_the_same_symbol_is_rejected() {
    let arena = Arena::new();
    let mut module_a = Module::new(&arena);
    let i32_ty = module_a.prims.i32;
    let void_ty = module_a.prims.void;

    let mut f1 = Function::new("dup", i32_ty, vec![], false);
    let b1 = f1.create_block();
    f1.push_inst(
        b1,
        Instruction {
            opcode: Opcode::Ret,
            dest: liric_ir::ValueId::NONE,
            result_ty: void_ty,
            operands: vec![Operand::int_const(i32_ty, 1)],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    f1.finalize().unwrap();
    module_a.add_function(f1);

    let mut module_b = Module::new(&arena);
    let mut f2 = Function::new("dup", i32_ty, vec![], false);
    let b2 = f2.create_block();
    f2.push_inst(
        b2,
        Instruction {
            opcode: Opcode::Ret,
            dest: liric_ir::ValueId::NONE,
            result_ty: void_ty,
            operands: vec![Operand::int_const(i32_ty, 2)],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    f2.finalize().unwrap();
    module_b.add_function(f2);

    assert!(module_a.merge(module_b).is_err());
}
