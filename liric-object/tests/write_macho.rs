//! Structural checks against the Mach-O arm64 writers. The custom
//! `MH_EXECUTE` layout here isn't something `object::read`'s Mach-O parser
//! is guaranteed to accept (no dyld actually loads it without a real code
//! signature), so these check the fixed-layout header fields directly
//! rather than round-tripping through a reader.

use std::str::FromStr;

use liric_arena::Arena;
use liric_ir::inst::{InstPayload, Instruction, Opcode};
use liric_ir::{Function, Global, Module, Operand, ValueId};
use liric_object::builder::ObjectBuilder;
use liric_object::{macho, ObjectError};
use target_lexicon::Triple;

const MH_MAGIC_64: u32 = 0xfeedfacf;
const CPU_TYPE_ARM64: u32 = 0x0100000c;
const MH_OBJECT: u32 = 0x1;
const MH_EXECUTE: u32 = 0x2;

fn aarch64_target() -> Box<dyn liric_codegen::Target> {
    let triple = Triple::from_str("aarch64-apple-darwin").unwrap();
    liric_codegen::for_triple(&triple).unwrap()
}

fn u32_at(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
}

fn module_returning_const<'a>(arena: &'a Arena, name: &str, value: i64) -> Module<'a> {
    let module = Module::new(arena);
    let mut f = Function::new(name, module.prims.i32, vec![], false);
    let entry = f.create_block();
    f.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Ret,
            dest: ValueId::NONE,
            result_ty: module.prims.i32,
            operands: vec![Operand::int_const(module.prims.i32, value)],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    f.finalize().unwrap();
    let mut module = module;
    module.add_function(f);
    module
}

#[test]
fn relocatable_object_has_macho_object_header() {
    let arena = Arena::new();
    let module = module_returning_const(&arena, "f", 42);
    let target = aarch64_target();

    let built = ObjectBuilder::new(target.as_ref(), false).build(&module).unwrap();
    let bytes = macho::write_relocatable(&built).unwrap();

    assert_eq!(u32_at(&bytes, 0), MH_MAGIC_64);
    assert_eq!(u32_at(&bytes, 4), CPU_TYPE_ARM64);
    assert_eq!(u32_at(&bytes, 12), MH_OBJECT);
    assert_eq!(u32_at(&bytes, 16), 3, "LC_SEGMENT_64, LC_SYMTAB, LC_BUILD_VERSION");
}

#[test]
fn no_link_executable_has_mh_execute_header_and_patched_entry() {
    let arena = Arena::new();
    let module = module_returning_const(&arena, "main", 42);
    let target = aarch64_target();

    let built = ObjectBuilder::new(target.as_ref(), true).build(&module).unwrap();
    let bytes = macho::write_no_link_executable(&built, "main").unwrap();

    assert_eq!(u32_at(&bytes, 0), MH_MAGIC_64);
    assert_eq!(u32_at(&bytes, 4), CPU_TYPE_ARM64);
    assert_eq!(u32_at(&bytes, 12), MH_EXECUTE);
    assert_eq!(u32_at(&bytes, 16), 15, "ncmds");
    assert_eq!(u32_at(&bytes, 20), 648, "sizeofcmds");
}

#[test]
fn no_link_executable_rejects_a_data_section() {
    let arena = Arena::new();
    let module = module_returning_const(&arena, "main", 42);
    let mut module = module;
    module.add_global(Global::new_definition(
        "g",
        module.prims.i32,
        true,
        true,
        0i32.to_le_bytes().to_vec(),
        vec![],
    ));
    let target = aarch64_target();

    let built = ObjectBuilder::new(target.as_ref(), true).build(&module).unwrap();
    let err = macho::write_no_link_executable(&built, "main").unwrap_err();
    assert!(matches!(err, ObjectError::Unsupported(_)));
}

#[test]
fn no_link_executable_rejects_an_unresolved_external_symbol() {
    let arena = Arena::new();
    let module = Module::new(&arena);
    let mut module = module;

    let mut main = Function::new("main", module.prims.i32, vec![], false);
    let entry = main.create_block();
    let dest = main.alloc_vreg();
    main.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Call,
            dest,
            result_ty: module.prims.i32,
            operands: vec![],
            target: None,
            else_target: None,
            default_target: None,
            callee: Some("host_only_symbol".to_string()),
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    main.push_inst(
        entry,
        Instruction {
            opcode: Opcode::Ret,
            dest: ValueId::NONE,
            result_ty: module.prims.i32,
            operands: vec![Operand::vreg(module.prims.i32, dest)],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
    main.finalize().unwrap();
    module.add_function(main);

    let target = aarch64_target();
    let built = ObjectBuilder::new(target.as_ref(), true).build(&module).unwrap();
    assert!(built.symbols.iter().any(|s| !s.is_defined()));

    let err = macho::write_no_link_executable(&built, "main").unwrap_err();
    assert!(matches!(err, ObjectError::Unsupported(_)));
}
