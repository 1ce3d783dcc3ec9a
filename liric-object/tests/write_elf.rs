//! Structural checks against the ELF-64 writers: a relocatable object is
//! parsed back with `object::read` to confirm every section/symbol a linker
//! would expect is present and correctly sized; the hand-rolled executables
//! have no section table for `object` to walk, so those are checked by
//! reading the fixed-layout header fields directly out of the bytes.

use std::str::FromStr;

use liric_arena::Arena;
use liric_ir::inst::{InstPayload, Instruction, Opcode};
use liric_ir::{DataReloc, Function, Global, Module, Operand, ValueId};
use liric_object::builder::ObjectBuilder;
use liric_object::{elf, ObjectError};
use object::read::{Object, ObjectSection, ObjectSymbol};
use target_lexicon::Triple;

fn x86_64_target() -> Box<dyn liric_codegen::Target> {
    let triple = Triple::from_str("x86_64-unknown-linux-gnu").unwrap();
    liric_codegen::for_triple(&triple).unwrap()
}

fn ret_const(f: &mut Function, block: liric_ir::BlockId, ty: &liric_ir::Type, value: i64) {
    f.push_inst(
        block,
        Instruction {
            opcode: Opcode::Ret,
            dest: ValueId::NONE,
            result_ty: ty,
            operands: vec![Operand::int_const(ty, value)],
            target: None,
            else_target: None,
            default_target: None,
            callee: None,
            payload: InstPayload::default(),
        },
    )
    .unwrap();
}

/// `callee` returns 7; `caller` calls it and returns the result, so the
/// built object carries one internal `Plt32` code relocation.
fn module_with_a_call<'a>(arena: &'a Arena) -> Module<'a> {
    let module = Module::new(arena);

    let mut callee = Function::new("callee", module.prims.i32, vec![], false);
    let entry = callee.create_block();
    ret_const(&mut callee, entry, module.prims.i32, 7);
    callee.finalize().unwrap();

    let mut caller = Function::new("caller", module.prims.i32, vec![], false);
    let entry = caller.create_block();
    let dest = caller.alloc_vreg();
    caller
        .push_inst(
            entry,
            Instruction {
                opcode: Opcode::Call,
                dest,
                result_ty: module.prims.i32,
                operands: vec![],
                target: None,
                else_target: None,
                default_target: None,
                callee: Some("callee".to_string()),
                payload: InstPayload::default(),
            },
        )
        .unwrap();
    caller
        .push_inst(
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
    caller.finalize().unwrap();

    let mut module = module;
    module.add_function(callee);
    module.add_function(caller);
    module
}

fn module_with_data_reloc<'a>(arena: &'a Arena) -> Module<'a> {
    let module = Module::new(arena);

    let mut module = module;
    module.add_global(Global::new_definition(
        "target_value",
        module.prims.i32,
        true,
        true,
        42i32.to_le_bytes().to_vec(),
        vec![],
    ));
    module.add_global(Global::new_definition(
        "pointer_to_target",
        module.prims.ptr,
        false,
        true,
        vec![0u8; 8],
        vec![DataReloc {
            offset_in_global: 0,
            symbol: "target_value".to_string(),
            addend: 0,
        }],
    ));
    module
}

#[test]
fn relocatable_object_round_trips_through_object_crate() {
    let arena = Arena::new();
    let module = module_with_a_call(&arena);
    let target = x86_64_target();

    let built = ObjectBuilder::new(target.as_ref(), false).build(&module).unwrap();
    let bytes = elf::write_relocatable(&built, target.triple().architecture).unwrap();

    let file = object::File::parse(&*bytes).expect("a valid relocatable ELF object");
    assert_eq!(file.format(), object::BinaryFormat::Elf);
    assert_eq!(file.architecture(), object::Architecture::X86_64);

    let text = file.section_by_name(".text").expect(".text section present");
    assert_eq!(text.size(), built.code.len() as u64);

    let names: Vec<_> = file.symbols().filter_map(|s| s.name().ok()).collect();
    assert!(names.contains(&"callee"));
    assert!(names.contains(&"caller"));

    let callee_sym = file.symbols().find(|s| s.name().ok() == Some("callee")).unwrap();
    assert_eq!(callee_sym.size(), built.symbol("callee").unwrap().size);
}

#[test]
fn relocatable_object_carries_a_data_section_and_its_pointer_reloc() {
    let arena = Arena::new();
    let module = module_with_data_reloc(&arena);
    let target = x86_64_target();

    let built = ObjectBuilder::new(target.as_ref(), false).build(&module).unwrap();
    let bytes = elf::write_relocatable(&built, target.triple().architecture).unwrap();

    let file = object::File::parse(&*bytes).expect("a valid relocatable ELF object");
    let data = file.section_by_name(".data").expect(".data section present");
    assert_eq!(data.size(), built.data.len() as u64);

    let names: Vec<_> = file.symbols().filter_map(|s| s.name().ok()).collect();
    assert!(names.contains(&"target_value"));
    assert!(names.contains(&"pointer_to_target"));
}

#[test]
fn static_executable_has_patched_call_site_and_single_load_segment() {
    let arena = Arena::new();
    let module = module_with_a_call(&arena);
    let target = x86_64_target();

    let built = ObjectBuilder::new(target.as_ref(), true).build(&module).unwrap();
    assert!(built.symbols.iter().all(|s| s.is_defined()), "no undefined symbols: this should build statically");

    let bytes = elf::write_static_executable(&built, target.triple().architecture, "caller").unwrap();

    assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);
    assert_eq!(bytes[4], 2, "ELFCLASS64");
    let e_type = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
    assert_eq!(e_type, 2, "ET_EXEC");
    let e_phnum = u16::from_le_bytes(bytes[56..58].try_into().unwrap());
    assert_eq!(e_phnum, 1, "one PT_LOAD segment covering the whole image");

    // The call site's displacement must no longer be the placeholder zero
    // the encoder emits before relocations are known.
    let call_reloc = built.code_relocs.iter().find(|r| r.symbol == "callee").unwrap();
    let off = call_reloc.offset as usize;
    let patched = i32::from_le_bytes(bytes_at(&bytes, off));
    assert_ne!(patched, 0);
    fn bytes_at(bytes: &[u8], off: usize) -> [u8; 4] {
        // The code section starts right after the ELF header + one phdr.
        let text_start = 64 + 56;
        bytes[text_start + off..text_start + off + 4].try_into().unwrap()
    }
}

#[test]
fn dynamic_executable_rejects_non_x86_64_plt_stubs() {
    let arena = Arena::new();
    let module = module_with_a_call(&arena);
    let triple = Triple::from_str("aarch64-unknown-linux-gnu").unwrap();
    let target = liric_codegen::for_triple(&triple).unwrap();

    let built = ObjectBuilder::new(target.as_ref(), true).build(&module).unwrap();
    let err = elf::write_dynamic_executable(&built, triple.architecture, "caller", &["libc.so.6"]).unwrap_err();
    assert!(matches!(err, ObjectError::Unsupported(_)));
}
