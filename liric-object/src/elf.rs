//! ELF-64 writers: a relocatable object for the linker, plus hand-rolled
//! static and dynamic executables for the no-linker-available path.

use target_lexicon::Architecture;

use crate::builder::{BuiltObject, SectionRef, SymbolKind};
use crate::codereloc;
use crate::error::{ObjectError, ObjectResult};
use crate::strtab::StrTab;
use liric_codegen::RelocKind;

const EHDR_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;
const SHDR_SIZE: u64 = 64;
const SYM_SIZE: u64 = 24;
const RELA_SIZE: u64 = 24;

const ET_REL: u16 = 1;
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;

const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_RELA: u32 = 4;
const SHT_DYNAMIC: u32 = 6;
const SHT_DYNSYM: u32 = 11;

const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;
const SHF_EXECINSTR: u64 = 0x4;

const STB_LOCAL: u8 = 0;
const STB_GLOBAL: u8 = 1;
const STT_NOTYPE: u8 = 0;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;
const STT_SECTION: u8 = 3;

const PT_LOAD: u32 = 1;
const PT_INTERP: u32 = 3;
const PT_DYNAMIC: u32 = 2;
const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

fn elf_machine(arch: Architecture) -> ObjectResult<u16> {
    match arch {
        Architecture::X86_64 => Ok(62),
        Architecture::Aarch64(_) => Ok(183),
        Architecture::Riscv64(_) => Ok(243),
        _ => Err(ObjectError::Unsupported("architecture has no ELF e_machine mapping")),
    }
}

fn reloc_type(arch: Architecture, kind: RelocKind) -> ObjectResult<u32> {
    use RelocKind::*;
    let t = match (arch, kind) {
        (Architecture::X86_64, Pc32) => 2,   // R_X86_64_PC32
        (Architecture::X86_64, Plt32) => 4,  // R_X86_64_PLT32
        (Architecture::X86_64, Abs64) => 1,  // R_X86_64_64
        (Architecture::X86_64, GotPcRel) => 42, // R_X86_64_GOTPCRELX
        (Architecture::Aarch64(_), Branch26) => 283, // R_AARCH64_CALL26
        (Architecture::Aarch64(_), Page21) => 275,   // R_AARCH64_ADR_PREL_PG_HI21
        (Architecture::Aarch64(_), PageOff12) => 277, // R_AARCH64_ADD_ABS_LO12_NC
        (Architecture::Aarch64(_), Abs64) => 257,    // R_AARCH64_ABS64
        (Architecture::Riscv64(_), Pc32) => 18,      // R_RISCV_CALL_PLT (approximation)
        (Architecture::Riscv64(_), Abs64) => 2,      // R_RISCV_64
        _ => return Err(ObjectError::Unsupported("relocation kind unmapped for this ELF machine")),
    };
    Ok(t)
}

fn align_up(v: u64, align: u64) -> u64 {
    if align == 0 {
        return v;
    }
    (v + align - 1) / align * align
}

fn pad_to(buf: &mut Vec<u8>, align: u64) {
    let target = align_up(buf.len() as u64, align);
    buf.resize(target as usize, 0);
}

/// Build a relocatable ELF-64 object: `.text`, `.data` (if non-empty),
/// `.rela.text`, `.symtab`, `.strtab`, `.shstrtab`, section header table
/// at EOF.
pub fn write_relocatable(built: &BuiltObject, arch: Architecture) -> ObjectResult<Vec<u8>> {
    let machine = elf_machine(arch)?;
    let has_data = !built.data.is_empty();

    // Section name string table.
    let mut shstrtab = StrTab::new();
    let text_name = shstrtab.add(".text");
    let data_name = if has_data { shstrtab.add(".data") } else { 0 };
    let rela_name = shstrtab.add(".rela.text");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let shstrtab_name = shstrtab.add(".shstrtab");

    // Symbol string table and symtab rows. Order: STN_UNDEF, section
    // symbols (.text, then .data if present), then every user symbol as
    // global (defined or not).
    let mut strtab = StrTab::new();
    let mut symtab = Vec::new();
    push_sym(&mut symtab, 0, 0, 0, STB_LOCAL, STT_NOTYPE, 0); // STN_UNDEF

    let text_shndx: u16 = 1;
    let data_shndx: u16 = if has_data { 2 } else { 0 };
    push_sym(&mut symtab, 0, 0, 0, STB_LOCAL, STT_SECTION, text_shndx);
    if has_data {
        push_sym(&mut symtab, 0, 0, 0, STB_LOCAL, STT_SECTION, data_shndx);
    }
    let first_global = symtab.len() as u32 / (SYM_SIZE as u32); // counts rows already pushed

    let mut name_to_symidx = std::collections::HashMap::new();
    for sym in &built.symbols {
        let name_off = strtab.add(&sym.name);
        let (shndx, value) = match sym.section {
            SectionRef::Text => (text_shndx, sym.offset),
            SectionRef::Data => (data_shndx, sym.offset),
            SectionRef::Undefined => (0, 0),
        };
        let ty = match sym.kind {
            SymbolKind::Function => STT_FUNC,
            SymbolKind::Data => STT_OBJECT,
            SymbolKind::Unknown => STT_NOTYPE,
        };
        name_to_symidx.insert(sym.name.clone(), (symtab.len() as u64 / SYM_SIZE) as u32);
        push_sym(&mut symtab, name_off, sym.size, value, STB_GLOBAL, ty, shndx);
    }

    // Relocations against .text.
    let mut rela = Vec::new();
    for r in &built.code_relocs {
        let sym_idx = *name_to_symidx
            .get(&r.symbol)
            .ok_or_else(|| ObjectError::UnknownRelocationSymbol {
                offset: r.offset,
                symbol: r.symbol.clone(),
            })?;
        let rtype = reloc_type(arch, r.kind)? as u64;
        rela.extend_from_slice(&r.offset.to_le_bytes());
        rela.extend_from_slice(&(((sym_idx as u64) << 32) | rtype).to_le_bytes());
        rela.extend_from_slice(&r.addend.to_le_bytes());
    }

    let strtab_bytes = strtab.into_bytes();
    let shstrtab_bytes = shstrtab.into_bytes();

    // Lay out section contents after the ELF header.
    let mut offset = EHDR_SIZE;
    let text_off = offset;
    offset += built.code.len() as u64;
    let data_off = if has_data {
        offset = align_up(offset, 8);
        let o = offset;
        offset += built.data.len() as u64;
        o
    } else {
        0
    };
    offset = align_up(offset, 8);
    let rela_off = offset;
    offset += rela.len() as u64;
    offset = align_up(offset, 8);
    let symtab_off = offset;
    offset += symtab.len() as u64;
    let strtab_off = offset;
    offset += strtab_bytes.len() as u64;
    let shstrtab_off = offset;
    offset += shstrtab_bytes.len() as u64;
    offset = align_up(offset, 8);
    let shoff = offset;

    // NULL, .text, [.data], .rela.text, .symtab, .strtab, .shstrtab.
    let num_sections: u16 = if has_data { 7 } else { 6 };
    let shstrndx = num_sections - 1;

    let mut out = Vec::with_capacity(offset as usize + num_sections as usize * SHDR_SIZE as usize);
    write_ehdr(&mut out, ET_REL, machine, 0, 0, shoff, num_sections, shstrndx);
    out.extend_from_slice(&built.code);
    if has_data {
        pad_to(&mut out, 8);
        out.extend_from_slice(&built.data);
    }
    pad_to(&mut out, 8);
    out.extend_from_slice(&rela);
    pad_to(&mut out, 8);
    out.extend_from_slice(&symtab);
    out.extend_from_slice(&strtab_bytes);
    out.extend_from_slice(&shstrtab_bytes);
    pad_to(&mut out, 8);
    debug_assert_eq!(out.len() as u64, shoff);

    // NULL section.
    write_shdr(&mut out, 0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0);
    // .text
    write_shdr(
        &mut out,
        text_name,
        SHT_PROGBITS,
        SHF_ALLOC | SHF_EXECINSTR,
        0,
        text_off,
        built.code.len() as u64,
        0,
        0,
        16,
        0,
    );
    if has_data {
        write_shdr(
            &mut out,
            data_name,
            SHT_PROGBITS,
            SHF_ALLOC | SHF_WRITE,
            0,
            data_off,
            built.data.len() as u64,
            0,
            0,
            8,
            0,
        );
    }
    // .rela.text: sh_link = symtab section index, sh_info = target (.text) section index.
    let symtab_shndx = if has_data { 4 } else { 3 };
    write_shdr(
        &mut out,
        rela_name,
        SHT_RELA,
        0,
        0,
        rela_off,
        rela.len() as u64,
        symtab_shndx,
        1,
        8,
        RELA_SIZE,
    );
    write_shdr(
        &mut out,
        symtab_name,
        SHT_SYMTAB,
        0,
        0,
        symtab_off,
        symtab.len() as u64,
        symtab_shndx + 1,
        first_global,
        8,
        SYM_SIZE,
    );
    write_shdr(
        &mut out,
        strtab_name,
        SHT_STRTAB,
        0,
        0,
        strtab_off,
        strtab_bytes.len() as u64,
        0,
        0,
        1,
        0,
    );
    write_shdr(
        &mut out,
        shstrtab_name,
        SHT_STRTAB,
        0,
        0,
        shstrtab_off,
        shstrtab_bytes.len() as u64,
        0,
        0,
        1,
        0,
    );

    Ok(out)
}

const LOAD_BASE: u64 = 0x400000;

/// A single `PT_LOAD` segment holding `.text` followed by `.data` at a
/// conventional base address; entry is the offset of `entry_symbol`
/// within `.text`. Data relocations are applied in place before writing.
///
/// Reduced fidelity by design: the whole file is one segment with
/// `p_offset == 0`, so every byte's file offset equals its virtual
/// address minus `LOAD_BASE` and no page-alignment padding is needed.
/// A production loader would split read-only code from writable data
/// into separate segments; this writer does not.
pub fn write_static_executable(
    built: &BuiltObject,
    arch: Architecture,
    entry_symbol: &str,
) -> ObjectResult<Vec<u8>> {
    let machine = elf_machine(arch)?;
    let entry_sym = built
        .symbol(entry_symbol)
        .filter(|s| s.is_defined())
        .ok_or_else(|| ObjectError::MissingEntrySymbol(entry_symbol.to_string()))?;

    let text_vaddr = LOAD_BASE + EHDR_SIZE + PHDR_SIZE;
    let data_vaddr = align_up(text_vaddr + built.code.len() as u64, 8);
    let entry = text_vaddr + entry_sym.offset;

    let mut code = built.code.clone();
    apply_code_relocations(&mut code, built, text_vaddr, data_vaddr, None)?;
    let mut data = built.data.clone();
    apply_data_relocations(&mut data, built, text_vaddr, data_vaddr)?;

    let mut out = Vec::new();
    write_ehdr(&mut out, ET_EXEC, machine, entry, EHDR_SIZE, 0, 0, 0);
    let phdr_pos = out.len();
    out.resize(phdr_pos + PHDR_SIZE as usize, 0);

    out.extend_from_slice(&code);
    pad_to(&mut out, 8);
    out.extend_from_slice(&data);

    let filesz = out.len() as u64;
    write_phdr(
        &mut out[phdr_pos..phdr_pos + PHDR_SIZE as usize],
        PT_LOAD,
        PF_R | PF_X | PF_W,
        0,
        LOAD_BASE,
        filesz,
        filesz,
        0x1000,
    );
    Ok(out)
}

/// Adds `PT_INTERP`, a minimal `.dynsym`/`.dynstr`/`.rela.plt`/`.got.plt`,
/// and one PLT stub per external symbol still undefined after building.
/// `needed` names the `DT_NEEDED` libraries to record.
pub fn write_dynamic_executable(
    built: &BuiltObject,
    arch: Architecture,
    entry_symbol: &str,
    needed: &[&str],
) -> ObjectResult<Vec<u8>> {
    let machine = elf_machine(arch)?;
    if arch != Architecture::X86_64 {
        // The minimal non-lazy PLT stub this writer emits (`jmp
        // *got(%rip)`) is an x86_64 encoding only.
        return Err(ObjectError::Unsupported("dynamic executable PLT stubs are only implemented for x86_64"));
    }
    let interp = match arch {
        Architecture::X86_64 => "/lib64/ld-linux-x86-64.so.2\0",
        Architecture::Aarch64(_) => "/lib/ld-linux-aarch64.so.1\0",
        _ => return Err(ObjectError::Unsupported("no known dynamic linker path for this architecture")),
    };

    let undefined: Vec<&str> = built
        .symbols
        .iter()
        .filter(|s| !s.is_defined())
        .map(|s| s.name.as_str())
        .collect();

    let entry_sym = built
        .symbol(entry_symbol)
        .filter(|s| s.is_defined())
        .ok_or_else(|| ObjectError::MissingEntrySymbol(entry_symbol.to_string()))?;

    let mut dynstr = StrTab::new();
    let mut interp_and_needed_names = Vec::new();
    for lib in needed {
        interp_and_needed_names.push(dynstr.add(lib));
    }
    let mut undef_name_offsets = Vec::new();
    for name in &undefined {
        undef_name_offsets.push(dynstr.add(name));
    }

    let mut dynsym = Vec::new();
    push_sym(&mut dynsym, 0, 0, 0, STB_LOCAL, STT_NOTYPE, 0);
    for off in &undef_name_offsets {
        push_sym(&mut dynsym, *off, 0, 0, STB_GLOBAL, STT_FUNC, 0);
    }

    // One 16-byte PLT stub per undefined symbol; a `.rela.plt` entry with
    // R_X86_64_JUMP_SLOT points the stub's GOT cell at the resolved
    // address. This is a minimal, non-lazy PLT: the stub is only an
    // indirect jump through `.got.plt`.
    let mut plt = Vec::new();
    let mut rela_plt = Vec::new();
    let got_plt_entries = undefined.len();
    for _ in 0..got_plt_entries {
        // ff 25 <rel32 to got.plt entry>  ; jmp *got(%rip)
        plt.extend_from_slice(&[0xff, 0x25, 0, 0, 0, 0]);
    }
    for i in 0..got_plt_entries {
        let sym_idx = (i + 1) as u64;
        rela_plt.extend_from_slice(&0u64.to_le_bytes()); // patched once .got.plt's offset is known
        rela_plt.extend_from_slice(&((sym_idx << 32) | 7u64).to_le_bytes()); // R_X86_64_JUMP_SLOT = 7
        rela_plt.extend_from_slice(&0i64.to_le_bytes());
    }

    let dynstr_bytes = dynstr.into_bytes();

    // Placed with `p_offset == 0` as in the static writer: every byte's
    // file offset equals its virtual address minus `LOAD_BASE`, so each
    // section's address is filled in as soon as its offset is known.
    let mut out = Vec::new();
    write_ehdr(&mut out, ET_DYN, machine, 0, EHDR_SIZE, 0, 0, 0);
    let phnum = 3u16; // PT_LOAD, PT_INTERP, PT_DYNAMIC
    let phdr_pos = out.len();
    out.resize(phdr_pos + phnum as usize * PHDR_SIZE as usize, 0);

    let interp_off = out.len() as u64;
    out.extend_from_slice(interp.as_bytes());

    pad_to(&mut out, 8);
    let dynsym_off = out.len() as u64;
    out.extend_from_slice(&dynsym);
    let dynstr_off = out.len() as u64;
    out.extend_from_slice(&dynstr_bytes);
    pad_to(&mut out, 8);
    let rela_plt_off = out.len() as u64;
    out.extend_from_slice(&rela_plt);
    pad_to(&mut out, 8);
    let got_plt_off = out.len() as u64;
    out.resize(out.len() + got_plt_entries * 8, 0);
    pad_to(&mut out, 8);
    let plt_off = out.len() as u64;
    out.extend_from_slice(&plt);

    // Patch each PLT stub's `jmp *got(%rip)` displacement and the
    // matching `.rela.plt` entry's target address, now that both the
    // `.got.plt` and `.plt` offsets are known.
    for i in 0..got_plt_entries {
        let stub_off = (plt_off + i as u64 * 6) as usize;
        let stub_vaddr = LOAD_BASE + stub_off as u64;
        let got_entry_vaddr = LOAD_BASE + got_plt_off + i as u64 * 8;
        let rel32 = (got_entry_vaddr as i64 - (stub_vaddr as i64 + 6)) as i32;
        out[stub_off + 2..stub_off + 6].copy_from_slice(&rel32.to_le_bytes());

        let rela_entry_off = (rela_plt_off + i as u64 * RELA_SIZE) as usize;
        out[rela_entry_off..rela_entry_off + 8].copy_from_slice(&got_entry_vaddr.to_le_bytes());
    }

    let mut plt_stubs = std::collections::HashMap::new();
    for (i, name) in undefined.iter().enumerate() {
        plt_stubs.insert(name.to_string(), LOAD_BASE + plt_off + i as u64 * 6);
    }

    pad_to(&mut out, 8);
    let text_off = out.len() as u64;
    let text_vaddr = LOAD_BASE + text_off;
    let mut code = built.code.clone();
    let data_vaddr_estimate = LOAD_BASE + align_up(text_off + built.code.len() as u64, 8);
    apply_code_relocations(&mut code, built, text_vaddr, data_vaddr_estimate, Some(&plt_stubs))?;
    out.extend_from_slice(&code);
    pad_to(&mut out, 8);
    let data_off = out.len() as u64;
    let data_vaddr = LOAD_BASE + data_off;
    debug_assert_eq!(data_vaddr, data_vaddr_estimate);

    let mut data = built.data.clone();
    apply_data_relocations(&mut data, built, text_vaddr, data_vaddr)?;
    out.extend_from_slice(&data);

    let entry = text_vaddr + entry_sym.offset;
    out[24..32].copy_from_slice(&entry.to_le_bytes()); // e_entry, known only now

    // `.dynamic` array: a short, fixed set of tags sufficient for a
    // loader to find `.dynsym`/`.dynstr`/`.rela.plt` and the needed libs.
    let dynamic_off = out.len() as u64;
    let mut dyn_entries: Vec<(i64, u64)> = Vec::new();
    for off in &interp_and_needed_names {
        dyn_entries.push((1, *off as u64)); // DT_NEEDED
    }
    dyn_entries.push((5, dynstr_off)); // DT_STRTAB
    dyn_entries.push((6, dynsym_off)); // DT_SYMTAB
    dyn_entries.push((11, SYM_SIZE)); // DT_SYMENT
    dyn_entries.push((23, rela_plt_off)); // DT_JMPREL
    dyn_entries.push((2, (rela_plt.len()) as u64)); // DT_PLTRELSZ
    dyn_entries.push((20, 7)); // DT_PLTREL = DT_RELA
    dyn_entries.push((0, 0)); // DT_NULL
    for (tag, val) in &dyn_entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&val.to_le_bytes());
    }
    let dynamic_size = (dyn_entries.len() * 16) as u64;

    write_phdr(
        &mut out[phdr_pos..phdr_pos + PHDR_SIZE as usize],
        PT_LOAD,
        PF_R | PF_X | PF_W,
        0,
        LOAD_BASE,
        out.len() as u64,
        out.len() as u64,
        0x1000,
    );
    write_phdr(
        &mut out[phdr_pos + PHDR_SIZE as usize..phdr_pos + 2 * PHDR_SIZE as usize],
        PT_INTERP,
        PF_R,
        interp_off,
        LOAD_BASE + interp_off,
        interp.len() as u64,
        interp.len() as u64,
        1,
    );
    write_phdr(
        &mut out[phdr_pos + 2 * PHDR_SIZE as usize..phdr_pos + 3 * PHDR_SIZE as usize],
        PT_DYNAMIC,
        PF_R | PF_W,
        dynamic_off,
        LOAD_BASE + dynamic_off,
        dynamic_size,
        dynamic_size,
        8,
    );

    Ok(out)
}

/// Patch every call-site/address relocation directly into `code`. A symbol
/// still undefined after building resolves through `plt_stubs` if given
/// (the dynamic-executable path); with `plt_stubs: None` (the static path,
/// which carries no PLT) any undefined symbol is a hard error.
fn apply_code_relocations(
    code: &mut [u8],
    built: &BuiltObject,
    text_vaddr: u64,
    data_vaddr: u64,
    plt_stubs: Option<&std::collections::HashMap<String, u64>>,
) -> ObjectResult<()> {
    for r in &built.code_relocs {
        let sym = built.symbol(&r.symbol).ok_or_else(|| ObjectError::UnknownRelocationSymbol {
            offset: r.offset,
            symbol: r.symbol.clone(),
        })?;
        let target_vaddr = if sym.is_defined() {
            match sym.section {
                SectionRef::Text => text_vaddr + sym.offset,
                SectionRef::Data => data_vaddr + sym.offset,
                SectionRef::Undefined => unreachable!(),
            }
        } else if let Some(addr) = plt_stubs.and_then(|m| m.get(&r.symbol)) {
            *addr
        } else {
            return Err(ObjectError::UnknownRelocationSymbol { offset: r.offset, symbol: r.symbol.clone() });
        };
        let site_vaddr = text_vaddr + r.offset;
        codereloc::patch(code, r.offset as usize, r.kind, r.addend, site_vaddr, target_vaddr)?;
    }
    Ok(())
}

fn apply_data_relocations(
    data: &mut [u8],
    built: &BuiltObject,
    text_vaddr: u64,
    data_vaddr: u64,
) -> ObjectResult<()> {
    for r in &built.data_relocs {
        let sym = built.symbol(&r.symbol).ok_or_else(|| ObjectError::UnknownRelocationSymbol {
            offset: r.offset,
            symbol: r.symbol.clone(),
        })?;
        if !sym.is_defined() {
            // Left as a zero ABS64 slot; only a dynamic loader could fix
            // this up, and the static-executable path never runs one.
            continue;
        }
        let target_base = match sym.section {
            SectionRef::Text => text_vaddr,
            SectionRef::Data => data_vaddr,
            SectionRef::Undefined => continue,
        };
        let value = (target_base + sym.offset) as i64 + r.addend;
        let start = r.offset as usize;
        if start + 8 > data.len() {
            return Err(ObjectError::DataRelocationOutOfBounds {
                offset: r.offset,
                size: data.len(),
            });
        }
        data[start..start + 8].copy_from_slice(&(value as u64).to_le_bytes());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_ehdr(
    out: &mut Vec<u8>,
    e_type: u16,
    e_machine: u16,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_shnum: u16,
    e_shstrndx: u16,
) {
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&e_type.to_le_bytes());
    out.extend_from_slice(&e_machine.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&e_entry.to_le_bytes());
    out.extend_from_slice(&e_phoff.to_le_bytes());
    out.extend_from_slice(&e_shoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    let phnum: u16 = if e_phoff != 0 { 1 } else { 0 };
    out.extend_from_slice(&phnum.to_le_bytes());
    out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&e_shnum.to_le_bytes());
    out.extend_from_slice(&e_shstrndx.to_le_bytes());
}

#[allow(clippy::too_many_arguments)]
fn write_shdr(
    out: &mut Vec<u8>,
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
) {
    out.extend_from_slice(&name.to_le_bytes());
    out.extend_from_slice(&sh_type.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&link.to_le_bytes());
    out.extend_from_slice(&info.to_le_bytes());
    out.extend_from_slice(&addralign.to_le_bytes());
    out.extend_from_slice(&entsize.to_le_bytes());
}

#[allow(clippy::too_many_arguments)]
fn write_phdr(out: &mut [u8], p_type: u32, p_flags: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64, align: u64) {
    out[0..4].copy_from_slice(&p_type.to_le_bytes());
    out[4..8].copy_from_slice(&p_flags.to_le_bytes());
    out[8..16].copy_from_slice(&offset.to_le_bytes());
    out[16..24].copy_from_slice(&vaddr.to_le_bytes());
    out[24..32].copy_from_slice(&vaddr.to_le_bytes()); // p_paddr == p_vaddr
    out[32..40].copy_from_slice(&filesz.to_le_bytes());
    out[40..48].copy_from_slice(&memsz.to_le_bytes());
    out[48..56].copy_from_slice(&align.to_le_bytes());
}

fn push_sym(out: &mut Vec<u8>, name: u32, size: u64, value: u64, bind: u8, ty: u8, shndx: u16) {
    out.extend_from_slice(&name.to_le_bytes());
    out.push((bind << 4) | (ty & 0xf)); // st_info
    out.push(0); // st_other
    out.extend_from_slice(&shndx.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
}
