//! Mach-O arm64 writers: a relocatable `MH_OBJECT` for the linker, plus a
//! hand-rolled, self-contained `MH_EXECUTE` for the no-linker-available
//! path (pre-resolved addresses, no dynamic symbol resolution at load
//! time beyond `dyld`'s own startup).

use crate::builder::{BuiltObject, SectionRef};
use crate::error::{ObjectError, ObjectResult};

const MH_MAGIC_64: u32 = 0xfeedfacf;
const MH_OBJECT: u32 = 0x1;
const MH_EXECUTE: u32 = 0x2;
const CPU_TYPE_ARM64: u32 = 0x0100000c;
const CPU_SUBTYPE_ALL: u32 = 0;
const MH_SUBSECTIONS_VIA_SYMBOLS: u32 = 0x2000;
const MH_NOUNDEFS: u32 = 0x1;
const MH_DYLDLINK: u32 = 0x4;
const MH_TWOLEVEL: u32 = 0x80;

const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x02;
const LC_DYSYMTAB: u32 = 0x0b;
const LC_LOAD_DYLIB: u32 = 0x0c;
const LC_LOAD_DYLINKER: u32 = 0x0e;
const LC_UUID: u32 = 0x1b;
const LC_FUNCTION_STARTS: u32 = 0x26;
const LC_DATA_IN_CODE: u32 = 0x29;
const LC_SOURCE_VERSION: u32 = 0x2a;
const LC_BUILD_VERSION: u32 = 0x32;
const LC_MAIN: u32 = 0x8000_0028;
const LC_DYLD_EXPORTS_TRIE: u32 = 0x8000_0033;
const LC_DYLD_CHAINED_FIXUPS: u32 = 0x8000_0034;

const S_REGULAR: u32 = 0;
const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;

const N_EXT: u8 = 0x1;
const N_SECT: u8 = 0xe;

const PLATFORM_MACOS: u32 = 1;
const TOOL_LD: u32 = 3;

fn align_up(v: u64, align: u64) -> u64 {
    (v + align - 1) / align * align
}

fn w32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn w64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn wname(out: &mut Vec<u8>, name: &str) {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    out.extend_from_slice(&buf);
}
fn wpad(out: &mut Vec<u8>, n: usize) {
    out.resize(out.len() + n, 0);
}

fn append_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Native Mach-O relocation type and pc-relative flag for one of this
/// crate's relocation kinds, arm64 only.
fn macho_reloc(kind: liric_codegen::RelocKind) -> ObjectResult<(u8, bool, u32)> {
    use liric_codegen::RelocKind::*;
    // (native type, is_pcrel, r_length)
    match kind {
        Abs64 => Ok((0, false, 3)), // ARM64_RELOC_UNSIGNED, 8-byte
        Branch26 => Ok((2, true, 2)), // ARM64_RELOC_BRANCH26
        Page21 => Ok((3, true, 2)),   // ARM64_RELOC_PAGE21
        PageOff12 => Ok((4, false, 2)), // ARM64_RELOC_PAGEOFF12
        GotLoadPage21 => Ok((5, true, 2)), // ARM64_RELOC_GOT_LOAD_PAGE21
        GotLoadPageOff12 => Ok((6, false, 2)), // ARM64_RELOC_GOT_LOAD_PAGEOFF12
        _ => Err(ObjectError::Unsupported("relocation kind unmapped for Mach-O arm64")),
    }
}

/// Build a relocatable Mach-O arm64 object: `__TEXT,__text`, optionally
/// `__DATA,__data`, `LC_SYMTAB`, `LC_BUILD_VERSION`.
///
/// Symbols are written defined-first, undefined-last, so the `nlist_64`
/// array's local/external/undefined runs stay contiguous as the format
/// requires; each name is prefixed with `_` per the platform convention.
pub fn write_relocatable(built: &BuiltObject) -> ObjectResult<Vec<u8>> {
    let defined: Vec<&crate::builder::ObjectSymbol> =
        built.symbols.iter().filter(|s| s.is_defined()).collect();
    let undefined: Vec<&crate::builder::ObjectSymbol> =
        built.symbols.iter().filter(|s| !s.is_defined()).collect();

    let mut strtab = vec![0u8];
    let mut str_offsets = Vec::with_capacity(built.symbols.len());
    for sym in defined.iter().chain(undefined.iter()) {
        str_offsets.push(strtab.len() as u32);
        strtab.push(b'_');
        strtab.extend_from_slice(sym.name.as_bytes());
        strtab.push(0);
    }

    let has_data = !built.data.is_empty();
    let num_sections: u32 = if has_data { 2 } else { 1 };

    let header_size: u64 = 32;
    let segment_cmd_size: u64 = 72 + 80 * num_sections as u64;
    let symtab_cmd_size: u64 = 24;
    let build_version_cmd_size: u64 = 24;
    let ncmds: u32 = 3;
    let sizeofcmds = segment_cmd_size + symtab_cmd_size + build_version_cmd_size;

    let text_file_off = header_size + sizeofcmds;
    let text_size = built.code.len() as u64;

    let data_align = 8u64;
    let data_file_off = align_up(text_file_off + text_size, data_align);
    let data_pad = data_file_off - (text_file_off + text_size);
    let data_vmaddr = if has_data { align_up(text_size, data_align) } else { 0 };

    let text_reloc_off = data_file_off + if has_data { built.data.len() as u64 } else { 0 };
    let text_reloc_size = built.code_relocs.len() as u64 * 8;

    let data_reloc_off = text_reloc_off + text_reloc_size;
    let data_reloc_size = built.data_relocs.len() as u64 * 8;

    let symtab_off = data_reloc_off + data_reloc_size;
    let symtab_entries_size = built.symbols.len() as u64 * 16;
    let strtab_off = symtab_off + symtab_entries_size;
    let total_size = strtab_off + strtab.len() as u64;

    let mut out = Vec::with_capacity(total_size as usize);

    w32(&mut out, MH_MAGIC_64);
    w32(&mut out, CPU_TYPE_ARM64);
    w32(&mut out, CPU_SUBTYPE_ALL);
    w32(&mut out, MH_OBJECT);
    w32(&mut out, ncmds);
    w32(&mut out, sizeofcmds as u32);
    w32(&mut out, MH_SUBSECTIONS_VIA_SYMBOLS);
    w32(&mut out, 0);

    w32(&mut out, LC_SEGMENT_64);
    w32(&mut out, segment_cmd_size as u32);
    wpad(&mut out, 16);
    let seg_vmsize = if has_data { data_vmaddr + built.data.len() as u64 } else { text_size };
    let seg_filesize = text_size + if has_data { data_pad + built.data.len() as u64 } else { 0 };
    w64(&mut out, 0);
    w64(&mut out, seg_vmsize);
    w64(&mut out, text_file_off);
    w64(&mut out, seg_filesize);
    w32(&mut out, 7);
    w32(&mut out, 7);
    w32(&mut out, num_sections);
    w32(&mut out, 0);

    wname(&mut out, "__text");
    wname(&mut out, "__TEXT");
    w64(&mut out, 0);
    w64(&mut out, text_size);
    w32(&mut out, text_file_off as u32);
    w32(&mut out, 2);
    w32(&mut out, text_reloc_off as u32);
    w32(&mut out, built.code_relocs.len() as u32);
    w32(&mut out, S_REGULAR | S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);

    if has_data {
        wname(&mut out, "__data");
        wname(&mut out, "__DATA");
        w64(&mut out, data_vmaddr);
        w64(&mut out, built.data.len() as u64);
        w32(&mut out, data_file_off as u32);
        w32(&mut out, 3);
        w32(&mut out, if built.data_relocs.is_empty() { 0 } else { data_reloc_off as u32 });
        w32(&mut out, built.data_relocs.len() as u32);
        w32(&mut out, S_REGULAR);
        w32(&mut out, 0);
        w32(&mut out, 0);
        w32(&mut out, 0);
    }

    w32(&mut out, LC_SYMTAB);
    w32(&mut out, symtab_cmd_size as u32);
    w32(&mut out, symtab_off as u32);
    w32(&mut out, built.symbols.len() as u32);
    w32(&mut out, strtab_off as u32);
    w32(&mut out, strtab.len() as u32);

    w32(&mut out, LC_BUILD_VERSION);
    w32(&mut out, build_version_cmd_size as u32);
    w32(&mut out, PLATFORM_MACOS);
    w32(&mut out, 14 << 16);
    w32(&mut out, 14 << 16);
    w32(&mut out, 0);

    out.resize(text_file_off as usize, 0);
    out.extend_from_slice(&built.code);
    if has_data {
        out.resize(data_file_off as usize, 0);
        out.extend_from_slice(&built.data);
    }

    // Name -> remapped symbol index, for relocation entries below.
    let mut remap = std::collections::HashMap::new();
    for (i, sym) in defined.iter().enumerate() {
        remap.insert(sym.name.clone(), i as u32);
    }
    for (i, sym) in undefined.iter().enumerate() {
        remap.insert(sym.name.clone(), (defined.len() + i) as u32);
    }

    out.resize(text_reloc_off as usize, 0);
    for r in &built.code_relocs {
        let sym_idx = *remap
            .get(&r.symbol)
            .ok_or_else(|| ObjectError::UnknownRelocationSymbol { offset: r.offset, symbol: r.symbol.clone() })?;
        let (native_type, is_pcrel, r_length) = macho_reloc(r.kind)?;
        let packed = (sym_idx & 0x00ff_ffff)
            | ((is_pcrel as u32) << 24)
            | (r_length << 25)
            | (1 << 27)
            | ((native_type as u32 & 0xf) << 28);
        w32(&mut out, r.offset as u32);
        w32(&mut out, packed);
    }

    out.resize(data_reloc_off as usize, 0);
    for r in &built.data_relocs {
        let sym_idx = *remap
            .get(&r.symbol)
            .ok_or_else(|| ObjectError::UnknownRelocationSymbol { offset: r.offset, symbol: r.symbol.clone() })?;
        // Data relocations carry only ABS64 in this builder.
        let packed = (sym_idx & 0x00ff_ffff) | (3u32 << 25) | (1 << 27);
        w32(&mut out, r.offset as u32);
        w32(&mut out, packed);
    }

    out.resize(symtab_off as usize, 0);
    for (oi, sym) in defined.iter().chain(undefined.iter()).enumerate() {
        w32(&mut out, str_offsets[oi]);
        if sym.is_defined() {
            let shndx: u8 = match sym.section {
                SectionRef::Text => 1,
                SectionRef::Data => 2,
                SectionRef::Undefined => 0,
            };
            out.push(N_SECT | N_EXT);
            out.push(shndx);
            out.extend_from_slice(&0u16.to_le_bytes());
            let mut value = sym.offset;
            if matches!(sym.section, SectionRef::Data) {
                value += data_vmaddr;
            }
            w64(&mut out, value);
        } else {
            out.push(N_EXT);
            out.push(0);
            out.extend_from_slice(&0u16.to_le_bytes());
            w64(&mut out, 0);
        }
    }

    out.resize(strtab_off as usize, 0);
    out.extend_from_slice(&strtab);

    Ok(out)
}

/// Build a self-contained, non-PIE-relocatable-at-runtime Mach-O arm64
/// `MH_EXECUTE`, good enough for `dyld` to load and jump to `entry_symbol`
/// with no external symbols to resolve beyond `libSystem`'s own startup.
///
/// No data section and no external relocations are supported on this
/// path: every referenced symbol must already be a defined function. A
/// module calling out to a host symbol resolved via `dlsym` (the fuller
/// no-link design with a synthesized, slide-fixed-up GOT) is not built
/// here; such a module should go through [`write_relocatable`] and a real
/// linker instead.
///
/// A real `codesign --sign -` ad-hoc signature is still required by the
/// OS loader on most OSes targeting this format; this writer does not
/// invoke `codesign` itself and leaves that to whatever runs the build.
pub fn write_no_link_executable(built: &BuiltObject, entry_symbol: &str) -> ObjectResult<Vec<u8>> {
    if !built.data.is_empty() {
        return Err(ObjectError::Unsupported("no-link Mach-O executable does not support a data section"));
    }
    if built.symbols.iter().any(|s| !s.is_defined()) {
        return Err(ObjectError::Unsupported(
            "no-link Mach-O executable requires every referenced symbol to be defined in this module",
        ));
    }

    let entry_sym = built
        .symbol(entry_symbol)
        .filter(|s| s.is_defined() && matches!(s.section, SectionRef::Text))
        .ok_or_else(|| ObjectError::MissingEntrySymbol(entry_symbol.to_string()))?;

    const IMAGE_BASE: u64 = 0x1_0000_0000;
    const PAGE: u64 = 0x4000;
    const NCMDS: u32 = 15;
    const SIZEOFCMDS: u32 = 648;
    const CODE_SIG_SLACK: u64 = 16;

    let header_and_cmds = 32 + SIZEOFCMDS as u64 + CODE_SIG_SLACK;
    let text_off = align_up(header_and_cmds, 8);
    let text_file_size = align_up(text_off + built.code.len() as u64, PAGE);
    let linkedit_off = text_file_size;

    let entry_off = text_off + entry_sym.offset;
    let entry_addr = IMAGE_BASE + entry_off;
    let text_vaddr = IMAGE_BASE + text_off;

    let mut code = built.code.clone();
    for r in &built.code_relocs {
        let sym = built
            .symbol(&r.symbol)
            .ok_or_else(|| ObjectError::UnknownRelocationSymbol { offset: r.offset, symbol: r.symbol.clone() })?;
        let target_vaddr = text_vaddr + sym.offset;
        let site_vaddr = text_vaddr + r.offset;
        crate::codereloc::patch(&mut code, r.offset as usize, r.kind, r.addend, site_vaddr, target_vaddr)?;
    }

    // A minimal, all-zero chained-fixups blob: no chained pointer fixups
    // are needed since this image carries no external symbol bindings.
    let fixups_blob: [u8; 56] = [
        0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x30, 0x00, 0x00, 0x00, 0x30, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let fixups_off = linkedit_off;

    let mut exports_blob = Vec::new();
    exports_blob.extend_from_slice(&[0x00, 0x01, b'_', 0x00, 0x12, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00]);
    append_uleb128(&mut exports_blob, entry_off);
    exports_blob.extend_from_slice(&[0x00, 0x00, 0x02]);
    exports_blob.extend_from_slice(b"_mh_execute_header");
    exports_blob.push(0x09);
    exports_blob.extend_from_slice(b"main\0");
    exports_blob.extend_from_slice(&[0x0d, 0x00, 0x00]);
    let exports_off = fixups_off + fixups_blob.len() as u64;

    let mut func_starts_blob = Vec::new();
    append_uleb128(&mut func_starts_blob, entry_off);
    func_starts_blob.push(0x00);
    let func_starts_size = 8u64;
    let func_starts_off = exports_off + exports_blob.len() as u64;

    let mut symtab_blob = Vec::new();
    w32(&mut symtab_blob, 2);
    symtab_blob.push(N_SECT | N_EXT);
    symtab_blob.push(1);
    symtab_blob.extend_from_slice(&0x0010u16.to_le_bytes());
    w64(&mut symtab_blob, IMAGE_BASE);
    w32(&mut symtab_blob, 22);
    symtab_blob.push(N_SECT | N_EXT);
    symtab_blob.push(1);
    symtab_blob.extend_from_slice(&0u16.to_le_bytes());
    w64(&mut symtab_blob, entry_addr);
    let symtab_off = func_starts_off + func_starts_size;

    let mut strtab_blob = vec![0u8; 32];
    strtab_blob[0] = 0x20;
    strtab_blob[1] = 0x00;
    strtab_blob[2..2 + 18].copy_from_slice(b"__mh_execute_header");
    strtab_blob[22..22 + 6].copy_from_slice(b"_main\0");
    let strtab_off = symtab_off + symtab_blob.len() as u64;

    let linkedit_size = strtab_off + strtab_blob.len() as u64 - linkedit_off;
    let total_size = strtab_off + strtab_blob.len() as u64;

    let mut out = Vec::with_capacity(total_size as usize);
    w32(&mut out, MH_MAGIC_64);
    w32(&mut out, CPU_TYPE_ARM64);
    w32(&mut out, CPU_SUBTYPE_ALL);
    w32(&mut out, MH_EXECUTE);
    w32(&mut out, NCMDS);
    w32(&mut out, SIZEOFCMDS);
    w32(&mut out, MH_NOUNDEFS | MH_DYLDLINK | MH_TWOLEVEL);
    w32(&mut out, 0);

    // __PAGEZERO
    w32(&mut out, LC_SEGMENT_64);
    w32(&mut out, 72);
    wname(&mut out, "__PAGEZERO");
    w64(&mut out, 0);
    w64(&mut out, IMAGE_BASE);
    w64(&mut out, 0);
    w64(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);

    // __TEXT
    w32(&mut out, LC_SEGMENT_64);
    w32(&mut out, 152);
    wname(&mut out, "__TEXT");
    w64(&mut out, IMAGE_BASE);
    w64(&mut out, text_file_size);
    w64(&mut out, 0);
    w64(&mut out, text_file_size);
    w32(&mut out, 5);
    w32(&mut out, 5);
    w32(&mut out, 1);
    w32(&mut out, 0);
    wname(&mut out, "__text");
    wname(&mut out, "__TEXT");
    w64(&mut out, IMAGE_BASE + text_off);
    w64(&mut out, built.code.len() as u64);
    w32(&mut out, text_off as u32);
    w32(&mut out, 2);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, S_REGULAR | S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);

    // __LINKEDIT
    w32(&mut out, LC_SEGMENT_64);
    w32(&mut out, 72);
    wname(&mut out, "__LINKEDIT");
    w64(&mut out, IMAGE_BASE + linkedit_off);
    w64(&mut out, align_up(linkedit_size, PAGE));
    w64(&mut out, linkedit_off);
    w64(&mut out, linkedit_size);
    w32(&mut out, 1);
    w32(&mut out, 1);
    w32(&mut out, 0);
    w32(&mut out, 0);

    w32(&mut out, LC_DYLD_CHAINED_FIXUPS);
    w32(&mut out, 16);
    w32(&mut out, fixups_off as u32);
    w32(&mut out, fixups_blob.len() as u32);

    w32(&mut out, LC_DYLD_EXPORTS_TRIE);
    w32(&mut out, 16);
    w32(&mut out, exports_off as u32);
    w32(&mut out, exports_blob.len() as u32);

    w32(&mut out, LC_SYMTAB);
    w32(&mut out, 24);
    w32(&mut out, symtab_off as u32);
    w32(&mut out, 2);
    w32(&mut out, strtab_off as u32);
    w32(&mut out, strtab_blob.len() as u32);

    w32(&mut out, LC_DYSYMTAB);
    w32(&mut out, 80);
    w32(&mut out, 0);
    w32(&mut out, 0); // ilocalsym, nlocalsym
    w32(&mut out, 0);
    w32(&mut out, 2); // iextdefsym, nextdefsym
    w32(&mut out, 2);
    w32(&mut out, 0); // iundefsym, nundefsym
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);
    w32(&mut out, 0);

    let dyld_path = "/usr/lib/dyld\0";
    w32(&mut out, LC_LOAD_DYLINKER);
    w32(&mut out, 32);
    w32(&mut out, 12);
    out.extend_from_slice(dyld_path.as_bytes());
    wpad(&mut out, 32 - 12 - dyld_path.len());

    w32(&mut out, LC_UUID);
    w32(&mut out, 24);
    wpad(&mut out, 16);

    w32(&mut out, LC_BUILD_VERSION);
    w32(&mut out, 32);
    w32(&mut out, PLATFORM_MACOS);
    w32(&mut out, 14 << 16);
    w32(&mut out, 14 << 16);
    w32(&mut out, 1);
    w32(&mut out, TOOL_LD);
    w32(&mut out, 0x04ce_0100);

    w32(&mut out, LC_SOURCE_VERSION);
    w32(&mut out, 16);
    w64(&mut out, 0);

    w32(&mut out, LC_MAIN);
    w32(&mut out, 24);
    w64(&mut out, entry_off);
    w64(&mut out, 0);

    let libsystem_path = "/usr/lib/libSystem.B.dylib\0";
    w32(&mut out, LC_LOAD_DYLIB);
    w32(&mut out, 56);
    w32(&mut out, 24);
    w32(&mut out, 2);
    w32(&mut out, 0x054c_0000);
    w32(&mut out, 0x0001_0000);
    out.extend_from_slice(libsystem_path.as_bytes());
    wpad(&mut out, 56 - 24 - libsystem_path.len());

    w32(&mut out, LC_FUNCTION_STARTS);
    w32(&mut out, 16);
    w32(&mut out, func_starts_off as u32);
    w32(&mut out, func_starts_size as u32);

    w32(&mut out, LC_DATA_IN_CODE);
    w32(&mut out, 16);
    w32(&mut out, symtab_off as u32);
    w32(&mut out, 0);

    if out.len() as u64 > text_off {
        return Err(ObjectError::Unsupported("load command list overran the reserved header region"));
    }

    out.resize(text_off as usize, 0);
    out.extend_from_slice(&code);
    out.resize(fixups_off as usize, 0);
    out.extend_from_slice(&fixups_blob);
    out.extend_from_slice(&exports_blob);
    out.resize(func_starts_off as usize, 0);
    out.extend_from_slice(&func_starts_blob);
    out.resize(symtab_off as usize, 0);
    out.extend_from_slice(&symtab_blob);
    out.resize(strtab_off as usize, 0);
    out.extend_from_slice(&strtab_blob);
    out.resize(total_size as usize, 0);

    Ok(out)
}
