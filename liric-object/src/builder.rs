//! The target-agnostic object builder: selects and encodes every defined
//! function and lays out every defined global into flat code/data buffers,
//! producing a symbol table and two relocation lists an object writer then
//! turns into a concrete container format.

use std::collections::HashMap;

use liric_codegen::{RelocKind, Target};
use liric_ir::Module;

use crate::blobs;
use crate::error::{ObjectError, ObjectResult};

const MAX_CODE_BYTES: usize = 4 * 1024 * 1024;
const MAX_DATA_BYTES: usize = 1024 * 1024;
const CODE_ALIGN: u64 = 16;

/// What a symbol names: affects only the `st_info`/`n_type` the writer
/// chooses, never layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Data,
    /// Referenced only (e.g. a call target), kind never observed locally.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRef {
    Text,
    Data,
    Undefined,
}

#[derive(Debug, Clone)]
pub struct ObjectSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub section: SectionRef,
    pub offset: u64,
    pub size: u64,
}

impl ObjectSymbol {
    pub fn is_defined(&self) -> bool {
        self.section != SectionRef::Undefined
    }
}

#[derive(Debug, Clone)]
pub struct CodeRelocation {
    pub offset: u64,
    pub symbol: String,
    pub kind: RelocKind,
    pub addend: i64,
}

#[derive(Debug, Clone)]
pub struct DataRelocation {
    pub offset: u64,
    pub symbol: String,
    pub addend: i64,
}

/// The flattened result of building a module for one target: code/data
/// bytes plus the symbol table (both by name and in definition order) and
/// the two relocation lists.
pub struct BuiltObject {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub symbols: Vec<ObjectSymbol>,
    pub symbol_index: HashMap<String, usize>,
    pub code_relocs: Vec<CodeRelocation>,
    pub data_relocs: Vec<DataRelocation>,
}

impl BuiltObject {
    pub fn symbol(&self, name: &str) -> Option<&ObjectSymbol> {
        self.symbol_index.get(name).map(|&i| &self.symbols[i])
    }
}

pub struct ObjectBuilder<'t> {
    target: &'t dyn Target,
    /// Resolve unresolved blob-kind intrinsics to libc names when building
    /// a self-contained ("no-link") image instead of a relocatable object.
    no_link: bool,
    symbols: Vec<ObjectSymbol>,
    symbol_index: HashMap<String, usize>,
    code: Vec<u8>,
    data: Vec<u8>,
    code_relocs: Vec<CodeRelocation>,
    data_relocs: Vec<DataRelocation>,
}

impl<'t> ObjectBuilder<'t> {
    pub fn new(target: &'t dyn Target, no_link: bool) -> Self {
        ObjectBuilder {
            target,
            no_link,
            symbols: Vec::new(),
            symbol_index: HashMap::new(),
            code: Vec::new(),
            data: Vec::new(),
            code_relocs: Vec::new(),
            data_relocs: Vec::new(),
        }
    }

    fn ensure_symbol(&mut self, name: &str, kind: SymbolKind) -> usize {
        if let Some(&i) = self.symbol_index.get(name) {
            return i;
        }
        let i = self.symbols.len();
        self.symbols.push(ObjectSymbol {
            name: name.to_string(),
            kind,
            section: SectionRef::Undefined,
            offset: 0,
            size: 0,
        });
        self.symbol_index.insert(name.to_string(), i);
        i
    }

    fn define_symbol(&mut self, name: &str, section: SectionRef, offset: u64, size: u64) {
        let i = self.ensure_symbol(name, SectionRef::kind_of(section));
        self.symbols[i].section = section;
        self.symbols[i].offset = offset;
        self.symbols[i].size = size;
    }

    fn align_code(&mut self) {
        let pad = (CODE_ALIGN - (self.code.len() as u64 % CODE_ALIGN)) % CODE_ALIGN;
        self.code.resize(self.code.len() + pad as usize, 0x90);
    }

    pub fn build(mut self, module: &Module) -> ObjectResult<BuiltObject> {
        // Step 1: pre-register every function and non-external global.
        for f in module.functions() {
            self.ensure_symbol(&f.name, SymbolKind::Function);
        }
        for g in module.globals() {
            self.ensure_symbol(&g.name, SymbolKind::Data);
        }

        // Step 2: select, encode, and place every defined function.
        for f in module.functions() {
            if f.is_declaration {
                continue;
            }
            self.align_code();
            let offset = self.code.len() as u64;
            let encoded = liric_codegen::compile_function(self.target, f, true)
                .map_err(|source| ObjectError::Codegen {
                    symbol: f.name.clone(),
                    source,
                })?;
            self.define_symbol(&f.name, SectionRef::Text, offset, encoded.bytes.len() as u64);
            self.code.extend_from_slice(&encoded.bytes);
            for reloc in &encoded.relocs {
                self.ensure_symbol(&reloc.symbol, SymbolKind::Unknown);
                self.code_relocs.push(CodeRelocation {
                    offset: offset + reloc.offset as u64,
                    symbol: reloc.symbol.clone(),
                    kind: reloc.kind,
                    addend: reloc.addend,
                });
            }
        }

        // Step 3: materialize any still-undefined blob-backed intrinsic.
        let arch = self.target.triple().architecture;
        let pending: Vec<String> = self
            .symbols
            .iter()
            .filter(|s| !s.is_defined())
            .map(|s| s.name.clone())
            .collect();
        for name in pending {
            if let Some(blob) = blobs::lookup(&name, arch) {
                self.align_code();
                let offset = self.code.len() as u64;
                self.code.extend_from_slice(blob);
                self.define_symbol(&name, SectionRef::Text, offset, blob.len() as u64);
            } else if self.no_link {
                if let Some(libc_name) = blobs::libc_fallback(&name) {
                    log::debug!("remapping unresolved intrinsic {name} to libc {libc_name}");
                }
            }
        }

        // Step 4: lay out every defined global's initializer and translate
        // its constant relocations into data relocations.
        for g in module.globals() {
            if g.is_external {
                continue;
            }
            let mut align = g.ty.align();
            if !g.relocs.is_empty() {
                align = align.max(8);
            }
            let pad = (align - (self.data.len() as u64 % align)) % align;
            self.data.resize(self.data.len() + pad as usize, 0);
            let offset = self.data.len() as u64;
            self.data.extend_from_slice(&g.initializer);
            self.define_symbol(&g.name, SectionRef::Data, offset, g.initializer.len() as u64);
            for r in &g.relocs {
                let reloc_offset = offset + r.offset_in_global;
                if reloc_offset + 8 > self.data.len() as u64 {
                    return Err(ObjectError::DataRelocationOutOfBounds {
                        offset: reloc_offset,
                        size: self.data.len(),
                    });
                }
                self.ensure_symbol(&r.symbol, SymbolKind::Unknown);
                self.data_relocs.push(DataRelocation {
                    offset: reloc_offset,
                    symbol: r.symbol.clone(),
                    addend: r.addend,
                });
            }
        }

        if self.code.len() > MAX_CODE_BYTES {
            return Err(ObjectError::CodeTooLarge(self.code.len()));
        }
        if self.data.len() > MAX_DATA_BYTES {
            return Err(ObjectError::DataTooLarge(self.data.len()));
        }

        Ok(BuiltObject {
            code: self.code,
            data: self.data,
            symbols: self.symbols,
            symbol_index: self.symbol_index,
            code_relocs: self.code_relocs,
            data_relocs: self.data_relocs,
        })
    }
}

impl SectionRef {
    fn kind_of(section: SectionRef) -> SymbolKind {
        match section {
            SectionRef::Text => SymbolKind::Function,
            SectionRef::Data => SymbolKind::Data,
            SectionRef::Undefined => SymbolKind::Unknown,
        }
    }
}
