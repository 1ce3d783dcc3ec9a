//! Module-level global variables.

use crate::types::Type;

/// A data relocation: a pointer-bearing field inside a global's initializer
/// that must be patched to the address of `symbol` (plus `addend`) at link
/// or load time.
#[derive(Debug, Clone)]
pub struct DataReloc {
    pub offset_in_global: u64,
    pub symbol: String,
    pub addend: i64,
}

/// A module-level global variable or external global declaration.
#[derive(Debug)]
pub struct Global<'a> {
    pub name: String,
    pub ty: &'a Type<'a>,
    pub is_const: bool,
    /// Internal linkage: not visible for symbol resolution outside this
    /// module's object/JIT image.
    pub is_local: bool,
    /// No initializer is carried locally; resolved externally (object
    /// emission leaves it undefined, JIT falls through to `dlsym`).
    pub is_external: bool,
    pub initializer: Vec<u8>,
    pub relocs: Vec<DataReloc>,
}

impl<'a> Global<'a> {
    pub fn new_definition(
        name: impl Into<String>,
        ty: &'a Type<'a>,
        is_const: bool,
        is_local: bool,
        initializer: Vec<u8>,
        relocs: Vec<DataReloc>,
    ) -> Self {
        Global {
            name: name.into(),
            ty,
            is_const,
            is_local,
            is_external: false,
            initializer,
            relocs,
        }
    }

    pub fn new_external(name: impl Into<String>, ty: &'a Type<'a>) -> Self {
        Global {
            name: name.into(),
            ty,
            is_const: false,
            is_local: false,
            is_external: true,
            initializer: Vec::new(),
            relocs: Vec::new(),
        }
    }
}
