//! The top-level IR container: arena, functions, globals, and interned
//! symbols.

use crate::error::{IrError, IrResult};
use crate::function::Function;
use crate::global::Global;
use crate::symbol::SymbolInterner;
use crate::types::Type;
use liric_arena::Arena;

/// The eight primitive types, interned once per module so repeated lookups
/// share one arena allocation (type identity is by arena pointer).
pub struct PrimTypes<'a> {
    pub void: &'a Type<'a>,
    pub i1: &'a Type<'a>,
    pub i8: &'a Type<'a>,
    pub i16: &'a Type<'a>,
    pub i32: &'a Type<'a>,
    pub i64: &'a Type<'a>,
    pub f32: &'a Type<'a>,
    pub f64: &'a Type<'a>,
    pub ptr: &'a Type<'a>,
}

impl<'a> PrimTypes<'a> {
    fn new(arena: &'a Arena) -> Self {
        PrimTypes {
            void: arena.alloc_one(Type::Void),
            i1: arena.alloc_one(Type::I1),
            i8: arena.alloc_one(Type::I8),
            i16: arena.alloc_one(Type::I16),
            i32: arena.alloc_one(Type::I32),
            i64: arena.alloc_one(Type::I64),
            f32: arena.alloc_one(Type::F32),
            f64: arena.alloc_one(Type::F64),
            ptr: arena.alloc_one(Type::Ptr),
        }
    }
}

/// The top-level IR container.
///
/// Owns the arena every `Function`/`Type`/constant in it was allocated from,
/// the ordered list of functions and globals, the interned primitive-type
/// cache, and the module's symbol table. The module never mutates the
/// functions/globals it hands out references to once they have been pushed
/// (object builders and the JIT installer only read it).
pub struct Module<'a> {
    pub arena: &'a Arena,
    pub prims: PrimTypes<'a>,
    functions: Vec<Function<'a>>,
    globals: Vec<Global<'a>>,
    pub symbols: SymbolInterner,
}

impl<'a> Module<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Module {
            arena,
            prims: PrimTypes::new(arena),
            functions: Vec::new(),
            globals: Vec::new(),
            symbols: SymbolInterner::new(),
        }
    }

    /// Allocate an array type in this module's arena.
    pub fn array_type(&self, elem: &'a Type<'a>, count: u64) -> &'a Type<'a> {
        self.arena.alloc_one(Type::Array { elem, count })
    }

    /// Allocate a struct type in this module's arena.
    pub fn struct_type(&self, fields: &[&'a Type<'a>], packed: bool) -> &'a Type<'a> {
        let fields = self.arena.alloc_slice(fields);
        self.arena.alloc_one(Type::Struct { fields, packed })
    }

    /// Allocate a function-signature type in this module's arena.
    pub fn func_type(
        &self,
        ret: &'a Type<'a>,
        params: &[&'a Type<'a>],
        vararg: bool,
    ) -> &'a Type<'a> {
        let params = self.arena.alloc_slice(params);
        self.arena.alloc_one(Type::Func {
            ret,
            params,
            vararg,
        })
    }

    /// Allocate a vector type in this module's arena.
    pub fn vector_type(&self, elem: &'a Type<'a>, lanes: u32, scalable: bool) -> &'a Type<'a> {
        self.arena.alloc_one(Type::Vector {
            elem,
            lanes,
            scalable,
        })
    }

    /// Add a function (definition or declaration) to the module.
    pub fn add_function(&mut self, f: Function<'a>) -> &mut Function<'a> {
        self.symbols.intern(&f.name);
        self.functions.push(f);
        self.functions.last_mut().unwrap()
    }

    pub fn function(&self, name: &str) -> Option<&Function<'a>> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function<'a>> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function<'a>> {
        self.functions.iter()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function<'a>> {
        self.functions.iter_mut()
    }

    /// Mark every defined function except `keep` as a declaration, so a
    /// single-function direct-pass build sees only the one function it is
    /// compiling. Returns the set of names that were flipped so the caller
    /// can restore them.
    pub fn hide_other_definitions(&mut self, keep: &str) -> Vec<String> {
        let mut hidden = Vec::new();
        for f in &mut self.functions {
            if f.name != keep && !f.is_declaration {
                f.is_declaration = true;
                hidden.push(f.name.clone());
            }
        }
        hidden
    }

    /// Undo `hide_other_definitions`.
    pub fn unhide_definitions(&mut self, names: &[String]) {
        for f in &mut self.functions {
            if names.iter().any(|n| n == &f.name) {
                f.is_declaration = false;
            }
        }
    }

    pub fn add_global(&mut self, g: Global<'a>) -> &mut Global<'a> {
        self.symbols.intern(&g.name);
        self.globals.push(g);
        self.globals.last_mut().unwrap()
    }

    pub fn global(&self, name: &str) -> Option<&Global<'a>> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global<'a>> {
        self.globals.iter()
    }

    /// Absorb every function and global from `other` into this module.
    ///
    /// Both modules must share the same arena (enforced by the shared `'a`
    /// lifetime), since functions and globals carry references into it. A
    /// name present as a declaration in one module and a definition in the
    /// other resolves to the definition; a name defined in both is an
    /// error, not silently resolved by insertion order.
    pub fn merge(&mut self, other: Module<'a>) -> IrResult<()> {
        for f in other.functions {
            match self.functions.iter().position(|existing| existing.name == f.name) {
                None => {
                    self.symbols.intern(&f.name);
                    self.functions.push(f);
                }
                Some(i) => {
                    let existing_defined = !self.functions[i].is_declaration;
                    let incoming_defined = !f.is_declaration;
                    if existing_defined && incoming_defined {
                        return Err(IrError::DuplicateDefinition(f.name));
                    }
                    if incoming_defined {
                        self.functions[i] = f;
                    }
                }
            }
        }
        for g in other.globals {
            if !self.globals.iter().any(|existing| existing.name == g.name) {
                self.symbols.intern(&g.name);
                self.globals.push(g);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_types_are_interned_once() {
        let arena = Arena::new();
        let m = Module::new(&arena);
        let a: *const Type = m.prims.i32;
        let b: *const Type = m.prims.i32;
        assert_eq!(a, b);
    }

    #[test]
    fn add_function_is_findable_by_name() {
        let arena = Arena::new();
        let mut m = Module::new(&arena);
        let f = Function::new_declaration("foo", m.prims.i32, vec![], false);
        m.add_function(f);
        assert!(m.function("foo").is_some());
        assert!(m.function("bar").is_none());
    }

    #[test]
    fn merge_resolves_declaration_against_definition_from_either_side() {
        let arena = Arena::new();
        let mut a = Module::new(&arena);
        a.add_function(Function::new_declaration("f", a.prims.i32, vec![], false));

        let mut b = Module::new(&arena);
        b.add_function(Function::new("f", b.prims.i32, vec![], false));

        a.merge(b).unwrap();
        assert!(!a.function("f").unwrap().is_declaration);
    }

    #[test]
    fn merge_rejects_two_definitions_of_the_same_function() {
        let arena = Arena::new();
        let mut a = Module::new(&arena);
        a.add_function(Function::new("f", a.prims.i32, vec![], false));

        let mut b = Module::new(&arena);
        b.add_function(Function::new("f", b.prims.i32, vec![], false));

        assert!(a.merge(b).is_err());
    }
}
