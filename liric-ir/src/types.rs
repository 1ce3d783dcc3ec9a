//! IR type system.
//!
//! Type identity is by arena pointer: two `&Type` are the same type iff they
//! are the same allocation. Primitive types are interned per-module
//! (`Module::prim_types`) so repeated lookups for e.g. `i32` share one
//! object; aggregate types (`array`, `struct`, `func`, `vector`) are each a
//! fresh arena allocation since their shape varies.

use std::fmt;

/// A tagged type variant, arena-allocated and never mutated after creation.
#[derive(Debug)]
pub enum Type<'a> {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// A single opaque address space pointer.
    Ptr,
    Array {
        elem: &'a Type<'a>,
        count: u64,
    },
    Struct {
        fields: &'a [&'a Type<'a>],
        packed: bool,
    },
    Func {
        ret: &'a Type<'a>,
        params: &'a [&'a Type<'a>],
        vararg: bool,
    },
    Vector {
        elem: &'a Type<'a>,
        lanes: u32,
        scalable: bool,
    },
}

impl<'a> Type<'a> {
    /// Is this an integer type of any width?
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64
        )
    }

    /// Is this a floating-point type?
    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Bit width of an integer type, if this is one.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(8),
            Type::I16 => Some(16),
            Type::I32 => Some(32),
            Type::I64 => Some(64),
            _ => None,
        }
    }

    /// Natural alignment of this type in bytes, following the C ABI unless
    /// the type is a `packed` struct.
    pub fn align(&self) -> u64 {
        match self {
            Type::Void => 1,
            Type::I1 | Type::I8 => 1,
            Type::I16 => 2,
            Type::I32 | Type::F32 => 4,
            Type::I64 | Type::F64 | Type::Ptr => 8,
            Type::Array { elem, .. } => elem.align(),
            Type::Struct { fields, packed } => {
                if *packed || fields.is_empty() {
                    1
                } else {
                    fields.iter().map(|f| f.align()).max().unwrap_or(1)
                }
            }
            Type::Func { .. } => 8,
            Type::Vector { elem, lanes, .. } => elem.align() * (*lanes as u64).min(1).max(1),
        }
    }

    /// Size in bytes, including struct padding unless `packed`.
    pub fn size(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::I1 | Type::I8 => 1,
            Type::I16 => 2,
            Type::I32 | Type::F32 => 4,
            Type::I64 | Type::F64 | Type::Ptr => 8,
            Type::Array { elem, count } => elem.size() * count,
            Type::Struct { fields, packed } => struct_layout(fields, *packed).1,
            Type::Func { .. } => 8,
            Type::Vector { elem, lanes, .. } => elem.size() * (*lanes as u64),
        }
    }

    /// Per-field byte offsets for a struct type, laid out C-ABI style (or
    /// tightly packed when `packed`). Panics on non-struct types.
    pub fn struct_offsets(&self) -> Vec<u64> {
        match self {
            Type::Struct { fields, packed } => struct_layout(fields, *packed).0,
            _ => panic!("struct_offsets called on non-struct type"),
        }
    }
}

/// Compute `(field offsets, total size)` for a sequence of fields.
fn struct_layout(fields: &[&Type], packed: bool) -> (Vec<u64>, u64) {
    let mut offsets = Vec::with_capacity(fields.len());
    let mut cursor: u64 = 0;
    let mut max_align: u64 = 1;
    for f in fields {
        let align = if packed { 1 } else { f.align() };
        max_align = max_align.max(align);
        cursor = align_up(cursor, align);
        offsets.push(cursor);
        cursor += f.size();
    }
    let total = if packed { cursor } else { align_up(cursor, max_align) };
    (offsets, total)
}

fn align_up(v: u64, align: u64) -> u64 {
    if align == 0 {
        return v;
    }
    (v + align - 1) / align * align
}

impl<'a> fmt::Display for Type<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Ptr => write!(f, "ptr"),
            Type::Array { elem, count } => write!(f, "[{} x {}]", count, elem),
            Type::Struct { fields, packed } => {
                if *packed {
                    write!(f, "<{{")?;
                } else {
                    write!(f, "{{")?;
                }
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                if *packed {
                    write!(f, "}}>")
                } else {
                    write!(f, "}}")
                }
            }
            Type::Func {
                ret,
                params,
                vararg,
            } => {
                write!(f, "{} (", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                if *vararg {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Type::Vector {
                elem,
                lanes,
                scalable,
            } => {
                if *scalable {
                    write!(f, "<vscale x {} x {}>", lanes, elem)
                } else {
                    write!(f, "<{} x {}>", lanes, elem)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes_and_alignment() {
        assert_eq!(Type::I32.size(), 4);
        assert_eq!(Type::I32.align(), 4);
        assert_eq!(Type::I64.size(), 8);
        assert_eq!(Type::Ptr.size(), 8);
    }

    #[test]
    fn struct_layout_inserts_padding() {
        let i8t = Type::I8;
        let i32t = Type::I32;
        let fields: &[&Type] = &[&i8t, &i32t];
        let s = Type::Struct {
            fields,
            packed: false,
        };
        assert_eq!(s.struct_offsets(), vec![0, 4]);
        assert_eq!(s.size(), 8);
        assert_eq!(s.align(), 4);
    }

    #[test]
    fn packed_struct_has_no_padding() {
        let i8t = Type::I8;
        let i32t = Type::I32;
        let fields: &[&Type] = &[&i8t, &i32t];
        let s = Type::Struct {
            fields,
            packed: true,
        };
        assert_eq!(s.struct_offsets(), vec![0, 1]);
        assert_eq!(s.size(), 5);
        assert_eq!(s.align(), 1);
    }

    #[test]
    fn array_size_is_elem_size_times_count() {
        let i32t = Type::I32;
        let arr = Type::Array {
            elem: &i32t,
            count: 10,
        };
        assert_eq!(arr.size(), 40);
    }
}
