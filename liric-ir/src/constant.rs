//! Aggregate constant construction: packs components into a byte buffer
//! while recording any embedded global references as constant relocations.

use crate::error::{IrError, IrResult};
use crate::types::Type;
use crate::value::{AggregateConst, ConstReloc, Operand, ValueKind};

/// One component of an aggregate constant being built: either a scalar leaf
/// value or a nested aggregate already packed.
pub enum Component<'a> {
    Scalar(Operand<'a>),
    Nested(AggregateConst),
}

/// Pack `components` (laid out at the offsets implied by `ty`) into a linear
/// byte buffer, recording pointer-bearing fields as constant relocations.
///
/// `ty` must be a `Struct`, `Array`, or `Vector` type whose field/element
/// count matches `components.len()`.
pub fn pack_aggregate<'a>(ty: &Type<'a>, components: &[Component<'a>]) -> IrResult<AggregateConst> {
    let offsets = field_offsets(ty, components.len());
    let size = ty.size();
    let mut bytes = vec![0u8; size as usize];
    let mut relocs = Vec::new();

    for (component, &offset) in components.iter().zip(offsets.iter()) {
        match component {
            Component::Scalar(op) => pack_scalar(op, offset, size, &mut bytes, &mut relocs)?,
            Component::Nested(agg) => {
                let end = offset + agg.bytes.len() as u64;
                if end > size {
                    return Err(IrError::RelocationOutOfBounds { offset, size });
                }
                bytes[offset as usize..end as usize].copy_from_slice(&agg.bytes);
                for r in &agg.relocs {
                    relocs.push(ConstReloc {
                        offset: offset + r.offset,
                        symbol: r.symbol.clone(),
                        addend: r.addend,
                    });
                }
            }
        }
    }

    Ok(AggregateConst { bytes, relocs })
}

fn field_offsets(ty: &Type, count: usize) -> Vec<u64> {
    match ty {
        Type::Struct { .. } => ty.struct_offsets(),
        Type::Array { elem, .. } | Type::Vector { elem, .. } => {
            let stride = elem.size();
            (0..count as u64).map(|i| i * stride).collect()
        }
        _ => panic!("pack_aggregate called on non-aggregate type"),
    }
}

fn pack_scalar(
    op: &Operand,
    offset: u64,
    total_size: u64,
    bytes: &mut [u8],
    relocs: &mut Vec<ConstReloc>,
) -> IrResult<()> {
    let width = op.ty.size();
    if offset + width > total_size {
        return Err(IrError::RelocationOutOfBounds {
            offset,
            size: total_size,
        });
    }
    let start = offset as usize;
    let end = start + width as usize;
    match &op.kind {
        ValueKind::IntConst { value, .. } => {
            let le = value.to_le_bytes();
            bytes[start..end].copy_from_slice(&le[..width as usize]);
        }
        ValueKind::FloatConst(v) => {
            if width == 4 {
                bytes[start..end].copy_from_slice(&(*v as f32).to_le_bytes());
            } else {
                bytes[start..end].copy_from_slice(&v.to_le_bytes());
            }
        }
        ValueKind::Null | ValueKind::Undef | ValueKind::Poison => {
            // Zero-initialized; undef/poison get a deterministic zero fill
            // so re-emission is reproducible.
        }
        ValueKind::Global(name) => {
            if width != 8 {
                return Err(IrError::RelocationOutOfBounds {
                    offset,
                    size: total_size,
                });
            }
            relocs.push(ConstReloc {
                offset,
                symbol: name.to_string(),
                addend: 0,
            });
        }
        ValueKind::Aggregate(_) | ValueKind::VReg(_) | ValueKind::Block(_) => {
            return Err(IrError::TypeMismatch {
                opcode: "constant".into(),
                detail: "aggregate field must be a scalar constant, not an instruction result"
                    .into(),
            });
        }
    }
    Ok(())
}

/// Canonicalize an integer constant to the declared bit width, independent
/// of how the caller spelled the literal (sign-extended or truncated).
pub fn canonical_int(bits: u32, value: i64) -> i64 {
    if bits >= 64 {
        return value;
    }
    let mask = (1i64 << bits) - 1;
    let truncated = value & mask;
    let sign_bit = 1i64 << (bits - 1);
    if truncated & sign_bit != 0 {
        truncated | !mask
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn canonicalizes_sign_extension() {
        assert_eq!(canonical_int(8, 0xff), -1);
        assert_eq!(canonical_int(8, 0x7f), 127);
        assert_eq!(canonical_int(32, -1), -1);
    }

    #[test]
    fn packs_struct_with_relocation() {
        let i32t = Type::I32;
        let ptrt = Type::Ptr;
        let fields: &[&Type] = &[&i32t, &ptrt];
        let sty = Type::Struct {
            fields,
            packed: false,
        };
        let components = vec![
            Component::Scalar(Operand::int_const(&i32t, 7)),
            Component::Scalar(Operand {
                ty: &ptrt,
                kind: ValueKind::Global("g"),
            }),
        ];
        let agg = pack_aggregate(&sty, &components).unwrap();
        assert_eq!(agg.bytes.len(), 16);
        assert_eq!(&agg.bytes[0..4], &7i32.to_le_bytes());
        assert_eq!(agg.relocs.len(), 1);
        assert_eq!(agg.relocs[0].offset, 8);
        assert_eq!(agg.relocs[0].symbol, "g");
    }
}
