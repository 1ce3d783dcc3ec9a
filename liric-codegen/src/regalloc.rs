//! Register/spill assignment: the baseline "every vreg owns a stack slot"
//! strategy described in `mach.rs`'s module doc.
//!
//! Each vreg gets an 8-byte-aligned slot sized to the widest use. Since
//! `MachineFunction` doesn't track per-vreg type information (isel already
//! discarded it), every slot is conservatively sized to a full machine word;
//! this wastes stack space relative to a width-aware allocator but keeps
//! the encoder's addressing-mode logic uniform across all three targets.

use crate::mach::{MOp, MachineFunction};

/// Slot size in bytes used for every vreg, regardless of its IR type.
pub const SLOT_SIZE: i32 = 8;

/// Assign every vreg in `mf` a stack-frame-relative byte offset, lay out
/// each `alloca`'s own backing storage below the vreg slots, and record the
/// resulting frame size. Offsets grow downward from the frame base, as is
/// conventional on all three supported targets (x86_64 SysV, AArch64
/// AAPCS64, RISC-V's LP64 psABI).
pub fn assign_slots(mf: &mut MachineFunction) {
    let count = mf.vreg_count.max(1) as usize;
    let mut slots = vec![0i32; count];
    for (i, slot) in slots.iter_mut().enumerate() {
        *slot = -(((i as i32) + 1) * SLOT_SIZE);
    }
    let mut cursor = count as i32 * SLOT_SIZE;

    let mut alloca_slots = std::collections::HashMap::new();
    for block in &mf.blocks {
        for inst in &block.insts {
            if let MOp::Alloca { size, align } = inst.op {
                let align = (align.max(1)) as i32;
                cursor = (cursor + align - 1) / align * align;
                cursor += size.max(1) as i32;
                if let Some(dest) = inst.dest {
                    alloca_slots.insert(dest, -cursor);
                }
            }
        }
    }

    // Keep the frame 16-byte aligned, as required on entry by both the
    // SysV and AAPCS64 call standards (and harmlessly satisfied on riscv64).
    let frame_size = (cursor + 15) & !15;
    mf.slots = slots;
    mf.alloca_slots = alloca_slots;
    mf.frame_size = frame_size;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::MachineFunction;

    #[test]
    fn frame_size_is_16_byte_aligned() {
        let mut mf = MachineFunction::new("f", 1);
        mf.vreg_count = 3;
        assign_slots(&mut mf);
        assert_eq!(mf.frame_size % 16, 0);
        assert_eq!(mf.slots.len(), 3);
        assert_eq!(mf.slots[0], -8);
        assert_eq!(mf.slots[1], -16);
    }
}
