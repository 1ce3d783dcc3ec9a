//! Pre-assembled intrinsic byte blobs: the external collaborator
//! `liric-codegen`'s intrinsic registry assumes exists, owned here since
//! the object builder is the one place that actually needs to materialize
//! their bytes into a text section.

use target_lexicon::Architecture;

/// Look up the blob for `name` on `arch`, if one is registered.
///
/// Only `__liric_sext_widen_i32` is carried, on x86_64: `movsxd rax, edi;
/// ret`, the SysV calling convention's sign-extending widen from a 32-bit
/// argument in `edi` to a 64-bit result in `rax`.
pub fn lookup(name: &str, arch: Architecture) -> Option<&'static [u8]> {
    match (name, arch) {
        ("__liric_sext_widen_i32", Architecture::X86_64) => {
            Some(&[0x48, 0x63, 0xc7, 0xc3])
        }
        _ => None,
    }
}

/// Best-effort libc fallback for a blob-backed intrinsic with no blob
/// registered for the active target, used only on the no-link path where
/// an unresolved symbol would otherwise abort the build.
pub fn libc_fallback(name: &str) -> Option<&'static str> {
    match name {
        "__liric_sext_widen_i32" => None,
        _ => None,
    }
}
