//! The intrinsic registry: classifies a callee name into one of the three
//! resolution strategies a target pipeline may use for it, and rewrites the
//! call accordingly.
//!
//! Pre-assembled intrinsic byte blobs themselves are an external
//! collaborator (a read-only `(name, target, bytes)` table this crate does
//! not own); what lives here is only the *classification* — which strategy
//! applies to a given name on a given target — and the call-site rewrite
//! that follows from it.

use std::collections::HashMap;

use target_lexicon::Triple;

use crate::error::{CodegenError, CodegenResult};

/// How an unresolved call to an intrinsic name should be lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicKind {
    /// Rewritten to a call against a synthetic external symbol; the object
    /// builder later defines that symbol by copying a pre-assembled byte
    /// blob for the active target.
    Blob,
    /// Rewritten to the equivalent libc symbol name.
    Libc,
    /// Linked to a host-side helper when JIT-installed; rejected outright
    /// when emitting an object file.
    Builtin,
}

/// A name → strategy table, one instance per target triple.
#[derive(Debug, Default)]
pub struct IntrinsicRegistry {
    entries: HashMap<&'static str, (IntrinsicKind, &'static str)>,
}

impl IntrinsicRegistry {
    /// Build the registry for `triple`. `llvm.fabs.f64` routes through
    /// libc when no blob is registered for the target; the same pattern
    /// extends to the handful of math/runtime intrinsics a compiled-language
    /// frontend typically lowers to.
    pub fn for_target(triple: &Triple) -> Self {
        let mut entries = HashMap::new();
        entries.insert("llvm.fabs.f64", (IntrinsicKind::Libc, "fabs"));
        entries.insert("llvm.fabs.f32", (IntrinsicKind::Libc, "fabsf"));
        entries.insert("llvm.sqrt.f64", (IntrinsicKind::Libc, "sqrt"));
        entries.insert("llvm.sqrt.f32", (IntrinsicKind::Libc, "sqrtf"));
        entries.insert("llvm.pow.f64", (IntrinsicKind::Libc, "pow"));
        entries.insert("llvm.floor.f64", (IntrinsicKind::Libc, "floor"));
        entries.insert("llvm.ceil.f64", (IntrinsicKind::Libc, "ceil"));
        entries.insert("llvm.memcpy", (IntrinsicKind::Libc, "memcpy"));
        entries.insert("llvm.memmove", (IntrinsicKind::Libc, "memmove"));
        entries.insert("llvm.memset", (IntrinsicKind::Libc, "memset"));
        entries.insert("llvm.trap", (IntrinsicKind::Builtin, "liric_trap"));
        entries.insert(
            "llvm.stackrestore",
            (IntrinsicKind::Builtin, "liric_stackrestore"),
        );
        // x86_64 carries a pre-assembled blob for the one genuinely
        // target-sensitive case exercised by the JIT path's integration
        // tests: a sign-extending widen helper.
        if matches!(triple.architecture, target_lexicon::Architecture::X86_64) {
            entries.insert("liric.sext_widen.i32", (IntrinsicKind::Blob, "__liric_sext_widen_i32"));
        }
        IntrinsicRegistry { entries }
    }

    pub fn classify(&self, name: &str) -> Option<(IntrinsicKind, &'static str)> {
        self.entries.get(name).copied()
    }

    /// Rewrite a call-site's callee name. `for_object` distinguishes the
    /// object-build path (where `Builtin` is rejected) from the JIT path
    /// (where it resolves to a host helper symbol).
    pub fn resolve_callee(&self, name: &str, for_object: bool) -> CodegenResult<String> {
        match self.classify(name) {
            Some((IntrinsicKind::Blob, synthetic)) => Ok(synthetic.to_string()),
            Some((IntrinsicKind::Libc, libc_name)) => Ok(libc_name.to_string()),
            Some((IntrinsicKind::Builtin, helper)) => {
                if for_object {
                    Err(CodegenError::BuiltinInObjectBuild(name.to_string()))
                } else {
                    Ok(helper.to_string())
                }
            }
            None => Ok(name.to_string()),
        }
    }
}

/// Below this byte count, `memcpy`/`memmove`/`memset` with a constant
/// length are expanded inline by the instruction selector rather than
/// lowered to a libc call.
pub const INLINE_MEM_OP_THRESHOLD: u64 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabs_resolves_to_libc_when_no_blob_registered() {
        let triple: Triple = "riscv64gc-unknown-linux-gnu".parse().unwrap();
        let reg = IntrinsicRegistry::for_target(&triple);
        assert_eq!(
            reg.resolve_callee("llvm.fabs.f64", false).unwrap(),
            "fabs"
        );
    }

    #[test]
    fn builtin_is_rejected_for_object_emission() {
        let triple: Triple = "x86_64-unknown-linux-gnu".parse().unwrap();
        let reg = IntrinsicRegistry::for_target(&triple);
        assert!(reg.resolve_callee("llvm.trap", true).is_err());
        assert!(reg.resolve_callee("llvm.trap", false).is_ok());
    }
}
