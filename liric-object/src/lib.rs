//! Ahead-of-time object emission: the target-agnostic builder plus the
//! ELF and Mach-O byte-level writers, the other half of the engine's two
//! output paths alongside `liric-jit`'s in-process installer.

pub mod blobs;
pub mod builder;
pub mod codereloc;
pub mod elf;
pub mod error;
pub mod macho;
pub mod strtab;

use target_lexicon::{Architecture, OperatingSystem, Triple, Vendor};

pub use builder::{BuiltObject, ObjectBuilder};
pub use error::{ObjectError, ObjectResult};

/// Which container format to emit, chosen from the active `Triple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Elf,
    MachO,
}

pub fn container_for(triple: &Triple) -> ObjectResult<Container> {
    if triple.vendor == Vendor::Apple {
        return Ok(Container::MachO);
    }
    match triple.operating_system {
        OperatingSystem::Linux => Ok(Container::Elf),
        _ => Err(ObjectError::Unsupported("no container format known for this operating system")),
    }
}

/// Build `module` for `target` and write it as a relocatable object.
pub fn emit_relocatable(target: &dyn liric_codegen::Target, module: &liric_ir::Module) -> ObjectResult<Vec<u8>> {
    let built = ObjectBuilder::new(target, false).build(module)?;
    match container_for(target.triple())? {
        Container::Elf => elf::write_relocatable(&built, target.triple().architecture),
        Container::MachO => {
            if !matches!(target.triple().architecture, Architecture::Aarch64(_)) {
                return Err(ObjectError::Unsupported("Mach-O writer only implements arm64"));
            }
            macho::write_relocatable(&built)
        }
    }
}

/// Build `module` for `target` and write it as a self-contained executable
/// with no external symbols remaining to resolve, falling back to a
/// dynamic executable on ELF when an extern call needs a PLT.
pub fn emit_no_link_executable(
    target: &dyn liric_codegen::Target,
    module: &liric_ir::Module,
    entry_symbol: &str,
    needed_libs: &[&str],
) -> ObjectResult<Vec<u8>> {
    let built = ObjectBuilder::new(target, true).build(module)?;
    let has_undefined = built.symbols.iter().any(|s| !s.is_defined());
    match container_for(target.triple())? {
        Container::Elf => {
            let arch = target.triple().architecture;
            if has_undefined {
                elf::write_dynamic_executable(&built, arch, entry_symbol, needed_libs)
            } else {
                elf::write_static_executable(&built, arch, entry_symbol)
            }
        }
        Container::MachO => macho::write_no_link_executable(&built, entry_symbol),
    }
}

/// Mark a freshly written object file executable, mirroring what a linker
/// or `chmod +x` would do after producing a runnable binary.
pub fn make_executable(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let rc = unsafe { libc::chmod(cpath.as_ptr(), 0o755) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
