//! Reads the three environment variables the reference binary honors,
//! independent of the `clap`-parsed command line.

use std::env;

use liric_jit::{SessionError, SessionResult};

/// `LIRIC_COMPILE_MODE`. Only `isel` is implemented by this workspace's
/// codegen crate; the other two are accepted as valid values (so a build
/// script or harness that always sets one of the three doesn't need to
/// special-case this engine) but rejected at startup with a clear message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompileMode {
    Isel,
    CopyPatch,
    Llvm,
}

impl CompileMode {
    fn parse(raw: &str) -> SessionResult<Self> {
        match raw {
            "isel" => Ok(CompileMode::Isel),
            "copy_patch" => Ok(CompileMode::CopyPatch),
            "llvm" => Ok(CompileMode::Llvm),
            other => Err(SessionError::argument(format!(
                "LIRIC_COMPILE_MODE must be one of isel|copy_patch|llvm, got {other:?}"
            ))),
        }
    }

    fn require_isel(self) -> SessionResult<()> {
        match self {
            CompileMode::Isel => Ok(()),
            CompileMode::CopyPatch => Err(SessionError::unsupported(
                "LIRIC_COMPILE_MODE=copy_patch has no backend in this build",
            )),
            CompileMode::Llvm => Err(SessionError::unsupported(
                "LIRIC_COMPILE_MODE=llvm has no backend in this build",
            )),
        }
    }
}

/// Environment-derived configuration, read once at startup.
pub struct EnvConfig {
    pub compile_mode: CompileMode,
    pub runtime_lib: Option<String>,
    pub verbose_blob_link: bool,
}

impl EnvConfig {
    pub fn from_env() -> SessionResult<Self> {
        let compile_mode = match env::var("LIRIC_COMPILE_MODE") {
            Ok(raw) => CompileMode::parse(&raw)?,
            Err(_) => CompileMode::Isel,
        };
        compile_mode.require_isel()?;
        let runtime_lib = env::var("LIRIC_RUNTIME_LIB").ok();
        let verbose_blob_link = env::var("LIRIC_VERBOSE_BLOB_LINK")
            .map(|v| v == "1")
            .unwrap_or(false);
        Ok(EnvConfig {
            compile_mode,
            runtime_lib,
            verbose_blob_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_compile_mode_is_rejected() {
        let err = CompileMode::parse("fast").unwrap_err();
        assert_eq!(err.kind, liric_jit::SessionErrorKind::Argument);
    }

    #[test]
    fn copy_patch_parses_but_has_no_backend() {
        let mode = CompileMode::parse("copy_patch").unwrap();
        assert!(mode.require_isel().is_err());
    }

    #[test]
    fn isel_is_the_only_mode_accepted_end_to_end() {
        let mode = CompileMode::parse("isel").unwrap();
        assert!(mode.require_isel().is_ok());
    }
}
