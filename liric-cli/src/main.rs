//! `liric`: the reference binary wired directly onto the engine's two
//! output paths, JIT execution and ahead-of-time object emission.
//!
//! ```text
//! liric [--jit] [--dump-ir] [--func NAME] [--emit-obj PATH] [--target TRIPLE] <file>|-
//! ```

mod config;
mod input;

use std::fs;
use std::io::Read as _;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};
use clap::Parser;
use log::LevelFilter;
use target_lexicon::Triple;

use liric_arena::Arena;
use liric_jit::{CompileSession, CompileStrategy, JitInstaller};

use config::EnvConfig;

#[derive(Parser, Debug)]
#[command(name = "liric", about = "Compile and run a Liric module")]
struct Args {
    /// JIT-install every defined function and call the entry symbol.
    #[arg(long)]
    jit: bool,

    /// Print a textual dump of the module's IR instead of compiling it.
    #[arg(long = "dump-ir")]
    dump_ir: bool,

    /// Entry symbol to invoke (`--jit`) or emit as the executable's entry
    /// point (`--emit-obj`). Defaults to `main`.
    #[arg(long)]
    func: Option<String>,

    /// Write a relocatable object, or a self-contained executable when an
    /// entry symbol is also given, to this path instead of running the JIT.
    #[arg(long = "emit-obj")]
    emit_obj: Option<PathBuf>,

    /// Target triple to compile for; defaults to the host triple.
    #[arg(long)]
    target: Option<String>,

    /// Raise the log filter one step per occurrence (info -> debug -> trace).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Lower the log filter to errors only.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Input file, or `-` for stdin.
    file: String,
}

fn log_level_for(args: &Args) -> LevelFilter {
    if args.quiet {
        return LevelFilter::Error;
    }
    match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(args: &Args) {
    env_logger::Builder::new()
        .filter_level(log_level_for(args))
        .parse_default_env()
        .init();
}

fn read_input(path: &str) -> anyhow::Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading module bytes from stdin")?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("reading {path}"))
    }
}

fn resolve_triple(raw: Option<&str>) -> anyhow::Result<Triple> {
    match raw {
        Some(raw) => Triple::from_str(raw).map_err(|e| anyhow::anyhow!("invalid target triple {raw:?}: {e}")),
        None => Ok(Triple::host()),
    }
}

fn run(args: &Args) -> anyhow::Result<i32> {
    let env_config = EnvConfig::from_env().map_err(anyhow::Error::from)?;
    let triple = resolve_triple(args.target.as_deref())?;
    let target = liric_codegen::for_triple(&triple)
        .with_context(|| format!("no codegen backend for {triple}"))?;
    log::debug!("compiling for {} ({})", triple, target.name());

    let bytes = read_input(&args.file)?;
    let arena = Arena::new();
    let module = input::load_module(&bytes, &arena).map_err(anyhow::Error::from)?;
    let entry = args.func.as_deref().unwrap_or("main");

    if args.dump_ir {
        let installer = JitInstaller::new().context("reserving JIT pages")?;
        let session = CompileSession::new(module, installer, CompileStrategy::IrMode);
        let dump = session.dump_ir().map_err(anyhow::Error::from)?;
        print!("{dump}");
        return Ok(0);
    }

    if let Some(path) = &args.emit_obj {
        let needed_libs: Vec<&str> = env_config.runtime_lib.as_deref().into_iter().collect();
        if env_config.verbose_blob_link {
            log::debug!("no-link executable builder may dlopen {:?}", needed_libs);
        }
        let bytes = if module.function(entry).is_some() {
            liric_object::emit_no_link_executable(target.as_ref(), &module, entry, &needed_libs)
        } else {
            liric_object::emit_relocatable(target.as_ref(), &module)
        }
        .map_err(anyhow::Error::from)?;
        fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        if module.function(entry).is_some() {
            liric_object::make_executable(path).with_context(|| format!("chmod +x {}", path.display()))?;
        }
        return Ok(0);
    }

    if args.jit {
        let installer = JitInstaller::new().context("reserving JIT pages")?;
        let mut session = CompileSession::new(module, installer, CompileStrategy::IrMode);
        session.commit(target.as_ref()).map_err(anyhow::Error::from)?;
        let addr = session
            .lookup_symbol(entry)
            .with_context(|| format!("entry symbol {entry} was never defined or resolved"))?;
        let func: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        return Ok(func());
    }

    bail!("one of --jit, --dump-ir, or --emit-obj is required");
}

fn main() {
    let args = Args::parse();
    init_logging(&args);
    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("liric: {err:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_target_flag_resolves_to_the_host_triple() {
        let triple = resolve_triple(None).unwrap();
        let host = Triple::host();
        assert_eq!(triple.architecture, host.architecture);
        assert_eq!(triple.operating_system, host.operating_system);
    }

    #[test]
    fn an_explicit_triple_round_trips_through_parsing() {
        let triple = resolve_triple(Some("x86_64-unknown-linux-gnu")).unwrap();
        assert_eq!(triple.architecture, target_lexicon::Architecture::X86_64);
    }

    #[test]
    fn a_malformed_triple_is_rejected_before_any_compilation_is_attempted() {
        assert!(resolve_triple(Some("not a triple")).is_err());
    }

    #[test]
    fn verbosity_count_maps_to_increasingly_permissive_log_levels() {
        let mut args = Args::parse_from(["liric", "--jit", "module.ll"]);
        assert_eq!(log_level_for(&args), LevelFilter::Warn);
        args.verbose = 1;
        assert_eq!(log_level_for(&args), LevelFilter::Info);
        args.verbose = 2;
        assert_eq!(log_level_for(&args), LevelFilter::Debug);
        args.verbose = 3;
        assert_eq!(log_level_for(&args), LevelFilter::Trace);
    }

    #[test]
    fn quiet_wins_even_with_verbose_flags_set() {
        let mut args = Args::parse_from(["liric", "--jit", "-v", "-v", "-q", "module.ll"]);
        assert_eq!(log_level_for(&args), LevelFilter::Error);
        args.quiet = false;
        assert_eq!(log_level_for(&args), LevelFilter::Debug);
    }

    #[test]
    fn quiet_overrides_verbosity() {
        let args = Args::parse_from(["liric", "--jit", "-v", "-v", "-q", "module.ll"]);
        assert!(args.quiet);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn emit_obj_and_target_and_func_all_parse() {
        let args = Args::parse_from([
            "liric",
            "--emit-obj",
            "out.o",
            "--target",
            "aarch64-apple-darwin",
            "--func",
            "start",
            "module.ll",
        ]);
        assert_eq!(args.emit_obj, Some(PathBuf::from("out.o")));
        assert_eq!(args.target.as_deref(), Some("aarch64-apple-darwin"));
        assert_eq!(args.func.as_deref(), Some("start"));
        assert_eq!(args.file, "module.ll");
    }
}
