use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Args;

use crate::compiler::{self, CompileError};
use crate::container::{self, ContainerError};
use crate::instr::FunctionTable;
use crate::vm::{BranchPool, NoDebugHook, World};

use super::report_diagnostics;

#[derive(Args)]
pub struct RunArgs {
    /// A project directory (compiled then run) or a compiled executable file
    pub source_path: PathBuf,
}

/// `vm.py::run` always enters at `main`, regardless of a project's
/// `mcfn.toml` entry override -- the container format carries no entry
/// field, so a loaded executable's root branch always starts there too.
const RUN_ENTRY: &str = "main";

fn compile_in_memory(source_path: &PathBuf) -> (String, FunctionTable) {
    match compiler::compile_project(source_path) {
        Ok(output) => {
            report_diagnostics(&output.diagnostics);
            (output.entry, output.functions)
        }
        Err(CompileError::MissingFunctionFile { function, path }) => {
            log::error!("required function file not found: {function} ({path})");
            process::exit(1);
        }
        Err(CompileError::Io(e)) => {
            log::error!("error reading source: {e}");
            process::exit(1);
        }
    }
}

fn load_from_file(source_path: &PathBuf) -> FunctionTable {
    let bytes = match fs::read(source_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("input file not found: {} ({e})", source_path.display());
            process::exit(1);
        }
    };
    match container::read_executable(&bytes) {
        Ok(exe) => exe.functions,
        Err(ContainerError::BadMagic) => {
            log::error!("not a valid executable: bad magic number");
            process::exit(1);
        }
        Err(ContainerError::UnsupportedVersion(v)) => {
            log::error!("unsupported executable format version: {v}");
            process::exit(1);
        }
        Err(e) => {
            log::error!("error reading executable: {e}");
            process::exit(1);
        }
    }
}

pub fn cmd_run(args: RunArgs) {
    let (entry, functions) = if args.source_path.is_dir() {
        log::info!("compiling and running directory: {}", args.source_path.display());
        compile_in_memory(&args.source_path)
    } else {
        log::info!("running executable file: {}", args.source_path.display());
        (RUN_ENTRY.to_string(), load_from_file(&args.source_path))
    };

    let Some(entry_program) = functions.get(&entry) else {
        log::error!("executable is missing required '{entry}' function");
        process::exit(1);
    };

    let mut pool = BranchPool::new();
    {
        let root = pool.get_mut(pool.root_id());
        root.program = entry_program.clone();
        root.function = entry.clone();
    }
    let mut world = World::new();

    log::info!("running from entry function '{entry}'");
    crate::vm::run(&mut pool, &mut world, &functions, &mut NoDebugHook);
    log::info!("execution completed");
}
