use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Args;

use crate::compiler::{self, CompileError};
use crate::container::{self, Executable};

use super::report_diagnostics;

#[derive(Args)]
pub struct CompileArgs {
    /// Directory of `.mcfunction` files to compile
    pub source_path: PathBuf,
    /// Output executable path
    #[arg(short = 'w', long = "write", value_name = "OUTPUT")]
    pub output: PathBuf,
}

pub fn cmd_compile(args: CompileArgs) {
    log::info!("compiling source: {}", args.source_path.display());

    let output = match compiler::compile_project(&args.source_path) {
        Ok(output) => output,
        Err(CompileError::MissingFunctionFile { function, path }) => {
            log::error!("required function file not found: {function} ({path})");
            process::exit(1);
        }
        Err(CompileError::Io(e)) => {
            log::error!("error reading source: {e}");
            process::exit(1);
        }
    };

    report_diagnostics(&output.diagnostics);

    let executable = Executable {
        namespace: output.namespace,
        functions: output.functions,
    };

    let bytes = match container::write_executable(&executable) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("error building executable: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&args.output, &bytes) {
        log::error!("error writing executable to {}: {e}", args.output.display());
        process::exit(1);
    }

    log::info!(
        "compiled {} function(s) into {}",
        executable.functions.len(),
        args.output.display()
    );
}
