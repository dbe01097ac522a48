use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Args;

use crate::container;
use crate::disassemble::disassemble_executable;

#[derive(Args)]
pub struct DisassembleArgs {
    /// Compiled executable to disassemble
    pub source_path: PathBuf,
    /// Also write the disassembly text to this path
    #[arg(short = 'w', long = "write", value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

pub fn cmd_disassemble(args: DisassembleArgs) {
    log::info!("disassembling: {}", args.source_path.display());

    let bytes = match fs::read(&args.source_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("input file not found: {} ({e})", args.source_path.display());
            process::exit(1);
        }
    };

    let executable = match container::read_executable(&bytes) {
        Ok(exe) => exe,
        Err(e) => {
            log::error!("error reading executable: {e}");
            process::exit(1);
        }
    };

    let text = disassemble_executable(&executable);
    println!("{text}");

    if let Some(output) = &args.output {
        if let Err(e) = fs::write(output, &text) {
            log::error!("error writing disassembly to {}: {e}", output.display());
            process::exit(1);
        }
        log::info!("disassembly written to {}", output.display());
    }
}
