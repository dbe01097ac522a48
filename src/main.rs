mod cli;

use clap::{ArgAction, Parser, Subcommand};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use cli::compile::CompileArgs;
use cli::disassemble::DisassembleArgs;
use cli::run::RunArgs;

#[derive(Parser)]
#[command(name = "mcfn", version, about = "MCFN compiler and virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Decrease log verbosity (-q for warn, -qq for error-only)
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    quiet: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run a project directory (compile+run) or a compiled executable
    Run(RunArgs),
    /// Compile a project directory of .mcfunction files
    Compile(CompileArgs),
    /// Decode an executable to a human-readable textual form
    Disassemble(DisassembleArgs),
}

fn level_filter(verbose: u8, quiet: u8) -> LevelFilter {
    let base = LevelFilter::Info as i8;
    let level = (base + verbose as i8 - quiet as i8).clamp(LevelFilter::Off as i8, LevelFilter::Trace as i8);
    match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logger(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto).expect("initialize logger");
}

fn main() {
    let cli = Cli::parse();
    init_logger(level_filter(cli.verbose, cli.quiet));

    match cli.command {
        Command::Run(args) => cli::run::cmd_run(args),
        Command::Compile(args) => cli::compile::cmd_compile(args),
        Command::Disassemble(args) => cli::disassemble::cmd_disassemble(args),
    }
}
