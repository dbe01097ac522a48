//! Command-line entry points: `run`, `compile`, `disassemble`.
//!
//! Grounded on `mcfn.py`'s `__main__` dispatch (action validation, `-w`
//! handling, compile-vs-read-executable branching for `run`) and the
//! teacher's `cli/build.rs`-style `cmd_*` functions that print-and-exit
//! rather than return a `Result` to `main`.

pub mod compile;
pub mod disassemble;
pub mod run;

use crate::diagnostic::{Diagnostic, Severity};

/// Log every accumulated diagnostic at its severity level. Diagnostics from
/// `compiler::compile_project` do not yet carry a real source span (every one
/// is stamped `Span::dummy()`), so there is no source-context panel worth
/// rendering through `ariadne` here -- a plain log line per diagnostic is the
/// honest rendering until spans are threaded through the preprocessor.
pub fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        match diag.severity {
            Severity::Error => log::error!("{}", diag.message),
            Severity::Warning => log::warn!("{}", diag.message),
        }
        for note in &diag.notes {
            log::info!("note: {note}");
        }
        if let Some(help) = &diag.help {
            log::info!("help: {help}");
        }
    }
}
