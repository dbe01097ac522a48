//! The compilation driver: a work queue over `.mcfunction` files, feeding the
//! preprocessor and parser, producing a namespace plus function table.
//!
//! Grounded on `compiler.py::compile_files` (work-queue shape) and the
//! teacher's resolve-then-parse pipeline loop.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::instr::FunctionTable;
use crate::parser::{self, FunctionCall};
use crate::preprocess::{self, Definitions};
use crate::span::Span;

/// The tiny `mcfn.toml` configuration surface (SPEC_FULL.md "Configuration").
#[derive(Clone, Debug, Default)]
pub struct ProjectConfig {
    pub namespace: Option<String>,
    pub entry: Option<String>,
}

impl ProjectConfig {
    /// Hand-parsed, section-aware, matching the teacher's minimal
    /// `Project::load` style -- no third-party TOML crate for a three-field
    /// surface.
    pub fn parse(text: &str) -> Self {
        let mut config = ProjectConfig::default();
        let mut in_package_section = false;
        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_package_section = line.trim_start_matches('[').trim_end_matches(']') == "package";
                continue;
            }
            if !in_package_section {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            match key {
                "namespace" => config.namespace = Some(value.to_string()),
                "entry" => config.entry = Some(value.to_string()),
                _ => {}
            }
        }
        config
    }

    pub fn load(dir: &Path) -> std::io::Result<Self> {
        let path = dir.join("mcfn.toml");
        if !path.exists() {
            return Ok(ProjectConfig::default());
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }
}

#[derive(Debug)]
pub enum CompileError {
    MissingFunctionFile { function: String, path: String },
    Io(std::io::Error),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::MissingFunctionFile { function, path } => {
                write!(f, "required function file not found: {function} ({path})")
            }
            CompileError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Output of compiling a project directory: the function table plus every
/// diagnostic accumulated along the way (compile-syntax/budget errors do not
/// abort the build; only a missing function file does).
pub struct CompileOutput {
    pub namespace: String,
    pub entry: String,
    pub functions: FunctionTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile a directory of `.mcfunction` files starting from the entry
/// function (default `main`), following `function` call sites transitively.
pub fn compile_project(dir: &Path) -> Result<CompileOutput, CompileError> {
    let config = ProjectConfig::load(dir).map_err(CompileError::Io)?;
    let namespace = config.namespace.clone().unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mcfn".to_string())
    });
    let entry = config.entry.clone().unwrap_or_else(|| "main".to_string());

    let mut queue: VecDeque<String> = VecDeque::from([entry.clone()]);
    let mut compiled: HashSet<String> = HashSet::new();
    let mut functions = FunctionTable::new();
    let mut diagnostics = Vec::new();
    // caller_arg_name -> positional_letter, merged per callee across call sites.
    let mut macro_bindings: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut defs = Definitions::new();

    while let Some(func) = queue.pop_front() {
        if compiled.contains(&func) {
            continue;
        }

        let path = dir.join(format!("{func}.mcfunction"));
        if !path.exists() {
            return Err(CompileError::MissingFunctionFile {
                function: func,
                path: path.display().to_string(),
            });
        }

        let source = fs::read_to_string(&path).map_err(CompileError::Io)?;
        let mut preprocessed = preprocess::preprocess(&source, &mut defs);
        if let Some(bindings) = macro_bindings.get(&func) {
            preprocessed = rewrite_macro_lines(&preprocessed, bindings);
        }

        let mut program = Vec::new();
        for line in preprocessed.lines() {
            // A vanilla-macro line carries a leading `$` marker; strip it
            // before parsing so the opcode head token matches normally. The
            // `$(name)` placeholders inside stay untouched -- they are
            // resolved by the VM at dispatch time, not by the compiler.
            let line = line.trim_start().strip_prefix('$').unwrap_or(line);
            let outcome = parser::parse_line(line, Span::dummy());
            diagnostics.extend(outcome.diagnostics);
            program.extend(outcome.instructions);
            for call in outcome.calls {
                record_call(&mut macro_bindings, &mut queue, &compiled, call);
            }
        }

        functions.insert(func.clone(), program);
        compiled.insert(func);
    }

    Ok(CompileOutput {
        namespace,
        entry,
        functions,
        diagnostics,
    })
}

fn record_call(
    macro_bindings: &mut BTreeMap<String, BTreeMap<String, String>>,
    queue: &mut VecDeque<String>,
    compiled: &HashSet<String>,
    call: FunctionCall,
) {
    macro_bindings
        .entry(call.callee.clone())
        .or_default()
        .extend(call.macro_bindings);
    if !compiled.contains(&call.callee) {
        queue.push_back(call.callee);
    }
}

/// Rewrite `$(caller_arg_name)` to `$(positional_letter)` on every
/// vanilla-macro line (one whose first non-whitespace character is `$`).
fn rewrite_macro_lines(source: &str, bindings: &BTreeMap<String, String>) -> String {
    source
        .lines()
        .map(|line| {
            if !line.trim_start().starts_with('$') {
                return line.to_string();
            }
            let mut rewritten = line.to_string();
            for (orig, letter) in bindings {
                rewritten = rewritten.replace(&format!("$({orig})"), &format!("$({letter})"));
            }
            rewritten
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn project_config_reads_namespace_and_entry() {
        let config = ProjectConfig::parse("[package]\nnamespace = \"example\"\nentry = \"start\"\n");
        assert_eq!(config.namespace.as_deref(), Some("example"));
        assert_eq!(config.entry.as_deref(), Some("start"));
    }

    #[test]
    fn project_config_defaults_when_section_absent() {
        let config = ProjectConfig::parse("# just a comment\n");
        assert!(config.namespace.is_none());
        assert!(config.entry.is_none());
    }

    #[test]
    fn missing_entry_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile_project(dir.path()).unwrap_err();
        assert!(matches!(err, CompileError::MissingFunctionFile { .. }));
    }

    #[test]
    fn compiles_entry_and_discovers_called_function() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = fs::File::create(dir.path().join("main.mcfunction")).unwrap();
        writeln!(main, "function helper").unwrap();
        let mut helper = fs::File::create(dir.path().join("helper.mcfunction")).unwrap();
        writeln!(helper, "say hi").unwrap();

        let out = compile_project(dir.path()).unwrap();
        assert!(out.diagnostics.is_empty());
        assert!(out.functions.contains_key("main"));
        assert!(out.functions.contains_key("helper"));
    }

    #[test]
    fn macro_bindings_rewrite_dollar_lines_in_callee() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = fs::File::create(dir.path().join("main.mcfunction")).unwrap();
        writeln!(main, r#"function greet {{"who": "world"}}"#).unwrap();
        let mut greet = fs::File::create(dir.path().join("greet.mcfunction")).unwrap();
        writeln!(greet, "$say $(who)").unwrap();

        let out = compile_project(dir.path()).unwrap();
        let greet_program = &out.functions["greet"];
        assert_eq!(greet_program.len(), 1);
        assert_eq!(greet_program[0].arg_str(0), "$(a)");
    }
}
