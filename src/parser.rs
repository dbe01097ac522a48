//! The command parser and lowerer: turns one preprocessed logical line into
//! a sequence of instructions, recursively lowering `execute` prefix chains
//! and `return run` subcommands.
//!
//! Grounded on `compiler.py::compile_source`'s `execute`-chain state machine.

use std::collections::BTreeMap;

use crate::diagnostic::Diagnostic;
use crate::instr::{Instruction, Opcode};
use crate::richtext;
use crate::span::Span;

/// A `function <name> { ... }` call site discovered while lowering one line.
/// The callee is pushed onto the compilation work queue; `macro_bindings`
/// records `caller_arg_name -> positional_letter` for vanilla-macro rewriting
/// inside the callee (spec.md §4.2 "function ... macro binding map").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub callee: String,
    pub macro_bindings: BTreeMap<String, String>,
}

/// The result of lowering one logical source line.
#[derive(Default)]
pub struct ParseOutcome {
    pub instructions: Vec<Instruction>,
    pub calls: Vec<FunctionCall>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    fn merge(&mut self, mut other: ParseOutcome) {
        self.instructions.append(&mut other.instructions);
        self.calls.append(&mut other.calls);
        self.diagnostics.append(&mut other.diagnostics);
    }
}

const VALID_SCORE_OPS: &[&str] = &["matches", ">", "<", ">=", "<=", "==", "!="];

/// Convert a 0-indexed position into its positional letter: `0 -> a`, ...,
/// `25 -> z`, `26 -> aa`, `27 -> ab`, ...
pub fn arg_letter(i: usize) -> String {
    const BASE: usize = 26;
    if i < BASE {
        ((b'a' + i as u8) as char).to_string()
    } else {
        let first = (i / BASE) - 1;
        let second = i % BASE;
        format!(
            "{}{}",
            (b'a' + first as u8) as char,
            (b'a' + second as u8) as char
        )
    }
}

fn drop(diags: &mut Vec<Diagnostic>, line: &str, span: Span, reason: impl Into<String>) {
    diags.push(
        Diagnostic::error(format!("dropped instruction: {}", reason.into()), span)
            .with_note(format!("in line: {line}")),
    );
}

/// Lower one preprocessed logical command line into instructions.
pub fn parse_line(line: &str, span: Span) -> ParseOutcome {
    let line = line.trim();
    let mut out = ParseOutcome::default();
    if line.is_empty() || line.starts_with('#') {
        return out;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return out;
    }

    match tokens[0].to_lowercase().as_str() {
        "execute" => parse_execute(line, &tokens, span, &mut out),
        "scoreboard" => parse_scoreboard(line, &tokens, span, &mut out),
        "tellraw" => parse_tellraw(line, span, &mut out),
        "data" => parse_data(line, &tokens, span, &mut out),
        "return" => parse_return(line, &tokens, span, &mut out),
        "tag" => parse_tag(line, &tokens, span, &mut out),
        "function" => parse_function(line, &tokens, span, &mut out),
        head => {
            let args: Vec<Vec<u8>> = tokens[1..].iter().map(|t| t.as_bytes().to_vec()).collect();
            emit_verbatim(head, args, line, span, &mut out);
        }
    }

    out
}

fn emit_verbatim(head: &str, args: Vec<Vec<u8>>, line: &str, span: Span, out: &mut ParseOutcome) {
    match Opcode::from_mnemonic(head) {
        Some(opcode) => {
            if args.len() > 255 {
                drop(&mut out.diagnostics, line, span, "too many arguments");
                return;
            }
            for arg in &args {
                if arg.len() > 255 {
                    drop(&mut out.diagnostics, line, span, "argument too long");
                    return;
                }
            }
            out.instructions.push(Instruction::new(opcode, args));
        }
        None => {
            // Unknown opcode: silently dropped, per spec.md §4.2 "Anything else".
        }
    }
}

fn emit(opcode: Opcode, args: &[&str], out: &mut ParseOutcome) {
    out.instructions.push(Instruction::text(opcode, args));
}

fn parse_execute(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    let mut i = 1usize;
    let mut prefix = Vec::new();

    while i < tokens.len() && tokens[i].to_lowercase() != "run" {
        let token = tokens[i].to_lowercase();
        match token.as_str() {
            "as" | "at" => {
                if i + 1 >= tokens.len() {
                    drop(&mut out.diagnostics, line, span, format!("missing selector after '{token}'"));
                    return;
                }
                let selector = tokens[i + 1];
                let opcode = if token == "as" { Opcode::ExecuteAs } else { Opcode::ExecuteAt };
                prefix.push(Instruction::text(opcode, &[selector]));
                i += 2;
            }
            "positioned" => {
                if i + 3 >= tokens.len() {
                    drop(&mut out.diagnostics, line, span, "missing coordinates after 'positioned'");
                    return;
                }
                prefix.push(Instruction::text(
                    Opcode::Positioned,
                    &[tokens[i + 1], tokens[i + 2], tokens[i + 3]],
                ));
                i += 4;
            }
            "if" | "unless" => {
                let is_if = token == "if";
                i += 1;
                if i >= tokens.len() {
                    drop(&mut out.diagnostics, line, span, format!("missing condition type after '{token}'"));
                    return;
                }
                let condition = tokens[i].to_lowercase();
                i += 1;
                match condition.as_str() {
                    "block" => {
                        if i + 3 >= tokens.len() {
                            drop(&mut out.diagnostics, line, span, format!("incomplete '{token} block' condition"));
                            return;
                        }
                        let opcode = if is_if { Opcode::IfBlock } else { Opcode::UnlessBlock };
                        prefix.push(Instruction::text(
                            opcode,
                            &[tokens[i], tokens[i + 1], tokens[i + 2], tokens[i + 3]],
                        ));
                        i += 4;
                    }
                    "entity" => {
                        if i >= tokens.len() {
                            drop(&mut out.diagnostics, line, span, format!("missing selector after '{token} entity'"));
                            return;
                        }
                        let opcode = if is_if { Opcode::IfEntity } else { Opcode::UnlessEntity };
                        prefix.push(Instruction::text(opcode, &[tokens[i]]));
                        i += 1;
                    }
                    "score" => {
                        if i + 2 >= tokens.len() {
                            drop(&mut out.diagnostics, line, span, format!("incomplete '{token} score' condition"));
                            return;
                        }
                        let score_selector = tokens[i];
                        let objective = tokens[i + 1];
                        let operator = tokens[i + 2].to_lowercase();
                        if !VALID_SCORE_OPS.contains(&operator.as_str()) {
                            drop(&mut out.diagnostics, line, span, format!("unexpected comparison operator '{operator}'"));
                            return;
                        }
                        let opcode = if is_if { Opcode::IfScore } else { Opcode::UnlessScore };
                        if operator == "matches" {
                            if i + 3 >= tokens.len() {
                                drop(&mut out.diagnostics, line, span, "missing range after 'matches'");
                                return;
                            }
                            prefix.push(Instruction::text(
                                opcode,
                                &[score_selector, objective, "matches", tokens[i + 3]],
                            ));
                            i += 4;
                        } else {
                            if i + 4 >= tokens.len() {
                                drop(&mut out.diagnostics, line, span, "incomplete relational 'score' condition");
                                return;
                            }
                            prefix.push(Instruction::text(
                                opcode,
                                &[score_selector, objective, &operator, tokens[i + 3], tokens[i + 4]],
                            ));
                            i += 5;
                        }
                    }
                    other => {
                        drop(&mut out.diagnostics, line, span, format!("unsupported {token}-condition type: {other}"));
                        return;
                    }
                }
            }
            "store" => {
                i += 1;
                if i >= tokens.len() {
                    drop(&mut out.diagnostics, line, span, "missing store kind after 'store'");
                    return;
                }
                let kind = tokens[i].to_lowercase();
                if kind != "result" && kind != "success" {
                    drop(&mut out.diagnostics, line, span, "store kind must be 'result' or 'success'");
                    return;
                }
                i += 1;
                if i >= tokens.len() || tokens[i].to_lowercase() != "score" {
                    drop(&mut out.diagnostics, line, span, "expected 'score' after execute store <kind>");
                    return;
                }
                i += 1;
                if i + 1 >= tokens.len() {
                    drop(&mut out.diagnostics, line, span, "missing target or objective for execute store score");
                    return;
                }
                prefix.push(Instruction::text(Opcode::ExecuteStore, &[&kind, tokens[i], tokens[i + 1]]));
                i += 2;
            }
            other => {
                drop(&mut out.diagnostics, line, span, format!("unexpected token in execute clause: {other}"));
                return;
            }
        }
    }

    if i >= tokens.len() || tokens[i].to_lowercase() != "run" {
        drop(&mut out.diagnostics, line, span, "missing 'run' keyword in execute command");
        return;
    }
    i += 1;

    if i >= tokens.len() {
        drop(&mut out.diagnostics, line, span, "missing subcommand after 'run'");
        return;
    }

    let subcommand = tokens[i..].join(" ");
    let sub = parse_line(&subcommand, span);

    out.instructions.extend(prefix);
    out.calls.extend(sub.calls.iter().cloned());
    out.diagnostics.extend(sub.diagnostics);
    out.instructions.extend(sub.instructions);
    out.instructions.push(Instruction::new(Opcode::KillBranch, vec![]));
}

fn parse_scoreboard(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    if tokens.len() < 2 {
        drop(&mut out.diagnostics, line, span, "incomplete scoreboard command");
        return;
    }
    match tokens[1].to_lowercase().as_str() {
        "objectives" => {
            if tokens.len() >= 3 && tokens[2].to_lowercase() == "list" {
                emit(Opcode::ListObjectives, &[], out);
            } else {
                drop(&mut out.diagnostics, line, span, "unsupported scoreboard objectives command");
            }
        }
        "players" => {
            if tokens.len() < 3 {
                drop(&mut out.diagnostics, line, span, "incomplete scoreboard players command");
                return;
            }
            let opcode = match tokens[2].to_lowercase().as_str() {
                "set" => Opcode::SetScore,
                "add" => Opcode::Add,
                "remove" => Opcode::Remove,
                "list" => Opcode::ListScores,
                "get" => Opcode::Get,
                "operation" => Opcode::Operation,
                "reset" => Opcode::Reset,
                _ => {
                    drop(&mut out.diagnostics, line, span, "unsupported scoreboard players command");
                    return;
                }
            };
            emit(opcode, &tokens[3..], out);
        }
        _ => drop(&mut out.diagnostics, line, span, "unsupported scoreboard command"),
    }
}

fn parse_tellraw(line: &str, span: Span, out: &mut ParseOutcome) {
    let parts: Vec<&str> = line.splitn(3, char::is_whitespace).collect();
    if parts.len() < 3 {
        drop(&mut out.diagnostics, line, span, "tellraw requires a target and a JSON payload");
        return;
    }
    let payload = parts[2].trim();
    let arg_bytes = if payload.starts_with('{') || payload.starts_with('[') {
        match richtext::parse(payload) {
            Ok(component) => match richtext::encode(&component) {
                Ok(bytes) => bytes,
                Err(e) => {
                    drop(&mut out.diagnostics, line, span, format!("could not encode tellraw payload: {e}"));
                    return;
                }
            },
            Err(richtext::RichTextError::InvalidJson(e)) => {
                // A genuine JSON-syntax failure is a compile error, not a fallback
                // (spec.md §4.3: "The JSON parse error itself is not swallowed").
                drop(&mut out.diagnostics, line, span, format!("invalid JSON in tellraw payload: {e}"));
                return;
            }
            Err(_) => fallback_raw(payload),
        }
    } else {
        fallback_raw(payload)
    };
    out.instructions.push(Instruction::new(Opcode::Tellraw, vec![arg_bytes]));
}

fn fallback_raw(payload: &str) -> Vec<u8> {
    let component = richtext::Component::Raw(payload.as_bytes().to_vec());
    richtext::encode(&component).unwrap_or_default()
}

fn parse_data(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    if tokens.len() < 3 {
        drop(&mut out.diagnostics, line, span, "invalid data command syntax");
        return;
    }
    let subcmd = tokens[1].to_lowercase();
    let typ = tokens[2].to_lowercase();
    let opcode = match (subcmd.as_str(), typ.as_str()) {
        ("get", "block") => Opcode::GetBlock,
        ("get", "entity") => Opcode::GetEntity,
        ("merge", "block") => Opcode::MergeBlock,
        ("merge", "entity") => Opcode::MergeEntity,
        _ => {
            drop(&mut out.diagnostics, line, span, "invalid data command syntax");
            return;
        }
    };
    emit(opcode, &tokens[3..], out);
}

fn parse_return(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    if tokens.len() < 2 {
        drop(&mut out.diagnostics, line, span, "return command requires at least one argument");
        return;
    }
    match tokens[1].to_lowercase().as_str() {
        "fail" => {
            if tokens.len() != 3 {
                drop(&mut out.diagnostics, line, span, "usage: return fail <status>");
                return;
            }
            emit(Opcode::ReturnFail, &[tokens[2]], out);
        }
        "run" => {
            if tokens.len() < 3 {
                drop(&mut out.diagnostics, line, span, "expecting subcommand at 'return run ...'");
                return;
            }
            let subcommand = tokens[2..].join(" ");
            let sub = parse_line(&subcommand, span);
            out.instructions.push(Instruction::new(Opcode::ReturnRun, vec![]));
            out.calls.extend(sub.calls);
            out.diagnostics.extend(sub.diagnostics);
            out.instructions.extend(sub.instructions);
            out.instructions.push(Instruction::new(Opcode::KillBranch, vec![]));
        }
        _ => emit(Opcode::Return_, &tokens[1..], out),
    }
}

fn parse_tag(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    if tokens.len() < 3 {
        drop(&mut out.diagnostics, line, span, "invalid tag command syntax");
        return;
    }
    let opcode = match tokens[1].to_lowercase().as_str() {
        "add" => Opcode::TagAdd,
        "remove" => Opcode::TagRemove,
        _ => {
            drop(&mut out.diagnostics, line, span, "invalid tag command syntax");
            return;
        }
    };
    emit(opcode, &tokens[2..], out);
}

fn parse_function(line: &str, tokens: &[&str], span: Span, out: &mut ParseOutcome) {
    if tokens.len() < 2 {
        drop(&mut out.diagnostics, line, span, "function command requires a name");
        return;
    }
    let rest = tokens[1..].join(" ");

    let mut mapping = BTreeMap::new();
    let (callee, mut args) = if let Some(brace_idx) = rest.find('{') {
        let name = rest[..brace_idx].trim().trim_end_matches(".mcfunction").to_string();
        let json_str = rest[brace_idx..].trim();
        match serde_json::from_str::<serde_json::Value>(json_str) {
            Ok(serde_json::Value::Object(map)) => {
                let mut arg_list = Vec::with_capacity(map.len());
                for (i, (orig, value)) in map.iter().enumerate() {
                    mapping.insert(orig.clone(), arg_letter(i));
                    arg_list.push(json_value_to_arg(value));
                }
                (name, arg_list)
            }
            _ => {
                drop(&mut out.diagnostics, line, span, format!("invalid JSON for function arguments: {json_str}"));
                return;
            }
        }
    } else {
        (rest.trim().to_string(), Vec::new())
    };

    args.insert(0, callee.clone());
    out.calls.push(FunctionCall {
        callee,
        macro_bindings: mapping,
    });
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    emit(Opcode::RunFunc, &arg_refs, out);
}

fn json_value_to_arg(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_letter_matches_spec_table() {
        assert_eq!(arg_letter(0), "a");
        assert_eq!(arg_letter(25), "z");
        assert_eq!(arg_letter(26), "aa");
        assert_eq!(arg_letter(27), "ab");
    }

    #[test]
    fn simple_say_lowers_verbatim() {
        let out = parse_line("say hi", Span::dummy());
        assert_eq!(out.instructions, vec![Instruction::text(Opcode::Say, &["hi"])]);
    }

    #[test]
    fn execute_as_run_say_lowers_to_as_then_say_then_kill_branch() {
        let out = parse_line("execute as @e run say hi", Span::dummy());
        assert_eq!(
            out.instructions,
            vec![
                Instruction::text(Opcode::ExecuteAs, &["@e"]),
                Instruction::text(Opcode::Say, &["hi"]),
                Instruction::new(Opcode::KillBranch, vec![]),
            ]
        );
    }

    #[test]
    fn execute_if_score_matches_lowers_to_if_score() {
        let out = parse_line("execute if score @s health matches 1..10 run say low", Span::dummy());
        assert_eq!(
            out.instructions[0],
            Instruction::text(Opcode::IfScore, &["@s", "health", "matches", "1..10"])
        );
    }

    #[test]
    fn return_run_nests_kill_branch_after_subcommand() {
        let out = parse_line("return run say done", Span::dummy());
        assert_eq!(
            out.instructions,
            vec![
                Instruction::new(Opcode::ReturnRun, vec![]),
                Instruction::text(Opcode::Say, &["done"]),
                Instruction::new(Opcode::KillBranch, vec![]),
            ]
        );
    }

    #[test]
    fn function_call_with_named_args_builds_macro_binding_map() {
        let out = parse_line(r#"function ns/greet {"who": "world", "times": 3}"#, Span::dummy());
        assert_eq!(out.calls.len(), 1);
        let call = &out.calls[0];
        assert_eq!(call.callee, "ns/greet");
        assert_eq!(call.macro_bindings.get("who"), Some(&"a".to_string()));
        assert_eq!(call.macro_bindings.get("times"), Some(&"b".to_string()));
    }

    #[test]
    fn unknown_head_with_no_opcode_match_is_silently_dropped() {
        let out = parse_line("gibberish token stream", Span::dummy());
        assert!(out.instructions.is_empty());
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn scoreboard_players_reset_lowers_to_reset_opcode() {
        let out = parse_line("scoreboard players reset @s health", Span::dummy());
        assert_eq!(out.instructions, vec![Instruction::text(Opcode::Reset, &["@s", "health"])]);
    }

    #[test]
    fn missing_run_keyword_is_reported_and_drops_instruction() {
        let out = parse_line("execute as @e say hi", Span::dummy());
        assert!(out.instructions.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
    }
}
