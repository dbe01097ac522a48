//! Source preprocessing: directive expansion, comment stripping, backslash
//! continuation, and indentation-chain flattening into logical command lines.
//!
//! Grounded on `compiler.py::preprocess/process_line/flatten`.

use std::collections::HashMap;

const MAX_LEVEL: usize = 20;

/// Process-wide `@define` registrations, accumulated across the directive pass.
#[derive(Default)]
pub struct Definitions {
    map: HashMap<String, String>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    fn substitute(&self, line: &str) -> String {
        let mut out = line.to_string();
        for (name, value) in &self.map {
            out = out.replace(&format!("?{name}"), value);
        }
        out
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Strip a trailing comment. `#` begins a comment only when it appears as a
/// standalone token (preceded by a space, or the whole remainder of the line);
/// `##`/`###` are preserved literally since they occur inside rich-text payloads.
fn strip_comment(line: &str) -> String {
    line.replace("###", "´´´")
        .replace("##", "´´")
        .split("# ")
        .next()
        .unwrap_or("")
        .replace('´', "#")
}

/// Expand one raw line into zero or more output lines, handling `?NAME`
/// substitution and the `@define`/`@repeat` directives.
fn process_line(line: &str, defs: &mut Definitions) -> Vec<String> {
    let substituted = defs.substitute(line);
    let trimmed = substituted.trim_start();

    if !(trimmed.starts_with('@') || trimmed.starts_with("#@")) {
        return vec![substituted];
    }

    let indent = indent_of(&substituted);
    let Some((head, rest)) = trimmed.splitn(2, ':').next().zip(trimmed.splitn(2, ':').nth(1))
    else {
        return vec![substituted];
    };
    let head = head.trim();
    let Some((operation, args_str)) = head.split_once(' ') else {
        return vec![substituted];
    };
    let operation = operation.trim_start_matches('#');
    let args: Vec<String> = args_str.split(',').map(|a| a.trim().to_string()).collect();
    let command = format!("{}{}", "    ".repeat(indent), rest.trim());

    match operation {
        "@repeat" => {
            let stop: i64 = args[0].parse().unwrap_or(0);
            let start: i64 = if args.len() > 1 {
                args[1].parse().unwrap_or(0)
            } else {
                0
            };
            let step: i64 = if args.len() > 2 {
                args[2].parse().unwrap_or(1)
            } else {
                1
            };
            let mut out = Vec::new();
            let mut i = start;
            if step > 0 {
                while i < stop {
                    out.push(command.replace("<i>", &i.to_string()));
                    i += step;
                }
            } else if step < 0 {
                while i > stop {
                    out.push(command.replace("<i>", &i.to_string()));
                    i += step;
                }
            }
            out
        }
        "@define" => {
            if let Some(name) = args.first() {
                defs.map.insert(name.clone(), command);
            }
            Vec::new()
        }
        _ => vec![substituted],
    }
}

/// Join lines ending in a backslash continuation with the next line.
fn join_continuations(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    for line in lines {
        if let Some(stripped) = line.strip_suffix('\\') {
            buffer.push_str(stripped.trim());
        } else {
            buffer.push_str(&line);
            out.push(std::mem::take(&mut buffer));
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
    out
}

/// Flatten an indentation chain into one logical line; preserves a leading `$`
/// (the vanilla macro-line marker) as the first character of the result.
fn flatten(chain: &[String], level: usize) -> String {
    let joined = chain[..=level]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(rest) = joined.strip_prefix('$') {
        format!("${}", rest.trim())
    } else {
        joined
    }
}

/// Preprocess one source file's raw text into a newline-joined string of
/// logical command lines, ready for the parser.
///
/// A directive line keeps the indentation of the directive itself (so a
/// `@repeat` nested under an `execute as @e` still chains correctly); each
/// emitted body line is re-indented to match before the indentation pass runs.
pub fn preprocess(source: &str, defs: &mut Definitions) -> String {
    let mut expanded_lines: Vec<String> = Vec::new();
    for line in source.lines() {
        expanded_lines.extend(process_line(line, defs));
    }
    let joined_lines = join_continuations(expanded_lines);

    let mut chain: Vec<String> = vec![String::new(); MAX_LEVEL];
    let mut final_lines = Vec::new();

    let mut i = 0;
    while i < joined_lines.len() {
        let original = &joined_lines[i];
        let trimmed = original.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        let cleaned = strip_comment(original).trim_end_matches('\\').to_string();
        let indent = indent_of(&cleaned);
        let level = indent / 4;
        let level = level.min(MAX_LEVEL - 1);
        chain[level] = cleaned;
        for slot in chain.iter_mut().skip(level + 1) {
            slot.clear();
        }

        let mut next_level = None;
        for next in joined_lines.iter().skip(i + 1) {
            let next_trimmed = next.trim();
            if next_trimmed.is_empty() || next_trimmed.starts_with('#') {
                continue;
            }
            let next_cleaned = strip_comment(next).trim_end_matches('\\').to_string();
            next_level = Some(indent_of(&next_cleaned) / 4);
            break;
        }

        if next_level.map_or(true, |nl| nl <= level) {
            final_lines.push(flatten(&chain, level));
        }

        i += 1;
    }

    final_lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_lines_pass_through_unchanged() {
        let mut defs = Definitions::new();
        let out = preprocess("say hi\nsay bye\n", &mut defs);
        assert_eq!(out, "say hi\nsay bye");
    }

    #[test]
    fn indented_line_is_prefixed_by_its_parent() {
        let mut defs = Definitions::new();
        let out = preprocess("execute as @e\n    say hi\n", &mut defs);
        assert_eq!(out, "execute as @e say hi");
    }

    #[test]
    fn unindented_sibling_line_does_not_attach() {
        let mut defs = Definitions::new();
        let out = preprocess("execute as @e\n    say hi\nsay bye\n", &mut defs);
        assert_eq!(out, "execute as @e say hi\nsay bye");
    }

    #[test]
    fn comment_is_stripped_but_double_hash_survives() {
        let mut defs = Definitions::new();
        let out = preprocess("say hi # a trailing comment\n", &mut defs);
        assert_eq!(out, "say hi");
        let out2 = preprocess("tellraw @a {\"text\":\"## bold marker\"}\n", &mut defs);
        assert!(out2.contains("##"));
    }

    #[test]
    fn define_then_repeat_expands_with_substitution() {
        let mut defs = Definitions::new();
        let out = preprocess(
            "@define obj: myobj\n@repeat 3: scoreboard players add p ?obj <i>\n",
            &mut defs,
        );
        assert_eq!(
            out,
            "scoreboard players add p myobj 0\nscoreboard players add p myobj 1\nscoreboard players add p myobj 2"
        );
    }

    #[test]
    fn repeat_with_start_and_stop() {
        let mut defs = Definitions::new();
        let out = preprocess("@repeat 5, 2: say <i>\n", &mut defs);
        assert_eq!(out, "say 2\nsay 3\nsay 4");
    }

    #[test]
    fn repeat_with_stride() {
        let mut defs = Definitions::new();
        let out = preprocess("@repeat 10, 0, 2: say <i>\n", &mut defs);
        assert_eq!(out, "say 0\nsay 2\nsay 4\nsay 6\nsay 8");
    }

    #[test]
    fn backslash_continuation_joins_next_line() {
        let mut defs = Definitions::new();
        let out = preprocess("say hello \\\n  world\n", &mut defs);
        assert_eq!(out, "say hello world");
    }

    #[test]
    fn macro_line_dollar_marker_preserved() {
        let mut defs = Definitions::new();
        let out = preprocess("$say $(value)\n", &mut defs);
        assert_eq!(out, "$say $(value)");
    }

    #[test]
    fn preprocessing_an_already_preprocessed_stream_is_idempotent() {
        let mut defs = Definitions::new();
        let source = "execute as @e at @s run say hi\nsay bye\n";
        let once = preprocess(source, &mut defs);
        let twice = preprocess(&once, &mut Definitions::new());
        assert_eq!(once, twice);
    }
}
