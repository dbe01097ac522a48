//! Human-readable disassembly of a decoded executable.
//!
//! Grounded on `disasembler/disasemble.py::disassemble_executable/disassemble/
//! disassemble_json`. Operates on an already-decoded `Executable` (the binary
//! parsing itself lives in `container`/`decode`) rather than re-walking raw
//! bytes.

use crate::container::{Executable, FORMAT_VERSION, MAGIC};
use crate::decode::display_arg;
use crate::instr::{Instruction, Opcode, Program};
use crate::richtext::{self, Component, StyleValue, Styles, STYLE_BOLD, STYLE_ITALIC, STYLE_STRIKETHROUGH, STYLE_UNDERLINED};

fn styles_to_props(styles: &Styles) -> String {
    styles
        .iter()
        .map(|(id, value)| match value {
            StyleValue::Color(c) => format!("color={c}"),
            StyleValue::Flag => match *id {
                STYLE_BOLD => "bold".to_string(),
                STYLE_ITALIC => "italic".to_string(),
                STYLE_STRIKETHROUGH => "strikethrough".to_string(),
                STYLE_UNDERLINED => "underlined".to_string(),
                other => format!("prop{other}"),
            },
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn disassemble_component(component: &Component) -> String {
    match component {
        Component::Raw(bytes) => format!("RAW_JSON({})", String::from_utf8_lossy(bytes)),
        Component::Score { name, objective, styles } => {
            let props = styles_to_props(styles);
            if props.is_empty() {
                format!("SCORE(name={name}, objective={objective})")
            } else {
                format!("SCORE(name={name}, objective={objective}, {props})")
            }
        }
        Component::Text { text, styles } => {
            let props = styles_to_props(styles);
            if props.is_empty() {
                format!("TEXT(\"{text}\")")
            } else {
                format!("TEXT(\"{text}\" {props})")
            }
        }
        Component::Array(items) => format!("[{}]", items.iter().map(disassemble_component).collect::<Vec<_>>().join(", ")),
    }
}

/// Disassemble a single instruction into its mnemonic-plus-arguments form,
/// rendering `tellraw`'s binary payload as a structured component rather than
/// a hex dump.
pub fn disassemble_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.opcode.mnemonic();
    let args: Vec<String> = instr
        .args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if instr.opcode == Opcode::Tellraw && i == 0 {
                richtext::decode(arg).map(|c| disassemble_component(&c)).unwrap_or_else(|| "<empty>".to_string())
            } else {
                display_arg(arg)
            }
        })
        .collect();
    if args.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{mnemonic} {}", args.join(" "))
    }
}

pub fn disassemble_program(program: &Program) -> String {
    program.iter().map(disassemble_instruction).collect::<Vec<_>>().join("\n")
}

/// Full executable disassembly, matching the section layout of the original
/// disassembler tool (header, then one block per function).
pub fn disassemble_executable(exe: &Executable) -> String {
    let mut out = vec!["####### Executable Disassembly #######".to_string(), String::new()];
    out.push("### Executable Header ###".to_string());
    out.push(format!("Magic: {}", String::from_utf8_lossy(MAGIC)));
    out.push(format!("Version: {FORMAT_VERSION}"));
    out.push(format!("Namespace: {}", exe.namespace));
    out.push(format!("Function Count: {}", exe.functions.len()));
    out.push(String::new());
    out.push("### Functions ###".to_string());
    for (name, program) in &exe.functions {
        out.push(format!("## Function: {name} ##"));
        out.push("  Disassembly:".to_string());
        for line in disassemble_program(program).lines() {
            out.push(format!("    {line}"));
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction;
    use std::collections::BTreeMap;

    #[test]
    fn zero_arg_instruction_disassembles_to_bare_mnemonic() {
        let instr = Instruction::new(Opcode::KillBranch, vec![]);
        assert_eq!(disassemble_instruction(&instr), "kill_branch");
    }

    #[test]
    fn say_instruction_disassembles_with_text_args() {
        let instr = Instruction::text(Opcode::Say, &["hello", "world"]);
        assert_eq!(disassemble_instruction(&instr), "say hello world");
    }

    #[test]
    fn tellraw_payload_disassembles_as_structured_component() {
        let component = richtext::parse(r#"{"text":"hi","bold":true}"#).unwrap();
        let encoded = richtext::encode(&component).unwrap();
        let instr = Instruction::new(Opcode::Tellraw, vec![encoded]);
        let line = disassemble_instruction(&instr);
        assert!(line.starts_with("tellraw TEXT(\"hi\" bold)"));
    }

    #[test]
    fn executable_disassembly_includes_header_and_function_section() {
        let mut functions = BTreeMap::new();
        functions.insert("main".to_string(), vec![Instruction::text(Opcode::Say, &["hi"])]);
        let exe = Executable {
            namespace: "demo".to_string(),
            functions,
        };
        let text = disassemble_executable(&exe);
        assert!(text.contains("Namespace: demo"));
        assert!(text.contains("## Function: main ##"));
        assert!(text.contains("say hi"));
    }
}
