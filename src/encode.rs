//! Instruction and rich-text encoding into the packed binary wire format.
//!
//! Grounded on `compiler.py::compile_instr` (per-instruction packing) and
//! spec.md §6.2's packed-instruction layout.

use crate::instr::Instruction;
use crate::richtext;

#[derive(Debug)]
pub enum EncodeError {
    TooManyArgs,
    ArgTooLong(usize),
    RichText(richtext::RichTextError),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::TooManyArgs => write!(f, "too many arguments in instruction"),
            EncodeError::ArgTooLong(len) => write!(f, "argument too long [{len}/255]"),
            EncodeError::RichText(e) => write!(f, "{e}"),
        }
    }
}

/// Encode one instruction into a packed byte sequence:
/// `arg_count(1) opcode(1) [arg_len(1) arg_bytes]*`.
pub fn encode_instruction(instr: &Instruction) -> Result<Vec<u8>, EncodeError> {
    if instr.args.len() > 255 {
        return Err(EncodeError::TooManyArgs);
    }
    let mut out = Vec::new();
    out.push(instr.args.len() as u8);
    out.push(instr.opcode as u8);
    for arg in &instr.args {
        if arg.len() > 255 {
            return Err(EncodeError::ArgTooLong(arg.len()));
        }
        out.push(arg.len() as u8);
        out.extend_from_slice(arg);
    }
    Ok(out)
}

/// Encode an ordered instruction stream (one function body).
pub fn encode_program(program: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for instr in program {
        out.extend(encode_instruction(instr)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Opcode;

    #[test]
    fn single_arg_instruction_packs_header_then_length_prefixed_arg() {
        let instr = Instruction::text(Opcode::Say, &["hi"]);
        let bytes = encode_instruction(&instr).unwrap();
        assert_eq!(bytes, vec![1, Opcode::Say as u8, 2, b'h', b'i']);
    }

    #[test]
    fn zero_arg_instruction_packs_just_the_header() {
        let instr = Instruction::new(Opcode::KillBranch, vec![]);
        let bytes = encode_instruction(&instr).unwrap();
        assert_eq!(bytes, vec![0, Opcode::KillBranch as u8]);
    }

    #[test]
    fn oversize_argument_is_rejected() {
        let instr = Instruction::new(Opcode::Say, vec![vec![0u8; 256]]);
        assert!(matches!(
            encode_instruction(&instr),
            Err(EncodeError::ArgTooLong(256))
        ));
    }
}
