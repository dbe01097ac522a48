//! Inverse of `encode`: parses a packed instruction block back into
//! `(opcode, args)` pairs, reparsing rich-text `tellraw` payloads.
//!
//! Grounded on `vm.py::parse_instructions`.

use crate::instr::{hex_dump, Instruction, Opcode};

#[derive(Debug)]
pub enum DecodeError {
    Truncated,
    UnknownOpcode(u8),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "truncated instruction block"),
            DecodeError::UnknownOpcode(b) => write!(f, "unknown opcode byte {b}"),
        }
    }
}

/// Decode a packed instruction block into a vector of instructions.
///
/// An argument that is not valid UTF-8 is kept as its raw bytes (the
/// argument stays opaque; decoding to a display string is the caller's job
/// via `Instruction::arg_str`, which falls back to a hex dump).
pub fn decode_instructions(block: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < block.len() {
        if pos + 2 > block.len() {
            return Err(DecodeError::Truncated);
        }
        let arg_count = block[pos] as usize;
        let opcode_byte = block[pos + 1];
        pos += 2;
        let opcode = Opcode::from_u8(opcode_byte).ok_or(DecodeError::UnknownOpcode(opcode_byte))?;

        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            if pos >= block.len() {
                return Err(DecodeError::Truncated);
            }
            let arg_len = block[pos] as usize;
            pos += 1;
            if pos + arg_len > block.len() {
                return Err(DecodeError::Truncated);
            }
            args.push(block[pos..pos + arg_len].to_vec());
            pos += arg_len;
        }
        out.push(Instruction::new(opcode, args));
    }
    Ok(out)
}

/// Render an instruction argument for display purposes: UTF-8 text verbatim,
/// or a hex dump when the bytes are not valid UTF-8.
pub fn display_arg(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => hex_dump(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_program;

    #[test]
    fn round_trips_through_encode() {
        let program = vec![
            Instruction::text(Opcode::Say, &["hi"]),
            Instruction::new(Opcode::KillBranch, vec![]),
        ];
        let bytes = encode_program(&program).unwrap();
        let decoded = decode_instructions(&bytes).unwrap();
        assert_eq!(decoded, program);
    }

    #[test]
    fn truncated_block_is_an_error() {
        assert!(matches!(decode_instructions(&[1]), Err(DecodeError::Truncated)));
    }

    #[test]
    fn unknown_opcode_byte_is_an_error() {
        assert!(matches!(
            decode_instructions(&[0, 255]),
            Err(DecodeError::UnknownOpcode(255))
        ));
    }

    #[test]
    fn invalid_utf8_argument_falls_back_to_hex_display() {
        let instr = Instruction::new(Opcode::Say, vec![vec![0xff, 0xfe]]);
        let bytes = encode_program(&[instr]).unwrap();
        let decoded = decode_instructions(&bytes).unwrap();
        assert_eq!(display_arg(&decoded[0].args[0]), "fffe");
    }
}
