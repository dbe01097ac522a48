//! The versioned binary executable container: magic, version, namespace,
//! function table, length-prefixed instruction blocks, DEFLATE-compressed.
//!
//! Grounded on `vm.py::parse_executable` (decode side) and
//! `compiler.py::create_executable`/`write_file` (encode side); spec.md §6.2.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::decode::decode_instructions;
use crate::encode::encode_program;
use crate::instr::{FunctionTable, Instruction};

/// The one format version this implementation supports. Any other value in
/// a loaded executable is a file-format error (spec.md §7).
pub const FORMAT_VERSION: u8 = 1;

pub const MAGIC: &[u8; 4] = b"MCFN";

/// A fully decoded executable: namespace plus every reachable function's
/// instruction stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Executable {
    pub namespace: String,
    pub functions: FunctionTable,
}

#[derive(Debug)]
pub enum ContainerError {
    BadMagic,
    UnsupportedVersion(u8),
    Truncated(&'static str),
    NamespaceTooLong,
    NameTooLong(String),
    BlockTooLong(String),
    TooManyFunctions,
    Decode(crate::decode::DecodeError),
    Encode(crate::encode::EncodeError),
    Compression(std::io::Error),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::BadMagic => write!(f, "invalid magic number in executable"),
            ContainerError::UnsupportedVersion(v) => write!(f, "unsupported format version: {v}"),
            ContainerError::Truncated(what) => write!(f, "truncated executable: {what}"),
            ContainerError::NamespaceTooLong => write!(f, "namespace longer than 255 bytes"),
            ContainerError::NameTooLong(name) => write!(f, "function name too long: {name}"),
            ContainerError::BlockTooLong(name) => {
                write!(f, "instruction block too long for function: {name}")
            }
            ContainerError::TooManyFunctions => write!(f, "more than 65535 functions"),
            ContainerError::Decode(e) => write!(f, "{e}"),
            ContainerError::Encode(e) => write!(f, "{e}"),
            ContainerError::Compression(e) => write!(f, "compression error: {e}"),
        }
    }
}

impl std::error::Error for ContainerError {}

/// Serialize an `Executable` into the uncompressed wire layout (magic,
/// version, namespace, function table).
fn write_uncompressed(exe: &Executable) -> Result<Vec<u8>, ContainerError> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);

    let ns_bytes = exe.namespace.as_bytes();
    if ns_bytes.len() > 255 {
        return Err(ContainerError::NamespaceTooLong);
    }
    out.push(ns_bytes.len() as u8);
    out.extend_from_slice(ns_bytes);

    if exe.functions.len() > u16::MAX as usize {
        return Err(ContainerError::TooManyFunctions);
    }
    out.extend_from_slice(&(exe.functions.len() as u16).to_be_bytes());

    for (name, program) in &exe.functions {
        let name_bytes = name.as_bytes();
        if name_bytes.len() > 255 {
            return Err(ContainerError::NameTooLong(name.clone()));
        }
        out.push(name_bytes.len() as u8);
        out.extend_from_slice(name_bytes);

        let block = encode_program(program).map_err(ContainerError::Encode)?;
        if block.len() > u16::MAX as usize {
            return Err(ContainerError::BlockTooLong(name.clone()));
        }
        out.extend_from_slice(&(block.len() as u16).to_be_bytes());
        out.extend_from_slice(&block);
    }

    Ok(out)
}

/// Compress an `Executable` into its final on-disk bytes.
pub fn write_executable(exe: &Executable) -> Result<Vec<u8>, ContainerError> {
    let raw = write_uncompressed(exe)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&raw).map_err(ContainerError::Compression)?;
    encoder.finish().map_err(ContainerError::Compression)
}

fn read_u8(bytes: &[u8], pos: &mut usize, what: &'static str) -> Result<u8, ContainerError> {
    let b = *bytes.get(*pos).ok_or(ContainerError::Truncated(what))?;
    *pos += 1;
    Ok(b)
}

fn read_bytes<'a>(
    bytes: &'a [u8],
    pos: &mut usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], ContainerError> {
    let slice = bytes
        .get(*pos..*pos + len)
        .ok_or(ContainerError::Truncated(what))?;
    *pos += len;
    Ok(slice)
}

/// Decompress and parse an on-disk executable.
pub fn read_executable(bytes: &[u8]) -> Result<Executable, ContainerError> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(ContainerError::Compression)?;

    let mut pos = 0usize;
    let magic = read_bytes(&raw, &mut pos, 4, "magic")?;
    if magic != MAGIC {
        return Err(ContainerError::BadMagic);
    }

    let version = read_u8(&raw, &mut pos, "version")?;
    if version != FORMAT_VERSION {
        return Err(ContainerError::UnsupportedVersion(version));
    }

    let ns_len = read_u8(&raw, &mut pos, "namespace length")? as usize;
    let namespace = String::from_utf8_lossy(read_bytes(&raw, &mut pos, ns_len, "namespace")?).into_owned();

    let func_count_bytes = read_bytes(&raw, &mut pos, 2, "function count")?;
    let func_count = u16::from_be_bytes([func_count_bytes[0], func_count_bytes[1]]) as usize;

    let mut functions = FunctionTable::new();
    for _ in 0..func_count {
        let name_len = read_u8(&raw, &mut pos, "function name length")? as usize;
        let name =
            String::from_utf8_lossy(read_bytes(&raw, &mut pos, name_len, "function name")?).into_owned();

        let block_len_bytes = read_bytes(&raw, &mut pos, 2, "instruction block length")?;
        let block_len = u16::from_be_bytes([block_len_bytes[0], block_len_bytes[1]]) as usize;
        let block = read_bytes(&raw, &mut pos, block_len, "instruction block")?;

        let instructions: Vec<Instruction> =
            decode_instructions(block).map_err(ContainerError::Decode)?;
        functions.insert(name, instructions);
    }

    Ok(Executable {
        namespace,
        functions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Opcode;

    fn sample() -> Executable {
        let mut functions = FunctionTable::new();
        functions.insert(
            "main".to_string(),
            vec![
                Instruction::text(Opcode::Say, &["hi"]),
                Instruction::new(Opcode::KillBranch, vec![]),
            ],
        );
        Executable {
            namespace: "example".to_string(),
            functions,
        }
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let exe = sample();
        let bytes = write_executable(&exe).unwrap();
        assert_eq!(&bytes[..0], b""); // compressed bytes, not directly inspectable
        let decoded = read_executable(&bytes).unwrap();
        assert_eq!(decoded, exe);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"NOPE\x01\x00\x00\x00").unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(read_executable(&bytes), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.push(99);
        raw.push(0);
        raw.extend_from_slice(&0u16.to_be_bytes());
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(
            read_executable(&bytes),
            Err(ContainerError::UnsupportedVersion(99))
        ));
    }
}
