//! The closed instruction set and the in-memory instruction/function representation.
//!
//! Grounded on `common.py::Instruction` (the opcode enum) and the binary
//! instruction layout implicit in `compiler.py::compile_instr` /
//! `vm.py::parse_instructions`.

use std::collections::BTreeMap;

/// A single opcode. Values are assigned consecutively starting at 1, in the exact
/// order given by spec.md section 6.1 — this is the corrected, non-colliding
/// enumeration; see DESIGN.md for the historical-collision open question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Opcode {
    ExecuteAs = 1,
    ExecuteAt,
    ExecuteStore,
    Positioned,
    IfBlock,
    IfEntity,
    IfScore,
    UnlessBlock,
    UnlessEntity,
    UnlessScore,
    Add,
    Remove,
    ListScores,
    ListObjectives,
    SetScore,
    Get,
    Operation,
    Reset,
    Say,
    Tellraw,
    SetBlock,
    Fill,
    Clone,
    GetBlock,
    GetEntity,
    MergeBlock,
    MergeEntity,
    Random,
    Summon,
    Kill,
    TagAdd,
    TagRemove,
    Return_,
    ReturnFail,
    ReturnRun,
    KillBranch,
    RunFunc,
}

impl Opcode {
    pub const ALL: &'static [Opcode] = &[
        Opcode::ExecuteAs,
        Opcode::ExecuteAt,
        Opcode::ExecuteStore,
        Opcode::Positioned,
        Opcode::IfBlock,
        Opcode::IfEntity,
        Opcode::IfScore,
        Opcode::UnlessBlock,
        Opcode::UnlessEntity,
        Opcode::UnlessScore,
        Opcode::Add,
        Opcode::Remove,
        Opcode::ListScores,
        Opcode::ListObjectives,
        Opcode::SetScore,
        Opcode::Get,
        Opcode::Operation,
        Opcode::Reset,
        Opcode::Say,
        Opcode::Tellraw,
        Opcode::SetBlock,
        Opcode::Fill,
        Opcode::Clone,
        Opcode::GetBlock,
        Opcode::GetEntity,
        Opcode::MergeBlock,
        Opcode::MergeEntity,
        Opcode::Random,
        Opcode::Summon,
        Opcode::Kill,
        Opcode::TagAdd,
        Opcode::TagRemove,
        Opcode::Return_,
        Opcode::ReturnFail,
        Opcode::ReturnRun,
        Opcode::KillBranch,
        Opcode::RunFunc,
    ];

    /// The lowercase mnemonic used both in the "anything else" verbatim lowering
    /// and in disassembly output.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::ExecuteAs => "execute_as",
            Opcode::ExecuteAt => "execute_at",
            Opcode::ExecuteStore => "execute_store",
            Opcode::Positioned => "positioned",
            Opcode::IfBlock => "if_block",
            Opcode::IfEntity => "if_entity",
            Opcode::IfScore => "if_score",
            Opcode::UnlessBlock => "unless_block",
            Opcode::UnlessEntity => "unless_entity",
            Opcode::UnlessScore => "unless_score",
            Opcode::Add => "add",
            Opcode::Remove => "remove",
            Opcode::ListScores => "list_scores",
            Opcode::ListObjectives => "list_objectives",
            Opcode::SetScore => "set_score",
            Opcode::Get => "get",
            Opcode::Operation => "operation",
            Opcode::Reset => "reset",
            Opcode::Say => "say",
            Opcode::Tellraw => "tellraw",
            Opcode::SetBlock => "setblock",
            Opcode::Fill => "fill",
            Opcode::Clone => "clone",
            Opcode::GetBlock => "get_block",
            Opcode::GetEntity => "get_entity",
            Opcode::MergeBlock => "merge_block",
            Opcode::MergeEntity => "merge_entity",
            Opcode::Random => "random",
            Opcode::Summon => "summon",
            Opcode::Kill => "kill",
            Opcode::TagAdd => "tag_add",
            Opcode::TagRemove => "tag_remove",
            Opcode::Return_ => "return_",
            Opcode::ReturnFail => "return_fail",
            Opcode::ReturnRun => "return_run",
            Opcode::KillBranch => "kill_branch",
            Opcode::RunFunc => "run_func",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    pub fn from_u8(value: u8) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| *op as u8 == value)
    }
}

/// A single instruction: an opcode plus its ordered, opaque byte-string arguments.
///
/// Most arguments are UTF-8 text; the `tellraw` payload argument is a structured
/// binary rich-text blob (see `crate::richtext`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub args: Vec<Vec<u8>>,
}

impl Instruction {
    pub fn new(opcode: Opcode, args: Vec<Vec<u8>>) -> Self {
        Self { opcode, args }
    }

    pub fn text(opcode: Opcode, args: &[&str]) -> Self {
        Self {
            opcode,
            args: args.iter().map(|a| a.as_bytes().to_vec()).collect(),
        }
    }

    /// Convenience accessor: argument `i` decoded as UTF-8, falling back to a hex
    /// dump on invalid UTF-8 (the same fallback the decoder applies).
    pub fn arg_str(&self, i: usize) -> std::borrow::Cow<'_, str> {
        match std::str::from_utf8(&self.args[i]) {
            Ok(s) => std::borrow::Cow::Borrowed(s),
            Err(_) => std::borrow::Cow::Owned(hex_dump(&self.args[i])),
        }
    }
}

pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// An ordered instruction stream for one function.
pub type Program = Vec<Instruction>;

/// All reachable functions, keyed by name.
pub type FunctionTable = BTreeMap<String, Program>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values_are_consecutive_from_one() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as u8, (i + 1) as u8);
        }
    }

    #[test]
    fn mnemonic_round_trips_through_from_mnemonic() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(*op));
        }
    }

    #[test]
    fn from_u8_round_trips() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_u8(*op as u8), Some(*op));
        }
    }

    #[test]
    fn setblock_and_list_scores_do_not_collide() {
        // Historical bug: one version of the enum gave setblock and list_scores
        // both the value 12. The corrected enumeration must not reproduce it.
        assert_ne!(Opcode::SetBlock as u8, Opcode::ListScores as u8);
    }
}
