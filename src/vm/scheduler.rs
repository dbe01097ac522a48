//! The cooperative scheduler: drives every ready branch to its next
//! suspension point, round after round, until the root branch halts.
//!
//! Grounded on `vm.py::run/process_all_branches/process_branch/handle_debug_hook`.

use crate::instr::FunctionTable;
use crate::vm::branch::{BranchId, BranchPool};
use crate::vm::exec::{self, Step};
use crate::vm::world::World;

/// What a debug hook tells the scheduler to do before the next round.
pub enum DebugAction {
    /// Falsy: busy-wait, re-polling without advancing any branch.
    Pause,
    /// `"quit"`: halt, after one final hook call.
    Quit,
    Continue,
}

pub trait DebugHook {
    fn poll(&mut self) -> DebugAction;
}

/// A hook that never pauses; the scheduler just runs to completion.
pub struct NoDebugHook;

impl DebugHook for NoDebugHook {
    fn poll(&mut self) -> DebugAction {
        DebugAction::Continue
    }
}

/// Step one branch repeatedly until it yields or the VM halts. Returns
/// `true` if this branch's step reached `kill_branch` on the root (a halt
/// request).
fn process_branch(pool: &mut BranchPool, world: &mut World, functions: &FunctionTable, id: BranchId) -> bool {
    loop {
        if !pool.is_alive(id) {
            return false;
        }
        match exec::step(pool, world, functions, id) {
            Ok(Step::Halt) => return true,
            Ok(Step::Yield) => return false,
            Ok(Step::Continue) => continue,
            Err(e) => {
                log::error!("branch {id} aborted: {e}");
                pool.kill(id);
                return false;
            }
        }
    }
}

/// Give every currently-ready branch one turn. Returns `true` if the VM
/// should halt (the root branch reached `kill_branch`).
fn process_all_branches(pool: &mut BranchPool, world: &mut World, functions: &FunctionTable) -> bool {
    let mut halted = false;
    for id in pool.ready_set().to_vec() {
        if pool.is_alive(id) && process_branch(pool, world, functions, id) {
            halted = true;
        }
    }
    halted
}

/// Run the VM to completion: round after round of `process_all_branches`,
/// consulting `hook` before each round, until the root halts or no branch
/// remains ready.
pub fn run(pool: &mut BranchPool, world: &mut World, functions: &FunctionTable, hook: &mut dyn DebugHook) {
    loop {
        match hook.poll() {
            DebugAction::Pause => continue,
            DebugAction::Quit => {
                hook.poll();
                return;
            }
            DebugAction::Continue => {}
        }
        if process_all_branches(pool, world, functions) {
            return;
        }
        if pool.ready_set().is_empty() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{Instruction, Opcode};
    use crate::vm::world::World;

    fn program(instrs: Vec<Instruction>) -> FunctionTable {
        let mut table = FunctionTable::new();
        table.insert("main".to_string(), instrs);
        table
    }

    #[test]
    fn run_halts_when_root_reaches_kill_branch() {
        let functions = program(vec![
            Instruction::text(Opcode::SetScore, &["@s", "n", "3"]),
            Instruction::new(Opcode::KillBranch, vec![]),
        ]);
        let mut pool = BranchPool::new();
        let mut world = World::new();
        pool.get_mut(0).program = functions["main"].clone();
        run(&mut pool, &mut world, &functions, &mut NoDebugHook);
        assert_eq!(world.get_score("n", "SERVER"), 3);
    }

    #[test]
    fn run_stops_when_ready_set_empties_without_root_halting() {
        let functions = program(vec![Instruction::text(Opcode::ExecuteAs, &["@e"])]);
        let mut pool = BranchPool::new();
        let mut world = World::new();
        pool.get_mut(0).program = functions["main"].clone();
        run(&mut pool, &mut world, &functions, &mut NoDebugHook);
        assert!(pool.ready_set().is_empty() || pool.is_alive(0));
    }
}
