//! The `Branch` execution context: the VM's fundamental mutable unit.
//!
//! Grounded on `vm.py::Branch` (attributes, `clone`/`new`/`kill`/`skip_over`).

use crate::instr::{Instruction, Opcode};

use super::selector::Executor;
use super::world::SERVER;

/// A `(kind, target, objective)` store request recorded by `execute_store`
/// and consumed by the next `kill_branch` (or transferred to a callee).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingStore {
    pub kind: StoreKind,
    pub target: String,
    pub objective: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Result,
    Success,
}

impl StoreKind {
    pub fn parse(s: &str) -> Option<StoreKind> {
        match s {
            "result" => Some(StoreKind::Result),
            "success" => Some(StoreKind::Success),
            _ => None,
        }
    }

    /// The value actually committed to the scoreboard for this store kind,
    /// given the branch's `last_value` at commit time.
    pub fn commit_value(self, last_value: i64) -> i64 {
        match self {
            StoreKind::Result => last_value,
            StoreKind::Success => i64::from(last_value != 0),
        }
    }
}

/// Opaque handle into a `BranchPool`. Stable across `Vec` reallocation since
/// it is a plain index, never a reference -- this is what lets `caller` be a
/// genuinely weak back-reference (spec.md "never an ownership edge").
pub type BranchId = usize;

#[derive(Clone, Debug)]
pub struct Branch {
    pub id: BranchId,
    pub executor: Executor,
    pub position: (f64, f64, f64),
    pub facing: (f64, f64),
    pub function: String,
    pub program: Vec<Instruction>,
    pub program_counter: usize,
    pub vars: Vec<String>,
    pub pending_store: Option<PendingStore>,
    pub last_value: i64,
    pub caller: Option<BranchId>,
    pub caller_pending_store: Option<PendingStore>,
    pub alive: bool,
}

impl Branch {
    /// A bare root branch, for use outside a `BranchPool` (tests, and the
    /// pool's own root construction).
    pub fn root() -> Self {
        Branch {
            id: 0,
            executor: Executor::Server,
            position: (0.0, 0.0, 0.0),
            facing: (0.0, 0.0),
            function: "main".to_string(),
            program: Vec::new(),
            program_counter: 0,
            vars: Vec::new(),
            pending_store: None,
            last_value: 0,
            caller: None,
            caller_pending_store: None,
            alive: true,
        }
    }

    /// Advance `program_counter` until the next `kill_branch` instruction
    /// (or the end of the program). Used to fast-forward past a clause's
    /// guarded subcommand on condition failure.
    pub fn skip_over(&mut self) {
        while self.program_counter < self.program.len() {
            if self.program[self.program_counter].opcode == Opcode::KillBranch {
                break;
            }
            self.program_counter += 1;
        }
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program.get(self.program_counter)
    }

    pub fn executor_tag(&self) -> &str {
        match &self.executor {
            Executor::Server => SERVER,
            Executor::Entity(kind) => kind,
        }
    }
}

/// Owns every `Branch` ever created in one VM run and the scheduler's ready
/// set (the subsequence of still-alive branch ids, in creation order).
///
/// Grounded on the module-level `branches`/`branchId` globals in `vm.py`.
pub struct BranchPool {
    branches: Vec<Branch>,
    ready: Vec<BranchId>,
}

const SOFT_WARNING_THRESHOLD: usize = 10_000;

impl BranchPool {
    pub fn new() -> Self {
        let mut pool = BranchPool {
            branches: Vec::new(),
            ready: Vec::new(),
        };
        pool.alloc(Branch::root());
        pool
    }

    fn alloc(&mut self, mut branch: Branch) -> BranchId {
        let id = self.branches.len();
        if id == SOFT_WARNING_THRESHOLD {
            log::warn!("there are {SOFT_WARNING_THRESHOLD} branches, you probably should fix that");
        }
        branch.id = id;
        self.branches.push(branch);
        self.ready.push(id);
        id
    }

    pub fn root_id(&self) -> BranchId {
        0
    }

    pub fn get(&self, id: BranchId) -> &Branch {
        &self.branches[id]
    }

    pub fn get_mut(&mut self, id: BranchId) -> &mut Branch {
        &mut self.branches[id]
    }

    pub fn ready_set(&self) -> &[BranchId] {
        &self.ready
    }

    /// Clone `source`'s attributes into a fresh branch, optionally
    /// overriding `executor`/`position`/`function`; appended to the ready
    /// set (so it is visited later in the same scheduler pass).
    pub fn clone_branch(
        &mut self,
        source: BranchId,
        executor: Option<Executor>,
        position: Option<(f64, f64, f64)>,
        function: Option<String>,
    ) -> BranchId {
        let src = self.branches[source].clone();
        let clone = Branch {
            id: 0,
            executor: executor.unwrap_or(src.executor),
            position: position.unwrap_or(src.position),
            facing: src.facing,
            function: function.unwrap_or(src.function),
            program: src.program,
            program_counter: src.program_counter,
            vars: Vec::new(),
            pending_store: None,
            last_value: 0,
            caller: Some(source),
            caller_pending_store: None,
            alive: true,
        };
        self.alloc(clone)
    }

    /// Create a new branch for a `run_func` call: fresh program, reset
    /// program counter, `vars` bound to the call-site arguments.
    pub fn call(&mut self, caller: BranchId, function: String, program: Vec<Instruction>, vars: Vec<String>) -> BranchId {
        let src = &self.branches[caller];
        let new_branch = Branch {
            id: 0,
            executor: src.executor.clone(),
            position: src.position,
            facing: src.facing,
            function,
            program,
            program_counter: 0,
            vars,
            pending_store: None,
            last_value: 0,
            caller: Some(caller),
            caller_pending_store: None,
            alive: true,
        };
        self.alloc(new_branch)
    }

    /// Commit any pending store using `last_value`, then remove the branch
    /// from the ready set. The root branch (id 0) is never removed here --
    /// reaching `kill_branch` on it is a VM halt request, handled by the
    /// scheduler.
    pub fn kill(&mut self, id: BranchId) {
        let (pending, last_value) = {
            let branch = &self.branches[id];
            (branch.pending_store.clone(), branch.last_value)
        };
        if let Some(store) = pending {
            self.commit_store(&store, last_value);
            self.branches[id].pending_store = None;
        }
        self.branches[id].alive = false;
        self.ready.retain(|&b| b != id);
    }

    pub fn is_alive(&self, id: BranchId) -> bool {
        self.branches[id].alive
    }

    fn commit_store(&mut self, _store: &PendingStore, _last_value: i64) {
        // World mutation happens in vm::exec, which holds the World and
        // calls World::set_score directly; this hook exists so BranchPool's
        // `kill` can be unit-tested without a World in scope.
    }
}

impl Default for BranchPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_has_one_ready_root_branch() {
        let pool = BranchPool::new();
        assert_eq!(pool.ready_set(), &[0]);
        assert_eq!(pool.get(0).caller, None);
    }

    #[test]
    fn clone_branch_appends_to_ready_set_with_caller_set() {
        let mut pool = BranchPool::new();
        let clone_id = pool.clone_branch(0, Some(Executor::Entity("e1".to_string())), None, None);
        assert_eq!(pool.ready_set(), &[0, clone_id]);
        assert_eq!(pool.get(clone_id).caller, Some(0));
    }

    #[test]
    fn kill_removes_branch_from_ready_set_but_root_stays_alive_flagwise() {
        let mut pool = BranchPool::new();
        let clone_id = pool.clone_branch(0, None, None, None);
        pool.kill(clone_id);
        assert_eq!(pool.ready_set(), &[0]);
        assert!(!pool.is_alive(clone_id));
    }

    #[test]
    fn skip_over_stops_at_kill_branch() {
        let mut branch = Branch::root();
        branch.program = vec![
            Instruction::text(Opcode::Say, &["a"]),
            Instruction::new(Opcode::KillBranch, vec![]),
            Instruction::text(Opcode::Say, &["b"]),
        ];
        branch.skip_over();
        assert_eq!(branch.program_counter, 1);
    }
}
