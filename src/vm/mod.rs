//! The branching virtual machine: branch pool, world state, selector/coordinate
//! evaluation, instruction execution, and the cooperative scheduler.

pub mod branch;
pub mod exec;
pub mod scheduler;
pub mod selector;
pub mod world;

pub use branch::{Branch, BranchId, BranchPool, PendingStore, StoreKind};
pub use exec::{ExecError, Step};
pub use scheduler::{run, DebugAction, DebugHook, NoDebugHook};
pub use selector::{Executor, SelectorError};
pub use world::{Entity, Nbt, Scoreboards, World};
