//! State Management Module
//!
//! Node-local state guarded for concurrent access: the vote ledger,
//! the tracker's file registry and the role/epoch state.

mod ledger;
mod registry;
mod role;

pub use ledger::VoteLedger;
pub use registry::FileRegistry;
pub use role::{ElectionFlag, NodeRole, ResultApplied, RoleState, SkipReason};
