//! The commit stack model
//!
//! This module implements the core stack editing functionality:
//! - Commit records and per-path file states
//! - File stacks: the linear text history of each path
//! - The dual index linking commits to file stack revisions
//! - Dependency analysis and the edit operators built on it
//! - Minimal export of the edits back to the host repository

pub mod commit;
pub mod deps;
pub mod edit;
pub mod export;
pub mod file;
pub mod file_stack;
pub mod index;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use commit::{CommitState, ImmutableKind, Rev, BOTTOM_REV};
pub use deps::DepMap;
pub use export::{GotoTarget, ImportOptions};
pub use file::{BottomFiles, FileData, FileState, ABSENT_FLAG};
pub use file_stack::{FileRev, FileStackState};
pub use index::{CommitIdx, DualIndex, FileIdx};
pub use state::CommitStackState;
