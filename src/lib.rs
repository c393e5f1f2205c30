//! In-memory commit stack editing.
//!
//! A [`CommitStackState`](stack::CommitStackState) models a linear sequence
//! of commits together with the per-path content history of every file they
//! touch. High-level history rewrites (fold a commit into its parent, drop a
//! commit, reorder the stack) are pure transformations: each returns a fresh
//! state sharing unchanged structure with its predecessor, so comparing the
//! edited state against the original yields the minimal list of repository
//! actions needed to realize the edits.

pub mod errors;
pub mod exchange;
pub mod stack;

pub use errors::{Result, StackEditError};
pub use exchange::{ExportCommit, ExportFile, ExportStack, ImportAction, ImportStack};
pub use stack::{CommitStackState, GotoTarget, ImportOptions, Rev};
