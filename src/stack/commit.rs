use std::collections::{BTreeMap, BTreeSet};

use crate::exchange::StackDate;

use super::file::FileState;

/// Position of a commit in the stack. `-1` is the sentinel for "bottom of
/// stack", i.e. the state just below the root commit.
pub type Rev = isize;

/// Sentinel rev for the state below the stack.
pub const BOTTOM_REV: Rev = -1;

/// How much of a commit is frozen against edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmutableKind {
    /// The commit and its ancestors must not be rewritten at all
    Hash,
    /// File contents are frozen, metadata may change
    Content,
    /// The change (diff) is frozen, contents may shift
    Diff,
    /// Fully editable
    None,
}

/// One commit of the stack: metadata plus the files it modifies. Inherited
/// (unmodified) file content is never stored here; resolve it through
/// `CommitStackState::get_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitState {
    /// Position in the stack; always equals the index in the stack sequence
    pub rev: Rev,
    /// Original hashes this commit descends from; merged when commits fold
    pub original_nodes: BTreeSet<String>,
    /// Stable identity across rebuilds, never empty
    pub key: String,
    pub author: String,
    pub date: StackDate,
    pub text: String,
    pub immutable_kind: ImmutableKind,
    /// Parent revs; at most one
    pub parents: Vec<Rev>,
    /// Only the files modified by this commit
    pub files: BTreeMap<String, FileState>,
}

impl CommitState {
    /// Whether every kind of edit is allowed on this commit.
    pub fn is_mutable(&self) -> bool {
        self.immutable_kind == ImmutableKind::None
    }

    /// First line of the commit message.
    pub fn title(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }

    /// Copy of this commit with `rev` and `parents` rewritten through `map`.
    pub(crate) fn rewrite_revs(&self, map: impl Fn(Rev) -> Rev) -> Self {
        let mut commit = self.clone();
        commit.rev = map(self.rev);
        commit.parents = self.parents.iter().map(|&parent| map(parent)).collect();
        commit
    }
}
