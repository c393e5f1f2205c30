use std::collections::BTreeMap;

use super::commit::Rev;
use super::file_stack::FileRev;

/// Commit-side coordinate of a modification: which commit touched which path.
pub type CommitIdx = (Rev, String);

/// File-stack-side coordinate: which stack holds the content, at which rev.
pub type FileIdx = (usize, FileRev);

/// The two inverse maps linking commit modifications to file stack
/// revisions. Both directions are always written together so they cannot
/// drift apart; when a path's history forks onto a new stack, the
/// commit-side entry points at the latest stack while the file side keeps
/// every recorded origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DualIndex {
    commit_to_file: BTreeMap<CommitIdx, FileIdx>,
    file_to_commit: BTreeMap<FileIdx, CommitIdx>,
}

impl DualIndex {
    pub fn set(&mut self, rev: Rev, path: &str, file_idx: usize, file_rev: FileRev) {
        self.commit_to_file
            .insert((rev, path.to_string()), (file_idx, file_rev));
        self.file_to_commit
            .insert((file_idx, file_rev), (rev, path.to_string()));
    }

    pub fn file_of(&self, rev: Rev, path: &str) -> Option<FileIdx> {
        self.commit_to_file.get(&(rev, path.to_string())).copied()
    }

    pub fn commit_of(&self, file_idx: usize, file_rev: FileRev) -> Option<&CommitIdx> {
        self.file_to_commit.get(&(file_idx, file_rev))
    }

    pub fn commit_entries(&self) -> impl Iterator<Item = (&CommitIdx, &FileIdx)> {
        self.commit_to_file.iter()
    }

    pub fn file_entries(&self) -> impl Iterator<Item = (&FileIdx, &CommitIdx)> {
        self.file_to_commit.iter()
    }
}
