//! Dependency analysis across commits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::commit::{Rev, BOTTOM_REV};
use super::state::CommitStackState;

/// For every rev, the set of earlier revs it depends on.
pub type DepMap = BTreeMap<Rev, BTreeSet<Rev>>;

impl CommitStackState {
    /// Prerequisites of every rev, combining content dependencies (from the
    /// file stacks, translated through the dual index) with structural ones
    /// (a change whose parent file flips absence or lives at another path
    /// needs that parent commit). Memoized per snapshot; entries pointing
    /// below the stack are discarded.
    pub fn calculate_dep_map(&self) -> Arc<DepMap> {
        self.dep_cache
            .get_or_init(|| Arc::new(self.compute_dep_map()))
            .clone()
    }

    fn compute_dep_map(&self) -> DepMap {
        let mut deps: DepMap = self
            .revs()
            .into_iter()
            .map(|rev| (rev, BTreeSet::new()))
            .collect();

        for (file_idx, file_stack) in self.file_stacks.iter().enumerate() {
            let commit_rev = |file_rev: usize| -> Rev {
                self.index
                    .commit_of(file_idx, file_rev)
                    .map_or(BOTTOM_REV, |(rev, _)| *rev)
            };
            for (file_rev, dep_file_revs) in file_stack.calculate_dep_map() {
                let rev = commit_rev(file_rev);
                if rev < 0 {
                    continue;
                }
                for dep_file_rev in dep_file_revs {
                    let dep_rev = commit_rev(dep_file_rev);
                    if dep_rev >= 0 && dep_rev != rev {
                        deps.entry(rev).or_default().insert(dep_rev);
                    }
                }
            }
        }

        for commit in &self.stack {
            for (path, file) in &commit.files {
                let (prev_rev, prev_path, prev_file) = self.parent_file(commit.rev, path, true);
                if prev_rev >= 0
                    && (prev_file.is_absent() != file.is_absent() || prev_path != *path)
                {
                    deps.entry(commit.rev).or_default().insert(prev_rev);
                }
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExportFile;
    use crate::stack::testing::{export_commit, renamed_file};

    #[test]
    fn test_content_dependency_from_overlapping_edits() {
        // B rewrites the line A introduced.
        let stack = vec![
            export_commit("A", &[], &[("x.txt", None)], &[("x.txt", Some(ExportFile::text("1")))]),
            export_commit("B", &["A"], &[], &[("x.txt", Some(ExportFile::text("12")))]),
        ];
        let state = CommitStackState::from_export(&stack).unwrap();
        let deps = state.calculate_dep_map();
        assert!(deps[&0].is_empty());
        assert_eq!(deps[&1], BTreeSet::from([0]));
    }

    #[test]
    fn test_no_dependency_between_disjoint_files() {
        let stack = vec![
            export_commit("A", &[], &[("x.txt", None)], &[("x.txt", Some(ExportFile::text("1")))]),
            export_commit("B", &["A"], &[("y.txt", None)], &[("y.txt", Some(ExportFile::text("2")))]),
        ];
        let state = CommitStackState::from_export(&stack).unwrap();
        let deps = state.calculate_dep_map();
        assert!(deps[&1].is_empty());
    }

    #[test]
    fn test_rename_creates_structural_dependency() {
        let stack = vec![
            export_commit("A", &[], &[("x.txt", None)], &[("x.txt", Some(ExportFile::text("33")))]),
            export_commit(
                "B",
                &["A"],
                &[],
                &[
                    ("x.txt", None),
                    ("y.txt", Some(renamed_file("33", "x.txt"))),
                ],
            ),
        ];
        let state = CommitStackState::from_export(&stack).unwrap();
        let deps = state.calculate_dep_map();
        assert_eq!(deps[&1], BTreeSet::from([0]));
    }

    #[test]
    fn test_deletion_depends_on_the_add() {
        let stack = vec![
            export_commit("A", &[], &[("x.txt", None)], &[("x.txt", Some(ExportFile::text("1\n")))]),
            export_commit("B", &["A"], &[], &[("x.txt", None)]),
        ];
        let state = CommitStackState::from_export(&stack).unwrap();
        let deps = state.calculate_dep_map();
        // The absence flip makes B structurally dependent on A.
        assert_eq!(deps[&1], BTreeSet::from([0]));
    }

    #[test]
    fn test_dep_map_is_memoized_per_snapshot() {
        let stack = vec![export_commit("A", &[], &[("x.txt", None)], &[("x.txt", Some(ExportFile::text("1")))])];
        let state = CommitStackState::from_export(&stack).unwrap();
        let first = state.calculate_dep_map();
        let second = state.calculate_dep_map();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
