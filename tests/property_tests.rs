//! Property-based invariants over randomly generated linear stacks.

use std::collections::BTreeMap;

use proptest::prelude::*;

use stackedit::exchange::{ExportCommit, ExportFile, ExportStack, StackDate};
use stackedit::stack::{CommitStackState, ImportOptions, Rev};

const PATHS: [&str; 3] = ["a.txt", "b.txt", "c.txt"];

#[derive(Debug, Clone)]
enum FileOp {
    /// Leave the path alone this commit
    Skip,
    /// Append a fresh unique line
    Append,
    /// Replace the whole content with a fresh unique line
    Rewrite,
    /// Delete the path
    Delete,
}

/// Build a linear export stack from per-commit, per-path operations. Every
/// generated line is unique, which keeps line provenance unambiguous.
fn build_export(commits: Vec<Vec<FileOp>>) -> ExportStack {
    let mut contents: Vec<Option<String>> = vec![None; PATHS.len()];
    let mut line = 0usize;
    let mut export = ExportStack::new();
    for (idx, ops) in commits.iter().enumerate() {
        let mut files = BTreeMap::new();
        let mut relevant_files = BTreeMap::new();
        for (path_idx, op) in ops.iter().enumerate() {
            let path = PATHS[path_idx].to_string();
            let next = match op {
                FileOp::Skip => continue,
                FileOp::Append => {
                    line += 1;
                    Some(format!(
                        "{}line{line}\n",
                        contents[path_idx].clone().unwrap_or_default()
                    ))
                }
                FileOp::Rewrite => {
                    line += 1;
                    Some(format!("line{line}\n"))
                }
                FileOp::Delete => {
                    if contents[path_idx].is_none() {
                        continue;
                    }
                    None
                }
            };
            if contents[path_idx].is_none() {
                relevant_files.insert(path.clone(), None);
            }
            contents[path_idx] = next.clone();
            files.insert(path, next.map(ExportFile::text));
        }
        export.push(ExportCommit {
            node: format!("node{idx}"),
            immutable: false,
            requested: true,
            author: "prop <prop@example.com>".to_string(),
            date: StackDate::new(idx as i64, 0),
            text: format!("commit {idx}"),
            parents: if idx == 0 {
                Vec::new()
            } else {
                vec![format!("node{}", idx - 1)]
            },
            relevant_files,
            files,
        });
    }
    export
}

fn arb_export() -> impl Strategy<Value = ExportStack> {
    prop::collection::vec(
        prop::collection::vec(
            prop_oneof![
                3 => Just(FileOp::Skip),
                3 => Just(FileOp::Append),
                2 => Just(FileOp::Rewrite),
                1 => Just(FileOp::Delete),
            ],
            PATHS.len(),
        ),
        1..6,
    )
    .prop_map(build_export)
}

fn all_contents(state: &CommitStackState) -> Vec<(Rev, String, Option<String>)> {
    let mut contents = Vec::new();
    for rev in state.revs() {
        for path in PATHS {
            if !state.bottom_files().contains_key(path) {
                continue;
            }
            let file = state.get_file(rev, path).expect("tracked path resolves");
            let data = (!file.is_absent())
                .then(|| state.get_utf8_data(file).expect("text file materializes"));
            contents.push((rev, path.to_string(), data));
        }
    }
    contents
}

proptest! {
    /// Construction keeps revs positional and the dual index maps inverse
    /// of each other.
    #[test]
    fn prop_construction_invariants(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        for (idx, &rev) in state.revs().iter().enumerate() {
            prop_assert_eq!(rev, idx as Rev);
            let commit = state.get_commit(rev).unwrap();
            prop_assert_eq!(commit.rev, rev);
            for &parent in &commit.parents {
                prop_assert!(parent < rev);
            }
        }
        let index = state.dual_index();
        for ((rev, path), &(file_idx, file_rev)) in index.commit_entries() {
            let back = index.commit_of(file_idx, file_rev);
            prop_assert_eq!(back, Some(&(*rev, path.clone())));
        }
        for (&(file_idx, file_rev), (rev, path)) in index.file_entries() {
            prop_assert_eq!(index.file_of(*rev, path), Some((file_idx, file_rev)));
        }
    }

    /// Switching to lazy references and back is invisible to content.
    #[test]
    fn prop_file_view_round_trip(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        let round_tripped = state.use_file_stack().use_file_content().unwrap();
        prop_assert_eq!(all_contents(&state), all_contents(&round_tripped));
    }

    /// A legal drop succeeds and introduces no new dependencies between
    /// the surviving revs.
    #[test]
    fn prop_drop_preserves_dependencies(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        let old_deps = state.calculate_dep_map();
        for rev in state.revs() {
            if !state.can_drop(rev) {
                continue;
            }
            let dropped = state.drop_rev(rev).unwrap();
            prop_assert_eq!(dropped.len(), state.len() - 1);
            let new_deps = dropped.calculate_dep_map();
            let renumber = |old: Rev| if old < rev { old } else { old - 1 };
            for (&new_rev, deps) in new_deps.iter() {
                let old_rev = if new_rev < rev { new_rev } else { new_rev + 1 };
                for &dep in deps {
                    let appeared: Vec<Rev> = old_deps[&old_rev]
                        .iter()
                        .filter(|&&d| d != rev)
                        .map(|&d| renumber(d))
                        .collect();
                    prop_assert!(
                        appeared.contains(&dep),
                        "drop of {} introduced dependency {} -> {}",
                        rev,
                        new_rev,
                        dep
                    );
                }
            }
        }
    }

    /// Commits whose position survives a legal swap keep their file
    /// content.
    #[test]
    fn prop_swap_preserves_untouched_positions(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        let before = all_contents(&state);
        for rev in state.revs() {
            if !state.can_move_up(rev) {
                continue;
            }
            let swapped = state.move_up(rev).unwrap();
            let after = all_contents(&swapped);
            for ((old_rev, path, old_data), (new_rev, _, new_data)) in
                before.iter().zip(after.iter())
            {
                if *old_rev == rev || *old_rev == rev + 1 {
                    continue;
                }
                prop_assert_eq!(old_rev, new_rev);
                prop_assert_eq!(old_data, new_data, "content changed at {} {}", old_rev, path);
            }
        }
    }

    /// Reordering by the identity permutation changes nothing.
    #[test]
    fn prop_identity_reorder_is_noop(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        let order = state.revs();
        prop_assert!(state.can_reorder(&order));
        let same = state.reorder(&order).unwrap();
        prop_assert_eq!(all_contents(&state), all_contents(&same));
        for rev in state.revs() {
            prop_assert_eq!(
                &state.get_commit(rev).unwrap().key,
                &same.get_commit(rev).unwrap().key
            );
        }
    }

    /// Folding the same rev from the same state twice gives equivalent
    /// results.
    #[test]
    fn prop_fold_down_is_deterministic(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        for rev in state.revs() {
            if !state.can_fold_down(rev) {
                continue;
            }
            let first = state.fold_down(rev).unwrap();
            let second = state.fold_down(rev).unwrap();
            prop_assert_eq!(all_contents(&first), all_contents(&second));
            prop_assert_eq!(first.describe_file_stacks(), second.describe_file_stacks());
            prop_assert_eq!(
                first.calculate_import_stack(&ImportOptions::default()).unwrap(),
                second.calculate_import_stack(&ImportOptions::default()).unwrap()
            );
        }
    }

    /// With no edits the minimal import stack is empty.
    #[test]
    fn prop_no_edits_export_nothing(export in arb_export()) {
        let state = CommitStackState::from_export(&export).unwrap();
        let actions = state.calculate_import_stack(&ImportOptions::default()).unwrap();
        prop_assert!(actions.is_empty());
    }
}
