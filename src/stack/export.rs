//! Minimal change computation: diff the edited state against the original
//! export and emit the action list that reconciles the repository.

use std::collections::HashSet;

use tracing::debug;

use crate::errors::{Result, StackEditError};
use crate::exchange::{ExportFile, ImportAction, ImportCommit, ImportStack, Mark};

use super::commit::Rev;
use super::file::{FileData, FileState};
use super::state::CommitStackState;

/// Where the working copy should end up after the import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GotoTarget {
    Rev(Rev),
    Hash(String),
}

/// Options for [`CommitStackState::calculate_import_stack`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub goto: Option<GotoTarget>,
    /// Move the working-copy pointer without touching its files
    pub preserve_dirty_files: bool,
}

impl CommitStackState {
    /// Compute the actions equivalent to transforming the originally
    /// exported stack into this state. Unchanged commits at the bottom are
    /// untouched; the result is empty when nothing was edited.
    pub fn calculate_import_stack(&self, options: &ImportOptions) -> Result<ImportStack> {
        let state = self.use_file_content()?;
        let reference = Self::from_export(&state.original_stack)?;
        let first_changed_rev = state
            .stack
            .iter()
            .zip(&reference.stack)
            .position(|(current, original)| current != original)
            .unwrap_or_else(|| state.len().min(reference.len())) as Rev;
        debug!(first_changed_rev, "computing import stack");

        let mut actions = ImportStack::new();
        for commit in state.stack.iter().filter(|c| c.rev >= first_changed_rev) {
            let parents: Vec<Mark> = commit
                .parents
                .iter()
                .map(|&parent| {
                    if parent >= first_changed_rev {
                        rev_mark(parent)
                    } else {
                        // The parent is identical to the original commit at
                        // that position, so its hash is still valid.
                        state.original_stack[parent as usize].node.clone()
                    }
                })
                .collect();
            let files = commit
                .files
                .iter()
                .map(|(path, file)| Ok((path.clone(), to_export_file(file)?)))
                .collect::<Result<_>>()?;
            actions.push(ImportAction::Commit(ImportCommit {
                mark: rev_mark(commit.rev),
                author: commit.author.clone(),
                date: commit.date,
                text: commit.text.clone(),
                parents,
                predecessors: commit.original_nodes.iter().cloned().collect(),
                files,
            }));
        }

        if let Some(target) = &options.goto {
            match state.resolve_goto(target) {
                Some(rev) if rev >= first_changed_rev => {
                    let mark = rev_mark(rev);
                    actions.push(if options.preserve_dirty_files {
                        ImportAction::Reset { mark }
                    } else {
                        ImportAction::Goto { mark }
                    });
                }
                Some(rev) => debug!(rev, "goto target is unchanged, nothing to emit"),
                None => debug!(?target, "goto target is not part of the stack"),
            }
        }

        let retained: HashSet<&String> = state
            .stack
            .iter()
            .flat_map(|commit| commit.original_nodes.iter())
            .collect();
        let orphaned: Vec<String> = state
            .original_stack
            .iter()
            .filter(|commit| commit.requested && !commit.immutable)
            .filter(|commit| !retained.contains(&commit.node))
            .map(|commit| commit.node.clone())
            .collect();
        if !orphaned.is_empty() {
            actions.push(ImportAction::Hide { nodes: orphaned });
        }
        Ok(actions)
    }

    /// Map a goto request onto a current rev. A hash equal to the original
    /// top of the stack sticks to the new top, whatever it is now;
    /// otherwise the latest commit descending from the hash wins.
    fn resolve_goto(&self, target: &GotoTarget) -> Option<Rev> {
        match target {
            GotoTarget::Rev(rev) => Some(*rev),
            GotoTarget::Hash(hash) => {
                if self.original_stack.last().map(|commit| &commit.node) == Some(hash)
                    && !self.is_empty()
                {
                    return Some(self.len() as Rev - 1);
                }
                self.stack
                    .iter()
                    .rev()
                    .find(|commit| commit.original_nodes.contains(hash))
                    .map(|commit| commit.rev)
            }
        }
    }
}

fn rev_mark(rev: Rev) -> Mark {
    format!(":r{rev}")
}

/// Convert a materialized file back to its wire form; absent files become
/// `None` (deletion).
fn to_export_file(file: &FileState) -> Result<Option<ExportFile>> {
    if file.is_absent() {
        return Ok(None);
    }
    let mut export = ExportFile {
        copy_from: file.copy_from.clone(),
        flags: (!file.flags.is_empty()).then(|| file.flags.clone()),
        ..Default::default()
    };
    match &file.data {
        FileData::Text(text) => export.data = Some(text.clone()),
        FileData::Binary(payload) => export.data_base85 = Some(payload.clone()),
        FileData::Lazy { .. } => {
            return Err(StackEditError::invariant(
                "lazy file data survived materialization",
            ));
        }
    }
    Ok(Some(export))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExportStack, ImportAction};
    use crate::stack::testing::{export_commit, public_commit};

    fn linear_add_modify() -> ExportStack {
        vec![
            public_commit("P", &[]),
            export_commit(
                "A",
                &["P"],
                &[("x.txt", None)],
                &[("x.txt", Some(ExportFile::text("hello")))],
            ),
            export_commit(
                "B",
                &["A"],
                &[],
                &[("x.txt", Some(ExportFile::text("hello world")))],
            ),
        ]
    }

    #[test]
    fn test_unedited_state_exports_nothing() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let actions = state
            .calculate_import_stack(&ImportOptions::default())
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_view_switch_is_not_an_edit() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let state = state.use_file_stack().use_file_content().unwrap();
        let actions = state
            .calculate_import_stack(&ImportOptions::default())
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_fold_emits_single_commit_action() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let folded = state.fold_down(2).unwrap();
        let actions = folded
            .calculate_import_stack(&ImportOptions::default())
            .unwrap();
        // Both originals survive as predecessors of the fold, so nothing
        // is orphaned and no hide action appears.
        assert_eq!(actions.len(), 1);
        let ImportAction::Commit(commit) = &actions[0] else {
            panic!("expected a commit action, got {:?}", actions[0]);
        };
        assert_eq!(commit.mark, ":r1");
        // The unchanged public parent is referenced by its hash.
        assert_eq!(commit.parents, vec!["P".to_string()]);
        assert_eq!(commit.predecessors, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            commit.files["x.txt"],
            Some(ExportFile::text("hello world"))
        );
    }

    #[test]
    fn test_drop_orphans_the_dropped_node() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let dropped = state.drop_rev(2).unwrap();
        let actions = dropped
            .calculate_import_stack(&ImportOptions::default())
            .unwrap();
        assert_eq!(
            actions,
            vec![ImportAction::Hide {
                nodes: vec!["B".to_string()]
            }]
        );
    }

    #[test]
    fn test_goto_original_top_hash_sticks_to_new_top() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let folded = state.fold_down(2).unwrap();
        let actions = folded
            .calculate_import_stack(&ImportOptions {
                goto: Some(GotoTarget::Hash("B".to_string())),
                preserve_dirty_files: false,
            })
            .unwrap();
        assert!(actions.contains(&ImportAction::Goto {
            mark: ":r1".to_string()
        }));
    }

    #[test]
    fn test_preserve_dirty_files_emits_reset() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let folded = state.fold_down(2).unwrap();
        let actions = folded
            .calculate_import_stack(&ImportOptions {
                goto: Some(GotoTarget::Rev(1)),
                preserve_dirty_files: true,
            })
            .unwrap();
        assert!(actions.contains(&ImportAction::Reset {
            mark: ":r1".to_string()
        }));
    }

    #[test]
    fn test_goto_to_unchanged_commit_emits_nothing() {
        let state = CommitStackState::from_export(&linear_add_modify()).unwrap();
        let folded = state.fold_down(2).unwrap();
        let actions = folded
            .calculate_import_stack(&ImportOptions {
                goto: Some(GotoTarget::Hash("P".to_string())),
                preserve_dirty_files: false,
            })
            .unwrap();
        assert!(actions
            .iter()
            .all(|action| !matches!(action, ImportAction::Goto { .. })));
    }
}
