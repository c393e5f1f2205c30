//! History rewriting: fold a commit into its parent, drop a commit,
//! reorder the stack. Every operation has a legality predicate; invoking an
//! operation whose predicate returns false fails fast.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::errors::{Result, StackEditError};

use super::commit::{CommitState, ImmutableKind, Rev};
use super::file::{FileData, FileState};
use super::state::{materialize_stack, CommitStackState};

impl CommitStackState {
    /// Whether `rev` can be merged into its sole parent. Conservative: a
    /// parent with more than one child never absorbs, regardless of whether
    /// the contents would merge cleanly.
    pub fn can_fold_down(&self, rev: Rev) -> bool {
        if rev <= 0 {
            return false;
        }
        let Some(commit) = self.get_commit(rev) else {
            return false;
        };
        if !commit.is_mutable() {
            return false;
        }
        let Some(&parent_rev) = commit.parents.first() else {
            return false;
        };
        let Some(parent) = self.get_commit(parent_rev) else {
            return false;
        };
        if !parent.is_mutable() {
            return false;
        }
        let child_count = self
            .stack
            .iter()
            .filter(|candidate| candidate.parents.contains(&parent_rev))
            .count();
        child_count == 1
    }

    /// Merge `rev` into its parent: changes combine, copy sources chain
    /// through the parent, reverted files cancel out, messages concatenate
    /// when the child's is meaningful, provenance merges.
    pub fn fold_down(&self, rev: Rev) -> Result<Self> {
        if !self.can_fold_down(rev) {
            return Err(StackEditError::illegal_edit(format!(
                "commit {rev} cannot fold into its parent"
            )));
        }
        let state = self.use_file_content()?;
        let commit = state.commit_ok(rev)?.clone();
        let parent_rev = commit.parents[0];
        let parent = state.commit_ok(parent_rev)?.clone();
        info!(rev, parent_rev, "folding commit into parent");

        let mut files = parent.files.clone();
        for (path, original_file) in &commit.files {
            let mut file = original_file.clone();
            // Chain the copy source through the parent: if the parent
            // obtained the source by copy itself, point at the grandparent
            // path; otherwise keep the child's source.
            let via = file.copy_from.clone().unwrap_or_else(|| path.clone());
            let copy_from = parent
                .files
                .get(&via)
                .and_then(|parent_file| parent_file.copy_from.clone())
                .or_else(|| file.copy_from.clone());
            file.copy_from = match copy_from {
                // The source did not exist below the parent, so the parent
                // introduced it; a copy marker would dangle.
                Some(source) if state.parent_file(parent_rev, &source, false).2.is_absent() => None,
                other => other,
            };
            let (_, _, below) = state.parent_file(parent_rev, path, false);
            if reverts_to(&state, &file, &below)? {
                files.remove(path);
            } else {
                files.insert(path.clone(), file);
            }
        }

        let text = if is_meaningful_text(&commit.text) {
            format!("{}\n\n{}", parent.text.trim_end(), commit.text)
        } else {
            parent.text.clone()
        };
        let mut original_nodes = parent.original_nodes.clone();
        original_nodes.extend(commit.original_nodes.iter().cloned());

        let merged = CommitState {
            rev: parent_rev,
            original_nodes,
            key: parent.key.clone(),
            author: parent.author.clone(),
            date: commit.date,
            text,
            immutable_kind: ImmutableKind::None,
            parents: parent.parents.clone(),
            files,
        };
        let mut stack = state.stack.clone();
        stack[parent_rev as usize] = Arc::new(merged);
        let folded = Self {
            stack,
            ..state.clone()
        };
        folded.rewrite_stack_dropping_rev(rev)
    }

    /// Whether `rev` can be removed: it is fully editable and nothing above
    /// it depends on it.
    pub fn can_drop(&self, rev: Rev) -> bool {
        let Some(commit) = self.get_commit(rev) else {
            return false;
        };
        if !commit.is_mutable() {
            return false;
        }
        self.calculate_dep_map()
            .values()
            .all(|deps| !deps.contains(&rev))
    }

    /// Remove `rev`. Its file revisions are severed from their stacks, so
    /// the content of every remaining commit reflows without the dropped
    /// change; later revs shift down by one.
    pub fn drop_rev(&self, rev: Rev) -> Result<Self> {
        if !self.can_drop(rev) {
            return Err(StackEditError::illegal_edit(format!(
                "commit {rev} cannot be dropped"
            )));
        }
        info!(rev, "dropping commit");
        let state = self.use_file_stack();
        let mut file_stacks = state.file_stacks.clone();
        for path in state.commit_ok(rev)?.files.keys() {
            if let Some((file_idx, file_rev)) = state.index.file_of(rev, path) {
                let unused = file_stacks[file_idx].rev_length();
                file_stacks[file_idx] =
                    Arc::new(file_stacks[file_idx].remap_revs(&HashMap::from([(file_rev, unused)])));
            }
        }
        let severed = Self {
            file_stacks,
            ..state.clone()
        };
        severed.rewrite_stack_dropping_rev(rev)
    }

    /// Whether the stack can be rearranged into `order`, where `order[i]`
    /// names the current rev that should end up at position `i`.
    pub fn can_reorder(&self, order: &[Rev]) -> bool {
        if !self.is_stack_linear() {
            return false;
        }
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        if sorted != self.revs() {
            return false;
        }
        if self.stack.iter().any(|commit| {
            commit.immutable_kind == ImmutableKind::Hash
                && order.get(commit.rev as usize) != Some(&commit.rev)
        }) {
            return false;
        }
        let new_pos: HashMap<Rev, Rev> = order
            .iter()
            .enumerate()
            .map(|(position, &rev)| (rev, position as Rev))
            .collect();
        self.calculate_dep_map().iter().all(|(rev, deps)| {
            deps.iter()
                .all(|dep| new_pos.get(dep) < new_pos.get(rev))
        })
    }

    /// Rearrange the stack into `order`. Each file stack is relabeled by
    /// the compacted restriction of the permutation to its own revs, so the
    /// content each commit carries travels with it; the commit sequence is
    /// then rewritten into a plain chain and everything derived is rebuilt.
    pub fn reorder(&self, order: &[Rev]) -> Result<Self> {
        if !self.can_reorder(order) {
            return Err(StackEditError::illegal_edit(format!(
                "stack cannot be reordered into {order:?}"
            )));
        }
        info!(?order, "reordering stack");
        let state = self.use_file_stack();
        let new_pos: HashMap<Rev, Rev> = order
            .iter()
            .enumerate()
            .map(|(position, &rev)| (rev, position as Rev))
            .collect();

        let mut file_stacks = Vec::with_capacity(state.file_stacks.len());
        let mut rev_maps: Vec<HashMap<usize, usize>> = Vec::with_capacity(state.file_stacks.len());
        for (file_idx, file_stack) in state.file_stacks.iter().enumerate() {
            let file_revs = file_stack.revs();
            let new_commit_revs = file_revs
                .iter()
                .map(|&file_rev| {
                    let (rev, _) = state.index.commit_of(file_idx, file_rev).ok_or_else(|| {
                        StackEditError::invariant(format!(
                            "file stack {file_idx} rev {file_rev} has no commit"
                        ))
                    })?;
                    Ok(if *rev < 0 { *rev } else { new_pos[rev] })
                })
                .collect::<Result<Vec<Rev>>>()?;
            let new_file_revs = compact_sequence(&new_commit_revs);
            let rev_map: HashMap<usize, usize> = file_revs
                .iter()
                .copied()
                .zip(new_file_revs)
                .filter(|(from, to)| from != to)
                .collect();
            file_stacks.push(Arc::new(file_stack.remap_revs(&rev_map)));
            rev_maps.push(rev_map);
        }

        let stack = (0..state.len())
            .map(|position| {
                let source = &state.stack[order[position] as usize];
                let files = source
                    .files
                    .iter()
                    .map(|(path, file)| {
                        let mut file = file.clone();
                        if let FileData::Lazy { file_idx, file_rev } = file.data {
                            let file_rev = rev_maps[file_idx]
                                .get(&file_rev)
                                .copied()
                                .unwrap_or(file_rev);
                            file.data = FileData::Lazy { file_idx, file_rev };
                        }
                        (path.clone(), file)
                    })
                    .collect();
                Arc::new(CommitState {
                    rev: position as Rev,
                    parents: if position == 0 {
                        Vec::new()
                    } else {
                        vec![position as Rev - 1]
                    },
                    files,
                    ..(**source).clone()
                })
            })
            .collect::<Vec<_>>();

        let resolver = Self {
            file_stacks,
            ..state.clone()
        };
        let materialized = materialize_stack(&stack, &resolver)?;
        Self::build(
            state.original_stack.clone(),
            state.bottom_files.clone(),
            materialized,
        )
    }

    /// The rev order with positions `rev` and `rev + 1` swapped; the
    /// identity order when the swap falls outside the stack.
    pub fn reordered_revs(&self, rev: Rev) -> Vec<Rev> {
        let mut order = self.revs();
        if rev >= 0 && (rev as usize) + 1 < order.len() {
            order.swap(rev as usize, rev as usize + 1);
        }
        order
    }

    /// Whether `rev` can swap with the commit above it.
    pub fn can_move_up(&self, rev: Rev) -> bool {
        rev >= 0 && (rev as usize) + 1 < self.len() && self.can_reorder(&self.reordered_revs(rev))
    }

    /// Whether `rev` can swap with the commit below it.
    pub fn can_move_down(&self, rev: Rev) -> bool {
        rev > 0 && self.can_move_up(rev - 1)
    }

    pub fn move_up(&self, rev: Rev) -> Result<Self> {
        if !self.can_move_up(rev) {
            return Err(StackEditError::illegal_edit(format!(
                "commit {rev} cannot move up"
            )));
        }
        self.reorder(&self.reordered_revs(rev))
    }

    pub fn move_down(&self, rev: Rev) -> Result<Self> {
        if !self.can_move_down(rev) {
            return Err(StackEditError::illegal_edit(format!(
                "commit {rev} cannot move down"
            )));
        }
        self.reorder(&self.reordered_revs(rev - 1))
    }
}

/// Map a sequence of distinct integers onto `0..n` preserving order, e.g.
/// `[0, 100, 50]` becomes `[0, 2, 1]`.
pub(crate) fn compact_sequence(revs: &[Rev]) -> Vec<usize> {
    let mut sorted = revs.to_vec();
    sorted.sort_unstable();
    revs.iter()
        .map(|rev| sorted.binary_search(rev).unwrap_or_default())
        .collect()
}

/// A commit message worth keeping on fold: several words, or long enough
/// to carry information on its own.
fn is_meaningful_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().any(char::is_whitespace) || trimmed.len() > 20
}

/// Whether `file` merely restores `below`, making the folded change a no-op
/// for its path.
fn reverts_to(state: &CommitStackState, file: &FileState, below: &FileState) -> Result<bool> {
    if file.is_absent() {
        return Ok(below.is_absent());
    }
    if below.is_absent() || file.copy_from.is_some() || file.flags != below.flags {
        return Ok(false);
    }
    match (&file.data, &below.data) {
        (FileData::Binary(left), FileData::Binary(right)) => Ok(left == right),
        _ if file.is_utf8() && below.is_utf8() => {
            Ok(state.get_utf8_data(file)? == state.get_utf8_data(below)?)
        }
        _ => Ok(false),
    }
}
