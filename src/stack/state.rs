//! The commit stack and its derived file histories.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, StackEditError};
use crate::exchange::ExportStack;

use super::commit::{CommitState, ImmutableKind, Rev, BOTTOM_REV};
use super::deps::DepMap;
use super::file::{build_bottom_files, BottomFiles, FileData, FileState};
use super::file_stack::FileStackState;
use super::index::DualIndex;

/// A snapshot of the whole editing session: the commit sequence, the
/// content of every referenced path just below it, and the derived per-path
/// file stacks with the dual index linking the two views.
///
/// Values are immutable; every operation returns a fresh state and shares
/// unchanged substructure with its input. Derived results (the dep map) are
/// memoized per snapshot.
#[derive(Debug, Clone)]
pub struct CommitStackState {
    /// The export this session started from, kept for minimal-export diffing
    pub(crate) original_stack: Arc<ExportStack>,
    pub(crate) bottom_files: Arc<BottomFiles>,
    pub(crate) stack: Vec<Arc<CommitState>>,
    pub(crate) file_stacks: Vec<Arc<FileStackState>>,
    pub(crate) index: Arc<DualIndex>,
    pub(crate) snapshot: Uuid,
    pub(crate) dep_cache: OnceLock<Arc<DepMap>>,
}

impl CommitStackState {
    /// Import an exported stack, validating its shape, deriving bottom
    /// files, and building the file stacks.
    pub fn from_export(export: &ExportStack) -> Result<Self> {
        validate_export(export)?;
        let bottom_files = build_bottom_files(export);
        let node_to_rev: HashMap<&str, Rev> = export
            .iter()
            .enumerate()
            .map(|(idx, commit)| (commit.node.as_str(), idx as Rev))
            .collect();
        let stack = export
            .iter()
            .enumerate()
            .map(|(idx, commit)| {
                let immutable_kind = if commit.immutable || !commit.requested {
                    ImmutableKind::Hash
                } else {
                    ImmutableKind::None
                };
                Arc::new(CommitState {
                    rev: idx as Rev,
                    original_nodes: BTreeSet::from([commit.node.clone()]),
                    key: commit.node.clone(),
                    author: commit.author.clone(),
                    date: commit.date,
                    text: commit.text.clone(),
                    immutable_kind,
                    parents: commit
                        .parents
                        .iter()
                        .map(|parent| node_to_rev[parent.as_str()])
                        .collect(),
                    files: commit
                        .files
                        .iter()
                        .map(|(path, file)| (path.clone(), FileState::from_export(file.as_ref())))
                        .collect(),
                })
            })
            .collect();
        Self::build(
            Arc::new(export.clone()),
            Arc::new(bottom_files),
            stack,
        )
    }

    /// Assemble a state from parts, deriving file stacks and the dual
    /// index. Callers must pass materialized (non-lazy) file data.
    pub(crate) fn build(
        original_stack: Arc<ExportStack>,
        bottom_files: Arc<BottomFiles>,
        stack: Vec<Arc<CommitState>>,
    ) -> Result<Self> {
        let mut state = Self {
            original_stack,
            bottom_files,
            stack,
            file_stacks: Vec::new(),
            index: Arc::new(DualIndex::default()),
            snapshot: Uuid::new_v4(),
            dep_cache: OnceLock::new(),
        };
        state.check_shape()?;
        let (file_stacks, index) = state.derive_file_stacks()?;
        debug!(
            commits = state.stack.len(),
            file_stacks = file_stacks.len(),
            "built commit stack state"
        );
        state.file_stacks = file_stacks;
        state.index = Arc::new(index);
        Ok(state)
    }

    /// Identity of this snapshot; fresh for every logical state, suitable
    /// as a key for externally held derived caches.
    pub fn snapshot_id(&self) -> Uuid {
        self.snapshot
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn revs(&self) -> Vec<Rev> {
        (0..self.stack.len() as Rev).collect()
    }

    pub fn get_commit(&self, rev: Rev) -> Option<&CommitState> {
        if rev < 0 {
            return None;
        }
        self.stack.get(rev as usize).map(Arc::as_ref)
    }

    pub(crate) fn commit_ok(&self, rev: Rev) -> Result<&CommitState> {
        self.get_commit(rev)
            .ok_or_else(|| StackEditError::invariant(format!("rev {rev} is not in the stack")))
    }

    pub fn bottom_files(&self) -> &BottomFiles {
        &self.bottom_files
    }

    pub fn file_stacks(&self) -> &[Arc<FileStackState>] {
        &self.file_stacks
    }

    pub fn dual_index(&self) -> &DualIndex {
        &self.index
    }

    /// Whether every non-root commit sits directly on the commit below it.
    pub fn is_stack_linear(&self) -> bool {
        self.stack.iter().all(|commit| {
            if commit.rev == 0 {
                commit.parents.is_empty()
            } else {
                commit.parents == [commit.rev - 1]
            }
        })
    }

    /// Ancestors of `start`, depth first, starting with `start` itself.
    pub fn log(&self, start: Rev) -> impl Iterator<Item = Rev> + '_ {
        let mut to_visit = vec![start];
        std::iter::from_fn(move || {
            let rev = to_visit.pop()?;
            if let Some(commit) = self.get_commit(rev) {
                // Parents always have a smaller rev, so this terminates.
                to_visit.extend(commit.parents.iter().copied());
            }
            Some(rev)
        })
    }

    /// The subsequence of [`log`](Self::log) that modifies `path`. With
    /// `follow_renames`, iteration switches to the source path once a
    /// visited modification carries `copy_from`.
    pub fn log_file<'a>(
        &'a self,
        start: Rev,
        path: &str,
        follow_renames: bool,
    ) -> impl Iterator<Item = (Rev, String, &'a FileState)> + 'a {
        let mut revs = self.log(start);
        let mut path = path.to_string();
        std::iter::from_fn(move || {
            for rev in revs.by_ref() {
                let Some(file) = self.get_commit(rev).and_then(|commit| commit.files.get(&path))
                else {
                    continue;
                };
                let visited = path.clone();
                if follow_renames {
                    if let Some(source) = &file.copy_from {
                        path = source.clone();
                    }
                }
                return Some((rev, visited, file));
            }
            None
        })
    }

    /// The file as seen at `rev`: the nearest ancestor modification, the
    /// bottom content when no commit touched it, or an error for paths the
    /// stack has never heard of.
    pub fn get_file(&self, rev: Rev, path: &str) -> Result<&FileState> {
        for log_rev in self.log(rev) {
            if let Some(file) = self
                .get_commit(log_rev)
                .and_then(|commit| commit.files.get(path))
            {
                return Ok(file);
            }
        }
        self.bottom_files
            .get(path)
            .ok_or_else(|| StackEditError::not_tracked(path))
    }

    /// The modification `rev`'s change to `path` builds upon: the nearest
    /// strictly earlier modification (following renames when asked),
    /// falling back to the bottom files at [`BOTTOM_REV`].
    pub(crate) fn parent_file(
        &self,
        rev: Rev,
        path: &str,
        follow_renames: bool,
    ) -> (Rev, String, FileState) {
        let mut prev_path = path.to_string();
        for (log_rev, log_path, file) in self.log_file(rev, path, follow_renames) {
            if log_rev == rev {
                if follow_renames {
                    if let Some(source) = &file.copy_from {
                        prev_path = source.clone();
                    }
                }
                continue;
            }
            return (log_rev, log_path, file.clone());
        }
        let file = self
            .bottom_files
            .get(&prev_path)
            .cloned()
            .unwrap_or_else(FileState::absent);
        (BOTTOM_REV, prev_path, file)
    }

    /// Materialize a file's UTF-8 content, resolving lazy references
    /// through the file stacks. Binary payloads fail with a decode error.
    pub fn get_utf8_data(&self, file: &FileState) -> Result<String> {
        match &file.data {
            FileData::Text(text) => Ok(text.clone()),
            FileData::Lazy { file_idx, file_rev } => {
                let stack = self.file_stacks.get(*file_idx).ok_or_else(|| {
                    StackEditError::invariant(format!("file stack {file_idx} does not exist"))
                })?;
                stack.get_rev(*file_rev)
            }
            FileData::Binary(_) => Err(StackEditError::decode(
                "binary file content was requested as text",
            )),
        }
    }

    /// Switch modified UTF-8 files to lazy file stack references. The
    /// stacks survive rebuilds, so references taken here stay meaningful
    /// across the rewriting operations.
    pub fn use_file_stack(&self) -> Self {
        let stack = self
            .stack
            .iter()
            .map(|commit| {
                let mut changed = false;
                let files = commit
                    .files
                    .iter()
                    .map(|(path, file)| {
                        let mapped = self.index.file_of(commit.rev, path);
                        match (&file.data, mapped) {
                            (FileData::Text(_), Some((file_idx, file_rev))) => {
                                changed = true;
                                let mut file = file.clone();
                                file.data = FileData::Lazy { file_idx, file_rev };
                                (path.clone(), file)
                            }
                            _ => (path.clone(), file.clone()),
                        }
                    })
                    .collect();
                if changed {
                    Arc::new(CommitState {
                        files,
                        ..(**commit).clone()
                    })
                } else {
                    Arc::clone(commit)
                }
            })
            .collect();
        Self {
            stack,
            ..self.clone()
        }
    }

    /// Switch lazy references back to inline strings; the inverse of
    /// [`use_file_stack`](Self::use_file_stack). Binary payloads are left
    /// untouched.
    pub fn use_file_content(&self) -> Result<Self> {
        let stack = materialize_stack(&self.stack, self)?;
        Ok(Self {
            stack,
            ..self.clone()
        })
    }

    /// One line per file stack, e.g.
    /// `"0:./x.txt 1:A/x.txt(hello) 2:B/x.txt(hello world)"`; the bottom
    /// pseudo-commit is shown as `"."`.
    pub fn describe_file_stacks(&self) -> Vec<String> {
        self.file_stacks
            .iter()
            .enumerate()
            .map(|(file_idx, file_stack)| {
                (0..file_stack.rev_length())
                    .filter_map(|file_rev| {
                        let (rev, path) = self.index.commit_of(file_idx, file_rev)?;
                        let title = match self.get_commit(*rev) {
                            Some(commit) => commit.title().to_string(),
                            None => ".".to_string(),
                        };
                        let content = file_stack.get_rev(file_rev).unwrap_or_default();
                        Some(if content.is_empty() {
                            format!("{file_rev}:{title}/{path}")
                        } else {
                            format!("{file_rev}:{title}/{path}({content})")
                        })
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    /// Remove `rev` from the sequence, shifting everything above it down.
    /// Contents are materialized first, so any file stack remapping done by
    /// the caller is reflected in the rebuilt state.
    pub(crate) fn rewrite_stack_dropping_rev(&self, rev: Rev) -> Result<Self> {
        let materialized = self.use_file_content()?;
        let stack = materialized
            .stack
            .iter()
            .filter(|commit| commit.rev != rev)
            .map(|commit| {
                let mut commit = commit.rewrite_revs(|r| if r < rev { r } else { r - 1 });
                commit.parents.retain(|&parent| parent >= 0);
                Arc::new(commit)
            })
            .collect();
        Self::build(
            self.original_stack.clone(),
            self.bottom_files.clone(),
            stack,
        )
    }

    fn check_shape(&self) -> Result<()> {
        for (idx, commit) in self.stack.iter().enumerate() {
            if commit.rev != idx as Rev {
                return Err(StackEditError::invariant(format!(
                    "commit at index {idx} claims rev {}",
                    commit.rev
                )));
            }
            for &parent in &commit.parents {
                if parent < 0 || parent >= commit.rev {
                    return Err(StackEditError::invariant(format!(
                        "commit {} has out-of-order parent {parent}",
                        commit.rev
                    )));
                }
            }
        }
        let roots = self
            .stack
            .iter()
            .filter(|commit| commit.parents.is_empty())
            .count();
        if !self.stack.is_empty() && roots != 1 {
            return Err(StackEditError::invariant(format!(
                "stack must have exactly one root, found {roots}"
            )));
        }
        Ok(())
    }

    /// Derive the file stacks and the dual index from the commit records.
    ///
    /// Per commit, renames are registered before plain modifications and
    /// copies (alphabetical within each class) so that a rename source's
    /// terminal absence is consumed before the name can be reused. A path's
    /// existing stack is continued only when the parent content is its
    /// current top; otherwise a new stack starts, seeded with the parent
    /// content when that content is textual.
    fn derive_file_stacks(&self) -> Result<(Vec<Arc<FileStackState>>, DualIndex)> {
        let mut file_stacks: Vec<FileStackState> = Vec::new();
        let mut index = DualIndex::default();
        for commit in &self.stack {
            let mut ordered: Vec<(u8, &String, &FileState)> = commit
                .files
                .iter()
                .map(|(path, file)| {
                    let priority = if is_rename(commit, file) {
                        0
                    } else if file.copy_from.is_none() {
                        1
                    } else {
                        2
                    };
                    (priority, path, file)
                })
                .collect();
            ordered.sort_by(|left, right| (left.0, left.1).cmp(&(right.0, right.1)));

            let mut renamed: HashSet<&str> = HashSet::new();
            for (priority, path, file) in ordered {
                if priority == 0 {
                    if let Some(source) = &file.copy_from {
                        renamed.insert(source.as_str());
                    }
                } else if file.is_absent() && renamed.contains(path.as_str()) {
                    // Already consumed as a rename source this commit.
                    continue;
                }
                if !file.is_utf8() {
                    // Binary payloads stay inline and never join a stack.
                    continue;
                }
                self.register_file(commit.rev, path, file, &mut file_stacks, &mut index)?;
            }
        }
        Ok((file_stacks.into_iter().map(Arc::new).collect(), index))
    }

    fn register_file(
        &self,
        rev: Rev,
        path: &str,
        file: &FileState,
        file_stacks: &mut Vec<FileStackState>,
        index: &mut DualIndex,
    ) -> Result<()> {
        let (prev_rev, prev_path, prev_file) =
            self.parent_file(rev, path, file.copy_from.is_some());
        let data = self.get_utf8_data(file)?;
        if let Some((file_idx, prev_file_rev)) = index.file_of(prev_rev, &prev_path) {
            if prev_file_rev + 1 == file_stacks[file_idx].rev_length() {
                // Strict continuation of the existing stack.
                let file_rev = prev_file_rev + 1;
                file_stacks[file_idx] = file_stacks[file_idx].edit_text(file_rev, &data, false)?;
                index.set(rev, path, file_idx, file_rev);
                return Ok(());
            }
        }
        let file_idx = file_stacks.len();
        if prev_file.is_utf8() {
            let prev_data = self.get_utf8_data(&prev_file)?;
            file_stacks.push(FileStackState::new([prev_data.as_str(), data.as_str()]));
            index.set(prev_rev, &prev_path, file_idx, 0);
            index.set(rev, path, file_idx, 1);
        } else {
            file_stacks.push(FileStackState::new([data.as_str()]));
            index.set(rev, path, file_idx, 0);
        }
        Ok(())
    }
}

/// Inline every lazy reference in `stack`, resolving through `resolver`'s
/// file stacks.
pub(crate) fn materialize_stack(
    stack: &[Arc<CommitState>],
    resolver: &CommitStackState,
) -> Result<Vec<Arc<CommitState>>> {
    stack
        .iter()
        .map(|commit| {
            let mut changed = false;
            let files = commit
                .files
                .iter()
                .map(|(path, file)| {
                    if let FileData::Lazy { .. } = &file.data {
                        changed = true;
                        let mut file = file.clone();
                        file.data = FileData::Text(resolver.get_utf8_data(&file)?);
                        Ok((path.clone(), file))
                    } else {
                        Ok((path.clone(), file.clone()))
                    }
                })
                .collect::<Result<_>>()?;
            Ok(if changed {
                Arc::new(CommitState {
                    files,
                    ..(**commit).clone()
                })
            } else {
                Arc::clone(commit)
            })
        })
        .collect()
}

fn is_rename(commit: &CommitState, file: &FileState) -> bool {
    file.copy_from
        .as_ref()
        .is_some_and(|source| commit.files.get(source).is_some_and(FileState::is_absent))
}

fn validate_export(export: &ExportStack) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, commit) in export.iter().enumerate() {
        if commit.parents.len() > 1 {
            return Err(StackEditError::structural(format!(
                "commit {} is a merge ({} parents)",
                commit.node,
                commit.parents.len()
            )));
        }
        if idx > 0 && commit.parents.is_empty() {
            return Err(StackEditError::structural(format!(
                "commit {} is a second root",
                commit.node
            )));
        }
        for parent in &commit.parents {
            if !seen.contains(parent.as_str()) {
                return Err(StackEditError::structural(format!(
                    "parent {parent} of {} does not appear earlier in the stack",
                    commit.node
                )));
            }
        }
        if !seen.insert(commit.node.as_str()) {
            return Err(StackEditError::structural(format!(
                "duplicate commit {}",
                commit.node
            )));
        }
    }
    Ok(())
}
