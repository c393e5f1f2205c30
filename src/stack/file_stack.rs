//! Linear text history of a single path.
//!
//! A [`FileStackState`] holds the revisions a path went through across
//! consecutive modifying commits. Internally every line is a slot tagged
//! with the rev that introduced it and, once deleted, the rev that deleted
//! it; the content of rev `r` is the concatenation of slots alive at `r`.
//! This representation makes rev relabeling cheap: remapping a rev past the
//! end of the stack severs its insertions (and voids its deletions) for
//! every remaining rev, and remapping by a permutation reorders edits.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::{Result, StackEditError};

/// Revision index within one file stack.
pub type FileRev = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    /// One line, including its trailing newline when present
    data: String,
    added: FileRev,
    /// Rev at which the line disappears; `None` while it is still live
    removed: Option<FileRev>,
}

impl Slot {
    fn alive_at(&self, rev: FileRev) -> bool {
        self.added <= rev && self.removed.map_or(true, |removed| removed > rev)
    }

    /// Whether the line was on screen when `rev` made its edit: introduced
    /// strictly earlier and not deleted before `rev`.
    fn context_at(&self, rev: FileRev) -> bool {
        self.added < rev && self.removed.map_or(true, |removed| removed >= rev)
    }
}

/// The text history of one path. All operations are pure and return a new
/// value; the engine shares these freely between state snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileStackState {
    rev_length: usize,
    slots: Vec<Slot>,
}

impl FileStackState {
    pub fn new<S: AsRef<str>>(texts: impl IntoIterator<Item = S>) -> Self {
        let mut state = Self::default();
        for text in texts {
            state = state.appended(text.as_ref());
        }
        state
    }

    /// Number of revisions held.
    pub fn rev_length(&self) -> usize {
        self.rev_length
    }

    pub fn revs(&self) -> Vec<FileRev> {
        (0..self.rev_length).collect()
    }

    /// Content at rev `rev`.
    pub fn get_rev(&self, rev: FileRev) -> Result<String> {
        if rev >= self.rev_length {
            return Err(StackEditError::invariant(format!(
                "file rev {rev} out of range (length {})",
                self.rev_length
            )));
        }
        Ok(self
            .slots
            .iter()
            .filter(|slot| slot.alive_at(rev))
            .map(|slot| slot.data.as_str())
            .collect())
    }

    /// All revision contents, bottom first.
    pub fn texts(&self) -> Vec<String> {
        (0..self.rev_length)
            .map(|rev| {
                self.slots
                    .iter()
                    .filter(|slot| slot.alive_at(rev))
                    .map(|slot| slot.data.as_str())
                    .collect()
            })
            .collect()
    }

    /// Replace rev `rev`'s content with `text`; `rev == rev_length` appends
    /// a new revision.
    ///
    /// With `immutable = true` every other revision keeps its content
    /// verbatim. With `immutable = false` later revisions reflow: they keep
    /// their own line edits, now expressed on top of the new text.
    pub fn edit_text(&self, rev: FileRev, text: &str, immutable: bool) -> Result<Self> {
        if rev > self.rev_length {
            return Err(StackEditError::invariant(format!(
                "cannot edit file rev {rev} past length {}",
                self.rev_length
            )));
        }
        if rev == self.rev_length {
            return Ok(self.appended(text));
        }
        if immutable {
            let mut texts = self.texts();
            texts[rev] = text.to_string();
            return Ok(Self::new(texts));
        }
        Ok(self.edited(rev, text))
    }

    /// Relabel revs through `map`; unmapped revs keep their labels. The rev
    /// count grows to cover the largest new label.
    pub fn remap_revs(&self, map: &HashMap<FileRev, FileRev>) -> Self {
        if self.rev_length == 0 {
            return self.clone();
        }
        let remap = |rev: FileRev| map.get(&rev).copied().unwrap_or(rev);
        let slots: Vec<Slot> = self
            .slots
            .iter()
            .map(|slot| Slot {
                data: slot.data.clone(),
                added: remap(slot.added),
                removed: slot.removed.map(remap),
            })
            .collect();
        let max_label = (0..self.rev_length).map(remap).max().unwrap_or(0);
        Self {
            rev_length: self.rev_length.max(max_label + 1),
            slots,
        }
    }

    /// For each rev, the earlier revs its content depends on: the revs whose
    /// lines it deletes, and the rev whose line run it splits by inserting
    /// inside it.
    pub fn calculate_dep_map(&self) -> BTreeMap<FileRev, BTreeSet<FileRev>> {
        let mut deps: BTreeMap<FileRev, BTreeSet<FileRev>> =
            (0..self.rev_length).map(|rev| (rev, BTreeSet::new())).collect();
        for slot in &self.slots {
            if let Some(removed) = slot.removed {
                if removed != slot.added {
                    deps.entry(removed).or_default().insert(slot.added);
                }
            }
        }
        // Insertions strictly inside another rev's run of lines.
        let mut start = 0;
        while start < self.slots.len() {
            let rev = self.slots[start].added;
            let mut end = start + 1;
            while end < self.slots.len() && self.slots[end].added == rev {
                end += 1;
            }
            let before = self.slots[..start]
                .iter()
                .rev()
                .find(|slot| slot.context_at(rev));
            let after = self.slots[end..].iter().find(|slot| slot.context_at(rev));
            if let (Some(before), Some(after)) = (before, after) {
                if before.added == after.added && before.added != rev {
                    deps.entry(rev).or_default().insert(before.added);
                }
            }
            start = end;
        }
        deps
    }

    /// Append `text` as a new top revision.
    fn appended(&self, text: &str) -> Self {
        let rev = self.rev_length;
        let context = |slot: &Slot| rev > 0 && slot.alive_at(rev - 1);
        self.spliced(rev, text, context)
    }

    /// Rewrite rev `rev` in place, letting later revs reflow.
    fn edited(&self, rev: FileRev, text: &str) -> Self {
        self.spliced(rev, text, |slot| slot.alive_at(rev))
    }

    /// Core splice: diff the lines visible through `context` against `text`
    /// and record the edit as belonging to `rev`.
    fn spliced(&self, rev: FileRev, text: &str, context: impl Fn(&Slot) -> bool) -> Self {
        let visible: Vec<usize> = (0..self.slots.len())
            .filter(|&idx| context(&self.slots[idx]))
            .collect();
        let old_lines: Vec<&str> = visible
            .iter()
            .map(|&idx| self.slots[idx].data.as_str())
            .collect();
        let new_lines = split_lines(text);
        let new_refs: Vec<&str> = new_lines.iter().map(String::as_str).collect();

        let mut slots = Vec::with_capacity(self.slots.len() + new_lines.len());
        let mut next = 0;
        for op in diff_lines(&old_lines, &new_refs) {
            match op {
                LineEdit::Keep(old_idx) | LineEdit::Delete(old_idx) => {
                    let global = visible[old_idx];
                    // Hidden slots keep their relative order.
                    slots.extend(self.slots[next..=global].iter().cloned());
                    next = global + 1;
                    if matches!(op, LineEdit::Delete(_)) {
                        if let Some(slot) = slots.last_mut() {
                            slot.removed = Some(rev);
                        }
                    }
                }
                LineEdit::Insert(new_idx) => {
                    slots.push(Slot {
                        data: new_lines[new_idx].clone(),
                        added: rev,
                        removed: None,
                    });
                }
            }
        }
        slots.extend(self.slots[next..].iter().cloned());
        Self {
            rev_length: self.rev_length.max(rev + 1),
            slots,
        }
    }
}

/// Line edit script entry; indices refer into the old and new line slices.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LineEdit {
    Keep(usize),
    Insert(usize),
    Delete(usize),
}

/// Split into lines, each keeping its trailing newline when present.
fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// Longest-common-subsequence line diff.
fn diff_lines(old: &[&str], new: &[&str]) -> Vec<LineEdit> {
    let m = old.len();
    let n = new.len();
    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            table[i][j] = if old[i - 1] == new[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    let mut edits = Vec::new();
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            edits.push(LineEdit::Keep(i - 1));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            edits.push(LineEdit::Insert(j - 1));
            j -= 1;
        } else {
            edits.push(LineEdit::Delete(i - 1));
            i -= 1;
        }
    }
    edits.reverse();
    edits
}
