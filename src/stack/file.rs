use std::collections::BTreeMap;

use crate::exchange::{ExportFile, ExportStack};

/// Flag string marking a file as nonexistent at a revision.
pub const ABSENT_FLAG: &str = "a";

/// Content of a file at one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    /// Inline UTF-8 content
    Text(String),
    /// Opaque base85 payload; compared by exact payload equality, never
    /// decoded by the engine
    Binary(String),
    /// Reference into a file stack
    Lazy { file_idx: usize, file_rev: usize },
}

/// A file as recorded by one commit: content plus copy/rename provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    pub data: FileData,
    /// Source path when the content was copied or renamed from another path
    pub copy_from: Option<String>,
    /// Short flag string; [`ABSENT_FLAG`] means "does not exist here"
    pub flags: String,
}

impl FileState {
    pub fn text<S: Into<String>>(data: S) -> Self {
        Self {
            data: FileData::Text(data.into()),
            copy_from: None,
            flags: String::new(),
        }
    }

    /// The file does not exist at this revision.
    pub fn absent() -> Self {
        Self {
            data: FileData::Text(String::new()),
            copy_from: None,
            flags: ABSENT_FLAG.to_string(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.flags == ABSENT_FLAG
    }

    /// Whether the content can participate in text history. Absent files
    /// count as empty text so that additions and deletions diff cleanly.
    pub fn is_utf8(&self) -> bool {
        !matches!(self.data, FileData::Binary(_))
    }

    pub(crate) fn from_export(file: Option<&ExportFile>) -> Self {
        match file {
            None => Self::absent(),
            Some(file) => {
                let data = if let Some(text) = &file.data {
                    FileData::Text(text.clone())
                } else if let Some(payload) = &file.data_base85 {
                    FileData::Binary(payload.clone())
                } else {
                    FileData::Text(String::new())
                };
                Self {
                    data,
                    copy_from: file.copy_from.clone(),
                    flags: file.flags.clone().unwrap_or_default(),
                }
            }
        }
    }
}

/// Snapshot of every referenced path as seen just below the stack.
pub type BottomFiles = BTreeMap<String, FileState>;

/// Derive the bottom files from an export. Earlier commits sit lower in the
/// stack, so the first `relevantFiles` entry for a path wins; paths that are
/// only ever modified are introduced inside the stack and start out absent.
pub(crate) fn build_bottom_files(stack: &ExportStack) -> BottomFiles {
    let mut bottom = BottomFiles::new();
    for commit in stack {
        for (path, file) in &commit.relevant_files {
            bottom
                .entry(path.clone())
                .or_insert_with(|| FileState::from_export(file.as_ref()));
        }
        for (path, file) in &commit.files {
            bottom.entry(path.clone()).or_insert_with(FileState::absent);
            // Copy sources are referenced paths too, even when the host
            // sent no pre-stack content for them.
            if let Some(source) = file.as_ref().and_then(|file| file.copy_from.clone()) {
                bottom.entry(source).or_insert_with(FileState::absent);
            }
        }
    }
    bottom
}
