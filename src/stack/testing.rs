//! Export stack builders shared by unit tests.

use crate::exchange::{ExportCommit, ExportFile, StackDate};

pub(crate) fn export_commit(
    node: &str,
    parents: &[&str],
    relevant_files: &[(&str, Option<ExportFile>)],
    files: &[(&str, Option<ExportFile>)],
) -> ExportCommit {
    ExportCommit {
        node: node.to_string(),
        immutable: false,
        requested: true,
        author: "test <test@example.com>".to_string(),
        date: StackDate::new(42, 0),
        text: node.to_string(),
        parents: parents.iter().map(|parent| parent.to_string()).collect(),
        relevant_files: relevant_files
            .iter()
            .map(|(path, file)| (path.to_string(), file.clone()))
            .collect(),
        files: files
            .iter()
            .map(|(path, file)| (path.to_string(), file.clone()))
            .collect(),
    }
}

/// An immutable commit outside the requested range, e.g. a public parent.
pub(crate) fn public_commit(node: &str, parents: &[&str]) -> ExportCommit {
    let mut commit = export_commit(node, parents, &[], &[]);
    commit.immutable = true;
    commit.requested = false;
    commit
}

pub(crate) fn renamed_file(data: &str, copy_from: &str) -> ExportFile {
    ExportFile {
        data: Some(data.to_string()),
        copy_from: Some(copy_from.to_string()),
        ..Default::default()
    }
}

pub(crate) fn binary_file(payload: &str) -> ExportFile {
    ExportFile {
        data_base85: Some(payload.to_string()),
        ..Default::default()
    }
}
