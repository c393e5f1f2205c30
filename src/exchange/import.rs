use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::export::{ExportFile, StackDate};

/// Identifier of a commit inside an [`ImportStack`]: either a synthetic
/// `":r<rev>"` mark for a commit created by this import, or an original hash.
pub type Mark = String;

/// Ordered action list submitted to the host repository.
pub type ImportStack = Vec<ImportAction>;

/// A commit to be (re)created by the host repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCommit {
    pub mark: Mark,
    pub author: String,
    pub date: StackDate,
    pub text: String,
    /// Parent marks or hashes; at most one
    pub parents: Vec<Mark>,
    /// Original hashes this commit was rewritten from
    pub predecessors: Vec<String>,
    /// Files changed relative to the parent; `None` deletes the path
    pub files: BTreeMap<String, Option<ExportFile>>,
}

/// One action of an [`ImportStack`].
///
/// The wire shape is a two-element `[name, payload]` array, e.g.
/// `["commit", {...}]` or `["goto", {"mark": ":r2"}]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportAction {
    /// Create a commit
    Commit(ImportCommit),
    /// Move the working copy and update its files
    Goto { mark: Mark },
    /// Move the working copy but leave its files untouched
    Reset { mark: Mark },
    /// Mark orphaned original commits as discarded
    Hide { nodes: Vec<String> },
}

#[derive(Serialize)]
struct MarkPayload<'a> {
    mark: &'a Mark,
}

#[derive(Serialize)]
struct NodesPayload<'a> {
    nodes: &'a [String],
}

impl Serialize for ImportAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        match self {
            ImportAction::Commit(commit) => {
                tuple.serialize_element("commit")?;
                tuple.serialize_element(commit)?;
            }
            ImportAction::Goto { mark } => {
                tuple.serialize_element("goto")?;
                tuple.serialize_element(&MarkPayload { mark })?;
            }
            ImportAction::Reset { mark } => {
                tuple.serialize_element("reset")?;
                tuple.serialize_element(&MarkPayload { mark })?;
            }
            ImportAction::Hide { nodes } => {
                tuple.serialize_element("hide")?;
                tuple.serialize_element(&NodesPayload { nodes })?;
            }
        }
        tuple.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_goto_action_wire_shape() {
        let action = ImportAction::Goto {
            mark: ":r2".to_string(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!(["goto", {"mark": ":r2"}]));
    }

    #[test]
    fn test_hide_action_wire_shape() {
        let action = ImportAction::Hide {
            nodes: vec!["abc".to_string(), "def".to_string()],
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!(["hide", {"nodes": ["abc", "def"]}]));
    }

    #[test]
    fn test_commit_action_wire_shape() {
        let action = ImportAction::Commit(ImportCommit {
            mark: ":r1".to_string(),
            author: "test".to_string(),
            date: StackDate::new(42, 0),
            text: "B".to_string(),
            parents: vec![":r0".to_string()],
            predecessors: vec!["beef".to_string()],
            files: BTreeMap::from([
                ("x.txt".to_string(), Some(ExportFile::text("33"))),
                ("y.txt".to_string(), None),
            ]),
        });
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!(["commit", {
                "mark": ":r1",
                "author": "test",
                "date": [42, 0],
                "text": "B",
                "parents": [":r0"],
                "predecessors": ["beef"],
                "files": {"x.txt": {"data": "33"}, "y.txt": null}
            }])
        );
    }
}
