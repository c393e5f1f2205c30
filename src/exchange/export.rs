use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Commits handed over by the host repository for editing, bottom first.
pub type ExportStack = Vec<ExportCommit>;

/// A commit timestamp on the wire: Unix seconds plus the timezone offset in
/// minutes west of UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, i32)", into = "(i64, i32)")]
pub struct StackDate {
    pub unix_seconds: i64,
    pub tz_offset_minutes: i32,
}

impl StackDate {
    pub fn new(unix_seconds: i64, tz_offset_minutes: i32) -> Self {
        Self {
            unix_seconds,
            tz_offset_minutes,
        }
    }

    /// Interpret the timestamp in its own timezone. Returns `None` for
    /// offsets or seconds outside the representable range.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::west_opt(self.tz_offset_minutes.checked_mul(60)?)?;
        offset.timestamp_opt(self.unix_seconds, 0).single()
    }
}

impl From<(i64, i32)> for StackDate {
    fn from((unix_seconds, tz_offset_minutes): (i64, i32)) -> Self {
        Self {
            unix_seconds,
            tz_offset_minutes,
        }
    }
}

impl From<StackDate> for (i64, i32) {
    fn from(date: StackDate) -> Self {
        (date.unix_seconds, date.tz_offset_minutes)
    }
}

/// One commit in an [`ExportStack`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCommit {
    /// Hash of the commit in the host repository
    pub node: String,
    /// Whether the commit must not be rewritten
    pub immutable: bool,
    /// Whether the commit is part of the caller's requested edit range
    pub requested: bool,
    pub author: String,
    pub date: StackDate,
    pub text: String,
    /// Parent hashes; at most one (merges are rejected at import)
    #[serde(default)]
    pub parents: Vec<String>,
    /// Pre-stack content of every path this commit cares about; `None`
    /// means the path does not exist below the stack
    #[serde(default)]
    pub relevant_files: BTreeMap<String, Option<ExportFile>>,
    /// Paths modified by this commit; `None` means the commit deletes the path
    #[serde(default)]
    pub files: BTreeMap<String, Option<ExportFile>>,
}

/// File content on the wire: UTF-8 `data` or opaque base85 `dataBase85`,
/// never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_base85: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
}

impl ExportFile {
    /// Plain UTF-8 content with no flags.
    pub fn text<S: Into<String>>(data: S) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }
}
