//! Event log rows.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Event type stored in the `Type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LogType {
    #[default]
    Generic,
    CreatePaste,
    EditPaste,
    DeletePaste,
    ViewPaste,
    Comment,
    Report,
    Session,
    Other(String),
}

impl LogType {
    /// Column representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Generic => "generic",
            Self::CreatePaste => "create_paste",
            Self::EditPaste => "edit_paste",
            Self::DeletePaste => "delete_paste",
            Self::ViewPaste => "view_paste",
            Self::Comment => "comment",
            Self::Report => "report",
            Self::Session => "session",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Parse a column value; unknown names are preserved as [`LogType::Other`].
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "generic" => Self::Generic,
            "create_paste" => Self::CreatePaste,
            "edit_paste" => Self::EditPaste,
            "delete_paste" => Self::DeletePaste,
            "view_paste" => Self::ViewPaste,
            "comment" => Self::Comment,
            "report" => Self::Report,
            "session" => Self::Session,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A persisted log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Log {
    pub content: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: f64,
    #[serde(rename = "Type")]
    pub log_type: LogType,
    #[serde(rename = "ID")]
    pub id: String,
}

/// Draft for [`crate::db::log::LogStore::create`]; missing fields get defaults.
#[derive(Debug, Clone, Default)]
pub struct NewLog {
    pub content: String,
    pub timestamp: Option<f64>,
    pub log_type: Option<LogType>,
    pub id: Option<String>,
}

impl NewLog {
    /// Draft of `log_type` with `content`, stamped at insert time.
    pub fn new(log_type: LogType, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            log_type: Some(log_type),
            ..Self::default()
        }
    }

    /// Pin the timestamp instead of using the insert time.
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<Log> for NewLog {
    fn from(log: Log) -> Self {
        Self {
            content: log.content,
            timestamp: Some(log.timestamp),
            log_type: Some(log.log_type),
            id: Some(log.id),
        }
    }
}
