use serde::{Deserialize, Serialize};
use thiserror::Error;

mod snapshot;
pub use snapshot::*;
mod stack;
pub use stack::*;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot root must be an object, found {0}")]
    NotAnObject(&'static str),
}

pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Which of the two independent undo stacks an edit belongs to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Pages, modules and layout.
    #[default]
    Structure,
    /// Text, media and style values inside existing modules.
    Content,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionMeta {
    pub action_type: String,
    pub description: String,
    pub timestamp: Timestamp,
}

impl ActionMeta {
    pub fn new(action_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self::at(action_type, description, chrono::Utc::now())
    }

    pub fn at(
        action_type: impl Into<String>,
        description: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            description: description.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub snapshot: Snapshot,
    pub meta: ActionMeta,
}
