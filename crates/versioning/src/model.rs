use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BranchId, Snapshot, VersionId};

/// Lineage and display metadata stored with every version as a JSON string
/// in the record's `notes` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionMetadata {
    pub title: String,
    pub short_title: String,
    pub change_list: Vec<String>,
    pub branch_id: BranchId,
    pub branch_color: Option<String>,
    pub parent_id: Option<VersionId>,
}

impl VersionMetadata {
    /// Parses a record's notes. Missing or malformed notes yield `None` and
    /// the caller falls back to defaults.
    pub fn from_notes(notes: Option<&str>) -> Option<Self> {
        let raw = notes?.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<Self>(raw) {
            Ok(meta) => Some(meta),
            Err(err) => {
                tracing::debug!("ignoring unparseable version notes: {}", err);
                None
            }
        }
    }

    pub fn to_notes(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Version row as returned by `GET/POST /sites/{id}/versions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: VersionId,
    pub version_number: u64,
    pub template_config: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub change_summary: Option<String>,
}

/// Body of `POST /sites/{id}/versions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewVersion {
    pub template_config: Value,
    pub change_summary: String,
    pub notes: String,
}

/// Body of `PATCH /sites/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteUpdate {
    pub template_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: VersionId,
    pub version_number: u64,
    pub template_config: Snapshot,
    pub created_at: DateTime<Utc>,
    pub metadata: VersionMetadata,
    /// Synthesized placeholder for a site that has never been saved.
    pub is_virtual: bool,
}

impl Version {
    pub fn branch_id(&self) -> &BranchId {
        &self.metadata.branch_id
    }

    pub fn branch_color(&self) -> Option<&str> {
        self.metadata.branch_color.as_deref()
    }

    pub fn parent_id(&self) -> Option<&VersionId> {
        self.metadata.parent_id.as_ref()
    }
}

/// One row of the history browser.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: VersionId,
    pub version_number: u64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub short_title: String,
    pub change_list: Vec<String>,
    pub branch_id: BranchId,
    pub branch_color: String,
    pub parent_id: Option<VersionId>,
    pub is_active: bool,
    pub is_latest: bool,
    pub is_virtual: bool,
}
