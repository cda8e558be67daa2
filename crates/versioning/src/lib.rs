//! Version and history engine for the site editor.
//!
//! Persists snapshots of a site's configuration as a lineage of versions
//! with fork-on-write branches, materializes session-local media at save
//! time and guards navigation against losing unsaved edits.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod assets;
pub use assets::*;

mod backend;
pub use backend::*;

mod config;
pub use config::*;

mod context;
pub use context::*;

mod guard;
pub use guard::*;

mod http;
pub use http::*;

mod lineage;
pub use lineage::*;

mod media;
pub use media::*;

mod model;
pub use model::*;

mod palette;
pub use palette::*;

mod save;
pub use save::*;

mod session;
pub use session::*;

mod summary;
pub use summary::*;

pub use history::{ActionMeta, EditMode, HistoryEntry, Snapshot, Timestamp};

#[derive(Debug, Error)]
pub enum VersioningError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{} media upload(s) failed: {}", failed.len(), failed.join(", "))]
    Upload { failed: Vec<String> },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("could not load version history: {0}")]
    Hydration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("media not available: {0}")]
    MediaUnavailable(String),

    #[error("version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for VersioningError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<history::SnapshotError> for VersioningError {
    fn from(err: history::SnapshotError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VersioningError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned version identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

impl BranchId {
    pub const MAIN: &'static str = "main";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
