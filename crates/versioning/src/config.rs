use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the site API (no trailing slash)
    pub api_url: String,

    /// Bearer token for the site API
    pub api_key: Option<String>,

    /// Usage tag sent with every media upload
    pub upload_usage: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum number of bullets in a version's change list
    pub summary_limit: usize,

    /// Maximum length of a fallback version title
    pub title_max_chars: usize,

    /// Cap on each undo stack (unbounded when unset)
    pub history_limit: Option<usize>,

    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".to_string(),
            api_key: None,
            upload_usage: "site-media".to_string(),
            request_timeout_secs: 30,
            summary_limit: 5,
            title_max_chars: 60,
            history_limit: None,
            user_agent: "SiteHistory/1.0".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// With API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_upload_usage(mut self, usage: impl Into<String>) -> Self {
        self.upload_usage = usage.into();
        self
    }

    /// With timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit.max(1);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
