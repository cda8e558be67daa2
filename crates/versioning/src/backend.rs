//! Boundary traits for the collaborators the engine talks to: the site REST
//! backend, the asset upload endpoint and the in-session media cache.
use serde::{Deserialize, Serialize};

use crate::{NewVersion, Result, SiteId, SiteUpdate, VersionRecord};

/// Version and site persistence.
#[async_trait::async_trait]
pub trait SiteBackend: Send + Sync {
    /// `GET /sites/{id}/versions`
    async fn list_versions(&self, site: &SiteId) -> Result<Vec<VersionRecord>>;

    /// `POST /sites/{id}/versions`
    async fn create_version(&self, site: &SiteId, version: NewVersion) -> Result<VersionRecord>;

    /// `PATCH /sites/{id}`
    async fn update_site(&self, site: &SiteId, update: SiteUpdate) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl MediaBlob {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: MediaBlob,
    pub thumbnail: Option<MediaBlob>,
    pub usage: String,
    pub site_id: SiteId,
}

/// Response of `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedAsset>;
}

/// Full-resolution and thumbnail pair produced when media was added during
/// the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMedia {
    pub full: MediaBlob,
    pub thumbnail: Option<MediaBlob>,
}

#[async_trait::async_trait]
pub trait MediaCache: Send + Sync {
    /// Cached pair for a token minted in this session, if any.
    fn retrieve(&self, token: &str) -> Option<CachedMedia>;

    /// Raw bytes behind a token when no cached pair exists.
    async fn read_blob(&self, token: &str) -> Result<MediaBlob>;
}
