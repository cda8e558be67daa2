use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::{CachedMedia, MediaBlob, MediaCache, Result, VersioningError, LOCAL_MEDIA_SCHEME};

/// In-session store of media added before it has been uploaded.
///
/// Tokens minted here are `blob:` URLs that can be dropped into the site
/// tree right away; the save path swaps them for hosted URLs. Tokens that
/// were not minted here resolve against an optional blob directory.
#[derive(Default)]
pub struct SessionMediaCache {
    entries: Mutex<HashMap<String, CachedMedia>>,
    blob_dir: Option<PathBuf>,
}

impl SessionMediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve unknown `blob:<name>` tokens to `<dir>/<name>`.
    pub fn with_blob_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.blob_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Stores a full/thumbnail pair and returns its token.
    pub fn insert(&self, full: MediaBlob, thumbnail: Option<MediaBlob>) -> String {
        let token = format!("{}session/{}", LOCAL_MEDIA_SCHEME, Uuid::new_v4());
        self.insert_with_token(token.clone(), full, thumbnail);
        token
    }

    pub fn insert_with_token(
        &self,
        token: impl Into<String>,
        full: MediaBlob,
        thumbnail: Option<MediaBlob>,
    ) {
        self.entries
            .lock()
            .insert(token.into(), CachedMedia { full, thumbnail });
    }

    pub fn remove(&self, token: &str) -> Option<CachedMedia> {
        self.entries.lock().remove(token)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl MediaCache for SessionMediaCache {
    fn retrieve(&self, token: &str) -> Option<CachedMedia> {
        self.entries.lock().get(token).cloned()
    }

    async fn read_blob(&self, token: &str) -> Result<MediaBlob> {
        let name = token
            .strip_prefix(LOCAL_MEDIA_SCHEME)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| VersioningError::MediaUnavailable(token.to_string()))?;
        let dir = self
            .blob_dir
            .as_ref()
            .ok_or_else(|| VersioningError::MediaUnavailable(token.to_string()))?;

        // Only the final path segment is honoured so tokens cannot escape the directory.
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let path = dir.join(file_name);
        debug!("Reading blob {} from {:?}", token, path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| VersioningError::MediaUnavailable(format!("{}: {}", token, e)))?;

        Ok(MediaBlob::new(bytes, file_name, mime_for(file_name)))
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_minted_tokens_resolve_from_cache() {
        let cache = SessionMediaCache::new();
        let token = cache.insert(
            MediaBlob::new(vec![1], "hero.png", "image/png"),
            Some(MediaBlob::new(vec![2], "hero_thumb.png", "image/png")),
        );
        assert!(token.starts_with("blob:session/"));

        let cached = cache.retrieve(&token).unwrap();
        assert_eq!(cached.full.bytes, vec![1]);
        assert_eq!(cached.thumbnail.unwrap().bytes, vec![2]);
        assert!(cache.read_blob(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_blob_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();

        let cache = SessionMediaCache::new().with_blob_dir(dir.path());
        let blob = cache.read_blob("blob:uploads/logo.svg").await.unwrap();
        assert_eq!(blob.bytes, b"<svg/>".to_vec());
        assert_eq!(blob.mime_type, "image/svg+xml");

        assert!(cache.read_blob("blob:missing.png").await.is_err());
        assert!(cache.read_blob("https://cdn/logo.svg").await.is_err());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }
}
