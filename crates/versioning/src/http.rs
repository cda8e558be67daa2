use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use tracing::{debug, info};

use crate::{
    AssetStore, EngineConfig, MediaBlob, NewVersion, Result, SiteBackend, SiteId, SiteUpdate,
    UploadRequest, UploadedAsset, VersionRecord, VersioningError,
};

/// REST client for the site API and its upload endpoint.
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(VersioningError::Persistence(format!(
            "{} failed: {} - {}",
            what, status, body
        )))
    }
}

fn blob_part(blob: MediaBlob) -> Result<Part> {
    Ok(Part::bytes(blob.bytes)
        .file_name(blob.file_name)
        .mime_str(&blob.mime_type)?)
}

#[async_trait::async_trait]
impl SiteBackend for HttpBackend {
    async fn list_versions(&self, site: &SiteId) -> Result<Vec<VersionRecord>> {
        let url = self.url(&format!("/sites/{}/versions", site));
        debug!("Fetching versions from {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(VersioningError::Hydration(format!(
                "version list returned {}",
                response.status()
            )));
        }

        let versions: Vec<VersionRecord> = response.json().await?;
        info!("Fetched {} versions for site {}", versions.len(), site);
        Ok(versions)
    }

    async fn create_version(&self, site: &SiteId, version: NewVersion) -> Result<VersionRecord> {
        let url = self.url(&format!("/sites/{}/versions", site));
        let response = self
            .authorize(self.client.post(&url))
            .json(&version)
            .send()
            .await?;
        let response = Self::check(response, "version create").await?;
        Ok(response.json().await?)
    }

    async fn update_site(&self, site: &SiteId, update: SiteUpdate) -> Result<()> {
        let url = self.url(&format!("/sites/{}", site));
        let response = self
            .authorize(self.client.patch(&url))
            .json(&update)
            .send()
            .await?;
        Self::check(response, "site update").await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AssetStore for HttpBackend {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedAsset> {
        let url = self.url("/upload");
        let file_name = request.file.file_name.clone();

        let mut form = Form::new()
            .part("file", blob_part(request.file)?)
            .text("usage", request.usage)
            .text("siteId", request.site_id.0);
        if let Some(thumbnail) = request.thumbnail {
            form = form.part("thumbnail", blob_part(thumbnail)?);
        }

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response, "upload").await?;
        let asset: UploadedAsset = response.json().await?;
        debug!("Uploaded {} -> {}", file_name, asset.url);
        Ok(asset)
    }
}
