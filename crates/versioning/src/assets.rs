use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{EditorContext, Result, Snapshot, UploadRequest, UploadedAsset};

/// URL scheme of media that only exists in the current editing session.
pub const LOCAL_MEDIA_SCHEME: &str = "blob:";

/// Outcome of uploading one local media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResolution {
    pub temp_url: String,
    pub final_url: String,
    pub thumbnail_url: Option<String>,
    pub failed: bool,
}

impl UploadResolution {
    pub fn resolved(temp_url: impl Into<String>, asset: UploadedAsset) -> Self {
        Self {
            temp_url: temp_url.into(),
            final_url: asset.url,
            thumbnail_url: asset.thumbnail_url,
            failed: false,
        }
    }

    pub fn failed(temp_url: impl Into<String>) -> Self {
        let temp_url = temp_url.into();
        Self {
            final_url: temp_url.clone(),
            temp_url,
            thumbnail_url: None,
            failed: true,
        }
    }
}

fn is_token_end(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '(' | ')' | ',' | '<' | '>' | '`')
}

/// Byte ranges of every local media token inside `text`.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find(LOCAL_MEDIA_SCHEME) {
        let start = from + offset;
        let body = start + LOCAL_MEDIA_SCHEME.len();
        let end = text[body..]
            .char_indices()
            .find(|(_, c)| is_token_end(*c))
            .map(|(i, _)| body + i)
            .unwrap_or(text.len());
        if end > body {
            spans.push((start, end));
        }
        from = end.max(body);
    }
    spans
}

fn visit_strings<F: FnMut(&str)>(value: &Value, f: &mut F) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => items.iter().for_each(|v| visit_strings(v, f)),
        Value::Object(map) => map.values().for_each(|v| visit_strings(v, f)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn rewrite_strings<F: FnMut(&str) -> Option<String>>(value: &mut Value, f: &mut F) {
    match value {
        Value::String(s) => {
            if let Some(replaced) = f(s) {
                *s = replaced;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| rewrite_strings(v, f)),
        Value::Object(map) => map.values_mut().for_each(|v| rewrite_strings(v, f)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Every distinct local media token in string values of the tree.
/// Object keys are never scanned.
pub fn find_pending_references(snapshot: &Snapshot) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    visit_strings(snapshot.tree(), &mut |s| {
        for (start, end) in token_spans(s) {
            found.insert(s[start..end].to_string());
        }
    });
    found
}

/// Replaces every exact token occurrence with its uploaded URL and records
/// thumbnails in the snapshot's side-table. Failed resolutions are skipped.
///
/// Tokens are matched whole, so `blob:a/1` never rewrites inside `blob:a/10`.
pub fn rewrite(snapshot: &Snapshot, resolutions: &[UploadResolution]) -> Snapshot {
    let lookup: HashMap<&str, &str> = resolutions
        .iter()
        .filter(|r| !r.failed)
        .map(|r| (r.temp_url.as_str(), r.final_url.as_str()))
        .collect();

    let mut tree = snapshot.tree().clone();
    if !lookup.is_empty() {
        rewrite_strings(&mut tree, &mut |s| {
            let spans = token_spans(s);
            if !spans.iter().any(|(a, b)| lookup.contains_key(&s[*a..*b])) {
                return None;
            }
            let mut out = String::with_capacity(s.len());
            let mut last = 0;
            for (start, end) in spans {
                out.push_str(&s[last..start]);
                let token = &s[start..end];
                out.push_str(lookup.get(token).copied().unwrap_or(token));
                last = end;
            }
            out.push_str(&s[last..]);
            Some(out)
        });
    }

    let mut rewritten = snapshot.with_tree(tree);
    rewritten.merge_thumbnails(resolutions.iter().filter(|r| !r.failed).filter_map(|r| {
        r.thumbnail_url
            .as_ref()
            .map(|thumb| (r.final_url.clone(), thumb.clone()))
    }));
    rewritten
}

/// Uploads session-local media referenced by a snapshot.
pub struct AssetMaterializer {
    ctx: Arc<EditorContext>,
}

impl AssetMaterializer {
    pub fn new(ctx: Arc<EditorContext>) -> Self {
        Self { ctx }
    }

    /// Uploads one reference. Never errors: failures come back as
    /// `failed: true` with the temp URL untouched so callers can aggregate.
    pub async fn materialize(&self, reference: &str) -> UploadResolution {
        match self.try_materialize(reference).await {
            Ok(asset) => {
                debug!("Materialized {} -> {}", reference, asset.url);
                UploadResolution::resolved(reference, asset)
            }
            Err(err) => {
                warn!("Failed to materialize {}: {}", reference, err);
                UploadResolution::failed(reference)
            }
        }
    }

    async fn try_materialize(&self, reference: &str) -> Result<UploadedAsset> {
        let (file, thumbnail) = match self.ctx.media().retrieve(reference) {
            Some(cached) => (cached.full, cached.thumbnail),
            None => (self.ctx.media().read_blob(reference).await?, None),
        };
        let request = UploadRequest {
            file,
            thumbnail,
            usage: self.ctx.config().upload_usage.clone(),
            site_id: self.ctx.site_id().clone(),
        };
        self.ctx.assets().upload(request).await
    }

    /// Uploads every reference concurrently and returns once all of them
    /// have settled, in the order given.
    pub async fn materialize_all<I>(&self, references: I) -> Vec<UploadResolution>
    where
        I: IntoIterator<Item = String>,
    {
        let references: Vec<String> = references.into_iter().collect();
        if references.is_empty() {
            return Vec::new();
        }
        info!("Uploading {} pending media reference(s)", references.len());
        join_all(references.iter().map(|r| self.materialize(r))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved(temp: &str, url: &str, thumb: Option<&str>) -> UploadResolution {
        UploadResolution {
            temp_url: temp.to_string(),
            final_url: url.to_string(),
            thumbnail_url: thumb.map(str::to_string),
            failed: false,
        }
    }

    #[test]
    fn test_token_spans_stop_at_delimiters() {
        let text = "background: url(blob:site/abc) no-repeat, url('blob:x/1')";
        let tokens: Vec<&str> = token_spans(text).iter().map(|(a, b)| &text[*a..*b]).collect();
        assert_eq!(tokens, vec!["blob:site/abc", "blob:x/1"]);
        assert!(token_spans("blob:").is_empty());
        assert!(token_spans("https://cdn.example.com/a.png").is_empty());
    }

    #[test]
    fn test_find_pending_references_dedupes() {
        let snap = Snapshot::new(json!({
            "pages": [
                { "hero": "blob:s/1", "gallery": ["blob:s/1", "blob:s/2", "https://cdn/x.png"] },
                { "style": "background-image: url(blob:s/1)" }
            ],
            "blob:s/9": "keys are not references",
            "count": 3
        }));
        let refs: Vec<String> = find_pending_references(&snap).into_iter().collect();
        assert_eq!(refs, vec!["blob:s/1".to_string(), "blob:s/2".to_string()]);
    }

    #[test]
    fn test_rewrite_replaces_every_occurrence() {
        let snap = Snapshot::new(json!({
            "a": "blob:s/1",
            "b": ["blob:s/1", { "c": "blob:s/1" }],
            "d": "url(blob:s/1)",
            "e": "blob:s/1"
        }));
        let out = rewrite(&snap, &[resolved("blob:s/1", "https://cdn/1.png", Some("https://cdn/1_t.png"))]);

        let text = out.tree().to_string();
        assert_eq!(text.matches("https://cdn/1.png").count(), 5);
        assert!(!text.contains("blob:"));
        assert_eq!(out.thumbnail_for("https://cdn/1.png"), Some("https://cdn/1_t.png"));
        // input untouched
        assert_eq!(snap.tree()["a"], json!("blob:s/1"));
    }

    #[test]
    fn test_rewrite_has_no_prefix_collisions() {
        let snap = Snapshot::new(json!({ "a": "blob:s/1", "b": "blob:s/10" }));
        let out = rewrite(
            &snap,
            &[
                resolved("blob:s/1", "https://cdn/one", None),
                resolved("blob:s/10", "https://cdn/ten", None),
            ],
        );
        assert_eq!(out.tree()["a"], json!("https://cdn/one"));
        assert_eq!(out.tree()["b"], json!("https://cdn/ten"));
    }

    #[test]
    fn test_rewrite_treats_tokens_literally() {
        let snap = Snapshot::new(json!({ "a": "blob:s/a.b+c", "b": "blob:s/aXb+c" }));
        let out = rewrite(&snap, &[resolved("blob:s/a.b+c", "https://cdn/lit", None)]);
        assert_eq!(out.tree()["a"], json!("https://cdn/lit"));
        assert_eq!(out.tree()["b"], json!("blob:s/aXb+c"));
    }

    #[test]
    fn test_failed_resolutions_are_ignored() {
        let snap = Snapshot::new(json!({ "a": "blob:s/1" }));
        let out = rewrite(&snap, &[UploadResolution::failed("blob:s/1")]);
        assert_eq!(out, snap);
    }
}
