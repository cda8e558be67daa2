use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    derive_title, find_pending_references, rewrite, summarize_changes, AssetMaterializer,
    EditorContext, NewVersion, Result, SiteUpdate, Version, VersionMetadata, VersioningError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Version),
    /// No unsaved changes; nothing was written.
    NothingToSave,
    /// Another save is running; this call did nothing.
    AlreadySaving,
}

impl SaveOutcome {
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Saved(version) => Some(version),
            Self::NothingToSave | Self::AlreadySaving => None,
        }
    }

    /// Informational text for outcomes that did not save.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Saved(_) => None,
            Self::NothingToSave => Some("No changes to save"),
            Self::AlreadySaving => Some("A save is already in progress"),
        }
    }
}

fn as_persistence(err: VersioningError) -> VersioningError {
    match err {
        VersioningError::Persistence(_) => err,
        other => VersioningError::Persistence(other.to_string()),
    }
}

/// Turns the live edit state into a persisted version.
///
/// A save either completes every durable step (uploads, template write,
/// version create) and then updates local history and lineage, or it
/// leaves local state exactly as it was.
pub struct SaveOrchestrator {
    ctx: Arc<EditorContext>,
    materializer: AssetMaterializer,
}

impl SaveOrchestrator {
    pub fn new(ctx: Arc<EditorContext>) -> Self {
        Self {
            materializer: AssetMaterializer::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn save(&self) -> Result<SaveOutcome> {
        if !self.ctx.with_state(|s| s.history.has_unsaved_changes()) {
            info!("Save requested with no unsaved changes");
            return Ok(SaveOutcome::NothingToSave);
        }
        let Some(_slot) = self.ctx.begin_save() else {
            info!("Save already in flight, ignoring request");
            return Ok(SaveOutcome::AlreadySaving);
        };

        let started_at = Utc::now();
        let (snapshot, display_name) = self.ctx.with_state(|s| {
            (s.history.live().clone(), s.display_name.clone())
        });
        snapshot.ensure_object()?;

        // Uploads
        let pending = find_pending_references(&snapshot);
        let resolutions = self.materializer.materialize_all(pending).await;
        let failed: Vec<String> = resolutions
            .iter()
            .filter(|r| r.failed)
            .map(|r| r.temp_url.clone())
            .collect();
        if !failed.is_empty() {
            warn!("Aborting save: {} of {} uploads failed", failed.len(), resolutions.len());
            return Err(VersioningError::Upload { failed });
        }
        let rewritten = rewrite(&snapshot, &resolutions);

        // Live template row
        let site = self.ctx.site_id();
        let template_config = rewritten.to_template_config();
        self.ctx
            .backend()
            .update_site(
                site,
                SiteUpdate {
                    template_config: template_config.clone(),
                    name: display_name.clone(),
                },
            )
            .await
            .map_err(as_persistence)?;

        // Summary, title and lineage placement
        let config = self.ctx.config();
        let (change_list, last_description, assignment, previous) = self.ctx.with_state(|s| {
            let changes: Vec<_> = s
                .history
                .changes_since(s.history.last_saved_at())
                .into_iter()
                .filter(|e| e.meta.timestamp <= started_at)
                .collect();
            (
                summarize_changes(&changes, config.summary_limit),
                changes.last().map(|e| e.meta.description.clone()),
                s.lineage.determine_branch_for_save(),
                s.persisted.clone(),
            )
        });
        let (title, short_title) = derive_title(
            last_description.as_deref(),
            self.ctx.title_rules(),
            config.title_max_chars,
        );
        let metadata = VersionMetadata {
            title,
            short_title,
            change_list,
            branch_id: assignment.branch_id,
            branch_color: Some(assignment.branch_color),
            parent_id: assignment.parent_id,
        };

        let request = NewVersion {
            template_config,
            change_summary: metadata.change_list.join("\n"),
            notes: metadata.to_notes()?,
        };
        let record = match self.ctx.backend().create_version(site, request).await {
            Ok(record) => record,
            Err(err) => {
                error!("Version create failed after template write: {}", err);
                if let Some(previous) = previous {
                    let rollback = SiteUpdate {
                        template_config: previous.to_template_config(),
                        name: display_name,
                    };
                    if let Err(rollback_err) = self.ctx.backend().update_site(site, rollback).await {
                        error!("Could not restore previous template: {}", rollback_err);
                    }
                }
                return Err(as_persistence(err));
            }
        };

        let version = self.ctx.with_state(|s| {
            let version = s.lineage.record_version(record, metadata).clone();
            s.history.mark_saved(started_at);
            // Edits made during the uploads may still hold temp tokens.
            let live = rewrite(s.history.live(), &resolutions);
            s.history.replace_live(live);
            s.persisted = Some(rewritten);
            version
        });

        info!(
            "Saved version {} ({}) on branch {}",
            version.version_number, version.id, version.metadata.branch_id
        );
        Ok(SaveOutcome::Saved(version))
    }
}
