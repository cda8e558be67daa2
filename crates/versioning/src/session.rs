use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    ActionMeta, EditMode, EditorContext, GuardChoice, GuardDecision, NavigationAction,
    NavigationGuard, Result, SaveOrchestrator, SaveOutcome, Snapshot, TimelineEntry, Timestamp,
    VersionId, VersioningError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationStatus {
    Fresh { versions: usize },
    /// Fetch failed; the timeline shows whatever was loaded before.
    Stale { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    Completed(NavigationAction),
    /// Unsaved edits; waiting for [`EditorSession::resolve_navigation`].
    AwaitingDecision,
    /// Runs once the save already in flight succeeds.
    AfterSave,
    NothingPending,
}

/// What a return to the tip would move past.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePreview {
    pub superseded: Vec<TimelineEntry>,
    pub outcome: NavigationOutcome,
}

/// The engine surface the editor UI talks to.
pub struct EditorSession {
    ctx: Arc<EditorContext>,
    saver: SaveOrchestrator,
    guard: NavigationGuard,
    /// Action to run when the in-flight save succeeds.
    post_save: Mutex<Option<NavigationAction>>,
    left: AtomicBool,
}

impl EditorSession {
    pub fn new(ctx: Arc<EditorContext>) -> Self {
        Self {
            saver: SaveOrchestrator::new(ctx.clone()),
            guard: NavigationGuard::new(),
            post_save: Mutex::new(None),
            left: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<EditorContext> {
        &self.ctx
    }

    // Local history

    pub fn edit(&self, snapshot: Snapshot, meta: ActionMeta) {
        self.ctx.with_state(|s| s.history.push(snapshot, meta));
    }

    pub fn set_mode(&self, mode: EditMode) {
        self.ctx.with_state(|s| s.history.set_mode(mode));
    }

    pub fn undo(&self) -> bool {
        self.ctx.with_state(|s| s.history.undo())
    }

    pub fn redo(&self) -> bool {
        self.ctx.with_state(|s| s.history.redo())
    }

    pub fn can_undo(&self) -> bool {
        self.ctx.with_state(|s| s.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.ctx.with_state(|s| s.history.can_redo())
    }

    pub fn undo_label(&self) -> Option<String> {
        self.ctx.with_state(|s| s.history.undo_label().map(str::to_string))
    }

    pub fn redo_label(&self) -> Option<String> {
        self.ctx.with_state(|s| s.history.redo_label().map(str::to_string))
    }

    pub fn live_snapshot(&self) -> Snapshot {
        self.ctx.with_state(|s| s.history.live().clone())
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.ctx.with_state(|s| s.display_name = Some(name));
    }

    // Saving

    /// Saves, then settles any navigation parked behind this save: it runs
    /// on success and goes back to the guard on failure.
    pub async fn save(&self) -> Result<SaveOutcome> {
        let outcome = self.saver.save().await;
        match &outcome {
            Ok(SaveOutcome::Saved(_)) => {
                let parked = self.post_save.lock().take();
                if let Some(action) = parked {
                    if let Err(err) = self.continue_after_save(action) {
                        warn!("Navigation after save failed: {}", err);
                    }
                }
            }
            Err(_) => {
                let parked = self.post_save.lock().take();
                if let Some(action) = parked {
                    self.guard.requeue(action);
                }
            }
            Ok(SaveOutcome::NothingToSave) | Ok(SaveOutcome::AlreadySaving) => {}
        }
        outcome
    }

    pub fn is_saving(&self) -> bool {
        self.ctx.is_saving()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.ctx.with_state(|s| s.history.has_unsaved_changes())
    }

    pub fn last_saved_at(&self) -> Option<Timestamp> {
        self.ctx.with_state(|s| s.history.last_saved_at())
    }

    // Timeline

    /// Reloads the version list. `loaded_version_number` is the version the
    /// editor opened with; when `None` the version already loaded stays
    /// active. Never fails: a fetch error leaves a stale timeline plus a
    /// warning.
    pub async fn hydrate(&self, loaded_version_number: Option<u64>) -> HydrationStatus {
        let fetched = self.ctx.backend().list_versions(self.ctx.site_id()).await;
        self.ctx.with_state(|s| {
            let current = s.history.live().clone();
            let loaded = loaded_version_number.or_else(|| {
                s.lineage
                    .active()
                    .filter(|v| !v.is_virtual)
                    .map(|v| v.version_number)
            });
            match fetched {
                Ok(records) => {
                    let count = s.lineage.apply_hydration(records, &current, loaded);
                    HydrationStatus::Fresh { versions: count }
                }
                Err(err) => {
                    let reason = VersioningError::Hydration(err.to_string()).to_string();
                    s.lineage.hydration_failed(reason.clone(), &current);
                    HydrationStatus::Stale { reason }
                }
            }
        })
    }

    pub fn list_timeline(&self) -> Vec<TimelineEntry> {
        self.ctx.with_state(|s| s.lineage.timeline())
    }

    pub fn timeline_warning(&self) -> Option<String> {
        self.ctx.with_state(|s| s.lineage.warning().map(str::to_string))
    }

    // Navigation

    pub fn load_version(&self, id: &VersionId) -> Result<NavigationOutcome> {
        if self.ctx.with_state(|s| s.lineage.get(id).is_none()) {
            return Err(VersioningError::VersionNotFound(id.clone()));
        }
        self.navigate(NavigationAction::LoadVersion(id.clone()))
    }

    /// Versions newer than the one being viewed, plus the guarded move back
    /// to the tip.
    pub fn restore_to_latest(&self) -> Result<RestorePreview> {
        let superseded = self.ctx.with_state(|s| {
            let viewing = s.lineage.active().map(|v| v.version_number).unwrap_or(0);
            let newer: Vec<VersionId> = s
                .lineage
                .versions_newer_than(viewing)
                .into_iter()
                .map(|v| v.id.clone())
                .collect();
            s.lineage
                .timeline()
                .into_iter()
                .filter(|entry| newer.contains(&entry.id))
                .collect::<Vec<_>>()
        });
        let outcome = self.navigate(NavigationAction::RestoreToLatest)?;
        Ok(RestorePreview { superseded, outcome })
    }

    pub fn leave_editor(&self) -> Result<NavigationOutcome> {
        self.navigate(NavigationAction::LeaveEditor)
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::Acquire)
    }

    pub fn pending_navigation(&self) -> Option<NavigationAction> {
        self.guard.pending()
    }

    pub fn cancel_navigation(&self) -> Option<NavigationAction> {
        self.guard.cancel()
    }

    fn navigate(&self, action: NavigationAction) -> Result<NavigationOutcome> {
        match self.guard.guard(action, self.has_unsaved_changes()) {
            GuardDecision::Proceed(action) => {
                self.apply(&action)?;
                Ok(NavigationOutcome::Completed(action))
            }
            GuardDecision::Intercepted => Ok(NavigationOutcome::AwaitingDecision),
        }
    }

    /// Settles the pending navigation. With `SaveThenContinue` the action
    /// runs only after a successful save; if the save fails the action stays
    /// pending and the error is returned. When another save is already
    /// running the action waits for it and `AfterSave` is returned.
    pub async fn resolve_navigation(&self, choice: GuardChoice) -> Result<NavigationOutcome> {
        let Some(action) = self.guard.take() else {
            return Ok(NavigationOutcome::NothingPending);
        };

        match choice {
            GuardChoice::Discard => {
                info!("Discarding unsaved edits for {:?}", action);
                self.apply(&action)?;
                Ok(NavigationOutcome::Completed(action))
            }
            GuardChoice::SaveThenContinue => match self.save().await {
                Ok(SaveOutcome::Saved(_)) | Ok(SaveOutcome::NothingToSave) => {
                    self.continue_after_save(action)
                }
                Ok(SaveOutcome::AlreadySaving) => {
                    *self.post_save.lock() = Some(action);
                    // The other save may have settled already.
                    if !self.ctx.is_saving() {
                        let parked = self.post_save.lock().take();
                        if let Some(action) = parked {
                            return self.continue_after_save(action);
                        }
                    }
                    Ok(NavigationOutcome::AfterSave)
                }
                Err(err) => {
                    warn!("Save before navigation failed: {}", err);
                    self.guard.requeue(action);
                    Err(err)
                }
            },
        }
    }

    /// Edits made while the save ran are still unsaved; those go back
    /// through the guard instead of being dropped.
    fn continue_after_save(&self, action: NavigationAction) -> Result<NavigationOutcome> {
        if self.has_unsaved_changes() {
            info!("Edits made during save, asking again before {:?}", action);
            self.guard.requeue(action);
            return Ok(NavigationOutcome::AwaitingDecision);
        }
        self.apply(&action)?;
        Ok(NavigationOutcome::Completed(action))
    }

    fn apply(&self, action: &NavigationAction) -> Result<()> {
        match action {
            NavigationAction::LoadVersion(id) => self.ctx.with_state(|s| -> Result<()> {
                let snapshot = s.lineage.set_active(id)?.template_config.clone();
                s.history.reset(snapshot);
                Ok(())
            }),
            NavigationAction::RestoreToLatest => self.ctx.with_state(|s| -> Result<()> {
                let Some(latest) = s.lineage.latest_version_id().cloned() else {
                    return Ok(());
                };
                let snapshot = s.lineage.set_active(&latest)?.template_config.clone();
                s.history.reset(snapshot);
                Ok(())
            }),
            NavigationAction::LeaveEditor => {
                self.left.store(true, Ordering::Release);
                Ok(())
            }
        }
    }
}
