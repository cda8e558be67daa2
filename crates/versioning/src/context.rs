use history::EditHistory;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{
    default_title_rules, AssetStore, EngineConfig, MediaCache, SiteBackend, SiteId, Snapshot,
    TitleRule, VersionLineage,
};

/// Mutable editor state. Always locked briefly and never across an `.await`.
pub struct EditorState {
    pub history: EditHistory,
    pub lineage: VersionLineage,
    /// Template most recently written to the site row; used to roll the row
    /// back when a version create fails after the template was patched.
    pub persisted: Option<Snapshot>,
    pub display_name: Option<String>,
}

/// Everything the engine components share for one site editing session.
///
/// Built once by the embedding UI and handed to each component's
/// constructor; nothing is reached through globals.
pub struct EditorContext {
    site_id: SiteId,
    config: EngineConfig,
    backend: Arc<dyn SiteBackend>,
    assets: Arc<dyn AssetStore>,
    media: Arc<dyn MediaCache>,
    title_rules: Vec<TitleRule>,
    state: Mutex<EditorState>,
    saving: AtomicBool,
}

impl EditorContext {
    /// `initial` becomes the live snapshot and is assumed to match the
    /// site row until [`Self::with_persisted_template`] says otherwise.
    pub fn new(
        site_id: SiteId,
        config: EngineConfig,
        backend: Arc<dyn SiteBackend>,
        assets: Arc<dyn AssetStore>,
        media: Arc<dyn MediaCache>,
        initial: Snapshot,
    ) -> Self {
        let mut history = EditHistory::new(initial.clone());
        if let Some(limit) = config.history_limit {
            history = history.with_limit(limit);
        }
        Self {
            site_id,
            config,
            backend,
            assets,
            media,
            title_rules: default_title_rules(),
            state: Mutex::new(EditorState {
                history,
                lineage: VersionLineage::new(),
                persisted: Some(initial),
                display_name: None,
            }),
            saving: AtomicBool::new(false),
        }
    }

    /// Template currently stored on the site row, when it differs from
    /// `initial`. A failed version create writes this back.
    pub fn with_persisted_template(self, template: Snapshot) -> Self {
        self.state.lock().persisted = Some(template);
        self
    }

    pub fn with_title_rules(mut self, rules: Vec<TitleRule>) -> Self {
        self.title_rules = rules;
        self
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn SiteBackend {
        self.backend.as_ref()
    }

    pub fn assets(&self) -> &dyn AssetStore {
        self.assets.as_ref()
    }

    pub fn media(&self) -> &dyn MediaCache {
        self.media.as_ref()
    }

    pub fn title_rules(&self) -> &[TitleRule] {
        &self.title_rules
    }

    /// Runs `f` with the state locked.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut EditorState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Claims the single save slot; `None` when a save is already running.
    pub(crate) fn begin_save(self: &Arc<Self>) -> Option<SaveSlot> {
        self.saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveSlot { ctx: self.clone() })
    }
}

/// Releases the in-flight flag on drop, whichever way the save ends.
pub(crate) struct SaveSlot {
    ctx: Arc<EditorContext>,
}

impl Drop for SaveSlot {
    fn drop(&mut self) {
        self.ctx.saving.store(false, Ordering::Release);
    }
}
