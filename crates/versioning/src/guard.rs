use parking_lot::Mutex;
use tracing::debug;

use crate::VersionId;

/// Something the user asked for that replaces the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationAction {
    LoadVersion(VersionId),
    RestoreToLatest,
    LeaveEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardChoice {
    /// Drop unsaved edits and continue.
    Discard,
    /// Save first; continue only if the save succeeds.
    SaveThenContinue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Nothing to lose, run the action now.
    Proceed(NavigationAction),
    /// Held until the user picks a [`GuardChoice`].
    Intercepted,
}

/// Holds at most one navigation intent while the user decides what to do
/// with unsaved edits. A newer intent replaces an older one.
#[derive(Debug, Default)]
pub struct NavigationGuard {
    pending: Mutex<Option<NavigationAction>>,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self, action: NavigationAction, has_unsaved_changes: bool) -> GuardDecision {
        if !has_unsaved_changes {
            return GuardDecision::Proceed(action);
        }
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(action) {
            debug!("Replacing pending navigation {:?}", previous);
        }
        GuardDecision::Intercepted
    }

    pub fn pending(&self) -> Option<NavigationAction> {
        self.pending.lock().clone()
    }

    pub fn take(&self) -> Option<NavigationAction> {
        self.pending.lock().take()
    }

    /// Puts an action back after a failed save-then-continue, unless the
    /// user already asked for something newer.
    pub fn requeue(&self, action: NavigationAction) {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            *pending = Some(action);
        }
    }

    pub fn cancel(&self) -> Option<NavigationAction> {
        self.take()
    }
}
