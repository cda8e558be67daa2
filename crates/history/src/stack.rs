use crate::{ActionMeta, EditMode, HistoryEntry, Snapshot, Timestamp};

#[derive(Debug, Default, Clone)]
struct UndoStack {
    past: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
}

impl UndoStack {
    fn trim(&mut self, limit: Option<usize>) {
        if let Some(limit) = limit {
            if self.past.len() > limit {
                let excess = self.past.len() - limit;
                self.past.drain(..excess);
            }
        }
    }

    fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

/// Live site snapshot plus the structure and content undo stacks.
///
/// Every entry stores the snapshot that was live before the edit it
/// describes. Undo swaps that snapshot back in and parks the current one on
/// the future list under the same meta, so redo is the exact inverse.
#[derive(Debug, Clone)]
pub struct EditHistory {
    live: Snapshot,
    mode: EditMode,
    structure: UndoStack,
    content: UndoStack,
    limit: Option<usize>,
    dirty: bool,
    last_saved_at: Option<Timestamp>,
}

impl EditHistory {
    pub fn new(live: Snapshot) -> Self {
        Self {
            live,
            mode: EditMode::default(),
            structure: UndoStack::default(),
            content: UndoStack::default(),
            limit: None,
            dirty: false,
            last_saved_at: None,
        }
    }

    /// Caps each stack's past list; the oldest entries are dropped first.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self
    }

    pub fn live(&self) -> &Snapshot {
        &self.live
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
    }

    fn stack(&self, mode: EditMode) -> &UndoStack {
        match mode {
            EditMode::Structure => &self.structure,
            EditMode::Content => &self.content,
        }
    }

    fn stack_mut(&mut self, mode: EditMode) -> &mut UndoStack {
        match mode {
            EditMode::Structure => &mut self.structure,
            EditMode::Content => &mut self.content,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot, meta: ActionMeta) {
        let previous = std::mem::replace(&mut self.live, snapshot);
        let (mode, limit) = (self.mode, self.limit);
        let stack = self.stack_mut(mode);
        stack.past.push(HistoryEntry {
            snapshot: previous,
            meta,
        });
        stack.future.clear();
        stack.trim(limit);
        self.dirty = true;
    }

    /// Returns `false` without touching anything when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let mode = self.mode;
        let Some(entry) = self.stack_mut(mode).past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.live, entry.snapshot);
        self.stack_mut(mode).future.push(HistoryEntry {
            snapshot: current,
            meta: entry.meta,
        });
        self.dirty = true;
        true
    }

    pub fn redo(&mut self) -> bool {
        let mode = self.mode;
        let Some(entry) = self.stack_mut(mode).future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.live, entry.snapshot);
        self.stack_mut(mode).past.push(HistoryEntry {
            snapshot: current,
            meta: entry.meta,
        });
        self.dirty = true;
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.stack(self.mode).past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.stack(self.mode).future.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.stack(self.mode)
            .past
            .last()
            .map(|e| e.meta.description.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.stack(self.mode)
            .future
            .last()
            .map(|e| e.meta.description.as_str())
    }

    pub fn past(&self, mode: EditMode) -> &[HistoryEntry] {
        &self.stack(mode).past
    }

    pub fn future(&self, mode: EditMode) -> &[HistoryEntry] {
        &self.stack(mode).future
    }

    /// Past entries from both stacks strictly newer than `since`, oldest first.
    ///
    /// Entries sharing a timestamp are all kept; structure entries sort
    /// before content entries on ties.
    pub fn changes_since(&self, since: Option<Timestamp>) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = self
            .structure
            .past
            .iter()
            .chain(self.content.past.iter())
            .filter(|e| since.map_or(true, |t| e.meta.timestamp > t))
            .collect();
        entries.sort_by_key(|e| e.meta.timestamp);
        entries
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub fn last_saved_at(&self) -> Option<Timestamp> {
        self.last_saved_at
    }

    /// Advances the saved marker. Edits made after `at` (while a save was in
    /// flight) keep the session dirty.
    pub fn mark_saved(&mut self, at: Timestamp) {
        self.last_saved_at = Some(at);
        self.dirty = !self.changes_since(Some(at)).is_empty();
    }

    /// Adopts a rewritten live tree without recording an edit.
    pub fn replace_live(&mut self, snapshot: Snapshot) {
        self.live = snapshot;
    }

    /// Loads a different snapshot wholesale, e.g. when switching versions.
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.live = snapshot;
        self.structure.clear();
        self.content.clear();
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn snap(n: i64) -> Snapshot {
        Snapshot::new(json!({ "rev": n }))
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut history = EditHistory::new(snap(0));
        for n in 1..=4 {
            history.push(snap(n), ActionMeta::at("edit", format!("edit {n}"), at(n)));
        }

        for _ in 0..3 {
            let before = history.live().clone();
            assert!(history.undo());
            assert!(history.redo());
            assert_eq!(history.live(), &before);
            assert!(history.undo());
        }
        assert_eq!(history.live(), &snap(1));
    }

    #[test]
    fn test_push_invalidates_redo() {
        let mut history = EditHistory::new(snap(0));
        history.push(snap(1), ActionMeta::at("edit", "first", at(1)));
        history.undo();
        assert!(history.can_redo());

        history.push(snap(2), ActionMeta::at("edit", "second", at(2)));
        assert!(!history.can_redo());
        assert!(history.future(EditMode::Structure).is_empty());
        assert!(!history.redo());
        assert_eq!(history.live(), &snap(2));
    }

    #[test]
    fn test_empty_stacks_are_silent() {
        let mut history = EditHistory::new(snap(0));
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(history.live(), &snap(0));
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn test_stacks_are_independent() {
        let mut history = EditHistory::new(snap(0));
        history.push(snap(1), ActionMeta::at("add_page", "Added page", at(1)));
        history.set_mode(EditMode::Content);
        assert!(!history.can_undo());
        history.push(snap(2), ActionMeta::at("edit_text", "Edited heading", at(2)));
        assert_eq!(history.undo_label(), Some("Edited heading"));

        history.set_mode(EditMode::Structure);
        assert_eq!(history.undo_label(), Some("Added page"));
    }

    #[test]
    fn test_changes_since_filters_and_orders() {
        let mut history = EditHistory::new(snap(0));
        history.push(snap(1), ActionMeta::at("a", "s1", at(1)));
        history.set_mode(EditMode::Content);
        history.push(snap(2), ActionMeta::at("b", "c2", at(2)));
        history.set_mode(EditMode::Structure);
        history.push(snap(3), ActionMeta::at("a", "s3", at(3)));
        history.set_mode(EditMode::Content);
        history.push(snap(4), ActionMeta::at("b", "c3", at(3)));

        let all: Vec<&str> = history
            .changes_since(None)
            .iter()
            .map(|e| e.meta.description.as_str())
            .collect();
        assert_eq!(all, vec!["s1", "c2", "s3", "c3"]);

        let cutoff = at(2);
        let recent = history.changes_since(Some(cutoff));
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.meta.timestamp > cutoff));
        assert!(recent
            .windows(2)
            .all(|w| w[0].meta.timestamp <= w[1].meta.timestamp));
    }

    #[test]
    fn test_mark_saved_keeps_later_edits_dirty() {
        let mut history = EditHistory::new(snap(0));
        history.push(snap(1), ActionMeta::at("a", "one", at(1)));
        history.mark_saved(at(1));
        assert!(!history.has_unsaved_changes());
        assert!(history.changes_since(history.last_saved_at()).is_empty());

        history.push(snap(2), ActionMeta::at("a", "two", at(5)));
        history.mark_saved(at(3));
        assert!(history.has_unsaved_changes());
        assert_eq!(history.changes_since(Some(at(3))).len(), 1);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = EditHistory::new(snap(0)).with_limit(2);
        for n in 1..=4 {
            history.push(snap(n), ActionMeta::at("a", format!("e{n}"), at(n)));
        }
        let past = history.past(EditMode::Structure);
        assert_eq!(past.len(), 2);
        assert_eq!(past[0].meta.description, "e3");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut history = EditHistory::new(snap(0));
        history.push(snap(1), ActionMeta::at("a", "one", at(1)));
        history.reset(snap(9));
        assert_eq!(history.live(), &snap(9));
        assert!(!history.can_undo());
        assert!(!history.has_unsaved_changes());
    }
}
