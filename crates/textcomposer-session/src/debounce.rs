//! Per-element debouncing of durable commits.
//!
//! Text edits and slider drags update the live document on every event but
//! should land in history once the user pauses. Each element id owns at most
//! one pending commit; a newer edit to the same id pushes its deadline back
//! and folds its patch in. Different ids never affect each other.
//!
//! The debouncer does not own a timer. The event loop asks for
//! [`CommitDebouncer::next_deadline`], waits until then, and collects due
//! commits with [`CommitDebouncer::poll_due`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use textcomposer_core::{ElementId, ElementPatch};

/// Default quiescence window for text and slider edits
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub deadline: Instant,
    pub patch: ElementPatch,
}

#[derive(Debug, Clone)]
pub struct CommitDebouncer {
    window: Duration,
    pending: HashMap<ElementId, PendingCommit>,
}

impl CommitDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Queue `patch` for `id`, superseding any pending commit for that id
    pub fn schedule(&mut self, id: ElementId, patch: ElementPatch, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(id)
            .and_modify(|pending| {
                pending.patch.merge(&patch);
                pending.deadline = deadline;
            })
            .or_insert(PendingCommit { deadline, patch });
    }

    /// Drop the pending commit for `id`, returning its patch
    pub fn cancel(&mut self, id: &ElementId) -> Option<ElementPatch> {
        self.pending.remove(id).map(|pending| pending.patch)
    }

    /// Remove and return every commit whose deadline has passed, oldest first
    pub fn poll_due(&mut self, now: Instant) -> Vec<(ElementId, ElementPatch)> {
        let due: Vec<ElementId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        self.take_ordered(due)
    }

    /// Remove and return every pending commit regardless of deadline
    pub fn drain(&mut self) -> Vec<(ElementId, ElementPatch)> {
        let all: Vec<ElementId> = self.pending.keys().cloned().collect();
        self.take_ordered(all)
    }

    fn take_ordered(&mut self, ids: Vec<ElementId>) -> Vec<(ElementId, ElementPatch)> {
        let mut taken: Vec<(ElementId, PendingCommit)> = ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|pending| (id, pending)))
            .collect();
        taken.sort_by(|a, b| a.1.deadline.cmp(&b.1.deadline).then_with(|| a.0.cmp(&b.0)));
        taken
            .into_iter()
            .map(|(id, pending)| (id, pending.patch))
            .collect()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    pub fn is_pending(&self, id: &ElementId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for CommitDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fires_once_after_quiet_window() {
        let start = Instant::now();
        let mut debouncer = CommitDebouncer::default();
        let id = ElementId::from("a");

        debouncer.schedule(id.clone(), ElementPatch::text("h"), start);
        debouncer.schedule(id.clone(), ElementPatch::text("he"), start + ms(100));
        debouncer.schedule(id.clone(), ElementPatch::text("hey"), start + ms(200));

        assert!(debouncer.poll_due(start + ms(400)).is_empty());
        let due = debouncer.poll_due(start + ms(500));
        assert_eq!(due, vec![(id, ElementPatch::text("hey"))]);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn merges_fields_of_superseded_edits() {
        let start = Instant::now();
        let mut debouncer = CommitDebouncer::default();
        let id = ElementId::from("a");

        debouncer.schedule(id.clone(), ElementPatch::text("hello"), start);
        debouncer.schedule(id.clone(), ElementPatch::font_size(40.0), start + ms(10));

        let due = debouncer.drain();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1.text.as_deref(), Some("hello"));
        assert_eq!(due[0].1.font_size, Some(40.0));
    }

    #[test]
    fn ids_are_independent() {
        let start = Instant::now();
        let mut debouncer = CommitDebouncer::default();
        let a = ElementId::from("a");
        let b = ElementId::from("b");

        debouncer.schedule(a.clone(), ElementPatch::opacity(0.5), start);
        debouncer.schedule(b.clone(), ElementPatch::opacity(0.2), start + ms(250));
        assert_eq!(debouncer.next_deadline(), Some(start + ms(300)));

        let first = debouncer.poll_due(start + ms(300));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, a);
        assert!(debouncer.is_pending(&b));

        let second = debouncer.poll_due(start + ms(550));
        assert_eq!(second[0].0, b);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn cancel_drops_pending_commit() {
        let start = Instant::now();
        let mut debouncer = CommitDebouncer::default();
        let id = ElementId::from("a");
        debouncer.schedule(id.clone(), ElementPatch::text("x"), start);
        assert_eq!(debouncer.cancel(&id), Some(ElementPatch::text("x")));
        assert!(debouncer.poll_due(start + ms(1000)).is_empty());
    }
}
