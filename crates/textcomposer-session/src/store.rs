//! The document store: the live element sequence, the selection, and the
//! undo history.
//!
//! The store never touches storage. Durable mutations return an [`Outcome`]
//! carrying the [`Effect`]s the caller must run (persist the new state, clear
//! storage). Transient mutations change the live sequence only.

use textcomposer_core::{
    ElementId, ElementPatch, HistoryManager, Snapshot, TextElement, snapshot_of,
};
use tracing::debug;

use crate::persistence::PersistedRecord;

/// Side effect requested by a store mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write this record to durable storage
    Persist(PersistedRecord),
    /// Remove the persisted record
    ClearStorage,
}

/// Result of a store mutation
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct Outcome {
    /// Whether the live document changed
    pub changed: bool,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    fn with_effect(effect: Effect) -> Self {
        Self {
            changed: true,
            effects: vec![effect],
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

/// Where an element sits in the paint order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderInfo {
    pub index: usize,
    pub can_move_up: bool,
    pub can_move_down: bool,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    /// Paint order: later elements are drawn on top
    elements: Vec<TextElement>,
    selected: Option<ElementId>,
    history: HistoryManager,
}

impl DocumentStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            elements: Vec::new(),
            selected: None,
            history: HistoryManager::new(history_capacity),
        }
    }

    // --- Queries ---

    pub fn elements(&self) -> &[TextElement] {
        &self.elements
    }

    pub fn element(&self, id: &ElementId) -> Option<&TextElement> {
        self.elements.iter().find(|el| &el.id == id)
    }

    pub fn selected(&self) -> Option<&ElementId> {
        self.selected.as_ref()
    }

    pub fn selected_element(&self) -> Option<&TextElement> {
        self.selected.as_ref().and_then(|id| self.element(id))
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn order_info(&self, id: &ElementId) -> Option<OrderInfo> {
        let index = self.index_of(id)?;
        let total = self.elements.len();
        Some(OrderInfo {
            index,
            can_move_up: index + 1 < total,
            can_move_down: index > 0,
            total,
        })
    }

    /// The state a persistence write should capture right now
    pub fn record(&self) -> PersistedRecord {
        PersistedRecord::new(&self.elements, self.selected.clone())
    }

    fn index_of(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|el| &el.id == id)
    }

    // --- History plumbing ---

    /// Record the current sequence as the initial state, if none is recorded
    pub fn initialize_history(&mut self) {
        self.history.initialize(snapshot_of(&self.elements));
    }

    /// Run `mutate` as a durable mutation: the pre-mutation sequence seeds
    /// the history if needed, and the post-mutation sequence becomes a new
    /// entry. `mutate` returns false to abort without recording anything.
    fn durable(&mut self, mutate: impl FnOnce(&mut Self) -> bool) -> Outcome {
        if !self.history.is_initialized() {
            self.initialize_history();
        }
        if !mutate(self) {
            return Outcome::unchanged();
        }
        self.history.add(snapshot_of(&self.elements));
        Outcome::with_effect(Effect::Persist(self.record()))
    }

    /// Replace the live sequence with a history snapshot
    fn restore(&mut self, snapshot: Snapshot) -> Outcome {
        self.elements = snapshot.to_vec();
        self.reconcile_selection();
        Outcome::with_effect(Effect::Persist(self.record()))
    }

    fn reconcile_selection(&mut self) {
        let dangling = self
            .selected
            .as_ref()
            .is_some_and(|id| self.index_of(id).is_none());
        if dangling {
            debug!("selected element no longer exists; clearing selection");
            self.selected = None;
        }
    }

    // --- Durable mutations ---

    /// Append an element on top. An element whose id is already present is
    /// ignored.
    pub fn add_element(&mut self, element: TextElement) -> Outcome {
        self.durable(|store| {
            if store.index_of(&element.id).is_some() {
                return false;
            }
            store.elements.push(element);
            true
        })
    }

    pub fn remove_element(&mut self, id: &ElementId) -> Outcome {
        self.durable(|store| {
            let Some(index) = store.index_of(id) else {
                return false;
            };
            store.elements.remove(index);
            store.reconcile_selection();
            true
        })
    }

    /// Apply `patch` and record the result. Records an entry even when the
    /// patch matches the live element, since transient updates may already
    /// have applied it. Unknown ids are a no-op.
    pub fn update_element(&mut self, id: &ElementId, patch: &ElementPatch) -> Outcome {
        self.durable(|store| {
            let Some(index) = store.index_of(id) else {
                return false;
            };
            patch.apply_to(&mut store.elements[index]);
            true
        })
    }

    /// Move one step towards the top of the paint order
    pub fn move_up(&mut self, id: &ElementId) -> Outcome {
        self.reorder(id, |index, len| (index + 1 < len).then_some(index + 1))
    }

    /// Move one step towards the bottom of the paint order
    pub fn move_down(&mut self, id: &ElementId) -> Outcome {
        self.reorder(id, |index, _| index.checked_sub(1))
    }

    pub fn move_to_top(&mut self, id: &ElementId) -> Outcome {
        self.reorder(id, |index, len| (index + 1 < len).then_some(len - 1))
    }

    pub fn move_to_bottom(&mut self, id: &ElementId) -> Outcome {
        self.reorder(id, |index, _| (index > 0).then_some(0))
    }

    fn reorder(
        &mut self,
        id: &ElementId,
        target: impl FnOnce(usize, usize) -> Option<usize>,
    ) -> Outcome {
        self.durable(|store| {
            let Some(index) = store.index_of(id) else {
                return false;
            };
            let Some(to) = target(index, store.elements.len()) else {
                return false;
            };
            let element = store.elements.remove(index);
            store.elements.insert(to, element);
            true
        })
    }

    // --- Transient mutations ---

    /// Apply `patch` to the live sequence only. No history, no persistence.
    /// Returns whether the element changed.
    pub fn update_element_immediate(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        match self.index_of(id) {
            Some(index) => self.elements[index].apply(patch),
            None => false,
        }
    }

    // --- Selection ---

    /// Select an element or clear the selection. Not validated here; the
    /// store reconciles after every sequence-replacing operation.
    pub fn set_selected(&mut self, id: Option<ElementId>) {
        self.selected = id;
    }

    // --- History navigation ---

    pub fn undo(&mut self) -> Outcome {
        match self.history.undo() {
            Some(snapshot) => self.restore(snapshot),
            None => Outcome::unchanged(),
        }
    }

    pub fn redo(&mut self) -> Outcome {
        match self.history.redo() {
            Some(snapshot) => self.restore(snapshot),
            None => Outcome::unchanged(),
        }
    }

    /// Jump back to the initial state and clear the selection. Later history
    /// entries remain reachable through redo.
    pub fn reset_to_initial(&mut self) -> Outcome {
        let snapshot = self.history.reset_to_initial();
        self.selected = None;
        self.restore(snapshot)
    }

    // --- Session lifecycle ---

    /// Replace the document with a loaded record. The loaded sequence becomes
    /// the initial history state, so undo never reaches past a reload.
    pub fn load(&mut self, record: PersistedRecord) {
        self.elements = record.text_layers;
        self.selected = record.selected_text_layer_id;
        self.reconcile_selection();
        self.history.reinitialize(snapshot_of(&self.elements));
    }

    /// Empty the document, start a new empty history baseline and drop the
    /// persisted record
    pub fn clear_all(&mut self) -> Outcome {
        self.elements.clear();
        self.selected = None;
        self.history.reinitialize(snapshot_of(&[]));
        Outcome::with_effect(Effect::ClearStorage)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(textcomposer_core::DEFAULT_HISTORY_CAPACITY)
    }
}
