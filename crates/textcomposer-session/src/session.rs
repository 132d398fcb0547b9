//! The editing session: owns the document store and runs the effects its
//! mutations request.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use textcomposer_core::{ElementId, ElementPatch, TextElement};
use tracing::{debug, info};

use crate::config::Config;
use crate::debounce::CommitDebouncer;
use crate::error::ComposerError;
use crate::interaction::{CanvasSize, Commit, Gesture, constrain_box, snap_to_center};
use crate::persistence::{PersistenceAdapter, Storage};
use crate::store::{DocumentStore, Effect, Outcome};
use crate::writer::{WriterHandle, start_writer_thread};

pub struct Session {
    store: DocumentStore,
    debouncer: CommitDebouncer,
    writer: WriterHandle,
    adapter: PersistenceAdapter,
    config: Config,
    canvas: CanvasSize,
}

impl Session {
    /// Start with an empty document. Nothing saved is read, and the saved
    /// record is replaced by the first durable edit.
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Result<Self> {
        let adapter = PersistenceAdapter::new(storage);
        let writer = start_writer_thread(adapter.clone())?;
        let mut store = DocumentStore::new(config.history_capacity);
        store.initialize_history();

        Ok(Self {
            store,
            debouncer: CommitDebouncer::new(config.debounce_window()),
            writer,
            adapter,
            canvas: CanvasSize::new(
                f64::from(config.max_canvas_width),
                f64::from(config.max_canvas_height),
            ),
            config,
        })
    }

    /// Start from the saved document, if any. The loaded document becomes
    /// the initial history state.
    pub fn open(storage: Arc<dyn Storage>, config: Config) -> Result<Self> {
        let mut session = Self::new(storage, config)?;
        match session.adapter.load() {
            Some(record) => session.store.load(record),
            None => info!("no saved document; starting empty"),
        }
        Ok(session)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.adapter
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Called when the background image, and with it the canvas, changes size
    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        self.canvas = canvas;
    }

    pub fn elements(&self) -> &[TextElement] {
        self.store.elements()
    }

    pub fn selected(&self) -> Option<&ElementId> {
        self.store.selected()
    }

    fn run(&self, outcome: Outcome) -> bool {
        for effect in outcome.effects {
            match effect {
                Effect::Persist(record) => self.writer.schedule_save(record),
                Effect::ClearStorage => self.writer.schedule_clear(),
            }
        }
        outcome.changed
    }

    fn require(&self, id: &ElementId) -> Result<&TextElement, ComposerError> {
        self.store
            .element(id)
            .ok_or_else(|| ComposerError::UnknownElement(id.clone()))
    }

    /// Apply a gesture. Returns whether the live document or selection
    /// changed; gestures aimed at a missing element leave everything as is.
    pub fn handle(&mut self, gesture: Gesture, now: Instant) -> Result<bool, ComposerError> {
        match gesture {
            Gesture::Create { x, y } => {
                let element = TextElement::new(x, y);
                // Selected before the add so the saved record carries it
                self.store.set_selected(Some(element.id.clone()));
                let outcome = self.store.add_element(element);
                Ok(self.run(outcome))
            }
            Gesture::DragMove { id, x, y } => {
                let (x, y) = self.snap(&id, x, y)?;
                Ok(self
                    .store
                    .update_element_immediate(&id, &ElementPatch::position(x, y)))
            }
            Gesture::DragEnd { id, x, y } => {
                let (x, y) = self.snap(&id, x, y)?;
                let outcome = self.store.update_element(&id, &ElementPatch::position(x, y));
                Ok(self.run(outcome))
            }
            Gesture::TransformEnd { id, transform } => {
                self.require(&id)?;
                match constrain_box(transform, self.config.min_transform_size) {
                    Some(transform) => {
                        let outcome = self.store.update_element(&id, &transform.to_patch());
                        Ok(self.run(outcome))
                    }
                    None => {
                        debug!(%id, "transform below minimum size; keeping previous box");
                        Ok(false)
                    }
                }
            }
            Gesture::Nudge { dx, dy } => {
                let Some(element) = self.store.selected_element() else {
                    return Ok(false);
                };
                let id = element.id.clone();
                let step = self.config.nudge_step;
                let patch = ElementPatch::position(element.x + dx * step, element.y + dy * step);
                let outcome = self.store.update_element(&id, &patch);
                Ok(self.run(outcome))
            }
            Gesture::Edit { id, patch, commit } => {
                self.require(&id)?;
                match commit {
                    Commit::Immediate => Ok(self.store.update_element_immediate(&id, &patch)),
                    Commit::Debounced => {
                        let changed = self.store.update_element_immediate(&id, &patch);
                        self.debouncer.schedule(id, patch, now);
                        Ok(changed)
                    }
                    Commit::Durable => {
                        let outcome = self.store.update_element(&id, &patch);
                        Ok(self.run(outcome))
                    }
                }
            }
            Gesture::Select(Some(id)) => {
                self.require(&id)?;
                self.store.set_selected(Some(id));
                Ok(true)
            }
            Gesture::Select(None) | Gesture::Deselect => {
                let changed = self.store.selected().is_some();
                self.store.set_selected(None);
                Ok(changed)
            }
        }
    }

    fn snap(&self, id: &ElementId, x: f64, y: f64) -> Result<(f64, f64), ComposerError> {
        let element = self.require(id)?;
        Ok(snap_to_center(element, x, y, self.canvas, self.config.snap_threshold))
    }

    // --- Debounced commits ---

    /// When the event loop should next call [`Session::poll`]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Record every debounced commit whose window has elapsed. Returns how
    /// many reached the history.
    pub fn poll(&mut self, now: Instant) -> usize {
        let due = self.debouncer.poll_due(now);
        self.commit_all(due)
    }

    /// Record every pending debounced commit now
    pub fn commit_pending(&mut self) -> usize {
        let pending = self.debouncer.drain();
        self.commit_all(pending)
    }

    fn commit_all(&mut self, commits: Vec<(ElementId, ElementPatch)>) -> usize {
        let mut recorded = 0;
        for (id, patch) in commits {
            let outcome = self.store.update_element(&id, &patch);
            if self.run(outcome) {
                recorded += 1;
            } else {
                debug!(%id, "dropping debounced commit for removed element");
            }
        }
        recorded
    }

    // --- Durable commands ---

    pub fn remove(&mut self, id: &ElementId) -> bool {
        self.commit_pending();
        self.debouncer.cancel(id);
        let outcome = self.store.remove_element(id);
        self.run(outcome)
    }

    pub fn move_up(&mut self, id: &ElementId) -> bool {
        self.commit_pending();
        let outcome = self.store.move_up(id);
        self.run(outcome)
    }

    pub fn move_down(&mut self, id: &ElementId) -> bool {
        self.commit_pending();
        let outcome = self.store.move_down(id);
        self.run(outcome)
    }

    pub fn move_to_top(&mut self, id: &ElementId) -> bool {
        self.commit_pending();
        let outcome = self.store.move_to_top(id);
        self.run(outcome)
    }

    pub fn move_to_bottom(&mut self, id: &ElementId) -> bool {
        self.commit_pending();
        let outcome = self.store.move_to_bottom(id);
        self.run(outcome)
    }

    pub fn undo(&mut self) -> bool {
        self.commit_pending();
        let outcome = self.store.undo();
        self.run(outcome)
    }

    pub fn redo(&mut self) -> bool {
        self.commit_pending();
        let outcome = self.store.redo();
        self.run(outcome)
    }

    pub fn reset_to_initial(&mut self) -> bool {
        self.commit_pending();
        let outcome = self.store.reset_to_initial();
        self.run(outcome)
    }

    /// Reset to the initial state and remove the saved document. Pending
    /// debounced edits are discarded.
    pub fn clear_all(&mut self) -> bool {
        let discarded = self.debouncer.drain().len();
        if discarded > 0 {
            debug!(discarded, "discarding pending edits");
        }
        let outcome = self.store.clear_all();
        info!("document cleared");
        self.run(outcome)
    }

    /// Record pending edits and wait until every queued write has run
    pub fn flush(&mut self) {
        self.commit_pending();
        self.writer.flush();
    }
}
