//! Snapshot-based undo/redo history.
//!
//! Every entry is an immutable copy of the full element sequence. Index 0 is
//! the initial state of the session and is never evicted; appending past the
//! capacity drops the oldest entry after it instead.

use std::sync::Arc;

use tracing::debug;

use crate::element::TextElement;

/// Maximum number of history entries, including the initial state
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// The initial entry plus room for at least one edit
const MIN_HISTORY_CAPACITY: usize = 2;

/// Immutable copy of the element sequence at one point in history
pub type Snapshot = Arc<[TextElement]>;

/// Build a snapshot from a slice of elements
pub fn snapshot_of(elements: &[TextElement]) -> Snapshot {
    Arc::from(elements)
}

/// One point of the history timeline, for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryItem {
    pub index: usize,
    /// This is the entry the document currently shows
    pub is_current: bool,
    /// At or before the current entry
    pub is_active: bool,
}

/// Linear undo/redo stack of snapshots
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<Snapshot>,
    current: usize,
    initialized: bool,
    capacity: usize,
}

impl HistoryManager {
    /// Create a manager holding at most `capacity` entries (clamped to 2)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            current: 0,
            initialized: false,
            capacity: capacity.max(MIN_HISTORY_CAPACITY),
        }
    }

    /// Record the initial state. Only the first call has an effect.
    pub fn initialize(&mut self, initial: Snapshot) {
        if self.initialized {
            return;
        }
        self.reinitialize(initial);
    }

    /// Drop all history and start a new baseline at `initial`
    pub fn reinitialize(&mut self, initial: Snapshot) {
        self.entries = vec![initial];
        self.current = 0;
        self.initialized = true;
    }

    /// Append a snapshot as the new current state. Any redo entries are
    /// discarded, then the oldest non-initial entry is evicted if the stack
    /// is over capacity.
    pub fn add(&mut self, snapshot: Snapshot) {
        if !self.initialized {
            self.initialize(snapshot_of(&[]));
        }

        self.entries.truncate(self.current + 1);
        self.entries.push(snapshot);
        self.current = self.entries.len() - 1;

        while self.entries.len() > self.capacity {
            self.entries.remove(1);
            self.current = self.current.saturating_sub(1);
        }

        debug!(index = self.current, len = self.entries.len(), "history entry added");
    }

    /// Step back one entry. Returns `None` at the initial state.
    pub fn undo(&mut self) -> Option<Snapshot> {
        if self.is_undo_disabled() {
            return None;
        }
        self.current -= 1;
        debug!(index = self.current, "undo");
        Some(self.entries[self.current].clone())
    }

    /// Step forward one entry. Returns `None` at the newest entry.
    pub fn redo(&mut self) -> Option<Snapshot> {
        if self.is_redo_disabled() {
            return None;
        }
        self.current += 1;
        debug!(index = self.current, "redo");
        Some(self.entries[self.current].clone())
    }

    /// Jump to the initial state. Later entries stay reachable through redo.
    pub fn reset_to_initial(&mut self) -> Snapshot {
        if !self.initialized {
            return snapshot_of(&[]);
        }
        self.current = 0;
        self.entries[0].clone()
    }

    pub fn is_undo_disabled(&self) -> bool {
        self.current == 0
    }

    pub fn is_redo_disabled(&self) -> bool {
        self.current + 1 >= self.entries.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Number of entries, including the initial state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The snapshot at index 0 (empty if never initialized)
    pub fn initial_state(&self) -> Snapshot {
        self.entries
            .first()
            .cloned()
            .unwrap_or_else(|| snapshot_of(&[]))
    }

    /// The snapshot at the current index
    pub fn current(&self) -> Option<Snapshot> {
        self.entries.get(self.current).cloned()
    }

    /// A window of at most `max_items` entries around the current index
    pub fn timeline(&self, max_items: usize) -> Vec<HistoryItem> {
        let count = max_items.min(self.entries.len());
        let start = self.current.saturating_sub(count / 2);

        (start..start + count)
            .take_while(|&index| index < self.entries.len())
            .map(|index| HistoryItem {
                index,
                is_current: index == self.current,
                is_active: index <= self.current,
            })
            .collect()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
