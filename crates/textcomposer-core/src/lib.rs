//! Core types for textcomposer: the text element model, snapshot history,
//! and the font catalog interface.

pub mod element;
pub mod fonts;
pub mod history;

pub use element::{ElementId, ElementPatch, FontVariant, TextAlign, TextElement};
pub use fonts::{FallbackFonts, FontCatalog, FontOption};
pub use history::{
    DEFAULT_HISTORY_CAPACITY, HistoryItem, HistoryManager, Snapshot, snapshot_of,
};
