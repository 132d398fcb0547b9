//! Document store, persistence and edit debouncing for textcomposer.

pub mod config;
pub mod debounce;
pub mod error;
pub mod interaction;
pub mod persistence;
pub mod session;
pub mod store;
pub mod writer;

pub use config::Config;
pub use debounce::{CommitDebouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use error::ComposerError;
pub use interaction::{CanvasSize, Commit, Gesture, Transform};
pub use persistence::{
    FileStorage, MemoryStorage, PersistedRecord, PersistenceAdapter, Storage, EXPORT_SIZE_KEY,
    IMAGE_KEY, STATE_KEY,
};
pub use session::Session;
pub use store::{DocumentStore, Effect, OrderInfo, Outcome};
pub use writer::{WriterHandle, start_writer_thread};
