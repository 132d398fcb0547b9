//! Deferred persistence writes.
//!
//! Mutations must not wait on storage, so writes are handed to a worker
//! thread over a channel. Commands run in the order they were sent, so when
//! two saves are queued back to back the later one wins.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::persistence::{PersistedRecord, PersistenceAdapter};

/// Commands from the editor thread to the writer thread
#[derive(Debug)]
pub enum WriteCommand {
    /// Write this record
    Save(PersistedRecord),
    /// Remove the saved record
    Clear,
    /// Acknowledge once everything queued before it has run
    Flush(mpsc::Sender<()>),
    /// Stop the worker
    Shutdown,
}

/// Handle for queueing writes on the writer thread
pub struct WriterHandle {
    command_tx: mpsc::Sender<WriteCommand>,
    thread: Option<JoinHandle<()>>,
}

/// Start the writer thread
pub fn start_writer_thread(adapter: PersistenceAdapter) -> Result<WriterHandle> {
    let (command_tx, command_rx) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("textcomposer-writer".into())
        .spawn(move || run_writer(adapter, command_rx))
        .context("Failed to spawn writer thread")?;

    Ok(WriterHandle {
        command_tx,
        thread: Some(thread),
    })
}

fn run_writer(adapter: PersistenceAdapter, command_rx: mpsc::Receiver<WriteCommand>) {
    while let Ok(command) = command_rx.recv() {
        match command {
            WriteCommand::Save(record) => adapter.write(&record),
            WriteCommand::Clear => adapter.clear(),
            WriteCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            WriteCommand::Shutdown => break,
        }
    }
    debug!("writer thread stopped");
}

impl WriterHandle {
    /// Queue a save. Never blocks.
    pub fn schedule_save(&self, record: PersistedRecord) {
        self.send(WriteCommand::Save(record));
    }

    /// Queue removal of the saved record. Never blocks.
    pub fn schedule_clear(&self) {
        self.send(WriteCommand::Clear);
    }

    /// Block until every command queued so far has run
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(WriteCommand::Flush(ack_tx));
        let _ = ack_rx.recv();
    }

    fn send(&self, command: WriteCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("writer thread is gone; change not saved");
        }
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WriteCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use textcomposer_core::TextElement;

    use super::*;
    use crate::persistence::MemoryStorage;

    #[test]
    fn later_save_wins() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone());
        let writer = start_writer_thread(adapter.clone()).unwrap();

        writer.schedule_save(PersistedRecord::new(&[TextElement::with_id("a", 0.0, 0.0)], None));
        writer.schedule_save(PersistedRecord::new(
            &[TextElement::with_id("a", 0.0, 0.0), TextElement::with_id("b", 0.0, 0.0)],
            None,
        ));
        writer.flush();

        assert_eq!(adapter.load().unwrap().text_layers.len(), 2);
    }

    #[test]
    fn clear_runs_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone());
        let writer = start_writer_thread(adapter.clone()).unwrap();

        writer.schedule_save(PersistedRecord::new(&[TextElement::default()], None));
        writer.schedule_clear();
        writer.flush();
        assert!(adapter.load().is_none());
    }

    #[test]
    fn drop_drains_queue() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone());
        {
            let writer = start_writer_thread(adapter.clone()).unwrap();
            writer.schedule_save(PersistedRecord::new(&[TextElement::default()], None));
        }
        assert!(adapter.load().is_some());
    }
}
