//! Durable key-value persistence of the document.
//!
//! The whole document is one JSON record under [`STATE_KEY`]. Writes are
//! best-effort: failures are logged and the in-memory document stays the
//! source of truth. Loading never fails; a missing or corrupt record reads as
//! "nothing saved".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use textcomposer_core::{ElementId, TextElement};
use tracing::{debug, info, warn};

/// Key of the document record
pub const STATE_KEY: &str = "image-text-composer-state";
/// Key of the cached export scaling metadata
pub const EXPORT_SIZE_KEY: &str = "exportSize";
/// Key of the persisted background image
pub const IMAGE_KEY: &str = "image-text-composer-image";

/// Version written by this build. Records without a version are version 0
/// and share the same layout.
pub const RECORD_VERSION: u32 = 1;

/// String key-value storage
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {:?}", self.dir))?;
        let path = self.path_for(key);
        // Write then rename so a crash mid-write never leaves a torn record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        }
        Ok(())
    }
}

/// In-memory storage. `failing()` builds one whose writes always error, to
/// stand in for a full disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let storage = Self::default();
        storage.set_fail_writes(true);
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("storage quota exceeded"));
        }
        let mut entries = self.entries.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// The persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    #[serde(default)]
    pub text_layers: Vec<TextElement>,
    #[serde(default)]
    pub selected_text_layer_id: Option<ElementId>,
    /// Milliseconds since the Unix epoch at write time
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub version: u32,
}

impl PersistedRecord {
    pub fn new(elements: &[TextElement], selected: Option<ElementId>) -> Self {
        Self {
            text_layers: elements.to_vec(),
            selected_text_layer_id: selected,
            timestamp: now_millis(),
            version: RECORD_VERSION,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Reads and writes the document record
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn Storage>,
    key: String,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            key: STATE_KEY.to_string(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Serialize and write the document. Failures are logged, never raised.
    pub fn save(&self, elements: &[TextElement], selected: Option<ElementId>) {
        self.write(&PersistedRecord::new(elements, selected));
    }

    /// Write an already built record. Failures are logged, never raised.
    pub fn write(&self, record: &PersistedRecord) {
        if let Err(e) = self.try_write(record) {
            warn!(error = %e, "failed to save document");
        }
    }

    fn try_write(&self, record: &PersistedRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize document")?;
        self.storage.set(&self.key, &json)?;
        debug!(elements = record.text_layers.len(), timestamp = record.timestamp, "document saved");
        Ok(())
    }

    /// Read the last written record. Missing or unreadable data gives `None`.
    pub fn load(&self) -> Option<PersistedRecord> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read saved document");
                return None;
            }
        };
        match serde_json::from_str::<PersistedRecord>(&raw) {
            Ok(record) => {
                info!(
                    elements = record.text_layers.len(),
                    version = record.version,
                    "loaded saved document"
                );
                Some(record)
            }
            Err(e) => {
                warn!(error = %e, "saved document is corrupt; starting empty");
                None
            }
        }
    }

    /// Remove the record
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(error = %e, "failed to clear saved document");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> (Arc<MemoryStorage>, PersistenceAdapter) {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone());
        (storage, adapter)
    }

    #[test]
    fn save_then_load() {
        let (_, adapter) = adapter();
        let elements = vec![TextElement::with_id("a", 1.0, 2.0)];
        adapter.save(&elements, Some(ElementId::from("a")));

        let record = adapter.load().unwrap();
        assert_eq!(record.text_layers, elements);
        assert_eq!(record.selected_text_layer_id, Some(ElementId::from("a")));
        assert_eq!(record.version, RECORD_VERSION);
        assert!(record.timestamp > 0);
    }

    #[test]
    fn missing_and_corrupt_records_load_as_none() {
        let (storage, adapter) = adapter();
        assert!(adapter.load().is_none());

        storage.set(STATE_KEY, "{\"textLayers\": [oops").unwrap();
        assert!(adapter.load().is_none());
    }

    #[test]
    fn legacy_record_without_version_loads() {
        let (storage, adapter) = adapter();
        storage
            .set(STATE_KEY, r#"{"textLayers":[],"selectedTextLayerId":null,"timestamp":5}"#)
            .unwrap();
        let record = adapter.load().unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.timestamp, 5);
    }

    #[test]
    fn write_failure_is_swallowed() {
        let storage = Arc::new(MemoryStorage::failing());
        let adapter = PersistenceAdapter::new(storage.clone());
        adapter.save(&[TextElement::default()], None);
        assert!(!storage.contains(STATE_KEY));
    }

    #[test]
    fn clear_removes_record() {
        let (storage, adapter) = adapter();
        adapter.save(&[], None);
        assert!(storage.contains(STATE_KEY));
        adapter.clear();
        assert!(adapter.load().is_none());
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));
        assert_eq!(storage.get(STATE_KEY).unwrap(), None);

        storage.set(STATE_KEY, "hello").unwrap();
        assert_eq!(storage.get(STATE_KEY).unwrap().as_deref(), Some("hello"));
        assert!(dir.path().join("state").join("image-text-composer-state.json").exists());

        storage.remove(STATE_KEY).unwrap();
        storage.remove(STATE_KEY).unwrap();
        assert_eq!(storage.get(STATE_KEY).unwrap(), None);
    }
}
