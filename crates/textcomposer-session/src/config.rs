//! Editor configuration.
//!
//! Read from `$XDG_CONFIG_HOME/textcomposer/config.json` (or
//! `~/.config/textcomposer/config.json`). Every field has a default, and a
//! missing or unreadable file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use textcomposer_core::DEFAULT_HISTORY_CAPACITY;
use tracing::warn;

use crate::debounce::DEFAULT_DEBOUNCE_WINDOW;

/// Get the default directory for persisted editor state
pub fn default_storage_dir() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });
    data_dir.join("textcomposer")
}

/// Get the config file path
pub fn default_config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
    config_dir.join("textcomposer").join("config.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// History entries kept, including the initial state
    pub history_capacity: usize,
    /// Quiescence window for debounced text and slider commits
    pub debounce_window_ms: u64,
    /// Distance moved by one arrow-key nudge
    pub nudge_step: f64,
    /// Distance from the canvas centre at which drags snap to it
    pub snap_threshold: f64,
    /// Smallest width/height a transform may produce
    pub min_transform_size: f64,
    pub max_canvas_width: u32,
    pub max_canvas_height: u32,
    /// Where state is persisted; `None` means [`default_storage_dir`]
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            debounce_window_ms: DEFAULT_DEBOUNCE_WINDOW.as_millis() as u64,
            nudge_step: 1.0,
            snap_threshold: 10.0,
            min_transform_size: 20.0,
            max_canvas_width: 800,
            max_canvas_height: 600,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load from the default config path, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_default(&default_config_path())
    }

    /// Load from `path`, falling back to defaults if it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(default_storage_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce_window(), Duration::from_millis(300));
        assert_eq!(config.history_capacity, 20);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "history_capacity": 50, "nudge_step": 10 }"#).unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.nudge_step, 10.0);
        assert_eq!(config.debounce_window_ms, 300);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
