//! Persisted panel configuration.
//!
//! A single JSON record at a fixed path under the platform config
//! directory, round-tripped verbatim. Missing fields pick up the defaults
//! so older or hand-edited files keep loading.

use crate::model::{DEFAULT_COUNT, DEFAULT_DELAY_SECS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_delay")]
    pub delay: u32,
}

fn default_count() -> u32 {
    DEFAULT_COUNT
}

fn default_delay() -> u32 {
    DEFAULT_DELAY_SECS
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            message: String::new(),
            url: String::new(),
            count: DEFAULT_COUNT,
            delay: DEFAULT_DELAY_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Self {
        let path = dirs::config_dir()
            .map(|d| d.join("share-console").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("share-console-config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    /// Load the saved record, or the defaults when the file is missing or
    /// unreadable.
    pub fn load(&self) -> PanelConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<PanelConfig>(&bytes) {
                return cfg;
            }
        }
        PanelConfig::default()
    }

    /// Write the record, returning the path it was saved to.
    pub fn save(&self, cfg: &PanelConfig) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
            .with_context(|| format!("writing config {}", self.path.display()))?;
        Ok(self.path.clone())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_reproduces_record_exactly() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));
        let cfg = PanelConfig {
            message: "hi".into(),
            url: "http://x".into(),
            count: 3,
            delay: 7,
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("absent.json"));
        let cfg = store.load();
        assert_eq!(cfg, PanelConfig::default());
        assert_eq!(cfg.count, DEFAULT_COUNT);
        assert_eq!(cfg.delay, DEFAULT_DELAY_SECS);
    }

    #[test]
    fn partial_record_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"message": "only this"}"#).unwrap();
        let cfg = ConfigStore::with_path(&path).load();
        assert_eq!(cfg.message, "only this");
        assert_eq!(cfg.url, "");
        assert_eq!(cfg.count, DEFAULT_COUNT);
        assert_eq!(cfg.delay, DEFAULT_DELAY_SECS);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(ConfigStore::with_path(&path).load(), PanelConfig::default());
    }
}
