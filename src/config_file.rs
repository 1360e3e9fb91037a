//! Remembered user preferences.
//!
//! Only the maketx location is persisted. It lives in
//! `<config dir>/tx-converter/settings.json`, e.g. `~/.config/tx-converter/settings.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Preferences {
    /// Path to the maketx executable picked last time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maketx: Option<PathBuf>,
}

/// Where preferences are read from and written to
pub trait PreferenceStore {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, prefs: &Preferences) -> Result<()>;
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the per-user config directory
    pub fn user_default() -> Result<Self> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(dir.join("tx-converter").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read preferences: {:?}", self.path))?;
        let prefs = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse preferences: {:?}", self.path))?;
        Ok(prefs)
    }

    fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let contents =
            serde_json::to_string_pretty(prefs).context("Failed to serialize preferences")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write preferences: {:?}", self.path))?;
        Ok(())
    }
}

/// Keeps preferences in memory; nothing touches the filesystem
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    prefs: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs: Mutex::new(prefs),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        let prefs = self
            .prefs
            .lock()
            .map_err(|_| anyhow::anyhow!("preference lock poisoned"))?;
        Ok(prefs.clone())
    }

    fn save(&self, prefs: &Preferences) -> Result<()> {
        let mut current = self
            .prefs
            .lock()
            .map_err(|_| anyhow::anyhow!("preference lock poisoned"))?;
        *current = prefs.clone();
        Ok(())
    }
}

/// Remember `maketx` as the converter, keeping any other stored settings
pub fn remember_converter(store: &dyn PreferenceStore, maketx: &Path) -> Result<()> {
    let mut prefs = store.load().unwrap_or_default();
    if prefs.maketx.as_deref() == Some(maketx) {
        return Ok(());
    }
    prefs.maketx = Some(maketx.to_path_buf());
    store.save(&prefs)
}
