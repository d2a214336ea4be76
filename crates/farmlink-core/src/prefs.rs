//! User preference persistence.
//!
//! The console persists exactly one preference: the display theme. Storage
//! is delegated to a key-value [`PreferenceStore`] collaborator so the
//! engine stays agnostic of where the value lives. [`FilePreferences`]
//! keeps a small TOML table on disk; [`MemoryPreferences`] backs tests and
//! ephemeral sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Preference key for the display theme.
pub const THEME_KEY: &str = "theme";

/// Display theme of the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Parse a stored value; anything unrecognized falls back to the
    /// default theme rather than failing startup.
    pub fn from_stored(value: &str) -> Theme {
        match value {
            "light" => Theme::Light,
            _ => Theme::Dark,
        }
    }

    /// The other theme.
    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Key-value store for user preferences.
///
/// Implementations must tolerate unknown keys (return `Ok(None)`) and are
/// expected to persist synchronously; the engine only stores tiny values.
pub trait PreferenceStore: Send + Sync {
    /// Read a stored value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, creating the key if needed.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// TOML-file-backed preference store.
///
/// The whole table is rewritten on each set; preferences are a handful of
/// short strings so this stays cheap.
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    /// Store preferences at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store preferences in the platform config directory,
    /// e.g. `~/.config/farmlink/preferences.toml` on Linux.
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Preferences("no config directory available".to_string()))?;
        Ok(Self::at(base.join("farmlink").join("preferences.toml")))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| Error::Preferences(format!("corrupt preference file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_table(&self, table: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string(table)
            .map_err(|e| Error::Preferences(format!("unserializable preferences: {e}")))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_table()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut table = self.read_table()?;
        table.insert(key.to_string(), value.to_string());
        self.write_table(&table)?;
        debug!(key, value, "stored preference");
        Ok(())
    }
}

/// In-memory preference store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryPreferences {
    table: StdMutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let table = self
            .table
            .lock()
            .map_err(|_| Error::Preferences("preference store poisoned".to_string()))?;
        Ok(table.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| Error::Preferences("preference store poisoned".to_string()))?;
        table.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
