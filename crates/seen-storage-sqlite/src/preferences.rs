//! Key-value preferences
//!
//! The settings manager keeps two values here: whether encryption is on and
//! the stored PIN hash. Platforms plug in their own store through
//! [`PreferenceStore`].

use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Encryption enabled flag
pub const KEY_ENCRYPTION_ENABLED: &str = "encryption_enabled";

/// Stored PIN hash
pub const KEY_PIN_HASH: &str = "pin_hash";

/// Persistent key-value store
pub trait PreferenceStore: Send + Sync {
    /// Read a flag; missing keys read as `false`
    fn get_bool(&self, key: &str) -> Result<bool>;

    /// Write a flag
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Read a string value
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value
    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key succeeds
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum PrefValue {
    Bool(bool),
    Text(String),
}

type PrefMap = BTreeMap<String, PrefValue>;

fn read_bool(map: &PrefMap, key: &str) -> Result<bool> {
    match map.get(key) {
        None => Ok(false),
        Some(PrefValue::Bool(value)) => Ok(*value),
        Some(PrefValue::Text(_)) => Err(Error::Preferences(format!("{} is not a flag", key))),
    }
}

fn read_string(map: &PrefMap, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None => Ok(None),
        Some(PrefValue::Text(value)) => Ok(Some(value.clone())),
        Some(PrefValue::Bool(_)) => Err(Error::Preferences(format!("{} is not a string", key))),
    }
}

/// In-memory preferences
#[derive(Default)]
pub struct MemoryPreferences {
    values: RwLock<PrefMap>,
}

impl MemoryPreferences {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, key: &str) -> Result<bool> {
        read_bool(&self.values.read(), key)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values.write().insert(key.to_string(), PrefValue::Bool(value));
        Ok(())
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        read_string(&self.values.read(), key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), PrefValue::Text(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Preferences persisted as a JSON object
///
/// Every write rewrites the whole file through a temp file and rename, so a
/// crash leaves either the old or the new contents.
pub struct JsonPreferences {
    path: PathBuf,
    values: RwLock<PrefMap>,
}

impl JsonPreferences {
    /// Load from `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::Preferences(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            PrefMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut PrefMap)) -> Result<()> {
        let mut values = self.values.write();
        let mut next = values.clone();
        apply(&mut next);
        let contents = serde_json::to_vec_pretty(&next)?;
        crate::files::write_private_file(&self.path, &contents)?;
        *values = next;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferences {
    fn get_bool(&self, key: &str) -> Result<bool> {
        read_bool(&self.values.read(), key)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), PrefValue::Bool(value));
        })
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        read_string(&self.values.read(), key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), PrefValue::Text(value.to_string()));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.values.read().contains_key(key) {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_preferences() {
        let prefs = MemoryPreferences::new();
        assert!(!prefs.get_bool(KEY_ENCRYPTION_ENABLED).unwrap());
        assert!(prefs.get_string(KEY_PIN_HASH).unwrap().is_none());

        prefs.set_bool(KEY_ENCRYPTION_ENABLED, true).unwrap();
        prefs.set_string(KEY_PIN_HASH, "abc").unwrap();
        assert!(prefs.get_bool(KEY_ENCRYPTION_ENABLED).unwrap());
        assert_eq!(prefs.get_string(KEY_PIN_HASH).unwrap().as_deref(), Some("abc"));

        prefs.remove(KEY_PIN_HASH).unwrap();
        prefs.remove(KEY_PIN_HASH).unwrap();
        assert!(prefs.get_string(KEY_PIN_HASH).unwrap().is_none());
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let prefs = MemoryPreferences::new();
        prefs.set_string(KEY_ENCRYPTION_ENABLED, "yes").unwrap();
        assert!(prefs.get_bool(KEY_ENCRYPTION_ENABLED).is_err());
    }

    #[test]
    fn test_json_preferences_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = JsonPreferences::open(&path).unwrap();
        prefs.set_bool(KEY_ENCRYPTION_ENABLED, true).unwrap();
        prefs.set_string(KEY_PIN_HASH, "deadbeef").unwrap();

        let reopened = JsonPreferences::open(&path).unwrap();
        assert!(reopened.get_bool(KEY_ENCRYPTION_ENABLED).unwrap());
        assert_eq!(
            reopened.get_string(KEY_PIN_HASH).unwrap().as_deref(),
            Some("deadbeef")
        );

        reopened.remove(KEY_PIN_HASH).unwrap();
        let again = JsonPreferences::open(&path).unwrap();
        assert!(again.get_string(KEY_PIN_HASH).unwrap().is_none());
    }

    #[test]
    fn test_json_preferences_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonPreferences::open(&path).is_err());
    }
}
