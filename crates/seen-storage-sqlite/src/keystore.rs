//! Platform keystore integration
//!
//! Provides a unified interface to platform-specific secure storage:
//! - Android: Keystore (AES-256-GCM keys, StrongBox when present)
//! - iOS/macOS: Keychain
//! - Desktop development: [`FileKeystore`], an owner-only JSON file
//!
//! The database key lives here, independent of the user's PIN.

use crate::encryption::{KeyAlgorithm, SymmetricKey};
use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Platform capabilities for secure storage
#[derive(Debug, Clone)]
pub struct KeystoreCapabilities {
    /// Has hardware-backed secure storage (TEE, StrongBox, Secure Enclave)
    pub has_secure_hardware: bool,
    /// Keys survive process restarts
    pub persistent: bool,
    /// Platform name
    pub platform: Platform,
}

impl Default for KeystoreCapabilities {
    fn default() -> Self {
        Self {
            has_secure_hardware: false,
            persistent: false,
            platform: Platform::Unknown,
        }
    }
}

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Android (Keystore, StrongBox)
    Android,
    /// iOS (Keychain, Secure Enclave)
    Ios,
    /// macOS (Keychain)
    MacOs,
    /// Windows (DPAPI)
    Windows,
    /// Linux (libsecret)
    Linux,
    /// Unknown platform
    Unknown,
}

impl Platform {
    /// Detect current platform at runtime
    pub fn current() -> Self {
        #[cfg(target_os = "android")]
        return Platform::Android;

        #[cfg(target_os = "ios")]
        return Platform::Ios;

        #[cfg(target_os = "macos")]
        return Platform::MacOs;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(target_os = "linux")]
        return Platform::Linux;

        #[cfg(not(any(
            target_os = "android",
            target_os = "ios",
            target_os = "macos",
            target_os = "windows",
            target_os = "linux"
        )))]
        return Platform::Unknown;
    }
}

/// Key plus the algorithm it was provisioned for
#[derive(Debug, Clone)]
pub struct StoredKey {
    /// Provisioned algorithm
    pub algorithm: KeyAlgorithm,
    /// Key material
    pub key: SymmetricKey,
}

impl StoredKey {
    /// New stored key
    pub fn new(algorithm: KeyAlgorithm, key: SymmetricKey) -> Self {
        Self { algorithm, key }
    }
}

/// Platform keystore abstraction
///
/// Native builds bridge these calls to the OS key store. Aliases are opaque
/// names; a missing alias is `Ok(None)`, not an error.
pub trait PlatformKeystore: Send + Sync {
    /// Get platform capabilities
    fn capabilities(&self) -> KeystoreCapabilities;

    /// Look up a key by alias
    fn load_key(&self, alias: &str) -> Result<Option<StoredKey>>;

    /// Persist a key under an alias, replacing any previous entry
    fn store_key(&self, alias: &str, key: &StoredKey) -> Result<()>;

    /// Delete a key; deleting a missing alias succeeds
    fn delete_key(&self, alias: &str) -> Result<()>;
}

/// In-memory keystore for tests and platforms without native integration
pub struct MockKeystore {
    capabilities: KeystoreCapabilities,
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl MockKeystore {
    /// Create new mock keystore
    pub fn new() -> Self {
        Self {
            capabilities: KeystoreCapabilities {
                has_secure_hardware: false,
                persistent: false,
                platform: Platform::current(),
            },
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Create with custom capabilities (for testing)
    pub fn with_capabilities(capabilities: KeystoreCapabilities) -> Self {
        Self {
            capabilities,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored aliases
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// True if no aliases are stored
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl Default for MockKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformKeystore for MockKeystore {
    fn capabilities(&self) -> KeystoreCapabilities {
        self.capabilities.clone()
    }

    fn load_key(&self, alias: &str) -> Result<Option<StoredKey>> {
        Ok(self.keys.read().get(alias).cloned())
    }

    fn store_key(&self, alias: &str, key: &StoredKey) -> Result<()> {
        self.keys.write().insert(alias.to_string(), key.clone());
        Ok(())
    }

    fn delete_key(&self, alias: &str) -> Result<()> {
        self.keys.write().remove(alias);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    entries: HashMap<String, KeyFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyFileEntry {
    algorithm: KeyAlgorithm,
    key: String,
}

/// File-backed keystore for desktop builds
///
/// Keys are hex-encoded in a JSON file readable only by the owner. This is
/// a development backend: it offers no protection beyond file permissions.
pub struct FileKeystore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileKeystore {
    /// Open (or lazily create) the key file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<KeyFile> {
        if !self.path.exists() {
            return Ok(KeyFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Keystore(format!("Failed to parse key file: {}", e)))
    }

    fn write_file(&self, file: &KeyFile) -> Result<()> {
        let contents = serde_json::to_vec_pretty(file)?;
        crate::files::write_private_file(&self.path, &contents)
    }
}

impl PlatformKeystore for FileKeystore {
    fn capabilities(&self) -> KeystoreCapabilities {
        KeystoreCapabilities {
            has_secure_hardware: false,
            persistent: true,
            platform: Platform::current(),
        }
    }

    fn load_key(&self, alias: &str) -> Result<Option<StoredKey>> {
        let _guard = self.lock.read();
        let file = self.read_file()?;
        match file.entries.get(alias) {
            Some(entry) => {
                let key = SymmetricKey::from_hex(&entry.key)?;
                Ok(Some(StoredKey::new(entry.algorithm, key)))
            }
            None => Ok(None),
        }
    }

    fn store_key(&self, alias: &str, key: &StoredKey) -> Result<()> {
        let _guard = self.lock.write();
        let mut file = self.read_file()?;
        file.entries.insert(
            alias.to_string(),
            KeyFileEntry {
                algorithm: key.algorithm,
                key: key.key.to_hex().to_string(),
            },
        );
        self.write_file(&file)
    }

    fn delete_key(&self, alias: &str) -> Result<()> {
        let _guard = self.lock.write();
        let mut file = self.read_file()?;
        if file.entries.remove(alias).is_some() {
            self.write_file(&file)?;
        }
        Ok(())
    }
}
