//! Encryption settings state machine
//!
//! State is derived from two preferences: the enabled flag and the stored
//! PIN hash. Every transition that moves data runs the migration first and
//! only then writes the preferences, so a failed migration leaves the state
//! as it was.

use crate::config::StorageConfig;
use crate::data_migration::{DataMigrationManager, MigrationReport};
use crate::database::Database;
use crate::key_manager::{KeyManager, LegacyKeyOutcome};
use crate::keystore::PlatformKeystore;
use crate::pin::{hash_pin, is_valid_pin, verify_pin};
use crate::preferences::{PreferenceStore, KEY_ENCRYPTION_ENABLED, KEY_PIN_HASH};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Encryption state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionState {
    /// Records live in the plaintext store
    Disabled,
    /// Encryption flagged on but no PIN stored yet
    SetupRequired,
    /// Records live in the encrypted store behind a PIN
    Enabled,
}

impl fmt::Display for EncryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionState::Disabled => write!(f, "disabled"),
            EncryptionState::SetupRequired => write!(f, "setup_required"),
            EncryptionState::Enabled => write!(f, "enabled"),
        }
    }
}

/// Drives encryption setup, teardown and PIN changes
pub struct EncryptionSettingsManager {
    prefs: Arc<dyn PreferenceStore>,
    keys: Arc<KeyManager>,
    migration: DataMigrationManager,
    // Serializes every operation touching the stores or preferences.
    lock: Mutex<()>,
}

impl EncryptionSettingsManager {
    /// Manager over explicit collaborators
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        keys: Arc<KeyManager>,
        migration: DataMigrationManager,
    ) -> Self {
        Self {
            prefs,
            keys,
            migration,
            lock: Mutex::new(()),
        }
    }

    /// Manager over the configured paths and aliases. The config is
    /// validated first.
    pub fn from_config(
        config: &StorageConfig,
        keystore: Arc<dyn PlatformKeystore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Result<Self> {
        config.validate()?;
        let keys = Arc::new(KeyManager::with_aliases(
            keystore,
            config.key_alias.clone(),
            config.legacy_key_alias.clone(),
        ));
        let migration = DataMigrationManager::from_config(config, keys.clone());
        Ok(Self::new(prefs, keys, migration))
    }

    /// Underlying migration manager
    pub fn migration(&self) -> &DataMigrationManager {
        &self.migration
    }

    fn state(&self) -> Result<EncryptionState> {
        if !self.prefs.get_bool(KEY_ENCRYPTION_ENABLED)? {
            return Ok(EncryptionState::Disabled);
        }
        match self.prefs.get_string(KEY_PIN_HASH)? {
            Some(hash) if !hash.is_empty() => Ok(EncryptionState::Enabled),
            _ => Ok(EncryptionState::SetupRequired),
        }
    }

    fn check_pin(&self, pin: &str) -> Result<()> {
        match self.prefs.get_string(KEY_PIN_HASH)? {
            Some(stored) if verify_pin(pin, &stored) => Ok(()),
            _ => Err(Error::VerificationFailed),
        }
    }

    /// Current state
    pub fn get_encryption_status(&self) -> Result<EncryptionState> {
        let _guard = self.lock.lock();
        self.state()
    }

    /// True iff the app must ask for the PIN before showing records
    pub fn requires_pin_on_startup(&self) -> Result<bool> {
        Ok(self.get_encryption_status()? == EncryptionState::Enabled)
    }

    /// Encrypt existing records under a new PIN
    pub fn setup_encryption(&self, pin: &str) -> Result<MigrationReport> {
        if !is_valid_pin(pin) {
            return Err(Error::InvalidPin);
        }

        let _guard = self.lock.lock();
        let state = self.state()?;
        if state == EncryptionState::Enabled {
            return Err(Error::InvalidState(
                "Encryption is already enabled".to_string(),
            ));
        }

        let report = self.migration.migrate_to_encrypted(pin)?;

        self.prefs.set_string(KEY_PIN_HASH, &hash_pin(pin))?;
        self.prefs.set_bool(KEY_ENCRYPTION_ENABLED, true)?;
        tracing::info!("Encryption enabled (from {}), {} records moved", state, report.total());
        Ok(report)
    }

    /// Decrypt records back to the plaintext store and forget the PIN
    pub fn disable_encryption(&self, pin: &str) -> Result<MigrationReport> {
        if !is_valid_pin(pin) {
            return Err(Error::InvalidPin);
        }

        let _guard = self.lock.lock();
        self.check_pin(pin)?;

        let report = self.migration.migrate_to_unencrypted(pin)?;

        self.prefs.set_bool(KEY_ENCRYPTION_ENABLED, false)?;
        self.prefs.remove(KEY_PIN_HASH)?;
        tracing::info!("Encryption disabled, {} records moved", report.total());
        Ok(report)
    }

    /// Replace the stored PIN. Records stay where they are; the database
    /// key does not depend on the PIN.
    pub fn change_pin(&self, current_pin: &str, new_pin: &str) -> Result<()> {
        if !is_valid_pin(current_pin) || !is_valid_pin(new_pin) {
            return Err(Error::InvalidPin);
        }

        let _guard = self.lock.lock();
        self.check_pin(current_pin)?;
        self.prefs.set_string(KEY_PIN_HASH, &hash_pin(new_pin))?;
        tracing::info!("PIN changed");
        Ok(())
    }

    /// Check the PIN at the startup gate
    pub fn unlock(&self, pin: &str) -> Result<()> {
        if !is_valid_pin(pin) {
            return Err(Error::InvalidPin);
        }
        let _guard = self.lock.lock();
        self.check_pin(pin)
    }

    /// Open whichever store currently holds the records. The PIN is
    /// required, and checked, only while encryption is enabled.
    pub fn open_active_database(&self, pin: Option<&str>) -> Result<Database> {
        let _guard = self.lock.lock();
        match self.state()? {
            EncryptionState::Enabled => {
                let pin = pin.ok_or(Error::VerificationFailed)?;
                if !is_valid_pin(pin) {
                    return Err(Error::InvalidPin);
                }
                self.check_pin(pin)?;
                let key = self.keys.current_key()?.ok_or_else(|| {
                    Error::Keystore("Database key missing from keystore".to_string())
                })?;
                Database::open_encrypted(self.migration.encrypted_path(), &key)
            }
            EncryptionState::Disabled | EncryptionState::SetupRequired => {
                Database::open_plain(self.migration.plain_path())
            }
        }
    }

    /// Application startup hook: retire any legacy key, then report state.
    /// A legacy key that cannot be upgraded is kept and logged.
    pub fn startup(&self) -> Result<EncryptionState> {
        let _guard = self.lock.lock();

        match self.keys.upgrade_legacy_key(self.migration.encrypted_path()) {
            Ok(LegacyKeyOutcome::NotPresent) => {}
            Ok(outcome) => tracing::info!("Legacy key upgrade: {:?}", outcome),
            Err(e) => tracing::warn!("Legacy key kept: {}", e),
        }

        let state = self.state()?;
        tracing::info!("Encryption state at startup: {}", state);
        Ok(state)
    }
}
