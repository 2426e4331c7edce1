//! Database key lifecycle
//!
//! The database key is generated once, held by the platform keystore and
//! never derived from the PIN. Earlier releases stored their key under a
//! different alias; [`KeyManager::upgrade_legacy_key`] moves an existing
//! encrypted database over to the current key before that alias is dropped.

use crate::database::Database;
use crate::encryption::{KeyAlgorithm, SymmetricKey};
use crate::keystore::{PlatformKeystore, StoredKey};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Alias of the current database key
pub const DEFAULT_KEY_ALIAS: &str = "seen_db_key_gcm";

/// Alias used by earlier releases
pub const LEGACY_KEY_ALIAS: &str = "seen_db_key";

/// What happened to a legacy key during upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKeyOutcome {
    /// No legacy key was stored
    NotPresent,
    /// Legacy key existed but no encrypted database did; key removed
    Discarded,
    /// Encrypted database re-keyed to the current key; legacy key removed
    Rekeyed,
    /// Database already opened with the current key; legacy key removed
    AlreadyCurrent,
}

/// Owns the database key stored in the platform keystore
pub struct KeyManager {
    keystore: Arc<dyn PlatformKeystore>,
    key_alias: String,
    legacy_alias: String,
}

impl KeyManager {
    /// Manager using the default aliases
    pub fn new(keystore: Arc<dyn PlatformKeystore>) -> Self {
        Self::with_aliases(keystore, DEFAULT_KEY_ALIAS, LEGACY_KEY_ALIAS)
    }

    /// Manager with explicit aliases
    pub fn with_aliases(
        keystore: Arc<dyn PlatformKeystore>,
        key_alias: impl Into<String>,
        legacy_alias: impl Into<String>,
    ) -> Self {
        Self {
            keystore,
            key_alias: key_alias.into(),
            legacy_alias: legacy_alias.into(),
        }
    }

    /// Current key alias
    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    /// Return the database key, provisioning it on first use
    pub fn get_or_create_key(&self) -> Result<SymmetricKey> {
        match self.keystore.load_key(&self.key_alias)? {
            Some(stored) if stored.algorithm == KeyAlgorithm::SqlcipherRaw => return Ok(stored.key),
            Some(stored) => {
                tracing::warn!(
                    "Key under {} has algorithm {}; replacing",
                    self.key_alias,
                    stored.algorithm.as_str()
                );
            }
            None => {}
        }

        let key = SymmetricKey::generate();
        self.keystore.store_key(
            &self.key_alias,
            &StoredKey::new(KeyAlgorithm::SqlcipherRaw, key.clone()),
        )?;
        tracing::info!("Provisioned database key {}", key.fingerprint());
        Ok(key)
    }

    /// The current key if one is provisioned; never creates one
    pub fn current_key(&self) -> Result<Option<SymmetricKey>> {
        Ok(self
            .keystore
            .load_key(&self.key_alias)?
            .filter(|stored| stored.algorithm == KeyAlgorithm::SqlcipherRaw)
            .map(|stored| stored.key))
    }

    /// Retire the legacy key, re-keying `encrypted_db` first if it exists.
    ///
    /// If neither the legacy nor the current key opens the database, the
    /// legacy key is kept and an error returned.
    pub fn upgrade_legacy_key(&self, encrypted_db: &Path) -> Result<LegacyKeyOutcome> {
        let Some(legacy) = self.keystore.load_key(&self.legacy_alias)? else {
            return Ok(LegacyKeyOutcome::NotPresent);
        };

        if !encrypted_db.exists() {
            self.keystore.delete_key(&self.legacy_alias)?;
            tracing::info!("Discarded unused legacy database key");
            return Ok(LegacyKeyOutcome::Discarded);
        }

        let current = self.get_or_create_key()?;

        match Database::open_encrypted(encrypted_db, &legacy.key) {
            Ok(db) => {
                db.rekey(&current)?;
                db.close()?;
                self.keystore.delete_key(&self.legacy_alias)?;
                tracing::info!(
                    "Re-keyed encrypted database from legacy key to {}",
                    current.fingerprint()
                );
                Ok(LegacyKeyOutcome::Rekeyed)
            }
            Err(legacy_err) => {
                // An interrupted earlier upgrade leaves the database on the current key.
                if Database::open_encrypted_read_only(encrypted_db, &current)
                    .and_then(Database::close)
                    .is_ok()
                {
                    self.keystore.delete_key(&self.legacy_alias)?;
                    tracing::info!("Encrypted database already uses current key; legacy key removed");
                    return Ok(LegacyKeyOutcome::AlreadyCurrent);
                }
                Err(Error::Keystore(format!(
                    "Legacy key cannot open {}: {}",
                    encrypted_db.display(),
                    legacy_err
                )))
            }
        }
    }
}
