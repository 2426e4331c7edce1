//! Local storage for Seen
//!
//! Records live in one of two SQLite databases: a plaintext store, or a
//! SQLCipher store keyed with a 256-bit key held by the platform keystore.
//! Turning encryption on or off moves every record between the two inside
//! a single transaction and then deletes the losing side.
//!
//! ## Security Model
//!
//! - **Database Encryption**: SQLCipher page encryption with a raw keystore key
//! - **Key Storage**: Platform keystores, with an owner-only file backend for desktop
//! - **PIN Gate**: Salted SHA-256 hash of a 4-6 digit PIN, checked before access
//! - **Legacy Keys**: Re-keyed in place before the old alias is removed

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod data_migration;
pub mod database;
pub mod encryption;
pub mod error;
mod files;
pub mod key_manager;
pub mod keystore;
pub mod migrations;
pub mod pin;
pub mod preferences;
pub mod repository;
pub mod settings;

pub use config::{StorageConfig, CONFIG_FILE_NAME, DATA_DIR_ENV};
pub use data_migration::{DataMigrationManager, MigrationDirection, MigrationReport};
pub use database::{remove_database_files, Database, RemovalReport};
pub use encryption::{KeyAlgorithm, SymmetricKey, KEY_LEN};
pub use error::{Error, ErrorKind, Result};
pub use key_manager::{KeyManager, LegacyKeyOutcome, DEFAULT_KEY_ALIAS, LEGACY_KEY_ALIAS};
pub use keystore::{
    FileKeystore, KeystoreCapabilities, MockKeystore, Platform, PlatformKeystore, StoredKey,
};
pub use migrations::{get_schema_version, run_migrations, SCHEMA_VERSION};
pub use pin::{hash_pin, is_valid_pin, verify_pin, MAX_PIN_LEN, MIN_PIN_LEN, SALT_LEN};
pub use preferences::{
    JsonPreferences, MemoryPreferences, PreferenceStore, KEY_ENCRYPTION_ENABLED, KEY_PIN_HASH,
};
pub use repository::Repository;
pub use settings::{EncryptionSettingsManager, EncryptionState};
