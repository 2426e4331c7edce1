//! Security tests for PIN hashing, key storage and database encryption
//!
//! Tests cover:
//! - Salted PIN hashes: round trip, non-collision, non-determinism
//! - PIN format validation
//! - Keystore-held database keys, including legacy key upgrade
//! - Encrypted database files holding no plaintext

use proptest::prelude::*;
use seen_storage_sqlite::{
    hash_pin, is_valid_pin, verify_pin, Database, FileKeystore, KeyAlgorithm, KeyManager,
    LegacyKeyOutcome, MockKeystore, PlatformKeystore, StoredKey, SymmetricKey, LEGACY_KEY_ALIAS,
    SALT_LEN,
};
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// PIN hashing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pin_round_trip(pin in "[0-9]{4,6}") {
        let stored = hash_pin(&pin);
        prop_assert!(verify_pin(&pin, &stored));
    }

    #[test]
    fn prop_distinct_pins_do_not_verify(a in "[0-9]{4,6}", b in "[0-9]{4,6}") {
        prop_assume!(a != b);
        prop_assert!(!verify_pin(&a, &hash_pin(&b)));
    }

    #[test]
    fn prop_hash_is_not_deterministic(pin in "[0-9]{4,6}") {
        let first = hash_pin(&pin);
        let second = hash_pin(&pin);
        prop_assert_ne!(&first, &second);
        prop_assert!(verify_pin(&pin, &first));
        prop_assert!(verify_pin(&pin, &second));
    }

    #[test]
    fn prop_valid_pins_accepted(pin in "[0-9]{4,6}") {
        prop_assert!(is_valid_pin(&pin));
    }

    #[test]
    fn prop_verify_never_panics(pin in "\\PC{0,8}", stored in "\\PC{0,160}") {
        let _ = verify_pin(&pin, &stored);
    }
}

#[test]
fn test_pin_format_table() {
    let cases = [
        ("1234", true),
        ("12345", true),
        ("123456", true),
        ("0000", true),
        ("123", false),
        ("1234567", false),
        ("12a4", false),
        ("", false),
        (" 1234", false),
        ("-123", false),
    ];
    for (pin, expected) in cases {
        assert_eq!(is_valid_pin(pin), expected, "pin {:?}", pin);
    }
}

#[test]
fn test_stored_hash_layout() {
    let stored = hash_pin("4242");
    assert_eq!(stored.len(), SALT_LEN * 4);
    assert!(stored.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert!(!verify_pin("0000", &stored));
}

// =============================================================================
// Keystore and key manager
// =============================================================================

#[test]
fn test_key_survives_file_keystore_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keystore.json");

    let first = KeyManager::new(Arc::new(FileKeystore::new(&path)))
        .get_or_create_key()
        .unwrap();
    let second = KeyManager::new(Arc::new(FileKeystore::new(&path)))
        .get_or_create_key()
        .unwrap();

    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_stored_key_debug_is_redacted() {
    let key = SymmetricKey::generate();
    let rendered = format!("{:?}", StoredKey::new(KeyAlgorithm::SqlcipherRaw, key.clone()));
    assert!(!rendered.contains(key.to_hex().as_str()));
}

#[test]
fn test_legacy_upgrade_preserves_records() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("seen_encrypted.db");
    let legacy = SymmetricKey::generate();

    let db = Database::open_encrypted(&db_path, &legacy).unwrap();
    for i in 0..3 {
        db.conn()
            .execute(
                "INSERT INTO notes (content, timestamp) VALUES (?1, ?2)",
                (format!("note {}", i), i as i64),
            )
            .unwrap();
    }
    db.close().unwrap();

    let keystore = Arc::new(MockKeystore::new());
    keystore
        .store_key(LEGACY_KEY_ALIAS, &StoredKey::new(KeyAlgorithm::Legacy, legacy))
        .unwrap();
    let manager = KeyManager::new(keystore.clone());

    assert_eq!(
        manager.upgrade_legacy_key(&db_path).unwrap(),
        LegacyKeyOutcome::Rekeyed
    );
    // A second run finds nothing left to do.
    assert_eq!(
        manager.upgrade_legacy_key(&db_path).unwrap(),
        LegacyKeyOutcome::NotPresent
    );

    let key = manager.get_or_create_key().unwrap();
    let db = Database::open_encrypted_read_only(&db_path, &key).unwrap();
    assert_eq!(db.count_rows("notes").unwrap(), 3);
}

#[test]
fn test_legacy_upgrade_after_interrupted_run() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("seen_encrypted.db");

    let keystore = Arc::new(MockKeystore::new());
    let manager = KeyManager::new(keystore.clone());
    let current = manager.get_or_create_key().unwrap();
    Database::open_encrypted(&db_path, &current)
        .unwrap()
        .close()
        .unwrap();

    // Legacy key still present although the database already moved on.
    keystore
        .store_key(
            LEGACY_KEY_ALIAS,
            &StoredKey::new(KeyAlgorithm::Legacy, SymmetricKey::generate()),
        )
        .unwrap();

    assert_eq!(
        manager.upgrade_legacy_key(&db_path).unwrap(),
        LegacyKeyOutcome::AlreadyCurrent
    );
    assert!(keystore.load_key(LEGACY_KEY_ALIAS).unwrap().is_none());
}

// =============================================================================
// Database encryption
// =============================================================================

#[test]
fn test_encrypted_file_has_no_plaintext() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("seen_encrypted.db");
    let key = SymmetricKey::generate();

    let db = Database::open_encrypted(&db_path, &key).unwrap();
    db.conn()
        .execute(
            "INSERT INTO notes (content, timestamp, mood) VALUES (?1, ?2, ?3)",
            ("a very private thought", 1i64, "anxious"),
        )
        .unwrap();
    db.close().unwrap();

    let bytes = std::fs::read(&db_path).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("a very private thought"));
    assert!(!text.contains("SQLite format 3"));
}

#[test]
fn test_plain_open_of_encrypted_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("seen_encrypted.db");
    Database::open_encrypted(&db_path, &SymmetricKey::generate())
        .unwrap()
        .close()
        .unwrap();

    assert!(Database::open_plain(&db_path).is_err());
}
