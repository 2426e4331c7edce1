//! Data migration tests
//!
//! Records move between the plaintext and encrypted stores all at once or
//! not at all, and the losing side is deleted only after a commit.

use seen_core::{Note, Phq9Assessment, Phq9Response, Phq9Result};
use seen_storage_sqlite::{
    DataMigrationManager, Database, Error, ErrorKind, KeyManager, MockKeystore, Repository,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    keys: Arc<KeyManager>,
    manager: DataMigrationManager,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let keys = Arc::new(KeyManager::new(Arc::new(MockKeystore::new())));
    let manager = DataMigrationManager::new(
        dir.path().join("seen.db"),
        dir.path().join("seen_encrypted.db"),
        keys.clone(),
    );
    Fixture {
        _dir: dir,
        keys,
        manager,
    }
}

impl Fixture {
    fn open_plain(&self) -> Database {
        Database::open_plain(self.manager.plain_path()).unwrap()
    }

    fn open_encrypted(&self) -> Database {
        let key = self.keys.get_or_create_key().unwrap();
        Database::open_encrypted(self.manager.encrypted_path(), &key).unwrap()
    }
}

/// Insert `notes` notes, `results` PHQ-9 summaries and `responses` PHQ-9 responses
fn seed(db: &Database, notes: usize, results: usize, responses: usize) {
    let repo = Repository::new(db);
    for i in 0..notes {
        let mood = if i % 2 == 0 { Some(format!("mood {}", i)) } else { None };
        let note = Note::with_timestamp(format!("note {}", i), mood, 1_000 + i as i64).unwrap();
        repo.insert_note(&note).unwrap();
    }
    for i in 0..results {
        let answers = [(i % 4) as u8; 9];
        let assessment = Phq9Assessment::from_answers(&answers).unwrap();
        repo.insert_phq9_result(&Phq9Result::from_assessment(&assessment, 2_000 + i as i64))
            .unwrap();
    }
    for i in 0..responses {
        let mut answers = [0u8; 9];
        answers[i % 9] = 3;
        let assessment = Phq9Assessment::from_answers(&answers).unwrap();
        repo.insert_phq9_response(&Phq9Response::from_assessment(&assessment, 3_000 + i as i64))
            .unwrap();
    }
}

/// All record fields except ids, newest first
fn contents(db: &Database) -> (Vec<Note>, Vec<Phq9Result>, Vec<Phq9Response>) {
    let repo = Repository::new(db);
    let strip_note = |mut n: Note| {
        n.id = None;
        n
    };
    let strip_result = |mut r: Phq9Result| {
        r.id = None;
        r
    };
    let strip_response = |mut r: Phq9Response| {
        r.id = None;
        r
    };
    (
        repo.list_notes().unwrap().into_iter().map(strip_note).collect(),
        repo.list_phq9_results().unwrap().into_iter().map(strip_result).collect(),
        repo.list_phq9_responses().unwrap().into_iter().map(strip_response).collect(),
    )
}

fn counts(db: &Database) -> (i64, i64, i64) {
    (
        db.count_rows("notes").unwrap(),
        db.count_rows("phq9_results").unwrap(),
        db.count_rows("phq9_responses").unwrap(),
    )
}

#[test]
fn test_round_trip_to_encrypted() {
    let fx = fixture();
    let expected = {
        let plain = fx.open_plain();
        seed(&plain, 5, 3, 4);
        let expected = contents(&plain);
        plain.close().unwrap();
        expected
    };

    let report = fx.manager.migrate_to_encrypted("1234").unwrap();
    assert_eq!((report.notes, report.phq9_results, report.phq9_responses), (5, 3, 4));
    assert!(report.source_removed);
    assert!(!fx.manager.plain_path().exists());

    let encrypted = fx.open_encrypted();
    assert_eq!(counts(&encrypted), (5, 3, 4));
    assert_eq!(contents(&encrypted), expected);
}

#[test]
fn test_round_trip_back_to_plaintext() {
    let fx = fixture();
    let expected = {
        let plain = fx.open_plain();
        seed(&plain, 3, 2, 2);
        contents(&plain)
    };

    fx.manager.migrate_to_encrypted("1234").unwrap();
    let report = fx.manager.migrate_to_unencrypted("1234").unwrap();
    assert_eq!(report.total(), 7);
    assert!(report.source_removed);
    assert!(!fx.manager.encrypted_path().exists());

    let plain = fx.open_plain();
    assert_eq!(contents(&plain), expected);
}

#[test]
fn test_reverse_migration_twice_does_not_duplicate() {
    let fx = fixture();
    seed(&fx.open_plain(), 4, 1, 1);
    fx.manager.migrate_to_encrypted("1234").unwrap();

    fx.manager.migrate_to_unencrypted("1234").unwrap();
    let second = fx.manager.migrate_to_unencrypted("1234").unwrap();
    assert_eq!(second.total(), 0);

    assert_eq!(counts(&fx.open_plain()), (4, 1, 1));
}

#[test]
fn test_reverse_migration_replaces_plaintext_rows() {
    let fx = fixture();
    seed(&fx.open_encrypted(), 2, 0, 0);
    // Stale rows left behind in the plaintext store.
    seed(&fx.open_plain(), 6, 2, 0);

    fx.manager.migrate_to_unencrypted("1234").unwrap();

    assert_eq!(counts(&fx.open_plain()), (2, 0, 0));
}

#[test]
fn test_forward_migration_appends_to_existing_target() {
    let fx = fixture();
    seed(&fx.open_encrypted(), 1, 0, 0);
    seed(&fx.open_plain(), 2, 0, 0);

    let report = fx.manager.migrate_to_encrypted("1234").unwrap();
    assert_eq!(report.notes, 2);
    assert_eq!(counts(&fx.open_encrypted()), (3, 0, 0));
}

#[test]
fn test_failed_forward_migration_is_atomic() {
    let fx = fixture();
    {
        let plain = fx.open_plain();
        seed(&plain, 3, 2, 2);
    }
    {
        // Fault injected into the second table so the first has already copied.
        let encrypted = fx.open_encrypted();
        encrypted
            .conn()
            .execute_batch(
                "CREATE TRIGGER fail_results BEFORE INSERT ON phq9_results
                 BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
            )
            .unwrap();
    }

    let err = fx.manager.migrate_to_encrypted("1234").unwrap_err();
    assert!(matches!(err, Error::MigrationFailed(_)));
    assert_eq!(err.kind(), ErrorKind::MigrationFailed);

    assert_eq!(counts(&fx.open_encrypted()), (0, 0, 0));
    assert!(fx.manager.plain_path().exists());
    assert_eq!(counts(&fx.open_plain()), (3, 2, 2));
}

#[test]
fn test_failed_reverse_migration_is_atomic() {
    let fx = fixture();
    seed(&fx.open_encrypted(), 2, 1, 1);
    {
        let plain = fx.open_plain();
        seed(&plain, 5, 0, 0);
        plain
            .conn()
            .execute_batch(
                "CREATE TRIGGER fail_results BEFORE INSERT ON phq9_results
                 BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
            )
            .unwrap();
    }

    let err = fx.manager.migrate_to_unencrypted("1234").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MigrationFailed);

    // The clearing DELETE rolled back with everything else.
    assert_eq!(counts(&fx.open_plain()), (5, 0, 0));
    assert!(fx.manager.encrypted_path().exists());
    assert_eq!(counts(&fx.open_encrypted()), (2, 1, 1));
}

#[test]
fn test_invalid_pin_rejected_before_io() {
    let fx = fixture();
    seed(&fx.open_plain(), 1, 0, 0);

    for pin in ["", "123", "1234567", "12a4"] {
        let err = fx.manager.migrate_to_encrypted(pin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPin);
    }
    assert!(!fx.manager.encrypted_path().exists());
    assert!(fx.keys.current_key().unwrap().is_none());
}

#[test]
fn test_has_data_on_empty_databases() {
    let fx = fixture();
    fx.open_plain().close().unwrap();
    fx.open_encrypted().close().unwrap();

    assert!(!fx.manager.has_unencrypted_data());
    assert!(!fx.manager.has_encrypted_data("1234"));
}

#[test]
fn test_has_data_after_any_row() {
    let fx = fixture();
    seed(&fx.open_plain(), 0, 0, 1);
    seed(&fx.open_encrypted(), 0, 1, 0);

    assert!(fx.manager.has_unencrypted_data());
    assert!(fx.manager.has_encrypted_data("1234"));
    assert!(!fx.manager.has_encrypted_data("12"));
}

#[test]
fn test_has_encrypted_data_with_wrong_key_is_false() {
    let fx = fixture();
    {
        let db = Database::open_encrypted(
            fx.manager.encrypted_path(),
            &seen_storage_sqlite::SymmetricKey::generate(),
        )
        .unwrap();
        seed(&db, 1, 0, 0);
    }
    fx.keys.get_or_create_key().unwrap();

    assert!(!fx.manager.has_encrypted_data("1234"));
}

#[test]
fn test_plaintext_without_some_tables_migrates() {
    let fx = fixture();
    {
        let conn = rusqlite::Connection::open(fx.manager.plain_path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, content TEXT NOT NULL,
                                 timestamp INTEGER NOT NULL, mood TEXT);
             INSERT INTO notes (content, timestamp) VALUES ('old', 1);",
        )
        .unwrap();
    }

    let report = fx.manager.migrate_to_encrypted("1234").unwrap();
    assert_eq!(report.notes, 1);
    assert_eq!(report.phq9_results, 0);
    assert_eq!(counts(&fx.open_encrypted()), (1, 0, 0));
}
