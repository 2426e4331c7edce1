//! Database connection and initialization
//!
//! One handle type serves both stores. Encrypted handles are SQLCipher
//! connections keyed with the keystore key; plain handles never see
//! `PRAGMA key` and read ordinary SQLite files.

use crate::{encryption::SymmetricKey, migrations, Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
    path: PathBuf,
    encrypted: bool,
}

impl Database {
    /// Open (creating if needed) a plaintext database and migrate its schema
    pub fn open_plain<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::open_with(path.as_ref(), None, read_write_flags())?;
        migrations::run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open (creating if needed) an encrypted database and migrate its schema
    pub fn open_encrypted<P: AsRef<Path>>(path: P, key: &SymmetricKey) -> Result<Self> {
        let db = Self::open_with(path.as_ref(), Some(key), read_write_flags())?;
        migrations::run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an existing plaintext database without write access
    pub fn open_plain_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), None, read_only_flags())
    }

    /// Open an existing encrypted database without write access
    pub fn open_encrypted_read_only<P: AsRef<Path>>(path: P, key: &SymmetricKey) -> Result<Self> {
        Self::open_with(path.as_ref(), Some(key), read_only_flags())
    }

    fn open_with(path: &Path, key: Option<&SymmetricKey>, flags: OpenFlags) -> Result<Self> {
        let db_exists = path.exists();
        if let Some(parent) = path.parent() {
            if !db_exists && !parent.as_os_str().is_empty() && flags.contains(OpenFlags::SQLITE_OPEN_CREATE) {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(path, flags)?;

        if let Some(key) = key {
            // PRAGMA key must be the first statement on the connection, or
            // SQLCipher treats the file as unencrypted.
            apply_key(&conn, "key", key)?;
            verify_cipher(&conn)?;
        }

        if db_exists {
            // Wrong key (or a non-database file) fails here rather than on
            // the first real query.
            let readable: std::result::Result<i64, rusqlite::Error> =
                conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0));
            if let Err(e) = readable {
                return Err(Error::Encryption(format!(
                    "Cannot read database {}: {}. It may be corrupted or use a different key.",
                    path.display(),
                    e
                )));
            }
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            encrypted: key.is_some(),
        })
    }

    /// Get connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// On-disk location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle was opened with a key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Rekey database with a new encryption key
    pub fn rekey(&self, new_key: &SymmetricKey) -> Result<()> {
        if !self.encrypted {
            return Err(Error::Encryption(
                "Cannot rekey a plaintext database".to_string(),
            ));
        }
        apply_key(&self.conn, "rekey", new_key)
    }

    /// Begin transaction
    pub fn transaction(&mut self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Whether a table exists
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Row count of a table. Table names come from a fixed list, never input.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Close the connection, surfacing any close error
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }
}

fn read_write_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn read_only_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn apply_key(conn: &Connection, pragma: &str, key: &SymmetricKey) -> Result<()> {
    let key_hex = key.to_hex();
    // Raw-key form: the keystore key is already 256 random bits, so
    // SQLCipher's passphrase KDF is skipped.
    let statement = Zeroizing::new(format!("PRAGMA {} = \"x'{}'\";", pragma, key_hex.as_str()));
    conn.execute_batch(&statement).map_err(|e| {
        Error::Encryption(format!("Failed to apply database {}: {}", pragma, e))
    })
}

fn verify_cipher(conn: &Connection) -> Result<()> {
    let cipher_version: std::result::Result<String, rusqlite::Error> =
        conn.query_row("PRAGMA cipher_version", [], |row| row.get(0));

    match cipher_version {
        Ok(version) if !version.is_empty() => {
            tracing::debug!("SQLCipher version: {}", version);
            Ok(())
        }
        _ => Err(Error::Encryption(
            "SQLCipher encryption verification failed. Database may not be encrypted.".to_string(),
        )),
    }
}

/// Outcome of deleting a database and its sidecar files
#[derive(Debug, Default, Clone)]
pub struct RemovalReport {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted
    pub failed: Vec<PathBuf>,
}

impl RemovalReport {
    /// True if nothing failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete a database file and its `<name>-*` siblings (`-journal`, `-wal`,
/// `-shm`). Best effort: failures are logged, not returned.
pub fn remove_database_files(path: &Path) -> RemovalReport {
    let mut report = RemovalReport::default();

    let Some(base_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return report;
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot list {} for cleanup: {}", dir.display(), e);
            return report;
        }
    };

    let sidecar_prefix = format!("{}-", base_name);
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != base_name && !name.starts_with(&sidecar_prefix) {
            continue;
        }
        let candidate = entry.path();
        if candidate.is_dir() {
            continue;
        }
        match fs::remove_file(&candidate) {
            Ok(()) => {
                tracing::debug!("Removed {}", candidate.display());
                report.removed.push(candidate);
            }
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", candidate.display(), e);
                report.failed.push(candidate);
            }
        }
    }

    report
}
