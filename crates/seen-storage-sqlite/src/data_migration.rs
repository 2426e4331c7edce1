//! Moving records between the plaintext and encrypted stores
//!
//! A migration copies every row of every record table from the source
//! database into the target inside one target transaction. Ids are
//! reassigned by the target; all other columns are copied verbatim. The
//! source files are deleted only after the commit succeeds, so a failure at
//! any earlier point leaves the source exactly as it was.

use crate::config::StorageConfig;
use crate::database::{remove_database_files, Database};
use crate::key_manager::KeyManager;
use crate::pin::is_valid_pin;
use crate::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct TableSpec {
    table: &'static str,
    columns: &'static [&'static str],
}

/// Record tables in copy order
const MIGRATED_TABLES: [TableSpec; 3] = [
    TableSpec {
        table: "notes",
        columns: &["content", "timestamp", "mood"],
    },
    TableSpec {
        table: "phq9_results",
        columns: &["score", "level", "timestamp"],
    },
    TableSpec {
        table: "phq9_responses",
        columns: &[
            "q1",
            "q2",
            "q3",
            "q4",
            "q5",
            "q6",
            "q7",
            "q8",
            "q9",
            "total_score",
            "timestamp",
        ],
    },
];

/// Names of the record tables, in the order they are migrated
pub fn migrated_tables() -> impl Iterator<Item = &'static str> {
    MIGRATED_TABLES.iter().map(|spec| spec.table)
}

/// Which way records move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Plaintext store into encrypted store
    ToEncrypted,
    /// Encrypted store into plaintext store
    ToUnencrypted,
}

impl MigrationDirection {
    fn label(&self) -> &'static str {
        match self {
            MigrationDirection::ToEncrypted => "plaintext -> encrypted",
            MigrationDirection::ToUnencrypted => "encrypted -> plaintext",
        }
    }
}

/// Rows copied by one migration
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Notes copied
    pub notes: usize,
    /// PHQ-9 summaries copied
    pub phq9_results: usize,
    /// PHQ-9 detailed responses copied
    pub phq9_responses: usize,
    /// Whether every source file was deleted afterwards
    pub source_removed: bool,
}

impl MigrationReport {
    /// Total rows copied
    pub fn total(&self) -> usize {
        self.notes + self.phq9_results + self.phq9_responses
    }

    fn record(&mut self, table: &str, copied: usize) {
        match table {
            "notes" => self.notes = copied,
            "phq9_results" => self.phq9_results = copied,
            "phq9_responses" => self.phq9_responses = copied,
            _ => {}
        }
    }
}

/// Copies records between the two stores
pub struct DataMigrationManager {
    plain_path: PathBuf,
    encrypted_path: PathBuf,
    keys: Arc<KeyManager>,
}

impl DataMigrationManager {
    /// Manager over explicit database paths
    pub fn new(
        plain_path: impl Into<PathBuf>,
        encrypted_path: impl Into<PathBuf>,
        keys: Arc<KeyManager>,
    ) -> Self {
        Self {
            plain_path: plain_path.into(),
            encrypted_path: encrypted_path.into(),
            keys,
        }
    }

    /// Manager over the configured database paths
    pub fn from_config(config: &StorageConfig, keys: Arc<KeyManager>) -> Self {
        Self::new(config.plain_db_path(), config.encrypted_db_path(), keys)
    }

    /// Plaintext database path
    pub fn plain_path(&self) -> &Path {
        &self.plain_path
    }

    /// Encrypted database path
    pub fn encrypted_path(&self) -> &Path {
        &self.encrypted_path
    }

    /// Move every record from the plaintext store into the encrypted store
    pub fn migrate_to_encrypted(&self, pin: &str) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::ToEncrypted, pin)
    }

    /// Move every record from the encrypted store into the plaintext store,
    /// replacing whatever the plaintext store held
    pub fn migrate_to_unencrypted(&self, pin: &str) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::ToUnencrypted, pin)
    }

    fn migrate(&self, direction: MigrationDirection, pin: &str) -> Result<MigrationReport> {
        if !is_valid_pin(pin) {
            return Err(Error::InvalidPin);
        }

        tracing::info!("Starting data migration ({})", direction.label());

        let mut report = self.copy_records(direction).map_err(|e| {
            tracing::warn!("Data migration ({}) rolled back: {}", direction.label(), e);
            match e {
                Error::MigrationFailed(_) => e,
                other => Error::MigrationFailed(other.to_string()),
            }
        })?;

        let source = self.source_path(direction);
        report.source_removed = if source.exists() {
            remove_database_files(source).is_complete() && !source.exists()
        } else {
            true
        };

        tracing::info!(
            "Data migration ({}) complete: notes={}, phq9_results={}, phq9_responses={}, source_removed={}",
            direction.label(),
            report.notes,
            report.phq9_results,
            report.phq9_responses,
            report.source_removed
        );
        Ok(report)
    }

    fn source_path(&self, direction: MigrationDirection) -> &Path {
        match direction {
            MigrationDirection::ToEncrypted => &self.plain_path,
            MigrationDirection::ToUnencrypted => &self.encrypted_path,
        }
    }

    /// Everything up to and including the commit. Handles are closed before
    /// returning, on success and on error alike.
    fn copy_records(&self, direction: MigrationDirection) -> Result<MigrationReport> {
        let (source, mut target) = match direction {
            MigrationDirection::ToEncrypted => {
                let key = self.keys.get_or_create_key()?;
                let source = if self.plain_path.exists() {
                    Some(Database::open_plain_read_only(&self.plain_path)?)
                } else {
                    None
                };
                (source, Database::open_encrypted(&self.encrypted_path, &key)?)
            }
            MigrationDirection::ToUnencrypted => {
                let source = if self.encrypted_path.exists() {
                    let key = self.keys.current_key()?.ok_or_else(|| {
                        Error::MigrationFailed("No database key for the encrypted store".to_string())
                    })?;
                    Some(Database::open_encrypted_read_only(&self.encrypted_path, &key)?)
                } else {
                    None
                };
                (source, Database::open_plain(&self.plain_path)?)
            }
        };

        let mut report = MigrationReport::default();
        {
            let tx = target.transaction()?;

            // A missing source has nothing to move, so the target is left alone.
            if let Some(source) = source.as_ref() {
                if direction == MigrationDirection::ToUnencrypted {
                    for spec in &MIGRATED_TABLES {
                        tx.execute(&format!("DELETE FROM {}", spec.table), [])?;
                    }
                }

                for spec in &MIGRATED_TABLES {
                    let copied = copy_table(source, &tx, spec)?;
                    tracing::debug!("Copied {} rows from {}", copied, spec.table);
                    report.record(spec.table, copied);
                }
            }

            tx.commit()?;
        }

        if let Some(source) = source {
            if let Err(e) = source.close() {
                tracing::warn!("Failed to close migration source: {}", e);
            }
        }
        if let Err(e) = target.close() {
            tracing::warn!("Failed to close migration target: {}", e);
        }

        Ok(report)
    }

    /// Whether the plaintext store holds any record. Errors read as `false`.
    pub fn has_unencrypted_data(&self) -> bool {
        if !self.plain_path.exists() {
            return false;
        }
        Database::open_plain_read_only(&self.plain_path)
            .and_then(|db| has_records(&db))
            .unwrap_or_else(|e| {
                tracing::debug!("Plaintext store not readable: {}", e);
                false
            })
    }

    /// Whether the encrypted store holds any record. Errors, a malformed PIN
    /// and a missing key all read as `false`.
    pub fn has_encrypted_data(&self, pin: &str) -> bool {
        if !is_valid_pin(pin) || !self.encrypted_path.exists() {
            return false;
        }
        let key = match self.keys.current_key() {
            Ok(Some(key)) => key,
            Ok(None) => return false,
            Err(e) => {
                tracing::debug!("Database key unavailable: {}", e);
                return false;
            }
        };
        Database::open_encrypted_read_only(&self.encrypted_path, &key)
            .and_then(|db| has_records(&db))
            .unwrap_or_else(|e| {
                tracing::debug!("Encrypted store not readable: {}", e);
                false
            })
    }
}

fn copy_table(source: &Database, tx: &Transaction<'_>, spec: &TableSpec) -> Result<usize> {
    if !source.table_exists(spec.table)? {
        return Ok(0);
    }

    let columns = spec.columns.join(", ");
    let placeholders = (1..=spec.columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut select = source
        .conn()
        .prepare(&format!("SELECT {} FROM {} ORDER BY id", columns, spec.table))?;
    let mut insert = tx.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        spec.table, columns, placeholders
    ))?;

    let mut copied = 0;
    let mut rows = select.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..spec.columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        insert.execute(params_from_iter(values.iter()))?;
        copied += 1;
    }
    Ok(copied)
}

fn has_records(db: &Database) -> Result<bool> {
    for spec in &MIGRATED_TABLES {
        if db.table_exists(spec.table)? && db.count_rows(spec.table)? > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}
