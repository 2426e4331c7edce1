//! Error types

use std::fmt;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Data migration between plaintext and encrypted stores failed
    #[error("Data migration failed: {0}")]
    MigrationFailed(String),

    /// PIN is not 4-6 digits
    #[error("Invalid PIN: must be 4 to 6 digits")]
    InvalidPin,

    /// PIN did not match the stored credential, or none is stored
    #[error("PIN verification failed")]
    VerificationFailed,

    /// Keystore error
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// Preferences error
    #[error("Preferences error: {0}")]
    Preferences(String),

    /// Operation not allowed in the current encryption state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid storage configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Record validation error
    #[error("Validation error: {0}")]
    Validation(#[from] seen_core::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Collapse into the kind surfaced to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPin => ErrorKind::InvalidPin,
            Error::VerificationFailed => ErrorKind::VerificationFailed,
            Error::MigrationFailed(_) => ErrorKind::MigrationFailed,
            Error::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Storage,
        }
    }
}

/// Caller-facing error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// PIN format rejected before any I/O
    InvalidPin,
    /// Wrong PIN, or no credential stored
    VerificationFailed,
    /// Data migration rolled back
    MigrationFailed,
    /// Filesystem failure
    Io,
    /// Database, keystore or preferences failure
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidPin => write!(f, "InvalidPin"),
            ErrorKind::VerificationFailed => write!(f, "VerificationFailed"),
            ErrorKind::MigrationFailed => write!(f, "MigrationFailed"),
            ErrorKind::Io => write!(f, "Io"),
            ErrorKind::Storage => write!(f, "Storage"),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
