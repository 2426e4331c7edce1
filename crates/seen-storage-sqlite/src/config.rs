//! Storage locations and names

use crate::key_manager::{DEFAULT_KEY_ALIAS, LEGACY_KEY_ALIAS};
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SEEN_DATA_DIR";

/// Optional config file read from the data directory
pub const CONFIG_FILE_NAME: &str = "seen.json";

/// Where the stores live and what they are called
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding both databases and the side files
    pub data_dir: PathBuf,
    /// Plaintext database file name
    pub plain_db_name: String,
    /// Encrypted database file name
    pub encrypted_db_name: String,
    /// Keystore alias of the database key
    pub key_alias: String,
    /// Keystore alias used by earlier releases
    pub legacy_key_alias: String,
    /// File-backed keystore name
    pub keystore_file: String,
    /// Preferences file name
    pub preferences_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "seen", "Seen")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".seen"))
}

impl StorageConfig {
    /// Default names rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            plain_db_name: "seen.db".to_string(),
            encrypted_db_name: "seen_encrypted.db".to_string(),
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            legacy_key_alias: LEGACY_KEY_ALIAS.to_string(),
            keystore_file: "keystore.json".to_string(),
            preferences_file: "preferences.json".to_string(),
        }
    }

    /// Resolve the data directory (explicit, then `SEEN_DATA_DIR`, then the
    /// platform default) and merge `seen.json` from it when present.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, data_dir.display());
            return Ok(Self::with_data_dir(data_dir));
        }

        let contents = fs::read_to_string(&path)?;
        let mut config: StorageConfig = serde_json::from_str(&contents)?;
        // The file is found through the data dir, so it cannot move it.
        config.data_dir = data_dir;
        config.validate()?;
        tracing::debug!("Loaded storage config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations that would point both stores at one file, or
    /// let database cleanup reach a side file
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("plain_db_name", &self.plain_db_name),
            ("encrypted_db_name", &self.encrypted_db_name),
            ("keystore_file", &self.keystore_file),
            ("preferences_file", &self.preferences_file),
        ];
        for (field, name) in names {
            let plain = Path::new(name)
                .file_name()
                .map(|n| n == name.as_str())
                .unwrap_or(false);
            if !plain {
                return Err(Error::Config(format!("{} must be a plain file name", field)));
            }
        }
        // Sidecar cleanup matches by prefix.
        if self.plain_db_name.starts_with(&self.encrypted_db_name)
            || self.encrypted_db_name.starts_with(&self.plain_db_name)
        {
            return Err(Error::Config(
                "database names must not be prefixes of each other".to_string(),
            ));
        }
        // Atomic writes stage through hidden `.tmp*` siblings.
        for (field, name) in [
            ("plain_db_name", &self.plain_db_name),
            ("encrypted_db_name", &self.encrypted_db_name),
        ] {
            if name.starts_with('.') {
                return Err(Error::Config(format!("{} must not start with '.'", field)));
            }
        }
        let side_files = [
            ("keystore_file", self.keystore_file.as_str()),
            ("preferences_file", self.preferences_file.as_str()),
            ("config file", CONFIG_FILE_NAME),
        ];
        for (field, side) in side_files {
            for db_name in [&self.plain_db_name, &self.encrypted_db_name] {
                if side.starts_with(db_name.as_str()) {
                    return Err(Error::Config(format!(
                        "{} '{}' would be removed along with database '{}'",
                        field, side, db_name
                    )));
                }
            }
        }
        if self.keystore_file == self.preferences_file {
            return Err(Error::Config(
                "keystore_file and preferences_file must differ".to_string(),
            ));
        }
        if self.key_alias == self.legacy_key_alias {
            return Err(Error::Config(
                "key_alias and legacy_key_alias must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Plaintext database path
    pub fn plain_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.plain_db_name)
    }

    /// Encrypted database path
    pub fn encrypted_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.encrypted_db_name)
    }

    /// File keystore path
    pub fn keystore_path(&self) -> PathBuf {
        self.data_dir.join(&self.keystore_file)
    }

    /// Preferences file path
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(&self.preferences_file)
    }
}
