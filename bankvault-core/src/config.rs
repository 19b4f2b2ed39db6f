//! Configuration management
//!
//! Settings live in `settings.json` inside the vault directory:
//! ```json
//! {
//!   "vault": { "databaseUrl": "vault.duckdb", "maxBackups": 10 }
//! }
//! ```
//! The database location can be overridden with `BANKVAULT_DATABASE_URL`.
//! The encryption key only ever comes from `BANKVAULT_ENCRYPTION_KEY`; this
//! crate never writes settings.json.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};

pub const ENCRYPTION_KEY_VAR: &str = "BANKVAULT_ENCRYPTION_KEY";
pub const DATABASE_URL_VAR: &str = "BANKVAULT_DATABASE_URL";

const SETTINGS_FILE: &str = "settings.json";
const URL_SCHEME: &str = "duckdb://";

/// Raw settings.json structure. Keys this crate doesn't use are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    vault: VaultSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultSettings {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    max_backups: Option<usize>,
}

/// Resolved vault configuration
#[derive(Clone)]
pub struct Config {
    pub vault_dir: PathBuf,
    /// Connection string as configured, before resolution
    pub database_url: String,
    /// Database file the connection string resolves to
    pub db_path: PathBuf,
    pub max_backups: Option<usize>,
    encryption_key: Zeroizing<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("vault_dir", &self.vault_dir)
            .field("database_url", &self.database_url)
            .field("db_path", &self.db_path)
            .field("max_backups", &self.max_backups)
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load config for `vault_dir` from settings.json and the environment
    pub fn load(vault_dir: &Path) -> Result<Self> {
        Self::resolve(
            vault_dir,
            non_empty_var(ENCRYPTION_KEY_VAR),
            non_empty_var(DATABASE_URL_VAR),
        )
    }

    /// Load config with explicit key and URL overrides instead of the
    /// environment. `database_url` falls back to settings.json when `None`.
    pub fn resolve(
        vault_dir: &Path,
        encryption_key: Option<String>,
        database_url: Option<String>,
    ) -> Result<Self> {
        let raw = read_settings(vault_dir)?;

        let encryption_key = encryption_key
            .ok_or_else(|| Error::config(format!("{} is not set", ENCRYPTION_KEY_VAR)))?;

        let database_url = database_url
            .or_else(|| raw.vault.database_url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "{} is not set and settings.json has no vault.databaseUrl",
                    DATABASE_URL_VAR
                ))
            })?;

        let db_path = resolve_db_path(vault_dir, &database_url)?;

        Ok(Self {
            vault_dir: vault_dir.to_path_buf(),
            database_url,
            db_path,
            max_backups: raw.vault.max_backups,
            encryption_key: Zeroizing::new(encryption_key),
        })
    }

    /// The configured key, as given
    pub fn encryption_key(&self) -> &str {
        &self.encryption_key
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_settings(vault_dir: &Path) -> Result<SettingsFile> {
    let settings_path = vault_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config(format!("settings.json is not valid: {}", e)))
}

/// Turn a connection string into a database file path
fn resolve_db_path(vault_dir: &Path, database_url: &str) -> Result<PathBuf> {
    let trimmed = database_url.trim();
    let path = match trimmed.split_once("://") {
        Some(_) => trimmed.strip_prefix(URL_SCHEME).ok_or_else(|| {
            Error::config(format!("Unsupported database URL: {}", database_url))
        })?,
        None => trimmed,
    };

    if path.is_empty() {
        return Err(Error::config("Database URL has no path"));
    }

    let path = Path::new(path);
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        vault_dir.join(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_missing_key_is_config_error() {
        let dir = tempdir().unwrap();
        let err = Config::resolve(dir.path(), None, Some("vault.duckdb".into())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let dir = tempdir().unwrap();
        let err = Config::resolve(dir.path(), Some(KEY.into()), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_url_from_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"vault":{"databaseUrl":"duckdb://data/vault.duckdb","maxBackups":3}}"#,
        )
        .unwrap();

        let config = Config::resolve(dir.path(), Some(KEY.into()), None).unwrap();
        assert_eq!(config.db_path, dir.path().join("data/vault.duckdb"));
        assert_eq!(config.max_backups, Some(3));
        assert_eq!(config.encryption_key(), KEY);
    }

    #[test]
    fn test_override_wins_and_absolute_paths_kept() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"vault":{"databaseUrl":"ignored.duckdb"}}"#,
        )
        .unwrap();

        let abs = dir.path().join("elsewhere.duckdb");
        let url = format!("duckdb://{}", abs.display());
        let config = Config::resolve(dir.path(), Some(KEY.into()), Some(url)).unwrap();
        assert_eq!(config.db_path, abs);
    }

    #[test]
    fn test_unsupported_scheme() {
        let dir = tempdir().unwrap();
        let err = Config::resolve(
            dir.path(),
            Some(KEY.into()),
            Some("postgres://localhost/vault".into()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_settings_keys_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme":"dark","vault":{"color":"blue","databaseUrl":"vault.duckdb"}}"#,
        )
        .unwrap();

        let config = Config::resolve(dir.path(), Some(KEY.into()), None).unwrap();
        assert_eq!(config.db_path, dir.path().join("vault.duckdb"));
        assert_eq!(config.max_backups, None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let dir = tempdir().unwrap();
        let config =
            Config::resolve(dir.path(), Some(KEY.into()), Some("vault.duckdb".into())).unwrap();
        assert!(!format!("{:?}", config).contains(KEY));
    }
}
