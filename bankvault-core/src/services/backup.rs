//! Backup service - vault backup management
//!
//! A backup is a ZIP archive holding the vault database and settings.json.
//! Ciphertexts are copied as-is, so a backup is only useful together with
//! the encryption key that was active when it was taken.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::domain::BackupMetadata;

const PREFIX: &str = "bankvault-";

/// Archive entry name for the vault database, wherever it lives on disk
const DB_ENTRY: &str = "vault.duckdb";

/// Config files to include in a backup (relative to the vault dir)
const CONFIG_FILES: &[&str] = &["settings.json"];

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub deleted: usize,
}

/// Backup service for the vault database
pub struct BackupService {
    vault_dir: PathBuf,
    db_path: PathBuf,
}

impl BackupService {
    pub fn new(vault_dir: PathBuf, db_path: PathBuf) -> Self {
        Self { vault_dir, db_path }
    }

    fn backups_dir(&self) -> PathBuf {
        self.vault_dir.join("backups")
    }

    fn timestamped_name(label: &str) -> String {
        let now = Utc::now();
        format!(
            "{}{}{}-{:06}.zip",
            PREFIX,
            label,
            now.format("%Y-%m-%dT%H-%M-%S"),
            now.timestamp_subsec_micros()
        )
    }

    fn add_file(
        zip: &mut ZipWriter<File>,
        entry: &str,
        path: &Path,
        options: SimpleFileOptions,
    ) -> Result<()> {
        let mut buffer = Vec::new();
        File::open(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .read_to_end(&mut buffer)?;
        zip.start_file(entry, options)?;
        zip.write_all(&buffer)?;
        Ok(())
    }

    fn write_archive(&self, backup_path: &Path, include_config: bool) -> Result<()> {
        let file = File::create(backup_path).context("Failed to create backup file")?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        Self::add_file(&mut zip, DB_ENTRY, &self.db_path, options)?;

        if include_config {
            for config_file in CONFIG_FILES {
                let config_path = self.vault_dir.join(config_file);
                if config_path.exists() {
                    Self::add_file(&mut zip, config_file, &config_path, options)?;
                }
            }
        }

        zip.finish()?;
        Ok(())
    }

    /// Archive the database and config files.
    ///
    /// Callers should checkpoint the database first so the file on disk is
    /// complete.
    pub fn create(&self, max_backups: Option<usize>) -> Result<BackupMetadata> {
        if !self.db_path.exists() {
            anyhow::bail!("Database file not found: {}", self.db_path.display());
        }

        let backups_dir = self.backups_dir();
        fs::create_dir_all(&backups_dir)?;

        let backup_name = Self::timestamped_name("");
        let backup_path = backups_dir.join(&backup_name);
        self.write_archive(&backup_path, true)?;

        let size_bytes = fs::metadata(&backup_path)?.len();

        if let Some(max) = max_backups {
            self.apply_retention(max)?;
        }

        Ok(BackupMetadata::new(backup_name, Utc::now(), size_bytes))
    }

    /// All backups, newest first
    pub fn list(&self) -> Result<Vec<BackupMetadata>> {
        let backups_dir = self.backups_dir();
        if !backups_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&backups_dir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) if Self::is_backup_name(n) => n.to_string(),
                _ => continue,
            };

            let size_bytes = fs::metadata(&path)?.len();
            let created_at = Self::parse_backup_time(&name);
            backups.push(BackupMetadata::new(name, created_at, size_bytes));
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.name.cmp(&a.name)));
        Ok(backups)
    }

    fn is_backup_name(name: &str) -> bool {
        name.starts_with(PREFIX)
            && name.ends_with(".zip")
            && !name.contains('/')
            && !name.contains('\\')
            && !name.contains("..")
    }

    /// Creation time from "bankvault-[pre-restore-]TIMESTAMP-MICROS.zip"
    fn parse_backup_time(backup_name: &str) -> DateTime<Utc> {
        let ts = backup_name
            .strip_prefix(PREFIX)
            .map(|s| s.strip_prefix("pre-restore-").unwrap_or(s))
            .and_then(|s| s.strip_suffix(".zip"));

        ts.and_then(|ts| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S-%f")
                .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S"))
                .ok()
        })
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Replace the vault database (and settings) with a backup's contents.
    ///
    /// Settings absent from the archive are left alone. The current
    /// database is archived as a "pre-restore" backup first.
    /// Nothing may hold the database open while this runs.
    pub fn restore(&self, backup_name: &str) -> Result<()> {
        if !Self::is_backup_name(backup_name) {
            anyhow::bail!("Invalid backup name: {}", backup_name);
        }
        let backup_path = self.backups_dir().join(backup_name);
        if !backup_path.exists() {
            anyhow::bail!("Backup not found: {}", backup_name);
        }

        if self.db_path.exists() {
            let pre_restore = self.backups_dir().join(Self::timestamped_name("pre-restore-"));
            self.write_archive(&pre_restore, false)?;
        }

        let mut archive = ZipArchive::new(File::open(&backup_path)?)
            .context("Backup is not a valid ZIP archive")?;
        if !archive.file_names().any(|n| n == DB_ENTRY) {
            anyhow::bail!("Backup does not contain a vault database");
        }

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            let target_path = if name == DB_ENTRY {
                self.db_path.clone()
            } else if CONFIG_FILES.contains(&name.as_str()) {
                self.vault_dir.join(&name)
            } else {
                continue;
            };

            let mut outfile = File::create(&target_path)
                .with_context(|| format!("Failed to write {}", target_path.display()))?;
            std::io::copy(&mut entry, &mut outfile)?;
        }

        // A stale write-ahead log would be replayed over the restored file
        let wal = PathBuf::from(format!("{}.wal", self.db_path.display()));
        if wal.exists() {
            fs::remove_file(&wal)?;
        }

        Ok(())
    }

    /// Delete every backup
    pub fn clear(&self) -> Result<ClearResult> {
        let backups = self.list()?;
        for backup in &backups {
            fs::remove_file(self.backups_dir().join(&backup.name))?;
        }
        Ok(ClearResult {
            deleted: backups.len(),
        })
    }

    fn apply_retention(&self, max_backups: usize) -> Result<()> {
        let mut backups = self.list()?;
        while backups.len() > max_backups {
            if let Some(oldest) = backups.pop() {
                fs::remove_file(self.backups_dir().join(&oldest.name))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn service(dir: &Path) -> BackupService {
        let db_path = dir.join("vault.duckdb");
        fs::write(&db_path, b"original").unwrap();
        fs::write(dir.join("settings.json"), br#"{"vault":{}}"#).unwrap();
        BackupService::new(dir.to_path_buf(), db_path)
    }

    #[test]
    fn test_create_and_list() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        let meta = service.create(None).unwrap();
        assert!(meta.name.starts_with("bankvault-"));
        assert!(meta.size_bytes > 0);

        let backups = service.list().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].name, meta.name);
    }

    #[test]
    fn test_create_without_database_fails() {
        let dir = tempdir().unwrap();
        let service =
            BackupService::new(dir.path().to_path_buf(), dir.path().join("missing.duckdb"));
        assert!(service.create(None).is_err());
    }

    #[test]
    fn test_restore_replaces_database() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        let meta = service.create(None).unwrap();

        fs::write(dir.path().join("vault.duckdb"), b"changed").unwrap();
        fs::remove_file(dir.path().join("settings.json")).unwrap();
        service.restore(&meta.name).unwrap();

        assert_eq!(fs::read(dir.path().join("vault.duckdb")).unwrap(), b"original");
        assert!(dir.path().join("settings.json").exists());

        let names: Vec<String> = service.list().unwrap().into_iter().map(|b| b.name).collect();
        assert!(names.iter().any(|n| n.starts_with("bankvault-pre-restore-")));
    }

    #[test]
    fn test_restore_rejects_unknown_or_unsafe_names() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        assert!(service.restore("bankvault-nope.zip").is_err());
        assert!(service.restore("../settings.json").is_err());
        assert!(service.restore("bankvault-../../x.zip").is_err());
    }

    #[test]
    fn test_retention_and_clear() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        for _ in 0..3 {
            service.create(Some(2)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(service.list().unwrap().len(), 2);

        assert_eq!(service.clear().unwrap().deleted, 2);
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_parse_backup_time() {
        let ts = BackupService::parse_backup_time("bankvault-2025-01-15T10-30-00-000123.zip");
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-15 10:30:00");

        let ts = BackupService::parse_backup_time(
            "bankvault-pre-restore-2025-01-15T10-30-00-000123.zip",
        );
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "2025-01-15");
    }
}
