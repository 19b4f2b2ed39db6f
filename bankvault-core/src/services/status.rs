//! Status service - vault summary counts

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::ports::VaultRepository;
use crate::services::encryption::FieldCipher;

/// Status service for vault-wide counts
pub struct StatusService {
    repository: Arc<dyn VaultRepository>,
    cipher: Arc<FieldCipher>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn VaultRepository>, cipher: Arc<FieldCipher>) -> Self {
        Self { repository, cipher }
    }

    /// Counts only. No usernames or bank details are returned.
    pub fn get_status(&self) -> Result<StatusSummary> {
        let users = self.repository.list_users()?;
        let banks = self.repository.list_all_banks()?;

        let legacy_passwords = users
            .iter()
            .filter(|u| !self.cipher.is_ciphertext(&u.master_password))
            .count() as i64;
        let custom_fields = banks.iter().map(|b| b.custom_fields.len() as i64).sum();
        let last_updated = banks
            .iter()
            .map(|b| b.updated_at)
            .chain(users.iter().map(|u| u.updated_at))
            .max()
            .map(|t| t.to_rfc3339());

        Ok(StatusSummary {
            total_users: users.len() as i64,
            total_banks: banks.len() as i64,
            total_custom_fields: custom_fields,
            legacy_passwords,
            last_updated,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_banks: i64,
    pub total_custom_fields: i64,
    pub legacy_passwords: i64,
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{CipherBlob, User};

    #[test]
    fn test_empty_vault() {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let service = StatusService::new(repo, Arc::new(FieldCipher::new([2u8; 32])));

        let status = service.get_status().unwrap();
        assert_eq!(status.total_users, 0);
        assert_eq!(status.total_banks, 0);
        assert!(status.last_updated.is_none());
    }

    #[test]
    fn test_counts_legacy_passwords() {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let cipher = Arc::new(FieldCipher::new([2u8; 32]));

        repo.insert_user(&User::new("alice", cipher.encrypt("password123").unwrap()))
            .unwrap();
        repo.insert_user(&User::new("bob", CipherBlob::from_stored("plaintext")))
            .unwrap();

        let status = StatusService::new(repo, cipher).get_status().unwrap();
        assert_eq!(status.total_users, 2);
        assert_eq!(status.legacy_passwords, 1);
        assert!(status.last_updated.is_some());
    }
}
