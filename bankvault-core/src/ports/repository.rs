//! Repository port - persistence abstraction

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{BankRecord, BankUpdate, CipherBlob, User};

/// Vault persistence abstraction
///
/// Every bank mutation touches exactly one record, scoped by its owner, and
/// bumps the owner's version. Callers never read a whole bank list, modify
/// it and write it back.
pub trait VaultRepository: Send + Sync {
    // === Schema ===

    /// Run any pending migrations
    fn ensure_schema(&self) -> Result<()>;

    // === Users ===

    /// Insert a new user. Fails with `Error::Conflict` when the
    /// case-insensitive username is already taken.
    fn insert_user(&self, user: &User) -> Result<()>;

    /// Get user by ID
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Get user by username, ignoring case
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Replace the stored master password if it still equals `expected`.
    /// Returns false when another change replaced it first. Bank writes do
    /// not affect the outcome.
    fn update_master_password(
        &self,
        id: Uuid,
        expected: &CipherBlob,
        master_password: &CipherBlob,
    ) -> Result<bool>;

    /// Get all users
    fn list_users(&self) -> Result<Vec<User>>;

    // === Banks ===

    /// Get a user's bank records in insertion order
    fn list_banks(&self, user_id: Uuid) -> Result<Vec<BankRecord>>;

    /// Get one bank record owned by `user_id`
    fn get_bank(&self, user_id: Uuid, bank_id: Uuid) -> Result<Option<BankRecord>>;

    /// Append a bank record to its owner's list
    fn insert_bank(&self, record: &BankRecord) -> Result<()>;

    /// Overwrite one bank record in place. Returns false when no record matched.
    fn update_bank(&self, user_id: Uuid, bank_id: Uuid, update: &BankUpdate) -> Result<bool>;

    /// Remove one bank record. Returns false when no record matched.
    fn delete_bank(&self, user_id: Uuid, bank_id: Uuid) -> Result<bool>;

    // === Maintenance ===

    /// Get every bank record across all users
    fn list_all_banks(&self) -> Result<Vec<BankRecord>>;

    /// Bank records whose owner does not exist
    fn find_orphaned_banks(&self) -> Result<Vec<OrphanedBank>>;
}

/// A bank record whose owning user row is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedBank {
    pub bank_id: String,
    pub user_id: String,
}
