//! Bank Vault Core - encrypted storage of personal banking credentials
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (User, BankRecord), validation and ciphertext types
//! - **ports**: Trait definitions for external dependencies (VaultRepository)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use domain::result::Result;
use ports::VaultRepository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, FieldError, OperationResult, ValidationErrors};
pub use domain::{
    BackupMetadata, BankFormValues, BankSummary, CustomFieldInput, DecryptedBank, User,
    UserPublic, NOT_AVAILABLE,
};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for vault operations
///
/// Holds the database, the field cipher and every service. Each operation
/// method returns `Err` only for storage or configuration failures; anything
/// the caller can act on comes back as a failed `OperationResult`.
pub struct VaultContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub user_service: UserService,
    pub bank_service: BankService,
    pub backup_service: BackupService,
    pub doctor_service: DoctorService,
    pub status_service: StatusService,
}

impl VaultContext {
    /// Load configuration for `vault_dir` and open the vault
    pub fn open(vault_dir: &Path) -> Result<Self> {
        Self::new(Config::load(vault_dir)?)
    }

    /// Open the vault described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let cipher = Arc::new(FieldCipher::from_config_key(config.encryption_key())?);

        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repository = Arc::new(DuckDbRepository::new(&config.db_path)?);
        repository.ensure_schema()?;

        let repo: Arc<dyn VaultRepository> = repository.clone();
        let user_service = UserService::new(Arc::clone(&repo), Arc::clone(&cipher));
        let bank_service = BankService::new(Arc::clone(&repo), Arc::clone(&cipher));
        let doctor_service = DoctorService::new(Arc::clone(&repo), Arc::clone(&cipher));
        let status_service = StatusService::new(repo, cipher);
        let backup_service = BackupService::new(config.vault_dir.clone(), config.db_path.clone());

        Ok(Self {
            config,
            repository,
            user_service,
            bank_service,
            backup_service,
            doctor_service,
            status_service,
        })
    }

    // === Credential operations ===

    pub fn list_banks_for_user(&self, user_id: Uuid) -> Result<OperationResult<Vec<BankSummary>>> {
        OperationResult::settle(self.bank_service.list(user_id))
    }

    pub fn add_bank(
        &self,
        user_id: Uuid,
        form: &BankFormValues,
    ) -> Result<OperationResult<BankSummary>> {
        OperationResult::settle(self.bank_service.add(user_id, form))
    }

    pub fn update_bank(
        &self,
        user_id: Uuid,
        bank_id: Uuid,
        form: &BankFormValues,
    ) -> Result<OperationResult<BankSummary>> {
        OperationResult::settle(self.bank_service.update(user_id, bank_id, form))
    }

    pub fn delete_bank(&self, user_id: Uuid, bank_id: Uuid) -> Result<OperationResult<()>> {
        OperationResult::settle(self.bank_service.delete(user_id, bank_id))
    }

    pub fn reveal_bank(
        &self,
        user_id: Uuid,
        bank_id: Uuid,
    ) -> Result<OperationResult<DecryptedBank>> {
        OperationResult::settle(self.bank_service.reveal(user_id, bank_id))
    }

    // === User lifecycle ===

    pub fn create_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OperationResult<UserPublic>> {
        OperationResult::settle(self.user_service.create_user(username, password))
    }

    pub fn verify_master_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OperationResult<UserPublic>> {
        OperationResult::settle(self.user_service.verify_master_password(username, password))
    }

    pub fn change_master_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<OperationResult<()>> {
        OperationResult::settle(
            self.user_service
                .change_master_password(user_id, current, new, confirm),
        )
    }

    /// Flush pending writes so the database file can be copied
    pub fn checkpoint(&self) -> Result<()> {
        self.repository.checkpoint()
    }
}
