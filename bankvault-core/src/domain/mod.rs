//! Core domain entities
//!
//! Users, bank records and the validation and encryption models around
//! them. Pure data and rules, no I/O.

mod backup;
pub mod bank;
pub mod encryption;
pub mod result;
mod user;
pub mod validation;

pub use backup::BackupMetadata;
pub use bank::{
    BankFormValues, BankRecord, BankSummary, BankUpdate, CustomField, CustomFieldInput,
    DecryptedBank, NOT_AVAILABLE,
};
pub use encryption::{CipherBlob, SecretComparison};
pub use user::{User, UserPublic};
