//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod backup;
mod bank;
mod doctor;
pub mod encryption;
pub mod logging;
pub mod migration;
mod status;
mod user;

pub use backup::{BackupService, ClearResult};
pub use bank::BankService;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use encryption::FieldCipher;
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LogStats, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{StatusService, StatusSummary};
pub use user::UserService;
