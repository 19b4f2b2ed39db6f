//! Doctor service - vault health checks

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::domain::User;
use crate::ports::VaultRepository;
use crate::services::encryption::FieldCipher;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<dyn VaultRepository>,
    cipher: Arc<FieldCipher>,
}

impl DoctorService {
    pub fn new(repository: Arc<dyn VaultRepository>, cipher: Arc<FieldCipher>) -> Self {
        Self { repository, cipher }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();
        let users = self.repository.list_users()?;

        checks.insert("ciphertext_integrity".to_string(), self.check_ciphertexts()?);
        checks.insert("legacy_master_passwords".to_string(), self.check_legacy_passwords(&users));
        checks.insert("orphaned_banks".to_string(), self.check_orphans()?);
        checks.insert("username_collisions".to_string(), Self::check_collisions(&users));

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary { passed, warnings, errors },
        })
    }

    /// Every stored bank field must decrypt under the configured key
    fn check_ciphertexts(&self) -> Result<CheckResult> {
        let banks = self.repository.list_all_banks()?;
        let mut failures = Vec::new();
        let mut checked = 0usize;

        for bank in &banks {
            for (field, blob) in bank.ciphertexts() {
                checked += 1;
                if self.cipher.decrypt(blob).is_err() {
                    failures.push(json!({
                        "bank_id": bank.id.to_string(),
                        "field": field,
                    }));
                }
            }
        }

        Ok(if failures.is_empty() {
            CheckResult::pass(format!(
                "All {} field(s) across {} bank(s) decrypt",
                checked,
                banks.len()
            ))
        } else {
            CheckResult::with_details(
                "error",
                format!("{} field(s) fail to decrypt with the current key", failures.len()),
                failures,
            )
        })
    }

    /// Master passwords that are still stored as plaintext
    fn check_legacy_passwords(&self, users: &[User]) -> CheckResult {
        let legacy: Vec<serde_json::Value> = users
            .iter()
            .filter(|u| !self.cipher.is_ciphertext(&u.master_password))
            .map(|u| json!({ "username": u.username }))
            .collect();

        if legacy.is_empty() {
            CheckResult::pass("All master passwords are encrypted")
        } else {
            CheckResult::with_details(
                "warning",
                format!(
                    "{} user(s) have a plaintext master password; changing it will encrypt it",
                    legacy.len()
                ),
                legacy,
            )
        }
    }

    fn check_orphans(&self) -> Result<CheckResult> {
        let orphans = self.repository.find_orphaned_banks()?;

        Ok(if orphans.is_empty() {
            CheckResult::pass("No orphaned banks found")
        } else {
            let details = orphans
                .iter()
                .map(|o| json!({ "bank_id": o.bank_id, "user_id": o.user_id }))
                .collect();
            CheckResult::with_details(
                "error",
                format!("{} bank(s) reference missing users", orphans.len()),
                details,
            )
        })
    }

    /// Usernames that only differ by case or surrounding whitespace
    fn check_collisions(users: &[User]) -> CheckResult {
        let mut by_key: HashMap<String, Vec<&str>> = HashMap::new();
        for user in users {
            by_key
                .entry(User::username_key(&user.username))
                .or_default()
                .push(&user.username);
        }

        let mut collisions: Vec<serde_json::Value> = by_key
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(key, names)| json!({ "username_key": key, "usernames": names }))
            .collect();
        collisions.sort_by_key(|v| v["username_key"].as_str().unwrap_or_default().to_string());

        if collisions.is_empty() {
            CheckResult::pass("All usernames are unique ignoring case")
        } else {
            CheckResult::with_details(
                "warning",
                format!("{} username(s) collide ignoring case", collisions.len()),
                collisions,
            )
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            status: "pass".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(status: &str, message: String, details: Vec<serde_json::Value>) -> Self {
        Self {
            status: status.to_string(),
            message,
            details: Some(details),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
