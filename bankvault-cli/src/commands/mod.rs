//! CLI command implementations

pub mod backup;
pub mod bank;
pub mod doctor;
pub mod logs;
pub mod status;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use dialoguer::Password;
use serde::Serialize;

use bankvault_core::{
    EntryPoint, LogEvent, LoggingService, OperationResult, UserPublic, VaultContext,
};

use crate::output;

/// Credentials shared by every command that acts as a user
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Username
    #[arg(short, long)]
    pub username: String,
    /// Master password (prompted when omitted)
    #[arg(short, long, env = "BANKVAULT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let vault_dir = get_vault_dir().ok()?;
    std::fs::create_dir_all(&vault_dir).ok()?;
    LoggingService::new(&vault_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Log `<action>_completed` or `<action>_failed` for a settled operation
pub fn log_outcome<T>(logger: &Option<LoggingService>, action: &str, result: &OperationResult<T>) {
    let suffix = if result.success { "completed" } else { "failed" };
    log_event(
        logger,
        LogEvent::new(format!("{}_{}", action, suffix))
            .with_command(action.replace('_', " "))
            .with_outcome(result),
    );
}

/// Get the vault directory from environment or default
pub fn get_vault_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BANKVAULT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".bankvault"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BANKVAULT_DIR"))
}

/// Open the vault: loads settings and environment, then the database
pub fn get_context() -> Result<VaultContext> {
    let vault_dir = get_vault_dir()?;

    std::fs::create_dir_all(&vault_dir)
        .with_context(|| format!("Failed to create vault directory: {:?}", vault_dir))?;

    VaultContext::open(&vault_dir).context("Failed to open vault")
}

/// Password from the flag/env var, else an interactive prompt
pub fn resolve_password(given: Option<String>, prompt: &str) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => Password::new()
            .with_prompt(prompt)
            .interact()
            .context("No password given and no terminal to prompt on"),
    }
}

/// Print a failed result and exit, or hand back the data of a successful one
pub fn require<T: Serialize>(result: OperationResult<T>, json: bool) -> Result<T> {
    if !result.success {
        fail(&result, json)?;
    }
    result
        .data
        .ok_or_else(|| anyhow!("Operation succeeded without data"))
}

/// Print a settled result: JSON as-is, or `human` on success
pub fn finish<T: Serialize>(
    result: OperationResult<T>,
    json: bool,
    human: impl FnOnce(&T),
) -> Result<()> {
    if !result.success {
        fail(&result, json)?;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(data) = &result.data {
        human(data);
    }
    Ok(())
}

fn fail<T: Serialize>(result: &OperationResult<T>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        output::failure(result);
    }
    std::process::exit(1);
}

/// Verify credentials and return the logged-in user
pub fn authenticate(
    ctx: &VaultContext,
    logger: &Option<LoggingService>,
    auth: AuthArgs,
    json: bool,
) -> Result<UserPublic> {
    let password = resolve_password(auth.password, "Master password")?;
    let result = ctx.verify_master_password(&auth.username, &password)?;
    log_outcome(logger, "login", &result);
    require(result, json)
}
