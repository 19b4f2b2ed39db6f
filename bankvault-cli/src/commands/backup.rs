//! Backup command - manage vault backups

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, get_logger, get_vault_dir, log_event};
use crate::output;
use bankvault_core::config::Config;
use bankvault_core::services::BackupService;
use bankvault_core::LogEvent;

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Maximum number of backups to keep (defaults to vault.maxBackups)
        #[arg(long, short = 'm')]
        max_backups: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available backups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore from a backup
    Restore {
        /// Backup name to restore
        name: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear all backups
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// A BackupService that doesn't hold the database open.
/// Restore must replace the file, so it can't go through `get_context`.
fn get_backup_service() -> Result<BackupService> {
    let vault_dir = get_vault_dir()?;
    let config = Config::load(&vault_dir).context("Failed to load vault configuration")?;
    Ok(BackupService::new(config.vault_dir, config.db_path))
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

pub fn run(command: BackupCommands) -> Result<()> {
    let logger = get_logger();

    match command {
        BackupCommands::Create { max_backups, json } => {
            let ctx = get_context()?;
            ctx.checkpoint()?;
            let result = ctx
                .backup_service
                .create(max_backups.or(ctx.config.max_backups))?;
            log_event(&logger, LogEvent::new("backup_created").with_command("backup create"));

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output::success("Backup created");
                println!("  Name: {}", result.name);
                println!("  Size: {}", result.size_display());
                println!(
                    "{}",
                    "Backups hold ciphertext; keep the encryption key to restore them.".dimmed()
                );
            }
        }
        BackupCommands::List { json } => {
            let backups = get_backup_service()?.list()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
                return Ok(());
            }

            if backups.is_empty() {
                output::info("No backups found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Name", "Created", "Size"]);
            for backup in backups {
                table.add_row(vec![
                    backup.name.clone(),
                    backup.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    backup.size_display(),
                ]);
            }
            println!("{}", table);
        }
        BackupCommands::Restore { name, force, json } => {
            let backup_service = get_backup_service()?;
            if !force && !json && !confirm(&format!("Restore from backup '{}'?", name))? {
                println!("Cancelled.");
                return Ok(());
            }

            backup_service.restore(&name)?;
            log_event(&logger, LogEvent::new("backup_restored").with_command("backup restore"));

            if json {
                println!("{}", serde_json::json!({ "restored": name }));
            } else {
                output::success(&format!("Vault restored from backup: {}", name));
            }
        }
        BackupCommands::Clear { force, json } => {
            let backup_service = get_backup_service()?;
            if !force && !json && !confirm("Delete all backups?")? {
                println!("Cancelled.");
                return Ok(());
            }

            let result = backup_service.clear()?;
            log_event(&logger, LogEvent::new("backups_cleared").with_command("backup clear"));

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Deleted {} backup(s)", result.deleted);
            }
        }
    }

    Ok(())
}
