//! Status command - show vault summary

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, log_event};
use crate::output;
use bankvault_core::LogEvent;

pub fn run(json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;
    log_event(&logger, LogEvent::new("status_completed").with_command("status"));

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Vault Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Banks", &status.total_banks.to_string()]);
    table.add_row(vec!["Custom fields", &status.total_custom_fields.to_string()]);
    table.add_row(vec!["Database", &ctx.config.db_path.display().to_string()]);
    println!("{}", table);

    if let Some(last) = &status.last_updated {
        println!();
        println!("Last change: {}", last);
    }

    if status.legacy_passwords > 0 {
        println!();
        output::warning(&format!(
            "{} user(s) still have a plaintext master password. Run `bv passwd` to encrypt it.",
            status.legacy_passwords
        ));
    }

    Ok(())
}
