//! Bank command - manage stored bank credentials

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use uuid::Uuid;

use bankvault_core::{BankFormValues, CustomFieldInput, DecryptedBank, LogEvent, VaultContext};

use super::{
    authenticate, finish, get_context, get_logger, log_event, log_outcome, require, AuthArgs,
};
use crate::output;

#[derive(Subcommand)]
pub enum BankCommands {
    /// List your banks
    List {
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a bank (missing required fields are prompted for)
    Add {
        #[command(flatten)]
        auth: AuthArgs,
        #[command(flatten)]
        fields: BankFieldArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a bank; omitted fields keep their stored values
    Update {
        /// Bank ID (or a unique prefix of it)
        bank_id: String,
        #[command(flatten)]
        auth: AuthArgs,
        #[command(flatten)]
        fields: BankFieldArgs,
        /// Remove all custom fields
        #[arg(long, conflicts_with = "custom_fields")]
        clear_fields: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a bank
    Delete {
        /// Bank ID (or a unique prefix of it)
        bank_id: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show every stored field of a bank, decrypted
    Reveal {
        /// Bank ID (or a unique prefix of it)
        bank_id: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Bank form fields accepted on the command line
#[derive(Args, Debug)]
pub struct BankFieldArgs {
    #[arg(long)]
    pub bank_name: Option<String>,
    /// Phone number registered for OTPs
    #[arg(long = "phone")]
    pub phone_for_otp: Option<String>,
    #[arg(long)]
    pub account_number: Option<String>,
    #[arg(long)]
    pub net_banking_username: Option<String>,
    #[arg(long)]
    pub net_banking_password: Option<String>,
    #[arg(long)]
    pub mobile_banking_username: Option<String>,
    #[arg(long)]
    pub mobile_banking_password: Option<String>,
    #[arg(long)]
    pub atm_pin: Option<String>,
    /// Custom field as LABEL=VALUE (repeatable)
    #[arg(long = "field", value_name = "LABEL=VALUE", value_parser = parse_custom_field)]
    pub custom_fields: Vec<CustomFieldInput>,
    /// Prompt (hidden) for passwords and PIN not given as flags
    #[arg(long)]
    pub ask_secrets: bool,
}

fn parse_custom_field(raw: &str) -> std::result::Result<CustomFieldInput, String> {
    raw.split_once('=')
        .map(|(label, value)| CustomFieldInput::new(label.trim(), value.trim()))
        .ok_or_else(|| format!("expected LABEL=VALUE, got '{}'", raw))
}

pub fn run(command: BankCommands) -> Result<()> {
    match command {
        BankCommands::List { auth, json } => run_list(auth, json),
        BankCommands::Add { auth, fields, json } => run_add(auth, fields, json),
        BankCommands::Update {
            bank_id,
            auth,
            fields,
            clear_fields,
            json,
        } => run_update(&bank_id, auth, fields, clear_fields, json),
        BankCommands::Delete {
            bank_id,
            auth,
            force,
            json,
        } => run_delete(&bank_id, auth, force, json),
        BankCommands::Reveal { bank_id, auth, json } => run_reveal(&bank_id, auth, json),
    }
}

fn run_list(auth: AuthArgs, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;

    let result = ctx.list_banks_for_user(user.id)?;
    log_outcome(&logger, "bank_list", &result);

    finish(result, json, |banks| {
        if banks.is_empty() {
            println!("No banks stored yet. Add one with `bv bank add`.");
            return;
        }
        let mut table = output::create_table();
        table.set_header(vec!["ID", "Bank", "Account Number"]);
        for bank in banks {
            table.add_row(vec![
                bank.id.to_string(),
                bank.bank_name.clone(),
                bank.account_number.clone(),
            ]);
        }
        println!("{}", table);
    })
}

fn run_add(auth: AuthArgs, fields: BankFieldArgs, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("bank_add_started").with_command("bank add"));

    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;
    let interactive = !json;

    let form = BankFormValues {
        bank_name: required(fields.bank_name, "Bank name", interactive)?,
        phone_for_otp: required(fields.phone_for_otp, "Phone for OTP", interactive)?,
        account_number: required(fields.account_number, "Account number", interactive)?,
        net_banking_username: required(
            fields.net_banking_username,
            "Net banking username",
            interactive,
        )?,
        net_banking_password: secret(
            fields.net_banking_password,
            "Net banking password (optional)",
            fields.ask_secrets,
        )?,
        mobile_banking_username: required(
            fields.mobile_banking_username,
            "Mobile banking username",
            interactive,
        )?,
        mobile_banking_password: secret(
            fields.mobile_banking_password,
            "Mobile banking password (optional)",
            fields.ask_secrets,
        )?,
        atm_pin: secret(fields.atm_pin, "ATM PIN (optional)", fields.ask_secrets)?,
        custom_fields: if fields.custom_fields.is_empty() {
            None
        } else {
            Some(fields.custom_fields)
        },
    };

    let result = ctx.add_bank(user.id, &form)?;
    log_outcome(&logger, "bank_add", &result);

    finish(result, json, |bank| {
        output::success(&format!("Added {}", bank.bank_name));
        println!("  ID: {}", bank.id);
    })
}

fn run_update(
    bank_id: &str,
    auth: AuthArgs,
    fields: BankFieldArgs,
    clear_fields: bool,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("bank_update_started").with_command("bank update"));

    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;
    let bank_id = resolve_bank_id(&ctx, user.id, bank_id, json)?;

    // Required fields must always be submitted, so default to what is stored
    let current: DecryptedBank = require(ctx.reveal_bank(user.id, bank_id)?, json)?;
    let keep = "(leave blank to keep)";

    let form = BankFormValues {
        bank_name: fields.bank_name.unwrap_or(current.bank_name),
        phone_for_otp: fields.phone_for_otp.unwrap_or(current.phone_for_otp),
        account_number: fields.account_number.unwrap_or(current.account_number),
        net_banking_username: fields
            .net_banking_username
            .unwrap_or(current.net_banking_username),
        net_banking_password: secret(
            fields.net_banking_password,
            &format!("Net banking password {}", keep),
            fields.ask_secrets,
        )?,
        mobile_banking_username: fields
            .mobile_banking_username
            .unwrap_or(current.mobile_banking_username),
        mobile_banking_password: secret(
            fields.mobile_banking_password,
            &format!("Mobile banking password {}", keep),
            fields.ask_secrets,
        )?,
        atm_pin: secret(fields.atm_pin, &format!("ATM PIN {}", keep), fields.ask_secrets)?,
        custom_fields: if clear_fields {
            Some(Vec::new())
        } else if fields.custom_fields.is_empty() {
            None
        } else {
            Some(fields.custom_fields)
        },
    };

    let result = ctx.update_bank(user.id, bank_id, &form)?;
    log_outcome(&logger, "bank_update", &result);

    finish(result, json, |bank| {
        output::success(&format!("Updated {}", bank.bank_name));
    })
}

fn run_delete(bank_id: &str, auth: AuthArgs, force: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("bank_delete_started").with_command("bank delete"));

    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;
    let bank_id = resolve_bank_id(&ctx, user.id, bank_id, json)?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete bank {}? This cannot be undone", bank_id))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let result = ctx.delete_bank(user.id, bank_id)?;
    log_outcome(&logger, "bank_delete", &result);

    finish(result, json, |_| {
        output::success("Bank deleted");
    })
}

fn run_reveal(bank_id: &str, auth: AuthArgs, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;
    let bank_id = resolve_bank_id(&ctx, user.id, bank_id, json)?;

    let result = ctx.reveal_bank(user.id, bank_id)?;
    log_outcome(&logger, "bank_reveal", &result);

    finish(result, json, |bank| {
        println!("{}", bank.bank_name.bold());
        println!();

        let mut table = output::create_table();
        table.add_row(vec!["Phone for OTP", &bank.phone_for_otp]);
        table.add_row(vec!["Account number", &bank.account_number]);
        table.add_row(vec!["Net banking username", &bank.net_banking_username]);
        table.add_row(vec!["Net banking password", &bank.net_banking_password]);
        table.add_row(vec!["Mobile banking username", &bank.mobile_banking_username]);
        table.add_row(vec!["Mobile banking password", &bank.mobile_banking_password]);
        table.add_row(vec!["ATM PIN", &bank.atm_pin]);
        for field in &bank.custom_fields {
            table.add_row(vec![field.label.as_str(), field.value.as_str()]);
        }
        println!("{}", table);
        println!();
        println!(
            "{}",
            format!("Last updated {}", bank.updated_at.format("%Y-%m-%d %H:%M")).dimmed()
        );
    })
}

/// Flag value, else a prompt, else empty (left for validation to report)
fn required(given: Option<String>, prompt: &str, interactive: bool) -> Result<String> {
    match given {
        Some(value) => Ok(value),
        None if interactive => Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
            .with_context(|| format!("{} is required", prompt)),
        None => Ok(String::new()),
    }
}

/// Flag value, else an optional hidden prompt, else empty (not provided)
fn secret(given: Option<String>, prompt: &str, ask: bool) -> Result<String> {
    match given {
        Some(value) => Ok(value),
        None if ask => Ok(Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?),
        None => Ok(String::new()),
    }
}

/// Accept a full bank id or a prefix matching exactly one of the user's banks
fn resolve_bank_id(ctx: &VaultContext, user_id: Uuid, raw: &str, json: bool) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }

    let banks = require(ctx.list_banks_for_user(user_id)?, json)?;
    let matches: Vec<Uuid> = banks
        .iter()
        .map(|b| b.id)
        .filter(|id| id.to_string().starts_with(&raw.to_lowercase()))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("No bank matches '{}'", raw)),
        _ => bail!("'{}' matches {} banks, use more characters", raw, matches.len()),
    }
}
