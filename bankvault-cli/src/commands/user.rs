//! User commands - register, login, passwd

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;

use bankvault_core::LogEvent;

use super::{
    authenticate, finish, get_context, get_logger, log_event, log_outcome, resolve_password,
    AuthArgs,
};

pub fn run_register(username: String, password: Option<String>, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("register_started").with_command("register"));

    let ctx = get_context()?;
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Master password")
            .with_confirmation("Confirm master password", "Passwords do not match")
            .interact()
            .context("No password given and no terminal to prompt on")?,
    };

    let result = ctx.create_user(&username, &password)?;
    log_outcome(&logger, "register", &result);

    finish(result, json, |user| {
        println!("{}", format!("Registered {}", user.username).green());
        println!("  User ID: {}", user.id);
    })
}

pub fn run_login(auth: AuthArgs, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let user = authenticate(&ctx, &logger, auth, json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("{}", format!("Welcome back, {}", user.username).green());
        println!("  Member since: {}", user.created_at.format("%Y-%m-%d"));
    }
    Ok(())
}

pub fn run_passwd(
    auth: AuthArgs,
    new_password: Option<String>,
    confirm_password: Option<String>,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("passwd_started").with_command("passwd"));

    let ctx = get_context()?;
    let current = resolve_password(auth.password.clone(), "Current master password")?;
    let user = authenticate(
        &ctx,
        &logger,
        AuthArgs {
            username: auth.username,
            password: Some(current.clone()),
        },
        json,
    )?;

    let (new, confirm) = match (new_password, confirm_password) {
        (Some(new), Some(confirm)) => (new, confirm),
        (Some(new), None) => {
            let confirm = resolve_password(None, "Confirm new master password")?;
            (new, confirm)
        }
        (None, _) => {
            let new = Password::new()
                .with_prompt("New master password")
                .with_confirmation("Confirm new master password", "Passwords do not match")
                .interact()
                .context("No new password given and no terminal to prompt on")?;
            (new.clone(), new)
        }
    };

    let result = ctx.change_master_password(user.id, &current, &new, &confirm)?;
    log_outcome(&logger, "passwd", &result);

    finish(result, json, |_| {
        println!("{}", "Master password changed".green());
    })
}
