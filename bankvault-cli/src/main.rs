//! Bank Vault CLI - banking credentials in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use bankvault_core::LogEvent;
use commands::{backup, bank, doctor, get_logger, log_event, logs, status, user, AuthArgs};

/// Bank Vault - encrypted banking credentials in your terminal
#[derive(Parser)]
#[command(name = "bv", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user account
    Register {
        /// Username
        username: String,
        /// Master password (prompted with confirmation when omitted)
        #[arg(short, long, env = "BANKVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a username and master password
    Login {
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change your master password
    Passwd {
        #[command(flatten)]
        auth: AuthArgs,
        /// New master password (prompted when omitted)
        #[arg(long)]
        new_password: Option<String>,
        /// Confirmation of the new master password
        #[arg(long)]
        confirm_password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored banks
    Bank {
        #[command(subcommand)]
        command: bank::BankCommands,
    },

    /// Show vault status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run vault health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage backups
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_event(
                &get_logger(),
                LogEvent::new("command_failed").with_error(format!("{:#}", e)),
            );
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register {
            username,
            password,
            json,
        } => user::run_register(username, password, json),
        Commands::Login { auth, json } => user::run_login(auth, json),
        Commands::Passwd {
            auth,
            new_password,
            confirm_password,
            json,
        } => user::run_passwd(auth, new_password, confirm_password, json),
        Commands::Bank { command } => bank::run(command),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Backup { command } => backup::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
