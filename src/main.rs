//! recursor: reset Cursor IDE machine identity and switch accounts
//!
//! This tool is not affiliated with or endorsed by Anysphere, Inc. (Cursor).
//! It modifies locally stored data on your machine at your own request.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod cursor;
mod error;
mod service;

#[derive(Parser)]
#[command(name = "recursor")]
#[command(about = "Reset Cursor IDE machine identity and switch accounts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved Cursor file locations
    Paths,

    /// Show machine identity, account, hook and process state
    Status,

    /// Check whether Cursor is running (exit code 0 = running)
    Running,

    /// Terminate all running Cursor processes
    Kill,

    /// Reset the machine identity (kills Cursor if running)
    Reset {
        /// Use this device id instead of generating one
        #[arg(long)]
        device_id: Option<String>,

        /// Keep state.vscdb instead of deleting it wholesale
        #[arg(long)]
        keep_database: bool,
    },

    /// Switch the persisted Cursor account
    SwitchAccount {
        /// Account email
        email: Option<String>,

        /// Account token
        token: Option<String>,

        /// Read the credential from a saved assignment response JSON
        #[arg(long, conflicts_with_all = ["email", "token"])]
        assignment: Option<PathBuf>,

        /// Close Cursor without asking if it is running
        #[arg(short, long)]
        force: bool,
    },

    /// Manage the main.js identity hook
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },
}

#[derive(Subcommand)]
enum HookAction {
    /// Report whether the hook is currently applied
    Status,
    /// Apply the hook (backs up main.js first)
    Apply,
    /// Restore main.js from its backup
    Revert,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Paths => {
            commands::paths::execute()?;
        }

        Commands::Status => {
            commands::status::execute()?;
        }

        Commands::Running => {
            use cursor::process::{CursorProcesses, ProcessControl};
            if CursorProcesses.is_running() {
                println!("running");
            } else {
                println!("not running");
                std::process::exit(1);
            }
        }

        Commands::Kill => {
            commands::kill::execute()?;
        }

        Commands::Reset {
            device_id,
            keep_database,
        } => {
            commands::reset::execute(device_id, keep_database)?;
        }

        Commands::SwitchAccount {
            email,
            token,
            assignment,
            force,
        } => {
            commands::switch::execute(email, token, assignment.as_deref(), force)?;
        }

        Commands::Hook { action } => match action {
            HookAction::Status => commands::hook::status()?,
            HookAction::Apply => commands::hook::apply()?,
            HookAction::Revert => commands::hook::revert()?,
        },
    }

    Ok(())
}
