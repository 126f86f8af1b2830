//! Switch-account command - persist a new account credential

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::config;
use crate::cursor::process::CursorProcesses;
use crate::cursor::reset::{Orchestrator, SwitchOutcome};
use crate::cursor::storage::KeyWrite;
use crate::service::AccountCredential;

/// Execute the switch-account command.
///
/// The credential comes either from explicit email/token arguments or from
/// a saved service-account assignment response (`--assignment <file>`).
pub fn execute(
    email: Option<String>,
    token: Option<String>,
    assignment_file: Option<&Path>,
    force_kill: bool,
) -> Result<()> {
    let credential = match (email, token, assignment_file) {
        (Some(email), Some(token), None) => AccountCredential { email, token },
        (None, None, Some(file)) => {
            let body = fs::read_to_string(file)
                .with_context(|| format!("Failed to read: {}", file.display()))?;
            AccountCredential::from_assignment_response(&body)?
        }
        _ => bail!("Provide either <email> <token> or --assignment <file>"),
    };

    let paths = config::resolve()?;
    let processes = CursorProcesses;
    let orchestrator = Orchestrator::new(&paths, &processes);

    match orchestrator.switch_account(&credential, force_kill)? {
        SwitchOutcome::NeedsConfirmation => {
            println!(
                "{} Cursor is currently running and will be force-closed.",
                "Warning:".yellow()
            );
            if !confirm("Close Cursor and switch account?")? {
                println!("Aborted.");
                return Ok(());
            }
            match orchestrator.switch_account(&credential, true)? {
                SwitchOutcome::Switched { email, key_writes } => {
                    report_switch(&email, &key_writes);
                }
                SwitchOutcome::NeedsConfirmation => unreachable!(),
            }
        }
        SwitchOutcome::Switched { email, key_writes } => {
            report_switch(&email, &key_writes);
        }
    }

    Ok(())
}

fn report_switch(email: &str, key_writes: &[KeyWrite]) {
    for write in key_writes.iter().filter(|w| !w.is_ok()) {
        eprintln!(
            "{} Database key {} was not updated",
            "Warning:".yellow(),
            write.key
        );
    }
    println!("{} Switched to account: {}", "Done:".green(), email);
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N) ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
