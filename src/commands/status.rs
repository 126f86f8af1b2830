//! Status command - machine identity, account and hook state at a glance

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config;
use crate::cursor::hook::{self, HookStatus};
use crate::cursor::process::{CursorProcesses, ProcessControl};
use crate::cursor::storage;

/// Execute the status command
pub fn execute() -> Result<()> {
    let paths = config::resolve()?;
    let info = storage::read_machine_info(&paths);

    let not_found = "Not found".dimmed().to_string();

    println!(
        "Machine ID:  {}",
        info.machine_id.as_deref().unwrap_or(not_found.as_str())
    );
    println!(
        "Account:     {}",
        info.current_account.as_deref().unwrap_or(not_found.as_str())
    );
    println!(
        "Token:       {}",
        match &info.cursor_token {
            Some(token) => preview_token(token),
            None => not_found.clone(),
        }
    );

    let hook_line = match &paths.main_script {
        None => "main.js not found".dimmed().to_string(),
        Some(script) => match hook::status(script) {
            Ok(HookStatus::Patched) => "applied".green().to_string(),
            Ok(HookStatus::Unpatched) => "not applied".to_string(),
            Err(e) => format!("{} {}", "unknown:".yellow(), e),
        },
    };
    println!("Hook:        {}", hook_line);

    if CursorProcesses.is_running() {
        println!("Cursor:      {}", "running".yellow());
    } else {
        println!("Cursor:      not running");
    }

    Ok(())
}

/// Never print a full token; the first few characters are enough to tell
/// accounts apart.
fn preview_token(token: &str) -> String {
    if token.chars().count() <= 10 {
        "*".repeat(token.chars().count())
    } else {
        format!("{}...", token.chars().take(10).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_token_truncates() {
        assert_eq!(preview_token("0123456789abcdef"), "0123456789...");
        assert_eq!(preview_token("short"), "*****");
    }
}
