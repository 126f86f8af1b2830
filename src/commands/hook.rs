//! Hook command - apply, revert or inspect the main.js identity hook

use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::config;
use crate::cursor::hook::{self, HookStatus, RevertOutcome};
use crate::error::Error;

/// Execute `hook status`
pub fn status() -> Result<()> {
    let script = require_script()?;

    match hook::status(&script)? {
        HookStatus::Patched => println!("Hook is {}.", "applied".green()),
        HookStatus::Unpatched => println!("Hook is not applied."),
    }

    Ok(())
}

/// Execute `hook apply`
pub fn apply() -> Result<()> {
    let script = require_script()?;

    let applied = hook::apply(&script)?;
    println!(
        "{} Hook applied to {} (pattern set: {})",
        "Done:".green(),
        script.display(),
        applied.version
    );
    println!("Backup kept at {}", hook::backup_path(&script).display());

    Ok(())
}

/// Execute `hook revert`
pub fn revert() -> Result<()> {
    let script = require_script()?;

    match hook::revert(&script)? {
        RevertOutcome::Restored => {
            println!("{} main.js restored from backup", "Done:".green());
        }
        RevertOutcome::NoBackup => {
            println!("No backup found; main.js is unmodified.");
        }
    }

    Ok(())
}

fn require_script() -> Result<PathBuf> {
    let paths = config::resolve()?;
    paths
        .main_script
        .ok_or_else(|| Error::ScriptNotFound(paths.config_dir.join("main.js")).into())
}
