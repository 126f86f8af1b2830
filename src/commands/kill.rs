//! Kill command - terminate running Cursor processes

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cursor::process::{CursorProcesses, ProcessControl};

/// Execute the kill command
pub fn execute() -> Result<()> {
    let processes = CursorProcesses;

    let pids = processes.pids();
    if pids.is_empty() {
        println!("Cursor is not running.");
        return Ok(());
    }

    println!("Terminating {} Cursor process(es)...", pids.len());
    processes.kill_all()?;
    println!("{} Cursor processes closed", "Done:".green());

    Ok(())
}
