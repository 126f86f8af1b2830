//! Reset command - full machine-identity reset

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config;
use crate::cursor::process::CursorProcesses;
use crate::cursor::reset::{Orchestrator, ResetOptions};

/// Execute the reset command
pub fn execute(device_id: Option<String>, keep_database: bool) -> Result<()> {
    let paths = config::resolve()?;
    let processes = CursorProcesses;
    let orchestrator = Orchestrator::new(&paths, &processes);

    let opts = ResetOptions {
        custom_device_id: device_id,
        keep_database,
    };

    println!("Resetting Cursor machine identity...\n");

    let report = orchestrator.full_reset(&opts)?;

    for step in &report.steps {
        println!("  {} {}", "-".dimmed(), step.line);
    }

    println!(
        "\n{} New device id: {}",
        "Reset complete.".green(),
        report.device_id
    );

    Ok(())
}
