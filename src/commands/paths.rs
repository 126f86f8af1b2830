//! Paths command - show the resolved Cursor locations

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config;

/// Execute the paths command
pub fn execute() -> Result<()> {
    let paths = config::resolve()?;

    println!("Config dir:  {}", paths.config_dir.display());
    println!("Storage:     {}", paths.storage.display());
    println!("Auth:        {}", paths.auth.display());
    println!("Database:    {}", paths.database.display());
    match &paths.main_script {
        Some(script) => println!("main.js:     {}", script.display()),
        None => println!("main.js:     {}", "not found".dimmed()),
    }

    Ok(())
}
