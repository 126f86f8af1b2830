//! Typed errors for failures callers need to tell apart
//!
//! Most I/O plumbing uses `anyhow` with context strings; these variants
//! cover the cases where the CLI (or a library consumer) branches on the
//! failure kind.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS identifier is not one Cursor ships on.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Hook operations need the installed main.js; none was found.
    #[error("Cursor main.js not found at: {}", .0.display())]
    ScriptNotFound(PathBuf),

    /// No known patch strategy matches the script content. Either the hook
    /// is already applied or the installed Cursor version is incompatible.
    #[error("No patch target found in: {}", .0.display())]
    NoPatchTarget(PathBuf),

    /// Cursor processes survived every kill attempt.
    #[error("{remaining} Cursor process(es) still running after {attempts} attempts")]
    Termination { attempts: u32, remaining: usize },

    /// The service-account assignment carried no usable token.
    #[error("Service account has no token available")]
    NoTokenAvailable,

    /// A reset or account switch is already in flight in this process.
    #[error("Another reset or account switch is already in progress")]
    OperationInProgress,
}
