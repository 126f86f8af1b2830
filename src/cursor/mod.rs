//! Core Cursor state operations

pub mod hook;
pub mod identity;
pub mod process;
pub mod reset;
pub mod storage;

// Re-exports for library consumers
#[allow(unused_imports)]
pub use process::{CursorProcesses, ProcessControl};
#[allow(unused_imports)]
pub use reset::Orchestrator;
