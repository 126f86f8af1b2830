//! CLI commands

pub mod hook;
pub mod kill;
pub mod paths;
pub mod reset;
pub mod status;
pub mod switch;
