//! recursor library
//!
//! Core functionality for resetting Cursor IDE machine identity, switching
//! the locally persisted account, and managing the main.js identity hook.
//!
//! # Disclaimer
//!
//! This tool is not affiliated with or endorsed by Anysphere, Inc. (Cursor).
//! It modifies locally stored data on your machine at your own request.

pub mod commands;
pub mod config;
pub mod cursor;
pub mod error;
pub mod service;
