//! Hook patching of Cursor's bundled main.js
//!
//! The hook rewrites the identity accessors in the bundled script so they
//! return the stored id field directly, dropping the fallback that would
//! recompute a native id. The accessors look like:
//!
//! ```text
//! async getMachineId(){return this.machineId??t$()}
//! async getMacMachineId(){return this.macMachineId??b$()}
//! ```
//!
//! and become `async getMachineId(){return this.machineId}` once patched.
//!
//! Patterns are fragile across Cursor versions, so the match/replace pairs
//! live in an ordered strategy table; apply picks the first strategy whose
//! rules all match, and a script no strategy matches is an explicit
//! `NoPatchTarget` failure.
//!
//! A `.backup` sibling holding the pre-patch content is the single source
//! of truth for "hook currently applied": created on first apply, consumed
//! and deleted by revert.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// One regex rewrite inside a strategy.
pub struct PatchRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

/// A complete pattern set for one range of Cursor bundle versions.
pub struct PatchStrategy {
    pub version: &'static str,
    rules: Vec<PatchRule>,
}

impl PatchStrategy {
    /// Every rule must match for the strategy to be applicable to apply.
    fn matches(&self, content: &str) -> bool {
        self.rules.iter().all(|r| r.pattern.is_match(content))
    }

    /// Does any rule still match? A single surviving accessor in original
    /// form means the script is not (fully) patched.
    fn any_rule_matches(&self, content: &str) -> bool {
        self.rules.iter().any(|r| r.pattern.is_match(content))
    }

    fn rewrite(&self, content: &str) -> String {
        let mut out = content.to_string();
        for rule in &self.rules {
            out = rule
                .pattern
                .replace_all(&out, rule.replacement)
                .into_owned();
        }
        out
    }
}

/// Known pattern sets, newest first.
pub fn strategies() -> Vec<PatchStrategy> {
    vec![PatchStrategy {
        version: "bundled-1.x",
        rules: vec![
            // The capture is the stored object path before the ??; the
            // fallback after it is what gets dropped.
            PatchRule {
                name: "getMachineId",
                pattern: Regex::new(
                    r"async getMachineId\(\)\{return ([^}]*?)\?\?[^}]+\}",
                )
                .expect("valid pattern"),
                replacement: "async getMachineId(){return $1}",
            },
            PatchRule {
                name: "getMacMachineId",
                pattern: Regex::new(
                    r"async getMacMachineId\(\)\{return ([^}]*?)\?\?[^}]+\}",
                )
                .expect("valid pattern"),
                replacement: "async getMacMachineId(){return $1}",
            },
        ],
    }]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// All accessor occurrences have been rewritten.
    Patched,
    /// At least one strategy still fully matches the script.
    Unpatched,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Script restored from the backup, backup deleted.
    Restored,
    /// No backup sibling; nothing to revert. Informational, not an error.
    NoBackup,
}

/// The backup sibling for a script path.
pub fn backup_path(script: &Path) -> PathBuf {
    let mut os = script.as_os_str().to_owned();
    os.push(".backup");
    PathBuf::from(os)
}

/// Check whether the hook is currently applied to the script content.
///
/// Patched means no rule of any strategy matches any remaining
/// occurrence; one accessor still in original form is enough to report
/// Unpatched.
pub fn status(script: &Path) -> Result<HookStatus> {
    let content = read_script(script)?;
    if strategies().iter().any(|s| s.any_rule_matches(&content)) {
        Ok(HookStatus::Unpatched)
    } else {
        Ok(HookStatus::Patched)
    }
}

/// Information about a successful apply.
#[derive(Debug)]
pub struct AppliedPatch {
    /// The strategy version that matched.
    pub version: &'static str,
}

/// Apply the hook: back up the script (first apply wins), then rewrite
/// every accessor occurrence in place.
pub fn apply(script: &Path) -> Result<AppliedPatch> {
    let content = read_script(script)?;

    let strategies = strategies();
    let strategy = strategies
        .iter()
        .find(|s| s.matches(&content))
        .ok_or_else(|| Error::NoPatchTarget(script.to_path_buf()))?;

    // The backup must always hold unpatched content, so a second apply
    // must never overwrite it.
    let backup = backup_path(script);
    if !backup.exists() {
        fs::write(&backup, &content)
            .with_context(|| format!("Failed to write backup: {}", backup.display()))?;
    }

    let patched = strategy.rewrite(&content);
    fs::write(script, patched)
        .with_context(|| format!("Failed to write: {}", script.display()))?;

    Ok(AppliedPatch {
        version: strategy.version,
    })
}

/// Restore the script from its backup and remove the backup.
pub fn revert(script: &Path) -> Result<RevertOutcome> {
    let backup = backup_path(script);
    if !backup.exists() {
        return Ok(RevertOutcome::NoBackup);
    }

    let original = fs::read_to_string(&backup)
        .with_context(|| format!("Failed to read backup: {}", backup.display()))?;
    fs::write(script, original)
        .with_context(|| format!("Failed to write: {}", script.display()))?;
    fs::remove_file(&backup)
        .with_context(|| format!("Failed to remove backup: {}", backup.display()))?;

    Ok(RevertOutcome::Restored)
}

fn read_script(script: &Path) -> Result<String> {
    if !script.exists() {
        return Err(Error::ScriptNotFound(script.to_path_buf()).into());
    }
    fs::read_to_string(script).with_context(|| format!("Failed to read: {}", script.display()))
}
