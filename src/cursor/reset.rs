//! Composite reset and account-switch operations
//!
//! Sequencing rules:
//! - Identity stores are never touched while Cursor may still be running;
//!   a kill that cannot be verified complete fails the whole operation
//!   before any mutation.
//! - After the kill gate, independent steps are best-effort: a failed
//!   database cleanup does not prevent the storage.json identity write.
//!   Every step contributes one human-readable line to the report.
//! - One operation at a time per orchestrator; a second call while one is
//!   in flight fails with `OperationInProgress` instead of interleaving.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::PathSet;
use crate::cursor::hook::{self, RevertOutcome};
use crate::cursor::identity::{self, IdentitySet};
use crate::cursor::process::{ProcessControl, KILL_ATTEMPTS};
use crate::cursor::storage::{self, DatabaseRemoval, KeyWrite};
use crate::error::Error;
use crate::service::AccountCredential;

/// Time allowed for OS process teardown after a verified kill. Constant
/// wait, no polling.
const SETTLE_AFTER_KILL: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Clone)]
pub struct ResetOptions {
    /// Overrides the generated device id verbatim.
    pub custom_device_id: Option<String>,
    /// Skip the wholesale database file removal.
    pub keep_database: bool,
}

/// One status line per completed sub-step.
#[derive(Debug)]
pub struct StepReport {
    pub step: &'static str,
    pub line: String,
}

/// Breakdown of a completed reset. Partial sub-step failures are visible
/// in the step lines even when the reset as a whole succeeded.
#[derive(Debug)]
pub struct ResetReport {
    pub steps: Vec<StepReport>,
    /// The freshly persisted device id.
    pub device_id: String,
}

#[derive(Debug)]
pub enum SwitchOutcome {
    /// Cursor is running and the caller did not force a kill; nothing was
    /// changed. The caller decides whether to retry with force.
    NeedsConfirmation,
    Switched {
        email: String,
        key_writes: Vec<KeyWrite>,
    },
}

pub struct Orchestrator<'a, P: ProcessControl> {
    paths: &'a PathSet,
    processes: &'a P,
    settle_delay: Duration,
    in_flight: AtomicBool,
}

impl<'a, P: ProcessControl> Orchestrator<'a, P> {
    pub fn new(paths: &'a PathSet, processes: &'a P) -> Self {
        Self {
            paths,
            processes,
            settle_delay: SETTLE_AFTER_KILL,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Test constructor: skip the fixed teardown waits.
    pub fn with_settle_delay(paths: &'a PathSet, processes: &'a P, delay: Duration) -> Self {
        Self {
            settle_delay: delay,
            ..Self::new(paths, processes)
        }
    }

    fn begin(&self) -> Result<OperationGuard<'_>, Error> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::OperationInProgress);
        }
        Ok(OperationGuard { flag: &self.in_flight })
    }

    /// Kill Cursor and verify it stayed dead. Errors out before any state
    /// store has been touched.
    fn terminate_and_verify(&self) -> Result<()> {
        self.processes.kill_all()?;
        thread::sleep(self.settle_delay);
        if self.processes.is_running() {
            return Err(Error::Termination {
                attempts: KILL_ATTEMPTS,
                remaining: self.processes.pids().len(),
            }
            .into());
        }
        Ok(())
    }

    /// Full machine-identity reset.
    pub fn full_reset(&self, opts: &ResetOptions) -> Result<ResetReport> {
        let _guard = self.begin()?;
        let mut steps = Vec::new();

        if self.processes.is_running() {
            self.terminate_and_verify()?;
            steps.push(StepReport {
                step: "processes",
                line: "Cursor processes closed".into(),
            });
        } else {
            steps.push(StepReport {
                step: "processes",
                line: "Cursor is not running".into(),
            });
        }

        steps.push(StepReport {
            step: "cleanup",
            line: summarize_writes(
                "Telemetry entries cleaned",
                "Telemetry cleanup skipped (no database file)",
                &storage::cleanup_telemetry_entries(self.paths),
            ),
        });

        let ids: IdentitySet = identity::generate(opts.custom_device_id.as_deref());

        storage::write_identity(self.paths, &ids)?;
        steps.push(StepReport {
            step: "identity",
            line: format!("New identity written to {}", self.paths.storage.display()),
        });

        steps.push(StepReport {
            step: "database",
            line: summarize_writes(
                "Identity keys updated in database",
                "Database update skipped (no database file)",
                &storage::write_identity_to_database(self.paths, &ids),
            ),
        });

        if opts.keep_database {
            steps.push(StepReport {
                step: "clean",
                line: "Database file kept".into(),
            });
        } else {
            steps.push(StepReport {
                step: "clean",
                line: match storage::remove_database(self.paths) {
                    DatabaseRemoval::Removed => "Database file removed".into(),
                    DatabaseRemoval::Absent => "Database file not present".into(),
                    DatabaseRemoval::Failed(e) => {
                        format!("Could not remove database file: {}", e)
                    }
                },
            });
        }

        steps.push(StepReport {
            step: "hook",
            line: match &self.paths.main_script {
                None => "main.js not found, nothing to restore".into(),
                Some(script) => match hook::revert(script) {
                    Ok(RevertOutcome::Restored) => "main.js restored from backup".into(),
                    Ok(RevertOutcome::NoBackup) => "main.js backup not found".into(),
                    Err(e) => format!("Could not restore main.js: {}", e),
                },
            },
        });

        Ok(ResetReport {
            steps,
            device_id: ids.dev_device_id,
        })
    }

    /// Switch the persisted account. Refuses to proceed while Cursor is
    /// running unless `force_kill` is set.
    pub fn switch_account(
        &self,
        credential: &AccountCredential,
        force_kill: bool,
    ) -> Result<SwitchOutcome> {
        let _guard = self.begin()?;

        if self.processes.is_running() {
            if !force_kill {
                return Ok(SwitchOutcome::NeedsConfirmation);
            }
            self.terminate_and_verify()?;
        }

        let credential = AccountCredential {
            email: credential.email.clone(),
            token: unwrap_token(&credential.token),
        };

        let key_writes = storage::write_account_credential(self.paths, &credential)?;

        Ok(SwitchOutcome::Switched {
            email: credential.email,
            key_writes,
        })
    }
}

struct OperationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Upstream sometimes delivers tokens as `userId::token`; only the second
/// segment is the credential.
fn unwrap_token(token: &str) -> String {
    token
        .split("::")
        .nth(1)
        .unwrap_or(token)
        .to_string()
}

fn summarize_writes(ok_label: &str, empty_label: &str, writes: &[KeyWrite]) -> String {
    if writes.is_empty() {
        return empty_label.to_string();
    }
    let failed: Vec<&KeyWrite> = writes.iter().filter(|w| !w.is_ok()).collect();
    if failed.is_empty() {
        format!("{} ({} keys)", ok_label, writes.len())
    } else {
        format!(
            "{} ({}/{} keys failed: {})",
            ok_label,
            failed.len(),
            writes.len(),
            failed
                .iter()
                .map(|w| w.key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    struct MockProcesses {
        running: AtomicBool,
        kill_fails: bool,
    }

    impl MockProcesses {
        fn running(initially: bool) -> Self {
            Self {
                running: AtomicBool::new(initially),
                kill_fails: false,
            }
        }

        fn unkillable() -> Self {
            Self {
                running: AtomicBool::new(true),
                kill_fails: true,
            }
        }
    }

    impl ProcessControl for MockProcesses {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn pids(&self) -> Vec<u32> {
            if self.is_running() {
                vec![4242]
            } else {
                Vec::new()
            }
        }

        fn kill_all(&self) -> Result<(), Error> {
            if self.kill_fails {
                return Err(Error::Termination {
                    attempts: KILL_ATTEMPTS,
                    remaining: 1,
                });
            }
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_paths(dir: &Path) -> PathSet {
        PathSet {
            storage: dir.join("storage.json"),
            auth: dir.join("auth.json"),
            database: dir.join("state.vscdb"),
            main_script: None,
            config_dir: dir.to_path_buf(),
        }
    }

    fn orchestrator<'a, P: ProcessControl>(
        paths: &'a PathSet,
        processes: &'a P,
    ) -> Orchestrator<'a, P> {
        Orchestrator::with_settle_delay(paths, processes, Duration::ZERO)
    }

    #[test]
    fn test_full_reset_fresh_environment() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(false);

        let report = orchestrator(&paths, &processes)
            .full_reset(&ResetOptions::default())
            .unwrap();

        assert_eq!(report.steps.len(), 5);
        let store = storage::read_json_lossy(&paths.storage);
        for key in [
            "telemetry.devDeviceId",
            "telemetry.macMachineId",
            "telemetry.machineId",
            "telemetry.sqmId",
        ] {
            assert!(store.contains_key(key), "missing {}", key);
        }
        assert_eq!(
            store["telemetry.devDeviceId"].as_str(),
            Some(report.device_id.as_str())
        );
    }

    #[test]
    fn test_full_reset_unkillable_process_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::unkillable();

        let err = orchestrator(&paths, &processes)
            .full_reset(&ResetOptions::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Termination { .. })
        ));
        assert!(!paths.storage.exists());
    }

    #[test]
    fn test_full_reset_kills_running_cursor() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(true);

        let report = orchestrator(&paths, &processes)
            .full_reset(&ResetOptions::default())
            .unwrap();

        assert!(!processes.is_running());
        assert_eq!(report.steps[0].line, "Cursor processes closed");
    }

    #[test]
    fn test_full_reset_custom_device_id() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(false);

        let opts = ResetOptions {
            custom_device_id: Some("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee".into()),
            keep_database: false,
        };
        let report = orchestrator(&paths, &processes).full_reset(&opts).unwrap();
        assert_eq!(report.device_id, "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee");
    }

    #[test]
    fn test_full_reset_database_handling() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(false);

        let create_db = || {
            let conn = Connection::open(&paths.database).unwrap();
            conn.execute(
                "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
                [],
            )
            .unwrap();
        };

        create_db();
        let opts = ResetOptions {
            keep_database: true,
            ..Default::default()
        };
        orchestrator(&paths, &processes).full_reset(&opts).unwrap();
        assert!(paths.database.exists());

        orchestrator(&paths, &processes)
            .full_reset(&ResetOptions::default())
            .unwrap();
        assert!(!paths.database.exists());
    }

    #[test]
    fn test_full_reset_reverts_hook() {
        let dir = TempDir::new().unwrap();
        let mut paths = test_paths(dir.path());
        let script = dir.path().join("main.js");
        fs::write(&script, "patched content").unwrap();
        fs::write(hook::backup_path(&script), "original content").unwrap();
        paths.main_script = Some(script.clone());

        let processes = MockProcesses::running(false);
        let report = orchestrator(&paths, &processes)
            .full_reset(&ResetOptions::default())
            .unwrap();

        assert_eq!(fs::read_to_string(&script).unwrap(), "original content");
        assert!(!hook::backup_path(&script).exists());
        assert!(report
            .steps
            .iter()
            .any(|s| s.line == "main.js restored from backup"));
    }

    #[test]
    fn test_switch_account_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(true);

        let credential = AccountCredential {
            email: "a@example.com".into(),
            token: "tok".into(),
        };
        let outcome = orchestrator(&paths, &processes)
            .switch_account(&credential, false)
            .unwrap();

        assert!(matches!(outcome, SwitchOutcome::NeedsConfirmation));
        assert!(processes.is_running());
        assert!(!paths.storage.exists());
    }

    #[test]
    fn test_switch_account_forced() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(true);

        let credential = AccountCredential {
            email: "a@example.com".into(),
            token: "user-1::real-token".into(),
        };
        let outcome = orchestrator(&paths, &processes)
            .switch_account(&credential, true)
            .unwrap();

        let SwitchOutcome::Switched { email, .. } = outcome else {
            panic!("expected switch to proceed");
        };
        assert_eq!(email, "a@example.com");
        assert!(!processes.is_running());

        // Delimited token is unwrapped before persisting
        let store = storage::read_json_lossy(&paths.storage);
        assert_eq!(store["cursorAuth/accessToken"].as_str(), Some("real-token"));
    }

    #[test]
    fn test_unwrap_token() {
        assert_eq!(unwrap_token("plain"), "plain");
        assert_eq!(unwrap_token("user::tok"), "tok");
        assert_eq!(unwrap_token("a::b::c"), "b");
        assert_eq!(unwrap_token(""), "");
    }

    #[test]
    fn test_operation_guard_rejects_reentry() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(dir.path());
        let processes = MockProcesses::running(false);
        let orch = orchestrator(&paths, &processes);

        let guard = orch.begin().unwrap();
        assert!(matches!(orch.begin(), Err(Error::OperationInProgress)));
        drop(guard);
        assert!(orch.begin().is_ok());
    }

    #[test]
    fn test_summarize_writes() {
        assert_eq!(summarize_writes("Done", "Skipped", &[]), "Skipped");
    }
}
