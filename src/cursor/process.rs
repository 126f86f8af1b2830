//! Cursor process detection and termination
//!
//! Detection shells out to the platform's process tools:
//! - Windows: `tasklist` filtered on Cursor.exe
//! - macOS: `pgrep -f` on the bundle executable, with a `ps` pass that
//!   drops helper/renderer subprocesses
//! - Linux: `pgrep` against the common install locations
//!
//! Termination is force-kill with a fixed number of attempts and constant
//! waits in between; there is no graceful-shutdown path because the whole
//! point is to stop Cursor before its state files are rewritten.

use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::error::Error;

/// Number of list-kill-recheck rounds before giving up.
pub const KILL_ATTEMPTS: u32 = 3;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const PER_KILL_DELAY: Duration = Duration::from_millis(200);
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[cfg(target_os = "macos")]
const MACOS_EXECUTABLE: &str = "/Applications/Cursor.app/Contents/MacOS/Cursor";

/// Seam between the orchestrator and real process management, so composite
/// operations can be exercised without killing anything.
pub trait ProcessControl {
    /// Is a main Cursor process currently running?
    fn is_running(&self) -> bool;

    /// PIDs of all matching Cursor processes.
    fn pids(&self) -> Vec<u32>;

    /// Terminate every matching process, retrying up to [`KILL_ATTEMPTS`]
    /// times. Individual kill failures are swallowed; only survivors after
    /// the last attempt are fatal.
    fn kill_all(&self) -> Result<(), Error>;
}

/// The real implementation, backed by platform process tools.
pub struct CursorProcesses;

impl ProcessControl for CursorProcesses {
    fn is_running(&self) -> bool {
        !self.pids().is_empty()
    }

    fn pids(&self) -> Vec<u32> {
        list_cursor_pids()
    }

    fn kill_all(&self) -> Result<(), Error> {
        for attempt in 1..=KILL_ATTEMPTS {
            let pids = self.pids();

            if pids.is_empty() {
                // Nothing left; give the OS a moment to finish teardown.
                thread::sleep(SETTLE_DELAY);
                return Ok(());
            }

            for pid in &pids {
                // Failures here are retried on the next round.
                let _ = kill_single(*pid);
                thread::sleep(PER_KILL_DELAY);
            }

            thread::sleep(RETRY_DELAY);

            let remaining = self.pids();
            if remaining.is_empty() {
                thread::sleep(SETTLE_DELAY);
                return Ok(());
            }

            if attempt == KILL_ATTEMPTS {
                return Err(Error::Termination {
                    attempts: KILL_ATTEMPTS,
                    remaining: remaining.len(),
                });
            }
        }

        Ok(())
    }
}

/// Run a command and capture stdout as a string; any failure reads as "no
/// output", matching the best-effort detection policy.
fn command_stdout(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
        .unwrap_or_default()
}

#[cfg(target_os = "windows")]
fn list_cursor_pids() -> Vec<u32> {
    let stdout = command_stdout(
        "tasklist",
        &["/FI", "IMAGENAME eq Cursor.exe", "/FO", "CSV", "/NH"],
    );
    parse_tasklist_pids(&stdout)
}

#[cfg(target_os = "macos")]
fn list_cursor_pids() -> Vec<u32> {
    let stdout = command_stdout("pgrep", &["-f", MACOS_EXECUTABLE]);

    // pgrep -f also matches helper/renderer subprocesses; keep only PIDs
    // whose argument list looks like the main executable.
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| {
            let args = command_stdout("ps", &["-p", &pid.to_string(), "-o", "args="]);
            args.lines().any(is_main_cursor_process)
        })
        .collect()
}

#[cfg(target_os = "linux")]
fn list_cursor_pids() -> Vec<u32> {
    // Install locations differ across package formats; first probe that
    // yields anything wins.
    let probes: [&[&str]; 4] = [
        &["-f", "/usr/bin/cursor"],
        &["-f", "/opt/cursor"],
        &["-f", "/snap/cursor"],
        &["-x", "cursor"],
    ];

    for args in probes {
        let pids: Vec<u32> = command_stdout("pgrep", args)
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect();
        if !pids.is_empty() {
            return pids;
        }
    }

    Vec::new()
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn list_cursor_pids() -> Vec<u32> {
    Vec::new()
}

#[cfg(target_os = "windows")]
fn kill_single(pid: u32) -> std::io::Result<()> {
    Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output()
        .map(|_| ())
}

#[cfg(not(target_os = "windows"))]
fn kill_single(pid: u32) -> std::io::Result<()> {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .output()
        .map(|_| ())
}

/// Extract PIDs from `tasklist /FO CSV /NH` output.
///
/// Lines look like: `"Cursor.exe","1234","Console","1","150,000 K"`.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn parse_tasklist_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter(|line| line.contains("Cursor.exe"))
        .filter_map(|line| {
            let mut fields = line.split("\",\"");
            fields.next()?; // image name
            fields.next()?.parse().ok()
        })
        .collect()
}

/// Does a `ps -o args=` line belong to the main Cursor process?
///
/// Renderer and utility subprocesses carry `--type=` flags, helpers have
/// "Helper" in their bundle path; both must be excluded or is_running
/// would report true long after the main process died.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn is_main_cursor_process(args_line: &str) -> bool {
    args_line.contains("/Applications/Cursor.app/Contents/MacOS/Cursor")
        && !args_line.contains("--type=")
        && !args_line.contains("Helper")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tasklist_pids() {
        let stdout = "\"Cursor.exe\",\"1234\",\"Console\",\"1\",\"150,000 K\"\n\
                      \"Cursor.exe\",\"5678\",\"Console\",\"1\",\"80,000 K\"\n";
        assert_eq!(parse_tasklist_pids(stdout), vec![1234, 5678]);
    }

    #[test]
    fn test_parse_tasklist_ignores_other_images() {
        let stdout = "\"notepad.exe\",\"42\",\"Console\",\"1\",\"8,000 K\"\n\
                      \"Cursor.exe\",\"99\",\"Console\",\"1\",\"80,000 K\"\n";
        assert_eq!(parse_tasklist_pids(stdout), vec![99]);
    }

    #[test]
    fn test_parse_tasklist_empty_output() {
        assert!(parse_tasklist_pids("").is_empty());
        assert!(parse_tasklist_pids("INFO: No tasks are running.\n").is_empty());
    }

    #[test]
    fn test_main_process_filter() {
        assert!(is_main_cursor_process(
            "/Applications/Cursor.app/Contents/MacOS/Cursor"
        ));
        assert!(!is_main_cursor_process(
            "/Applications/Cursor.app/Contents/MacOS/Cursor --type=renderer"
        ));
        assert!(!is_main_cursor_process(
            "/Applications/Cursor.app/Contents/Frameworks/Cursor Helper (GPU).app/Contents/MacOS/Cursor Helper"
        ));
        assert!(!is_main_cursor_process("/usr/bin/vim"));
    }
}
