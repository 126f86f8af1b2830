//! Platform-specific Cursor paths
//!
//! Cursor keeps its global state under the per-user config directory:
//! - macOS: ~/Library/Application Support/Cursor/User/
//! - Linux: ~/.config/Cursor/User/
//! - Windows: %USERPROFILE%/AppData/Roaming/Cursor/User/
//!
//! The patch target (the bundled main.js) lives in the installation
//! directory, which varies by platform and install method, so it is probed
//! from an ordered candidate list and may legitimately be absent.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Resolved locations for one Cursor installation.
///
/// Recomputed on every call site that needs it; nothing here is cached.
#[derive(Debug, Clone)]
pub struct PathSet {
    /// globalStorage/storage.json: flat JSON key/value store
    pub storage: PathBuf,
    /// globalStorage/auth.json: newer auth-scheme sidecar
    pub auth: PathBuf,
    /// globalStorage/state.vscdb: SQLite database with ItemTable
    pub database: PathBuf,
    /// Bundled main.js, if an installation was found
    pub main_script: Option<PathBuf>,
    /// The Cursor/User directory containing the above
    pub config_dir: PathBuf,
}

/// Resolve the path set for the current machine.
pub fn resolve() -> Result<PathSet> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let local_app_data = std::env::var_os("LOCALAPPDATA").map(PathBuf::from);
    let resolved = resolve_for(std::env::consts::OS, &home, local_app_data.as_deref())?;
    let main_script = resolved
        .main_script_candidates
        .iter()
        .find(|p| p.exists())
        .cloned();
    Ok(resolved.into_path_set(main_script))
}

/// Everything path resolution can compute without touching the filesystem.
#[derive(Debug)]
pub struct ResolvedPaths {
    pub storage: PathBuf,
    pub auth: PathBuf,
    pub database: PathBuf,
    pub config_dir: PathBuf,
    pub main_script_candidates: Vec<PathBuf>,
}

impl ResolvedPaths {
    pub fn into_path_set(self, main_script: Option<PathBuf>) -> PathSet {
        PathSet {
            storage: self.storage,
            auth: self.auth,
            database: self.database,
            main_script,
            config_dir: self.config_dir,
        }
    }
}

/// Pure path resolution for a given OS identifier and home directory.
///
/// `local_app_data` is only consulted on Windows (%LOCALAPPDATA% holds the
/// per-user installation directory). Unknown OS identifiers fail with
/// [`Error::UnsupportedPlatform`].
pub fn resolve_for(
    os: &str,
    home: &Path,
    local_app_data: Option<&Path>,
) -> Result<ResolvedPaths, Error> {
    let (app_data_dir, config_dir) = match os {
        "windows" => {
            let app = home.join("AppData").join("Roaming").join("Cursor");
            let cfg = app.join("User");
            (app, cfg)
        }
        "macos" => {
            let app = home
                .join("Library")
                .join("Application Support")
                .join("Cursor");
            let cfg = app.join("User");
            (app, cfg)
        }
        "linux" => {
            let app = home.join(".config").join("Cursor");
            let cfg = app.join("User");
            (app, cfg)
        }
        other => return Err(Error::UnsupportedPlatform(other.to_string())),
    };

    let global_storage = config_dir.join("globalStorage");

    Ok(ResolvedPaths {
        storage: global_storage.join("storage.json"),
        auth: global_storage.join("auth.json"),
        database: global_storage.join("state.vscdb"),
        config_dir,
        main_script_candidates: main_script_candidates(os, &app_data_dir, local_app_data),
    })
}

/// Ordered list of locations where the bundled main.js may live.
///
/// The first existing candidate wins; a miss on all of them is not an
/// error (hook operations report it separately).
fn main_script_candidates(
    os: &str,
    app_data_dir: &Path,
    local_app_data: Option<&Path>,
) -> Vec<PathBuf> {
    match os {
        "macos" => vec![
            PathBuf::from("/Applications/Cursor.app/Contents/Resources/app/out/main.js"),
            PathBuf::from("/Applications/Cursor.app/Contents/Resources/app/main.js"),
            app_data_dir.join("main.js"),
        ],
        "windows" => {
            let programs = local_app_data
                .map(|p| p.join("Programs").join("Cursor"))
                .unwrap_or_else(|| PathBuf::from("Programs").join("Cursor"));
            vec![
                programs
                    .join("resources")
                    .join("app")
                    .join("out")
                    .join("main.js"),
                programs.join("resources").join("app").join("main.js"),
                app_data_dir.join("main.js"),
            ]
        }
        _ => vec![
            PathBuf::from("/opt/cursor/resources/app/out/main.js"),
            PathBuf::from("/opt/cursor/resources/app/main.js"),
            app_data_dir.join("main.js"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_layout() {
        let paths = resolve_for("linux", Path::new("/home/me"), None).unwrap();
        assert_eq!(
            paths.storage,
            PathBuf::from("/home/me/.config/Cursor/User/globalStorage/storage.json")
        );
        assert_eq!(
            paths.database,
            PathBuf::from("/home/me/.config/Cursor/User/globalStorage/state.vscdb")
        );
        assert_eq!(
            paths.auth,
            PathBuf::from("/home/me/.config/Cursor/User/globalStorage/auth.json")
        );
        assert_eq!(
            paths.config_dir,
            PathBuf::from("/home/me/.config/Cursor/User")
        );
    }

    #[test]
    fn test_macos_layout() {
        let paths = resolve_for("macos", Path::new("/Users/me"), None).unwrap();
        assert!(paths
            .storage
            .starts_with("/Users/me/Library/Application Support/Cursor/User"));
        assert!(paths.storage.ends_with("storage.json"));
        assert!(paths.database.ends_with("state.vscdb"));
    }

    #[test]
    fn test_windows_layout() {
        let paths = resolve_for(
            "windows",
            Path::new("C:\\Users\\me"),
            Some(Path::new("C:\\Users\\me\\AppData\\Local")),
        )
        .unwrap();
        assert!(paths.storage.ends_with("storage.json"));
        assert!(paths.config_dir.to_string_lossy().contains("AppData"));
        // Installation candidates come from %LOCALAPPDATA%
        assert!(paths.main_script_candidates[0]
            .to_string_lossy()
            .contains("Programs"));
    }

    #[test]
    fn test_unsupported_platform() {
        let err = resolve_for("freebsd", Path::new("/home/me"), None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform(ref os) if os == "freebsd"));
    }

    #[test]
    fn test_main_script_candidates_ordered() {
        let candidates = main_script_candidates(
            "macos",
            Path::new("/Users/me/Library/Application Support/Cursor"),
            None,
        );
        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].to_string_lossy().contains("out/main.js"));
        assert!(candidates[2].ends_with("main.js"));
    }
}
