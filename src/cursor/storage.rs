//! State store operations
//!
//! Cursor spreads overlapping identity/auth state across three places with
//! inconsistent freshness: the flat JSON store (storage.json), a newer auth
//! sidecar (auth.json), and the ItemTable key/value table in state.vscdb.
//! Reads apply a fixed precedence (JSON store, then sidecar, then SQLite);
//! writes go to every store that exists, best-effort per key, so a corrupt
//! or missing store never blocks a reset.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rusqlite::{params, Connection};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use crate::config::PathSet;
use crate::cursor::identity::IdentitySet;
use crate::service::AccountCredential;

/// Outcome of one best-effort key write or delete.
///
/// Partial failure across keys is expected (locked database, missing
/// table); it is surfaced as a value instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrite {
    pub key: String,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Failed(String),
}

impl KeyWrite {
    fn ok(key: &str) -> Self {
        Self {
            key: key.to_string(),
            outcome: WriteOutcome::Ok,
        }
    }

    fn failed(key: &str, reason: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            outcome: WriteOutcome::Failed(reason.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == WriteOutcome::Ok
    }
}

/// Identity and account state as currently persisted, after the layered
/// lookup. `None` means no store had the field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    pub machine_id: Option<String>,
    pub current_account: Option<String>,
    pub cursor_token: Option<String>,
}

/// Placeholder token some builds leave behind; never a real credential.
const MOCK_TOKEN: &str = "mock-token";

/// Read a JSON object, treating a missing or corrupt file as empty.
///
/// Deliberately lossy: a store that cannot be parsed is replaced on the
/// next write rather than blocking the operation.
pub fn read_json_lossy(path: &Path) -> Map<String, Value> {
    if !path.exists() {
        return Map::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "{} Could not read {}: {}",
                "Warning:".yellow(),
                path.display(),
                e
            );
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            eprintln!(
                "{} {} is not valid JSON, starting fresh",
                "Warning:".yellow(),
                path.display()
            );
            Map::new()
        }
    }
}

/// Merge the four telemetry identity keys into storage.json.
///
/// Unrelated keys are preserved. The parent directory is created and a
/// read-only file mode is cleared before writing.
pub fn write_identity(paths: &PathSet, ids: &IdentitySet) -> Result<()> {
    let mut store = read_json_lossy(&paths.storage);

    store.insert("telemetry.devDeviceId".into(), json!(ids.dev_device_id));
    store.insert("telemetry.macMachineId".into(), json!(ids.mac_machine_id));
    store.insert("telemetry.machineId".into(), json!(ids.machine_id));
    store.insert("telemetry.sqmId".into(), json!(ids.sqm_id));

    write_json_object(&paths.storage, &store)
}

/// The key/value pairs a reset pushes into ItemTable.
fn identity_db_pairs(ids: &IdentitySet) -> Vec<(String, String)> {
    vec![
        ("telemetry.devDeviceId".into(), ids.dev_device_id.clone()),
        ("telemetry.macMachineId".into(), ids.mac_machine_id.clone()),
        ("telemetry.machineId".into(), ids.machine_id.clone()),
        ("telemetry.sqmId".into(), ids.sqm_id.clone()),
        // Cursor mirrors the device id under a second key
        ("storage.serviceMachineId".into(), ids.dev_device_id.clone()),
    ]
}

/// Upsert the identity keys into ItemTable, one outcome per key.
///
/// A missing database file yields an empty report; storage.json alone is
/// sufficient for a reset.
pub fn write_identity_to_database(paths: &PathSet, ids: &IdentitySet) -> Vec<KeyWrite> {
    if !paths.database.exists() {
        return Vec::new();
    }

    let pairs = identity_db_pairs(ids);

    let conn = match Connection::open(&paths.database) {
        Ok(conn) => conn,
        Err(e) => {
            return pairs
                .iter()
                .map(|(key, _)| KeyWrite::failed(key, &e))
                .collect();
        }
    };

    pairs
        .iter()
        .map(|(key, value)| {
            match conn.execute(
                "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
                params![key, value],
            ) {
                Ok(_) => KeyWrite::ok(key),
                Err(e) => KeyWrite::failed(key, &e),
            }
        })
        .collect()
}

/// Persist an account credential into every auth location Cursor reads.
///
/// storage.json is the primary store and its failure is fatal; the auth
/// sidecar and the SQLite rows are best-effort. The SQLite path uses an
/// UPDATE followed by a conditional INSERT per key, not a transaction, so
/// partial application across keys is possible.
pub fn write_account_credential(
    paths: &PathSet,
    credential: &AccountCredential,
) -> Result<Vec<KeyWrite>> {
    let auth_object = json!({
        "email": credential.email,
        "token": credential.token,
        "refreshToken": credential.token,
    });

    let mut store = read_json_lossy(&paths.storage);
    store.insert("workos.cursor.auth".into(), auth_object.clone());
    store.insert("cursorAuth/cachedEmail".into(), json!(credential.email));
    store.insert("cursorAuth/accessToken".into(), json!(credential.token));
    store.insert("cursorAuth/refreshToken".into(), json!(credential.token));
    write_json_object(&paths.storage, &store)?;

    // Newer auth scheme sidecar; optional, absorbed on failure.
    let sidecar = json!({
        "email": credential.email,
        "access_token": credential.token,
    });
    if let Err(e) = write_json_value(&paths.auth, &sidecar) {
        eprintln!(
            "{} Could not write auth sidecar {}: {}",
            "Warning:".yellow(),
            paths.auth.display(),
            e
        );
    }

    if !paths.database.exists() {
        return Ok(Vec::new());
    }

    let pairs = vec![
        ("workos.cursor.auth".to_string(), auth_object.to_string()),
        ("cursorAuth/cachedEmail".to_string(), credential.email.clone()),
        ("cursorAuth/accessToken".to_string(), credential.token.clone()),
        ("cursorAuth/refreshToken".to_string(), credential.token.clone()),
    ];

    let conn = match Connection::open(&paths.database) {
        Ok(conn) => conn,
        Err(e) => {
            return Ok(pairs
                .iter()
                .map(|(key, _)| KeyWrite::failed(key, &e))
                .collect());
        }
    };

    Ok(pairs
        .iter()
        .map(|(key, value)| match update_or_insert(&conn, key, value) {
            Ok(_) => KeyWrite::ok(key),
            Err(e) => KeyWrite::failed(key, &e),
        })
        .collect())
}

fn update_or_insert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    let updated = conn.execute(
        "UPDATE ItemTable SET value = ?2 WHERE key = ?1",
        params![key, value],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }
    Ok(())
}

/// Delete stale telemetry rows plus the cached server config.
///
/// Best-effort: each delete is reported independently and a missing
/// database yields an empty report.
pub fn cleanup_telemetry_entries(paths: &PathSet) -> Vec<KeyWrite> {
    const DELETES: [(&str, &str); 3] = [
        (
            "telemetry.*",
            "DELETE FROM ItemTable WHERE key LIKE 'telemetry.%'",
        ),
        (
            "storage.serviceMachineId*",
            "DELETE FROM ItemTable WHERE key LIKE 'storage.serviceMachineId%'",
        ),
        (
            "cursorai/serverConfig",
            "DELETE FROM ItemTable WHERE key = 'cursorai/serverConfig'",
        ),
    ];

    if !paths.database.exists() {
        return Vec::new();
    }

    let conn = match Connection::open(&paths.database) {
        Ok(conn) => conn,
        Err(e) => {
            return DELETES
                .iter()
                .map(|(label, _)| KeyWrite::failed(label, &e))
                .collect();
        }
    };

    DELETES
        .iter()
        .map(|(label, sql)| match conn.execute(sql, []) {
            Ok(_) => KeyWrite::ok(label),
            Err(e) => KeyWrite::failed(label, &e),
        })
        .collect()
}

/// Outcome of the wholesale database removal step.
#[derive(Debug, PartialEq, Eq)]
pub enum DatabaseRemoval {
    Removed,
    Absent,
    Failed(String),
}

/// Delete state.vscdb entirely; no-op when it does not exist.
pub fn remove_database(paths: &PathSet) -> DatabaseRemoval {
    if !paths.database.exists() {
        return DatabaseRemoval::Absent;
    }
    match fs::remove_file(&paths.database) {
        Ok(_) => DatabaseRemoval::Removed,
        Err(e) => DatabaseRemoval::Failed(e.to_string()),
    }
}

/// Layered lookup of the current machine id, account and token.
///
/// storage.json seeds the result, the auth sidecar fills gaps, and SQLite
/// rows fill whatever is still missing. A later store never overrides an
/// earlier one.
pub fn read_machine_info(paths: &PathSet) -> MachineInfo {
    let mut info = MachineInfo::default();

    let store = read_json_lossy(&paths.storage);

    info.machine_id = string_field(&store, "telemetry.devDeviceId");
    info.current_account = string_field(&store, "cursorAuth/cachedEmail");
    info.cursor_token = string_field(&store, "cursorAuth/accessToken")
        .or_else(|| string_field(&store, "cursorAuth/refreshToken"));

    // Newer auth system nests the account under workos.cursor.auth
    if let Some(auth) = store.get("workos.cursor.auth").and_then(Value::as_object) {
        if info.current_account.is_none() {
            info.current_account = string_field(auth, "email");
        }
        if info.cursor_token.is_none() {
            info.cursor_token =
                string_field(auth, "token").or_else(|| string_field(auth, "refreshToken"));
        }
    }

    if paths.auth.exists() {
        let sidecar = read_json_lossy(&paths.auth);
        if info.current_account.is_none() {
            info.current_account = string_field(&sidecar, "email");
        }
        if info.cursor_token.is_none() {
            info.cursor_token = string_field(&sidecar, "access_token")
                .or_else(|| string_field(&sidecar, "token"));
        }
    }

    if paths.database.exists() {
        if let Ok(conn) = Connection::open(&paths.database) {
            if info.machine_id.is_none() {
                info.machine_id = query_item(&conn, "telemetry.devDeviceId");
            }
            if info.current_account.is_none() {
                info.current_account = query_item(&conn, "cursorAuth/cachedEmail");
            }
            if info.cursor_token.is_none() {
                info.cursor_token = query_item(&conn, "cursorAuth/refreshToken");
            }
        }
    }

    if info.cursor_token.as_deref() == Some(MOCK_TOKEN) {
        info.cursor_token = None;
    }

    info
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty() && *s != MOCK_TOKEN)
        .map(str::to_string)
}

fn query_item(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT value FROM ItemTable WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .filter(|s| !s.is_empty() && s != MOCK_TOKEN)
}

/// Write a JSON object pretty-printed, creating parent directories and
/// clearing a read-only file mode first.
fn write_json_object(path: &Path, map: &Map<String, Value>) -> Result<()> {
    write_json_value(path, &Value::Object(map.clone()))
}

fn write_json_value(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create: {}", parent.display()))?;
    }

    ensure_writable(path);

    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))
}

/// Clear the read-only bit if the file carries one. Failures are absorbed;
/// the subsequent write will surface a real permission problem.
fn ensure_writable(path: &Path) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        if let Err(e) = fs::set_permissions(path, permissions) {
            eprintln!(
                "{} Could not clear read-only mode on {}: {}",
                "Warning:".yellow(),
                path.display(),
                e
            );
        }
    }
}
