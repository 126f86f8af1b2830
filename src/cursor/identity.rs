//! Machine identity generation
//!
//! Cursor distinguishes installations with four pseudo-random telemetry
//! values. None of them are derived from hardware; a fresh set is
//! indistinguishable from a new installation.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

/// One complete set of machine-identity values.
///
/// Always generated as a whole and persisted immediately; instances are not
/// kept around after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySet {
    /// telemetry.devDeviceId (UUID v4)
    pub dev_device_id: String,
    /// telemetry.macMachineId (SHA-512 hex digest, 128 chars)
    pub mac_machine_id: String,
    /// telemetry.machineId (SHA-256 hex digest, 64 chars)
    pub machine_id: String,
    /// telemetry.sqmId (uppercase UUID v4 in braces)
    pub sqm_id: String,
}

/// Generate a fresh identity set from OS randomness.
///
/// `custom_device_id` overrides only the device id; the three hashes are
/// always freshly random regardless.
pub fn generate(custom_device_id: Option<&str>) -> IdentitySet {
    let mut bytes32 = [0u8; 32];
    let mut bytes64 = [0u8; 64];
    OsRng.fill_bytes(&mut bytes32);
    OsRng.fill_bytes(&mut bytes64);

    let dev_device_id = match custom_device_id {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };

    let mac_machine_id = hex_digest(Sha512::new(), &bytes64);
    let machine_id = hex_digest(Sha256::new(), &bytes32);
    let sqm_id = format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase());

    IdentitySet {
        dev_device_id,
        mac_machine_id,
        machine_id,
        sqm_id,
    }
}

fn hex_digest<D: Digest>(mut hasher: D, input: &[u8]) -> String {
    hasher.update(input);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
