//! Stable host fingerprint reported during enrollment

use sha2::{Digest, Sha256};
use sysinfo::System;
use tidewater_domain::{AgentError, Result};

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// SHA-256 hex of the machine id, or of the host name where no machine id
/// exists.
pub fn system_id() -> Result<String> {
    let source = machine_id()
        .or_else(System::host_name)
        .ok_or_else(|| AgentError::Internal("no machine id or host name available".into()))?;
    Ok(fingerprint(&source))
}

fn machine_id() -> Option<String> {
    MACHINE_ID_PATHS.iter().find_map(|path| {
        let raw = std::fs::read_to_string(path).ok()?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn fingerprint(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}
