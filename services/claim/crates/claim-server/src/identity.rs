//! Machine identity reported to the cloud and in claim responses.

use std::fs;
use std::io;
use std::path::Path;

use uuid::Uuid;

const MACHINE_GUID_FILENAME: &str = "machine_guid";

/// Who this agent is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub machine_guid: String,
    pub hostname: String,
    pub version: String,
}

impl AgentIdentity {
    pub fn new(machine_guid: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            machine_guid: machine_guid.into(),
            hostname: hostname.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Read `<varlib_dir>/machine_guid`, creating it with a fresh v4 UUID when
/// it is missing or does not hold a valid UUID.
pub fn load_or_create_machine_guid(varlib_dir: &Path) -> io::Result<String> {
    let path = varlib_dir.join(MACHINE_GUID_FILENAME);

    match fs::read_to_string(&path) {
        Ok(raw) => {
            if let Ok(guid) = Uuid::try_parse(raw.trim()) {
                return Ok(guid.to_string());
            }
            tracing::warn!(path = %path.display(), "machine GUID file is malformed, regenerating");
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let guid = Uuid::new_v4().to_string();
    fs::write(&path, format!("{guid}\n"))?;
    tracing::info!(machine_guid = %guid, "generated new machine GUID");
    Ok(guid)
}
