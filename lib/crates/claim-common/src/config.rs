use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::types::CloudStatus;

/// File name of the challenge mirror under `varlib_dir`.
pub const CHALLENGE_FILENAME: &str = "claim_session_id";

/// claimd server configuration, loaded from `CLAIMD_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimServerConfig {
    /// Listen address (default: 127.0.0.1:19999)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Agent variable-data directory; holds the challenge file, the
    /// machine GUID and the claim record.
    #[serde(default = "default_varlib_dir")]
    pub varlib_dir: PathBuf,

    /// Hostname reported to the cloud and in the `agents` block.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Control-plane URL shown in the status report before claiming.
    #[serde(default)]
    pub cloud_url: Option<String>,

    /// Cloud status to start in, until the cloud link reports otherwise.
    #[serde(default)]
    pub cloud_status: CloudStatus,

    /// Proxy for the outbound claim call (e.g. `http://proxy:3128`).
    #[serde(default)]
    pub proxy: Option<String>,

    /// Skip TLS certificate verification on the outbound claim call.
    #[serde(default)]
    pub insecure: bool,

    /// Upper bound on the outbound claim call.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,

    /// How long to wait for the agent to come online after a claim.
    #[serde(default = "default_online_wait_secs")]
    pub online_wait_secs: u64,
}

impl ClaimServerConfig {
    #[must_use]
    pub fn challenge_path(&self) -> PathBuf {
        self.varlib_dir.join(CHALLENGE_FILENAME)
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 19999))
}

fn default_varlib_dir() -> PathBuf {
    PathBuf::from("/var/lib/claimd")
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_claim_timeout_secs() -> u64 {
    30
}

fn default_online_wait_secs() -> u64 {
    10
}

impl Default for ClaimServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            varlib_dir: default_varlib_dir(),
            hostname: default_hostname(),
            cloud_url: None,
            cloud_status: CloudStatus::default(),
            proxy: None,
            insecure: false,
            claim_timeout_secs: default_claim_timeout_secs(),
            online_wait_secs: default_online_wait_secs(),
        }
    }
}
