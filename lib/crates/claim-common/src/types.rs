use serde::{Deserialize, Serialize};

/// The agent's relationship with the control-plane, as reported by the
/// cloud-connection subsystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloudStatus {
    /// Not claimed, cloud reachable.
    #[default]
    Available,
    /// Claimed but not connected, or unreachable.
    Offline,
    /// Reachable only through a parent agent.
    Indirect,
    /// Rejected by the control-plane.
    Banned,
    /// Claimed and connected.
    Online,
}

impl CloudStatus {
    /// Whether a claim may be attempted while in this state.
    #[must_use]
    pub fn can_be_claimed(self) -> bool {
        match self {
            Self::Available | Self::Offline | Self::Indirect => true,
            Self::Banned | Self::Online => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Offline => "offline",
            Self::Indirect => "indirect",
            Self::Banned => "banned",
            Self::Online => "online",
        }
    }
}

impl std::fmt::Display for CloudStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the cloud connection, emitted under `cloud` in every claim
/// response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudStatusReport {
    pub status: CloudStatus,
    /// Unix seconds of the last status transition.
    pub since: i64,
    /// Seconds elapsed since `since` at the time of the snapshot.
    pub age: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Why the agent is in this state (e.g. the ban reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
}

impl CloudStatusReport {
    #[must_use]
    pub fn new(status: CloudStatus, since: i64) -> Self {
        Self {
            status,
            since,
            age: 0,
            url: None,
            reason: None,
            claim_id: None,
        }
    }
}

/// Result of a single claim attempt against the control-plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub success: bool,
    /// `"ok"` on success, otherwise a human-readable failure reason.
    pub message: String,
}

impl ClaimOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: reason.into(),
        }
    }
}

/// Identity block describing the agent that answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSummary {
    pub machine_guid: String,
    pub hostname: String,
    pub version: String,
    /// Unix seconds when the response was built.
    pub now: i64,
}

/// JSON body returned by `GET /api/v2/claim` with status 200.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimResponse {
    pub can_be_claimed: bool,
    pub cloud: CloudStatusReport,
    /// Present only when a claim attempt ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present only while the agent can still be claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_status_serde_lowercase() {
        let variants = [
            (CloudStatus::Available, "\"available\""),
            (CloudStatus::Offline, "\"offline\""),
            (CloudStatus::Indirect, "\"indirect\""),
            (CloudStatus::Banned, "\"banned\""),
            (CloudStatus::Online, "\"online\""),
        ];
        for (variant, expected_json) in &variants {
            let json = serde_json::to_string(variant).unwrap();
            assert_eq!(&json, expected_json);
            assert_eq!(variant.as_str(), expected_json.trim_matches('"'));
        }
    }

    #[test]
    fn claimable_states() {
        assert!(CloudStatus::Available.can_be_claimed());
        assert!(CloudStatus::Offline.can_be_claimed());
        assert!(CloudStatus::Indirect.can_be_claimed());
    }

    #[test]
    fn banned_and_online_are_not_claimable() {
        assert!(!CloudStatus::Banned.can_be_claimed());
        assert!(!CloudStatus::Online.can_be_claimed());
    }

    #[test]
    fn cloud_status_default_is_available() {
        assert_eq!(CloudStatus::default(), CloudStatus::Available);
    }

    #[test]
    fn report_omits_absent_optionals() {
        let report = CloudStatusReport::new(CloudStatus::Offline, 100);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["since"], 100);
        assert!(json.get("url").is_none());
        assert!(json.get("claim_id").is_none());
    }

    #[test]
    fn probe_response_has_no_attempt_fields() {
        let resp = ClaimResponse {
            can_be_claimed: true,
            cloud: CloudStatusReport::new(CloudStatus::Available, 0),
            success: None,
            message: None,
            key_filename: Some("/var/lib/claimd/claim_session_id".to_string()),
            cmd: Some("sudo cat /var/lib/claimd/claim_session_id".to_string()),
            help: Some("help".to_string()),
            agents: Vec::new(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["can_be_claimed"], true);
        assert!(json.get("success").is_none());
        assert!(json.get("message").is_none());
        assert_eq!(json["cmd"], "sudo cat /var/lib/claimd/claim_session_id");
    }

    #[test]
    fn outcome_constructors() {
        assert_eq!(
            ClaimOutcome::ok(),
            ClaimOutcome {
                success: true,
                message: "ok".to_string()
            }
        );
        let failed = ClaimOutcome::failed("network unreachable");
        assert!(!failed.success);
        assert_eq!(failed.message, "network unreachable");
    }
}
