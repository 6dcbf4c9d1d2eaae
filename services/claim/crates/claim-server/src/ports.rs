//! Collaborator traits the handshake depends on.
//!
//! The cloud-connection subsystem owns the cloud status and the outbound
//! claim call. The handshake only sees them through these two ports.

use async_trait::async_trait;
use claim_common::{ClaimOutcome, ClaimParams, CloudStatusReport};

/// Everything the claim executor needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimAttempt {
    pub base_url: String,
    pub token: String,
    pub rooms: Option<String>,
    /// Proxy setting: `None`/`"env"` for environment defaults, `"none"` to
    /// disable, anything else is a proxy URL.
    pub proxy: Option<String>,
    pub insecure: bool,
}

impl ClaimAttempt {
    #[must_use]
    pub fn new(params: ClaimParams, outbound: &OutboundSettings) -> Self {
        Self {
            base_url: params.base_url,
            token: params.token,
            rooms: params.rooms,
            proxy: outbound.proxy.clone(),
            insecure: outbound.insecure,
        }
    }

    /// Room identifiers, split on `,` with empty segments dropped.
    #[must_use]
    pub fn room_ids(&self) -> Vec<String> {
        self.rooms
            .as_deref()
            .map(|r| {
                r.split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Agent-wide settings for the outbound claim call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundSettings {
    pub proxy: Option<String>,
    pub insecure: bool,
}

/// Read access to the agent's current cloud status.
pub trait CloudStatusSource: Send + Sync {
    fn current(&self) -> CloudStatusReport;
}

/// Performs the network claim. Implementations own their timeouts and never
/// retry.
#[async_trait]
pub trait ClaimExecutor: Send + Sync {
    /// Make exactly one claim attempt.
    async fn attempt_claim(&self, attempt: &ClaimAttempt) -> ClaimOutcome;

    /// After a successful claim, reload cloud state and wait (bounded) for
    /// the agent to report its new status.
    async fn reload_and_wait_for_status(&self) -> CloudStatusReport;
}
