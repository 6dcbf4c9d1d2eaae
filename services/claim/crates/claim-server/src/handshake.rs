//! The claim handshake: check the cloud status, verify the challenge key,
//! validate parameters, rotate the challenge, and make one claim attempt.

use std::sync::Arc;

use chrono::Utc;
use claim_common::{
    AgentSummary, ClaimOutcome, ClaimParams, ClaimRequest, ClaimResponse, CloudStatusReport,
};

use crate::challenge::ChallengeStore;
use crate::error::ClaimError;
use crate::identity::AgentIdentity;
use crate::operator::{self, OperatorShell};
use crate::ports::{ClaimAttempt, ClaimExecutor, CloudStatusSource, OutboundSettings};

/// Long-lived service answering claim requests.
///
/// Shared across all connections; the only mutable state is the challenge,
/// which is serialised by [`ChallengeStore::lock`].
pub struct ClaimService {
    challenge: Arc<ChallengeStore>,
    status: Arc<dyn CloudStatusSource>,
    executor: Arc<dyn ClaimExecutor>,
    identity: AgentIdentity,
    outbound: OutboundSettings,
    shell: &'static dyn OperatorShell,
}

impl ClaimService {
    pub fn new(
        challenge: Arc<ChallengeStore>,
        status: Arc<dyn CloudStatusSource>,
        executor: Arc<dyn ClaimExecutor>,
        identity: AgentIdentity,
    ) -> Self {
        Self {
            challenge,
            status,
            executor,
            identity,
            outbound: OutboundSettings::default(),
            shell: operator::native(),
        }
    }

    #[must_use]
    pub fn with_outbound(mut self, outbound: OutboundSettings) -> Self {
        self.outbound = outbound;
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: &'static dyn OperatorShell) -> Self {
        self.shell = shell;
        self
    }

    #[must_use]
    pub fn challenge(&self) -> &ChallengeStore {
        &self.challenge
    }

    /// Evaluate one claim request given its raw query string.
    ///
    /// Requests without a key, or made while the agent cannot be claimed,
    /// only report status and never rotate the challenge. Every request that
    /// reaches the key check rotates it exactly once, whatever the outcome.
    pub async fn handle(&self, query: &str) -> Result<ClaimResponse, ClaimError> {
        let mut request = ClaimRequest::parse(query);

        let mut report = self.status.current();
        let mut can_be_claimed = report.status.can_be_claimed();
        let mut outcome = None;

        if can_be_claimed && let Some(key) = request.key.take() {
            let params = self.authorize(&key, request)?;
            let attempt = ClaimAttempt::new(params, &self.outbound);

            let result = self.executor.attempt_claim(&attempt).await;
            if result.success {
                can_be_claimed = false;
                report = self.executor.reload_and_wait_for_status().await;
            } else {
                report = self.status.current();
            }
            tracing::info!(
                success = result.success,
                status = %report.status,
                "claim attempt finished",
            );
            outcome = Some(result);
        }

        Ok(self.respond(report, can_be_claimed, outcome))
    }

    /// Key check, parameter validation and rotation under a single lock.
    /// The lock is released before the caller awaits the claim executor.
    fn authorize(&self, key: &str, request: ClaimRequest) -> Result<ClaimParams, ClaimError> {
        let mut challenge = self.challenge.lock();

        if !challenge.matches(key) {
            tracing::warn!("claim rejected: key does not match the active challenge");
            challenge.rotate();
            return Err(ClaimError::InvalidKey);
        }

        let params = match request.into_params() {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "claim rejected: invalid parameters");
                challenge.rotate();
                return Err(ClaimError::InvalidParameters(e));
            }
        };

        challenge.rotate();
        Ok(params)
    }

    fn respond(
        &self,
        cloud: CloudStatusReport,
        can_be_claimed: bool,
        outcome: Option<ClaimOutcome>,
    ) -> ClaimResponse {
        let (success, message) = match outcome {
            Some(o) => (Some(o.success), Some(o.message)),
            None => (None, None),
        };

        let mut response = ClaimResponse {
            can_be_claimed,
            cloud,
            success,
            message,
            key_filename: None,
            cmd: None,
            help: None,
            agents: vec![AgentSummary {
                machine_guid: self.identity.machine_guid.clone(),
                hostname: self.identity.hostname.clone(),
                version: self.identity.version.clone(),
                now: Utc::now().timestamp(),
            }],
        };

        if can_be_claimed {
            let hint = self.shell.render(&self.challenge.filename());
            response.key_filename = Some(hint.display_path);
            response.cmd = Some(hint.command);
            response.help = Some(hint.help.to_string());
        }

        response
    }
}
