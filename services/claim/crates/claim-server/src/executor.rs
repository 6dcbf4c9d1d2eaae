//! Outbound claim call to the control-plane.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use claim_common::{ClaimOutcome, CloudStatus, CloudStatusReport};
use serde::{Deserialize, Serialize};

use crate::cloud::{ClaimRecord, CloudLink};
use crate::identity::AgentIdentity;
use crate::ports::{ClaimAttempt, ClaimExecutor};

/// Body of `PUT /api/v1/spaces/nodes/{machine_guid}`.
#[derive(Debug, Serialize)]
struct NodeClaimRequest<'a> {
    token: &'a str,
    rooms: Vec<String>,
    hostname: &'a str,
    machine_guid: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct NodeClaimReply {
    #[serde(default)]
    claim_id: Option<String>,
}

/// Error shape returned by the control-plane on non-2xx replies.
#[derive(Debug, Default, Deserialize)]
struct CloudErrorReply {
    #[serde(default, rename = "errorMsgKey")]
    error_msg_key: Option<String>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}

/// Claims the agent over HTTPS and records the result for [`CloudLink`].
pub struct HttpClaimExecutor {
    identity: AgentIdentity,
    link: Arc<CloudLink>,
    record_path: PathBuf,
    claim_timeout: Duration,
    online_wait: Duration,
}

impl HttpClaimExecutor {
    pub fn new(
        identity: AgentIdentity,
        link: Arc<CloudLink>,
        claim_timeout: Duration,
        online_wait: Duration,
    ) -> Self {
        let record_path = link.record_path().to_path_buf();
        Self {
            identity,
            link,
            record_path,
            claim_timeout,
            online_wait,
        }
    }

    fn client(&self, attempt: &ClaimAttempt) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.claim_timeout)
            .danger_accept_invalid_certs(attempt.insecure);

        builder = match attempt.proxy.as_deref() {
            None | Some("" | "env") => builder,
            Some("none") => builder.no_proxy(),
            Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
        };

        builder.build()
    }

    fn endpoint(&self, attempt: &ClaimAttempt) -> String {
        format!(
            "{}/api/v1/spaces/nodes/{}",
            attempt.base_url.trim_end_matches('/'),
            self.identity.machine_guid
        )
    }

    async fn claim(&self, attempt: &ClaimAttempt) -> Result<ClaimRecord, String> {
        let client = self
            .client(attempt)
            .map_err(|e| format!("invalid proxy configuration: {e}"))?;

        let rooms = attempt.room_ids();
        let body = NodeClaimRequest {
            token: &attempt.token,
            rooms: rooms.clone(),
            hostname: &self.identity.hostname,
            machine_guid: &self.identity.machine_guid,
        };

        let response = client
            .put(self.endpoint(attempt))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timed out waiting for the cloud to respond".to_string()
                } else {
                    format!("cannot connect to the cloud: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reply: CloudErrorReply = response.json().await.unwrap_or_default();
            return Err(reply
                .error_message
                .or(reply.error_msg_key)
                .unwrap_or_else(|| format!("cloud rejected the claim (HTTP {})", status.as_u16())));
        }

        let reply: NodeClaimReply = response.json().await.unwrap_or_default();
        Ok(ClaimRecord {
            url: attempt.base_url.clone(),
            rooms,
            claim_id: reply
                .claim_id
                .unwrap_or_else(|| self.identity.machine_guid.clone()),
            machine_guid: self.identity.machine_guid.clone(),
            claimed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ClaimExecutor for HttpClaimExecutor {
    async fn attempt_claim(&self, attempt: &ClaimAttempt) -> ClaimOutcome {
        let record = match self.claim(attempt).await {
            Ok(record) => record,
            Err(reason) => {
                tracing::warn!(url = %attempt.base_url, reason = %reason, "claim attempt failed");
                return ClaimOutcome::failed(reason);
            }
        };

        if let Err(e) = record.save(&self.record_path) {
            tracing::error!(error = %e, "claimed, but the claim record could not be saved");
            return ClaimOutcome::failed(format!("claimed, but cannot save claim record: {e}"));
        }

        tracing::info!(url = %attempt.base_url, claim_id = %record.claim_id, "agent claimed");
        ClaimOutcome::ok()
    }

    async fn reload_and_wait_for_status(&self) -> CloudStatusReport {
        if let Err(e) = self.link.reload() {
            tracing::warn!(error = %e, "cannot reload claim record");
        }
        self.link.wait_for(CloudStatus::Online, self.online_wait).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CloudStatusSource;
    use axum::Json;
    use axum::extract::Path as UrlPath;
    use axum::http::StatusCode;
    use axum::routing::put;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn spawn_cloud_stub(app: axum::Router) -> (String, tokio::sync::oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
        (format!("http://{addr}"), shutdown_tx)
    }

    fn executor(dir: &std::path::Path) -> (HttpClaimExecutor, Arc<CloudLink>) {
        let link = Arc::new(CloudLink::new(CloudStatus::Available, None, dir));
        let exec = HttpClaimExecutor::new(
            AgentIdentity::new("0b0e7a5e-0000-4000-8000-000000000001", "host-1"),
            link.clone(),
            Duration::from_secs(5),
            Duration::from_millis(200),
        );
        (exec, link)
    }

    fn attempt(base_url: String) -> ClaimAttempt {
        ClaimAttempt {
            base_url,
            token: "tok".to_string(),
            rooms: Some("r1,,r2".to_string()),
            proxy: Some("none".to_string()),
            insecure: false,
        }
    }

    #[tokio::test]
    async fn success_persists_record_and_goes_online() {
        let app = axum::Router::new().route(
            "/api/v1/spaces/nodes/{guid}",
            put(|UrlPath(guid): UrlPath<String>, Json(body): Json<Value>| async move {
                assert_eq!(body["token"], "tok");
                assert_eq!(body["rooms"], json!(["r1", "r2"]));
                assert_eq!(body["hostname"], "host-1");
                assert_eq!(body["machine_guid"], guid);
                Json(json!({ "claim_id": "claim-42" }))
            }),
        );
        let (url, _shutdown) = spawn_cloud_stub(app).await;
        let dir = tempfile::tempdir().unwrap();
        let (exec, link) = executor(dir.path());

        let outcome = exec.attempt_claim(&attempt(url.clone())).await;
        assert_eq!(outcome, ClaimOutcome::ok());

        let record = ClaimRecord::load(link.record_path()).unwrap().unwrap();
        assert_eq!(record.claim_id, "claim-42");
        assert_eq!(record.url, url);

        let report = exec.reload_and_wait_for_status().await;
        assert_eq!(report.status, CloudStatus::Online);
        assert_eq!(link.current().claim_id.as_deref(), Some("claim-42"));
    }

    #[tokio::test]
    async fn rejection_surfaces_cloud_message() {
        let app = axum::Router::new().route(
            "/api/v1/spaces/nodes/{guid}",
            put(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "errorMsgKey": "ErrInvalidToken", "errorMessage": "token expired" })),
                )
            }),
        );
        let (url, _shutdown) = spawn_cloud_stub(app).await;
        let dir = tempfile::tempdir().unwrap();
        let (exec, link) = executor(dir.path());

        let outcome = exec.attempt_claim(&attempt(url)).await;
        assert_eq!(outcome, ClaimOutcome::failed("token expired"));
        assert!(ClaimRecord::load(link.record_path()).unwrap().is_none());
    }

    #[tokio::test]
    async fn rejection_without_body_reports_status_code() {
        let app = axum::Router::new().route(
            "/api/v1/spaces/nodes/{guid}",
            put(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let (url, _shutdown) = spawn_cloud_stub(app).await;
        let dir = tempfile::tempdir().unwrap();
        let (exec, _link) = executor(dir.path());

        let outcome = exec.attempt_claim(&attempt(url)).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("HTTP 500"), "{}", outcome.message);
    }

    #[tokio::test]
    async fn unreachable_cloud_fails_without_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let dir = tempfile::tempdir().unwrap();
        let (exec, link) = executor(dir.path());

        let outcome = exec.attempt_claim(&attempt(format!("http://{addr}"))).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("cannot connect"), "{}", outcome.message);
        assert!(ClaimRecord::load(link.record_path()).unwrap().is_none());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let (exec, _link) = executor(dir.path());
        assert_eq!(
            exec.endpoint(&attempt("https://cloud.example/".to_string())),
            "https://cloud.example/api/v1/spaces/nodes/0b0e7a5e-0000-4000-8000-000000000001"
        );
    }
}
