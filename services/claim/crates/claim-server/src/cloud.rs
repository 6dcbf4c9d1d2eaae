//! In-process view of the agent's cloud connection.
//!
//! [`CloudLink`] is the status source the handshake reads. It is seeded
//! from configuration, and moves to `online` once a claim record exists on
//! disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use claim_common::{CloudStatus, CloudStatusReport};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::ports::CloudStatusSource;

/// Persisted result of a successful claim, under `<varlib>/cloud.d/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimRecord {
    pub url: String,
    #[serde(default)]
    pub rooms: Vec<String>,
    pub claim_id: String,
    pub machine_guid: String,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimRecord {
    #[must_use]
    pub fn path(varlib_dir: &Path) -> PathBuf {
        varlib_dir.join("cloud.d").join("claim.json")
    }

    /// `Ok(None)` when the agent has never been claimed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("malformed claim record {}", path.display()))?;
        Ok(Some(record))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Current cloud status, observable by the handshake and by waiters.
#[derive(Debug)]
pub struct CloudLink {
    tx: watch::Sender<CloudStatusReport>,
    record_path: PathBuf,
}

impl CloudLink {
    pub fn new(status: CloudStatus, url: Option<String>, varlib_dir: &Path) -> Self {
        let mut report = CloudStatusReport::new(status, now());
        report.url = url;
        let (tx, _rx) = watch::channel(report);
        Self {
            tx,
            record_path: ClaimRecord::path(varlib_dir),
        }
    }

    #[must_use]
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Re-read the claim record. Returns whether the agent is claimed.
    pub fn reload(&self) -> Result<bool> {
        let Some(record) = ClaimRecord::load(&self.record_path)? else {
            return Ok(false);
        };
        self.tx.send_modify(|r| {
            if r.status != CloudStatus::Online {
                r.since = now();
                r.status = CloudStatus::Online;
            }
            r.url = Some(record.url);
            r.claim_id = Some(record.claim_id);
            r.reason = None;
        });
        tracing::info!(claim_id = ?self.tx.borrow().claim_id, "claim record loaded");
        Ok(true)
    }

    /// Wait up to `timeout` for `status`, then return whatever is current.
    pub async fn wait_for(&self, status: CloudStatus, timeout: Duration) -> CloudStatusReport {
        let mut rx = self.tx.subscribe();
        let reached = tokio::time::timeout(timeout, async {
            loop {
                if rx.borrow_and_update().status == status {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await
        .unwrap_or(false);
        if !reached {
            tracing::warn!(
                wanted = %status,
                timeout_secs = timeout.as_secs(),
                "cloud status did not settle in time",
            );
        }
        self.current()
    }
}

impl CloudStatusSource for CloudLink {
    fn current(&self) -> CloudStatusReport {
        let mut report = self.tx.borrow().clone();
        report.age = (now() - report.since).max(0);
        report
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    impl CloudLink {
        fn set_status(&self, status: CloudStatus, reason: Option<String>) {
            self.tx.send_modify(|r| {
                if r.status != status {
                    r.since = now();
                    r.status = status;
                }
                r.reason = reason;
            });
        }
    }

    fn record() -> ClaimRecord {
        ClaimRecord {
            url: "https://cloud.example".to_string(),
            rooms: vec!["r1".to_string()],
            claim_id: "claim-1".to_string(),
            machine_guid: "guid".to_string(),
            claimed_at: Utc::now(),
        }
    }

    #[test]
    fn seeded_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(
            CloudStatus::Indirect,
            Some("https://cloud.example".to_string()),
            dir.path(),
        );
        let report = link.current();
        assert_eq!(report.status, CloudStatus::Indirect);
        assert_eq!(report.url.as_deref(), Some("https://cloud.example"));
        assert!(report.age >= 0);
    }

    #[test]
    fn reload_without_record_keeps_status() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(CloudStatus::Available, None, dir.path());
        assert!(!link.reload().unwrap());
        assert_eq!(link.current().status, CloudStatus::Available);
    }

    #[test]
    fn reload_with_record_goes_online() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(CloudStatus::Available, None, dir.path());
        record().save(link.record_path()).unwrap();
        assert!(link.reload().unwrap());
        let report = link.current();
        assert_eq!(report.status, CloudStatus::Online);
        assert_eq!(report.claim_id.as_deref(), Some("claim-1"));
    }

    #[test]
    fn malformed_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(CloudStatus::Available, None, dir.path());
        fs::create_dir_all(link.record_path().parent().unwrap()).unwrap();
        fs::write(link.record_path(), "{").unwrap();
        assert!(link.reload().is_err());
    }

    #[test]
    fn set_status_records_reason() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(CloudStatus::Available, None, dir.path());
        link.set_status(CloudStatus::Banned, Some("abuse".to_string()));
        let report = link.current();
        assert_eq!(report.status, CloudStatus::Banned);
        assert_eq!(report.reason.as_deref(), Some("abuse"));
    }

    #[tokio::test]
    async fn wait_for_returns_when_reached() {
        let dir = tempfile::tempdir().unwrap();
        let link = std::sync::Arc::new(CloudLink::new(CloudStatus::Offline, None, dir.path()));
        let waiter = {
            let link = link.clone();
            tokio::spawn(async move {
                link.wait_for(CloudStatus::Online, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        link.set_status(CloudStatus::Online, None);
        let report = waiter.await.unwrap();
        assert_eq!(report.status, CloudStatus::Online);
    }

    #[tokio::test]
    async fn wait_for_times_out_with_current_status() {
        let dir = tempfile::tempdir().unwrap();
        let link = CloudLink::new(CloudStatus::Offline, None, dir.path());
        let report = link
            .wait_for(CloudStatus::Online, Duration::from_millis(20))
            .await;
        assert_eq!(report.status, CloudStatus::Offline);
    }
}
