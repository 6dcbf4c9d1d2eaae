//! claimd entry point.
//!
//! Initialises tracing, loads configuration from environment variables
//! (prefixed with `CLAIMD_`), prepares the challenge file and cloud link,
//! and serves the claim endpoint over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use claim_common::ClaimServerConfig;
use tracing_subscriber::EnvFilter;

use claim_server::identity::load_or_create_machine_guid;
use claim_server::{
    AgentIdentity, ChallengeStore, ClaimService, CloudLink, HttpClaimExecutor, OutboundSettings,
    router,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("claimd starting");

    // 2. Load configuration from CLAIMD_* env vars.
    let config: ClaimServerConfig = envy::prefixed("CLAIMD_")
        .from_env()
        .context("failed to load config from CLAIMD_* env vars")?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        varlib_dir  = %config.varlib_dir.display(),
        hostname    = %config.hostname,
        status      = %config.cloud_status,
        proxy       = config.proxy.as_deref().unwrap_or("env"),
        insecure    = config.insecure,
        "configuration loaded",
    );

    // 3. Identity and variable-data directory.
    std::fs::create_dir_all(&config.varlib_dir)
        .with_context(|| format!("failed to create {}", config.varlib_dir.display()))?;
    let machine_guid = load_or_create_machine_guid(&config.varlib_dir)
        .context("failed to load machine GUID")?;
    let identity = AgentIdentity::new(machine_guid, config.hostname.clone());

    // 4. Cloud link, seeded from config and any existing claim record.
    let link = Arc::new(CloudLink::new(
        config.cloud_status,
        config.cloud_url.clone(),
        &config.varlib_dir,
    ));
    if let Err(e) = link.reload() {
        tracing::warn!(error = %e, "ignoring unreadable claim record");
    }

    // 5. First challenge, so the file exists before anyone asks for it.
    let challenge = Arc::new(ChallengeStore::new(config.challenge_path()));
    challenge.lock().rotate();
    tracing::info!(path = %challenge.path().display(), "claim challenge ready");

    let executor = Arc::new(HttpClaimExecutor::new(
        identity.clone(),
        link.clone(),
        Duration::from_secs(config.claim_timeout_secs),
        Duration::from_secs(config.online_wait_secs),
    ));

    let service = ClaimService::new(challenge, link, executor, identity).with_outbound(
        OutboundSettings {
            proxy: config.proxy.clone(),
            insecure: config.insecure,
        },
    );

    // 6. Bind and serve.
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;

    tracing::info!("claim endpoint ready — http://{}/api/v2/claim", config.listen_addr);

    axum::serve(listener, router(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("claimd shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
