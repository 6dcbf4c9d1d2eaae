use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use claim_common::config::CHALLENGE_FILENAME;
use claim_common::params::names;
use claim_common::{ClaimResponse, validate_claim_param};
use clap::{Parser, Subcommand};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// claimd operator CLI.
///
/// Reads the local claim challenge and drives the agent's claim endpoint.
#[derive(Parser, Debug)]
#[command(name = "claimctl", version, about)]
struct Cli {
    /// Base URL of the local claimd server
    #[arg(long, env = "CLAIMD_SERVER", default_value = "http://127.0.0.1:19999")]
    server: String,

    /// Agent variable-data directory holding the challenge file
    #[arg(long, env = "CLAIMD_VARLIB_DIR", default_value = "/var/lib/claimd")]
    varlib_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the current claim challenge
    Key,
    /// Show the agent's cloud status and claim instructions
    Status,
    /// Claim the agent using the local challenge
    Claim {
        /// Claim token from the control-plane
        #[arg(long)]
        token: String,
        /// Control-plane base URL
        #[arg(long)]
        url: String,
        /// Comma-separated room IDs
        #[arg(long)]
        rooms: Option<String>,
    },
}

fn read_challenge(varlib_dir: &Path) -> Result<String> {
    let path = varlib_dir.join(CHALLENGE_FILENAME);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read challenge file {}", path.display()))?;
    let key = raw.trim();
    if key.is_empty() {
        bail!("challenge file {} is empty", path.display());
    }
    Ok(key.to_string())
}

fn claim_url(server: &str, pairs: &[(&str, &str)]) -> String {
    let query = pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", utf8_percent_encode(value, NON_ALPHANUMERIC)))
        .collect::<Vec<_>>()
        .join("&");
    let base = format!("{}/api/v2/claim", server.trim_end_matches('/'));
    if query.is_empty() {
        base
    } else {
        format!("{base}?{query}")
    }
}

fn fetch(url: &str) -> Result<ClaimResponse> {
    match ureq::get(url).set("User-Agent", "claimctl").call() {
        Ok(resp) => serde_json::from_str(&resp.into_string().context("reading response")?)
            .context("parsing response"),
        Err(ureq::Error::Status(403, _)) => bail!(
            "invalid key: the challenge changed or was mistyped. Read it again with 'claimctl key'"
        ),
        Err(ureq::Error::Status(400, _)) => bail!("invalid parameters"),
        Err(ureq::Error::Status(code, _)) => bail!("claim endpoint returned HTTP {code}"),
        Err(e) => Err(e).context("cannot reach claimd"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Key => {
            println!("{}", read_challenge(&cli.varlib_dir)?);
        }
        Commands::Status => {
            let resp = fetch(&claim_url(&cli.server, &[]))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::Claim { token, url, rooms } => {
            let supplied = [
                (names::TOKEN, Some(&token)),
                (names::URL, Some(&url)),
                (names::ROOMS, rooms.as_ref()),
            ];
            for (name, value) in supplied {
                if let Some(value) = value
                    && !validate_claim_param(value)
                {
                    bail!("--{name} may only contain letters, digits and . , - : / _");
                }
            }

            let key = read_challenge(&cli.varlib_dir)?;
            let mut pairs = vec![
                (names::KEY, key.as_str()),
                (names::TOKEN, token.as_str()),
                (names::URL, url.as_str()),
            ];
            if let Some(rooms) = rooms.as_deref() {
                pairs.push((names::ROOMS, rooms));
            }

            let resp = fetch(&claim_url(&cli.server, &pairs))?;
            match resp.success {
                Some(true) => println!("claimed (cloud status: {})", resp.cloud.status),
                Some(false) => bail!(
                    "claim failed: {}",
                    resp.message.unwrap_or_else(|| "unknown reason".to_string())
                ),
                None => bail!(
                    "agent cannot be claimed right now (cloud status: {})",
                    resp.cloud.status
                ),
            }
        }
    }

    Ok(())
}
