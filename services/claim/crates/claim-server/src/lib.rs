//! claimd: proves to the control-plane that whoever calls the claim
//! endpoint can read a root-only file on this host, then claims the agent.

pub mod challenge;
pub mod cloud;
pub mod error;
pub mod executor;
pub mod handshake;
pub mod identity;
pub mod operator;
pub mod ports;
pub mod routes;

pub use challenge::ChallengeStore;
pub use cloud::CloudLink;
pub use error::ClaimError;
pub use executor::HttpClaimExecutor;
pub use handshake::ClaimService;
pub use identity::AgentIdentity;
pub use ports::{ClaimAttempt, ClaimExecutor, CloudStatusSource, OutboundSettings};
pub use routes::router;
