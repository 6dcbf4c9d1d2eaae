pub mod config;
pub mod params;
pub mod types;

pub use config::ClaimServerConfig;
pub use params::{ClaimParams, ClaimRequest, ParamError, validate_claim_param};
pub use types::*;
