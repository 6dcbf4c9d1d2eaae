//! Claim request parameters: query-string parsing and charset validation.
//!
//! Untrusted input from the `claim` endpoint is parsed here into a typed
//! [`ClaimRequest`], then narrowed to [`ClaimParams`] once the presence and
//! charset rules hold. The key is not charset-checked; it is compared for
//! exact equality against the active challenge instead.

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Query parameter names understood by the claim endpoint.
pub mod names {
    pub const KEY: &str = "key";
    pub const TOKEN: &str = "token";
    pub const ROOMS: &str = "rooms";
    pub const URL: &str = "url";
}

/// Why a set of claim parameters was refused.
///
/// Only used for operator logs; callers of the endpoint always see the
/// generic `invalid parameters` body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    #[error("parameter '{0}' contains characters outside [A-Za-z0-9.,-:/_]")]
    InvalidCharacters(&'static str),
}

/// Parameters of one inbound claim call. Every field is optional at this
/// stage; absent, empty and unknown parameters all end up as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimRequest {
    pub key: Option<String>,
    pub token: Option<String>,
    pub rooms: Option<String>,
    pub base_url: Option<String>,
}

/// Validated parameters, ready to hand to the claim executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimParams {
    pub token: String,
    pub base_url: String,
    pub rooms: Option<String>,
}

impl ClaimRequest {
    /// Parse an `&`-separated list of `name=value` pairs.
    ///
    /// Consecutive separators are skipped, pairs with an empty name or an
    /// empty value are dropped (so `token=` counts as "not supplied"), and
    /// for a repeated name the last value wins. The value is everything after
    /// the first `=`, so `token==abc` yields `=abc`. Values are
    /// percent-decoded.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut req = Self::default();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if name.is_empty() || value.is_empty() {
                continue;
            }

            let slot = match name {
                names::KEY => &mut req.key,
                names::TOKEN => &mut req.token,
                names::ROOMS => &mut req.rooms,
                names::URL => &mut req.base_url,
                _ => continue,
            };
            *slot = Some(percent_decode_str(value).decode_utf8_lossy().into_owned());
        }

        req
    }

    /// Require `token` and `url`, and check the charset of every supplied
    /// value except the key.
    pub fn into_params(self) -> Result<ClaimParams, ParamError> {
        let token = self.token.ok_or(ParamError::Missing(names::TOKEN))?;
        let base_url = self.base_url.ok_or(ParamError::Missing(names::URL))?;

        if !validate_claim_param(&token) {
            return Err(ParamError::InvalidCharacters(names::TOKEN));
        }
        if !validate_claim_param(&base_url) {
            return Err(ParamError::InvalidCharacters(names::URL));
        }
        if let Some(rooms) = &self.rooms
            && !validate_claim_param(rooms)
        {
            return Err(ParamError::InvalidCharacters(names::ROOMS));
        }

        Ok(ClaimParams {
            token,
            base_url,
            rooms: self.rooms,
        })
    }
}

/// `true` for the empty string, or when every character is ASCII
/// alphanumeric or one of `. , - : / _`.
#[must_use]
pub fn validate_claim_param(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '-' | ':' | '/' | '_'))
}
