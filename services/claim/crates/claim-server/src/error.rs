//! Per-request rejections of the claim endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use claim_common::ParamError;
use thiserror::Error;

/// A claim request refused before any attempt was made.
///
/// The response body is deliberately generic; the wrapped detail is for
/// operator logs only.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("invalid key")]
    InvalidKey,

    #[error("invalid parameters")]
    InvalidParameters(#[source] ParamError),
}

impl ClaimError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidKey => StatusCode::FORBIDDEN,
            Self::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        }
    }

    #[must_use]
    pub fn body(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::InvalidParameters(_) => "invalid parameters",
        }
    }
}

impl IntoResponse for ClaimError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}
