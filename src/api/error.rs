//! API error taxonomy.
//!
//! Fatal variants abort the run; per-chapter skip causes (missing token,
//! gated content) are handled at the crawl loop and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no stored session and no credentials were provided")]
    CredentialsMissing,

    #[error("login rejected: {0}")]
    AuthFailure(String),

    #[error("session expired and could not be refreshed")]
    AuthExpired,

    #[error("giving up on {endpoint} after {attempts} attempts: {last}")]
    NetworkExhausted {
        endpoint: String,
        attempts: u32,
        last: String,
    },

    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed response from {endpoint}: {detail}")]
    Malformed { endpoint: String, detail: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// A network-level failure for one attempt (connect, TLS, timeout, body
/// read). Kept stringly so test doubles can construct it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}
