//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use gridwatch_core::{FetchError, VerificationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("malformed {endpoint} payload: {message}")]
    Malformed {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, .. } => FetchError::Status(status),
            ClientError::Malformed { .. } => FetchError::Malformed(err.to_string()),
            other => FetchError::Transport(other.to_string()),
        }
    }
}
