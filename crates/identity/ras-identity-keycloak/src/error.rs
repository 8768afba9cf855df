//! Keycloak client error types.

use std::time::Duration;
use thiserror::Error;

pub type KeycloakResult<T> = Result<T, KeycloakError>;

/// Failure raised by an [`HttpTransport`](crate::HttpTransport) before any
/// response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum KeycloakError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid user credentials: {}", .description.as_deref().unwrap_or("no description"))]
    InvalidCredentials { description: Option<String> },

    #[error("Identity provider returned {error} (HTTP {status}): {}", .description.as_deref().unwrap_or("no description"))]
    IdpError {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Token is not active")]
    InactiveToken,
}

impl KeycloakError {
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, KeycloakError::InvalidCredentials { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, KeycloakError::Transport(_))
    }

    /// HTTP status of the response that produced this error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            KeycloakError::IdpError { status, .. } | KeycloakError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
