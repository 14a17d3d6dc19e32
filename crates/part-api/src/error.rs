//! Error types for the PART API client.

use thiserror::Error;

/// Errors returned by the PART client.
#[derive(Error, Debug)]
pub enum PartApiError {
    /// The session is absent or expired (HTTP 401).
    #[error("not authenticated: {message}")]
    NotAuthenticated {
        /// Message from the API, or the status reason when none was sent.
        message: String,
    },

    /// API returned an error envelope.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("connection failed: {0}")]
    Connection(String),

    /// Invalid arguments, rejected before any network activity.
    #[error("invalid input: {0}")]
    Input(String),

    /// The response body was not the JSON we expected.
    #[error("error decoding response body (status {status}): {source}")]
    Decode {
        /// HTTP status of the response whose body failed to parse.
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// Request payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PartApiError {
    /// Human-readable message carried by the error.
    pub fn message(&self) -> String {
        match self {
            Self::NotAuthenticated { message } | Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status attached to the error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotAuthenticated { .. } => Some(401),
            Self::Server { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Self::NotAuthenticated { .. })
    }
}

impl From<reqwest::Error> for PartApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Input(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Result type for PART operations.
pub type Result<T> = std::result::Result<T, PartApiError>;
