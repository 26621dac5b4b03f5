//! Consul client error types.

use thiserror::Error;

/// Result type for Consul operations.
pub type ConsulResult<T> = Result<T, ConsulError>;

/// Errors that can occur while talking to Consul.
#[derive(Debug, Error)]
pub enum ConsulError {
    /// HTTP request failed (connection refused, timeout, TLS failure).
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The agent address could not be turned into a URL.
    #[error("Invalid Consul address {address:?}: {message}")]
    InvalidAddress { address: String, message: String },

    /// Non-success status from the agent.
    #[error("Consul API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The agent answered with something that is not a KV listing.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ConsulError {
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}
