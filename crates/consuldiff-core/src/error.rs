//! Core error types.

use consuldiff_consul::ConsulError;
use thiserror::Error;

/// Startup configuration errors. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Environment variable {name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            message: message.into(),
        }
    }
}

/// A cycle that could not run at all.
///
/// Failures after the fetch (storage, publishing) do not abort the cycle;
/// they are recorded in the [`CycleReport`](crate::CycleReport).
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to fetch KV state: {0}")]
    Fetch(#[from] ConsulError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_variable() {
        assert_eq!(
            ConfigError::Missing("GIT_TOKEN").to_string(),
            "Environment variable GIT_TOKEN is not set"
        );
        assert_eq!(
            ConfigError::invalid("POLL_INTERVAL_MINUTES", "must be positive").to_string(),
            "Environment variable POLL_INTERVAL_MINUTES is invalid: must be positive"
        );
    }

    #[test]
    fn cycle_error_wraps_fetch_failure() {
        let err = CycleError::from(ConsulError::invalid_response("truncated"));
        assert!(err.to_string().starts_with("Failed to fetch KV state"));
    }
}
