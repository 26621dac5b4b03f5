//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error other than a missing file (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while writing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored content exists but is not a snapshot.
    #[error("Corrupt snapshot at {location}: {source}")]
    Corrupt {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid location format
    #[error("Invalid location: {0:?}")]
    InvalidLocation(String),

    /// Storage is read-only
    #[error("Storage is read-only")]
    ReadOnly,

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Create an invalid location error.
    pub fn invalid_location(location: impl Into<String>) -> Self {
        Self::InvalidLocation(location.into())
    }

    /// Whether this error means the stored content could not be parsed.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_invalid_location_formats_name() {
        let err = StoreError::invalid_location("../etc");
        assert_eq!(err.to_string(), "Invalid location: \"../etc\"");
    }

    #[test]
    fn store_error_io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::from(io_err);
        assert!(err.to_string().contains("IO error"));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn store_error_corrupt_keeps_source() {
        let source = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = StoreError::Corrupt {
            location: "state.json".to_string(),
            source,
        };
        assert!(err.is_corrupt());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn store_error_read_only_displays() {
        assert_eq!(StoreError::ReadOnly.to_string(), "Storage is read-only");
    }
}
