//! Persistence error types
//!
//! Everything that can go wrong at the storage-medium boundary.

use thiserror::Error;

/// Errors raised by persistence adapters
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or stored blob could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Value exceeds what the medium can hold
    #[error("Quota exceeded for '{key}': {size} bytes (limit {limit})")]
    Quota { key: String, size: usize, limit: usize },

    /// Adapter cannot currently serve requests
    #[error("Adapter unavailable: {0}")]
    Unavailable(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PersistenceError::Quota {
            key: "prefs".to_string(),
            size: 5000,
            limit: 4096,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded for 'prefs': 5000 bytes (limit 4096)"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PersistenceError = json_err.into();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PersistenceError = io_err.into();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
