//! State store error types

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Errors returned by fallible store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Updates or imported state were not a JSON object
    #[error("Invalid input for namespace '{namespace}': {reason}")]
    InvalidInput { namespace: String, reason: String },

    /// No adapter registered under the requested name
    #[error("Unknown persistence adapter: {0}")]
    UnknownAdapter(String),

    /// Namespace has no persistence configuration
    #[error("Namespace '{0}' is not configured for persistence")]
    NotPersisted(String),

    /// Initial computation of a derived value failed
    #[error("Derived value '{namespace}.{key}' failed to compute: {reason}")]
    Derive {
        namespace: String,
        key: String,
        reason: String,
    },

    /// Adapter failure surfaced by an explicit persistence call
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    pub(crate) fn invalid_input(namespace: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidInput {
            namespace: namespace.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::UnknownAdapter("floppy".to_string());
        assert_eq!(err.to_string(), "Unknown persistence adapter: floppy");

        let err = StoreError::invalid_input("global", "updates must be an object");
        assert_eq!(
            err.to_string(),
            "Invalid input for namespace 'global': updates must be an object"
        );
    }

    #[test]
    fn test_persistence_error_conversion() {
        let err: StoreError = PersistenceError::Quota {
            key: "k".to_string(),
            size: 5000,
            limit: 4096,
        }
        .into();
        assert!(matches!(err, StoreError::Persistence(_)));
    }
}
