//! Error types for multifile.

use thiserror::Error;

use crate::form::ValidationErrors;

/// Result type alias using multifile's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for multifile operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A content-accessing operation ran on a handle with no name bound.
    #[error("The '{field}' attribute has no file associated with it.")]
    Unbound { field: String },

    /// Handle has no storage backend (restored from a serialized form).
    #[error("File handle is not linked to a storage backend: {0}")]
    Unlinked(String),

    /// Submitted files failed form validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A handle still had no name after its commit attempt
    #[error("File {index} of '{field}' has no name after commit")]
    MissingName { field: String, index: usize },

    /// Encoded file list does not fit the column
    #[error("Stored value of '{field}' is {length} characters, limit is {max_length}")]
    ValueTooLong {
        field: String,
        length: usize,
        max_length: usize,
    },

    /// Storage backend operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Returns true for [`Error::Unbound`].
    pub fn is_unbound(&self) -> bool {
        matches!(self, Error::Unbound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::ValidationError;

    #[test]
    fn test_error_display_unbound() {
        let err = Error::Unbound {
            field: "files".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The 'files' attribute has no file associated with it."
        );
        assert!(err.is_unbound());
    }

    #[test]
    fn test_error_display_missing_name() {
        let err = Error::MissingName {
            field: "files".to_string(),
            index: 2,
        };
        assert_eq!(err.to_string(), "File 2 of 'files' has no name after commit");
    }

    #[test]
    fn test_error_display_value_too_long() {
        let err = Error::ValueTooLong {
            field: "files".to_string(),
            length: 23,
            max_length: 10,
        };
        assert_eq!(
            err.to_string(),
            "Stored value of 'files' is 23 characters, limit is 10"
        );
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
        assert!(!err.is_unbound());
    }

    #[test]
    fn test_error_from_validation_errors() {
        let errors = ValidationErrors::from(vec![ValidationError::new("empty", "empty file")]);
        let err: Error = errors.into();
        match err {
            Error::Validation(inner) => assert_eq!(inner.codes(), vec!["empty"]),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
