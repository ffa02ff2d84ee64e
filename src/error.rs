use thiserror::Error;

/// Main error type for Kinship
#[derive(Error, Debug)]
pub enum KinshipError {
    /// Database-related errors (the backing store is unavailable or a read failed)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An input person id does not resolve
    #[error("Person not found: {0}")]
    PersonNotFound(i64),

    /// Dataset import errors
    #[error("Import error: {0}")]
    Import(String),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl KinshipError {
    /// True for errors that should surface to callers as "not found"
    /// rather than as an internal failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KinshipError::PersonNotFound(_))
    }
}

/// Convenient Result type using KinshipError
pub type Result<T> = std::result::Result<T, KinshipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KinshipError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_person_not_found_display() {
        let err = KinshipError::PersonNotFound(42);
        assert_eq!(err.to_string(), "Person not found: 42");
        assert!(err.is_not_found());
        assert!(!KinshipError::InvalidInput("x".into()).is_not_found());
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: KinshipError = rusqlite_err.into();
        assert!(matches!(err, KinshipError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KinshipError = io_err.into();
        assert!(matches!(err, KinshipError::Io(_)));
    }
}
