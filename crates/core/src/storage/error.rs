use thiserror::Error;

use super::keys::KeyError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Conditional check failed for {0}")]
    ConditionFailed(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<KeyError> for RepositoryError {
    fn from(err: KeyError) -> Self {
        RepositoryError::InvalidData(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_not_found_display() {
        let error = RepositoryError::NotFound {
            entity_type: "WorkOrder",
            id: "abc-123".to_string(),
        };
        assert_eq!(error.to_string(), "WorkOrder not found: abc-123");
    }

    #[test]
    fn test_repository_error_already_exists_display() {
        let error = RepositoryError::AlreadyExists {
            entity_type: "Property",
            id: "12 Main St".to_string(),
        };
        assert_eq!(error.to_string(), "Property already exists: 12 Main St");
    }

    #[test]
    fn test_repository_error_condition_failed_display() {
        let error = RepositoryError::ConditionFailed("WO#1|WO#1".to_string());
        assert_eq!(error.to_string(), "Conditional check failed for WO#1|WO#1");
    }

    #[test]
    fn test_repository_error_connection_failed_display() {
        let error = RepositoryError::ConnectionFailed("timeout after 30s".to_string());
        assert_eq!(error.to_string(), "Connection failed: timeout after 30s");
    }

    #[test]
    fn test_repository_error_query_failed_display() {
        let error = RepositoryError::QueryFailed("invalid partition key".to_string());
        assert_eq!(error.to_string(), "Query failed: invalid partition key");
    }

    #[test]
    fn test_key_error_becomes_invalid_data() {
        let error: RepositoryError = KeyError::UnknownTag("FOO".to_string()).into();
        assert_eq!(error.to_string(), "Invalid data: Unknown key tag: FOO");
    }
}
