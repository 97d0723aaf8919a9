use thiserror::Error;

use propdesk_core::entities::ValidationError;
use propdesk_core::storage::{repository_error_to_status_code, RepositoryError};

/// Why a protocol was rejected or aborted.
///
/// A protocol aborts on its first failed required step; steps already
/// applied stay applied.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    Duplicate(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not permitted: {0}")]
    NotPermitted(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CoordinatorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity_type, id } => {
                CoordinatorError::NotFound { entity_type, id }
            }
            RepositoryError::AlreadyExists { entity_type, id } => {
                CoordinatorError::Duplicate(format!("{entity_type} {id} already exists"))
            }
            RepositoryError::ConditionFailed(key) => {
                CoordinatorError::Conflict(format!("{key} can no longer be changed"))
            }
            other => CoordinatorError::Repository(other),
        }
    }
}

impl CoordinatorError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        CoordinatorError::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// HTTP status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            CoordinatorError::Duplicate(_) | CoordinatorError::Conflict(_) => 409,
            CoordinatorError::NotFound { .. } => 404,
            CoordinatorError::Validation(_) => 400,
            CoordinatorError::NotPermitted(_) => 403,
            CoordinatorError::Repository(err) => repository_error_to_status_code(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
