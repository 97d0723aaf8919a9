use thiserror::Error;

/// Errors raised while validating request input before it reaches storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
    #[error("Only one address can be marked as primary")]
    MultiplePrimaryAddresses,
    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::EmptyField("email").to_string(),
            "email cannot be empty"
        );
        assert_eq!(
            ValidationError::UnknownValue {
                kind: "Role",
                value: "OWNER".to_string()
            }
            .to_string(),
            "Unknown Role value: OWNER"
        );
    }
}
