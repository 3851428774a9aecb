//! Error taxonomy for the capture core.
//!
//! Value objects fail with [`ValidationError`]; aggregates fail with
//! [`DomainError`]. Nothing here retries: callers decide.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A value failed its construction-time invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending field, as it appears in the raw payload
    pub field: String,

    /// Human-readable description of the violated rule
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a required field that was absent
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }

    /// Re-target the error at a different field name (e.g. `id` -> `pinId`)
    pub fn for_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// Errors raised by aggregate mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid state for {aggregate_id}: {reason}")]
    InvalidState { aggregate_id: String, reason: String },

    #[error("{aggregate_id} is already downloaded")]
    AlreadyDownloaded { aggregate_id: String },

    #[error("{aggregate_id} expired at {expired_at}")]
    ExpiredContent {
        aggregate_id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("{member} already exists in {aggregate_id}")]
    AlreadyExists { aggregate_id: String, member: String },

    #[error("{member} not found in {aggregate_id}")]
    NotFound { aggregate_id: String, member: String },
}

impl DomainError {
    pub fn invalid_state(aggregate_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            aggregate_id: aggregate_id.into(),
            reason: reason.into(),
        }
    }

    /// True for every rejected transition (as opposed to bad input)
    pub fn is_invalid_state(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// Field name, when this is a validation failure
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation(e) => Some(&e.field),
            _ => None,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::missing("videoUrl");
        assert_eq!(err.field, "videoUrl");
        assert_eq!(err.to_string(), "invalid videoUrl: is required");
    }

    #[test]
    fn test_invalid_state_classification() {
        let downloaded = DomainError::AlreadyDownloaded {
            aggregate_id: "p1".to_string(),
        };
        let validation: DomainError = ValidationError::missing("id").into();

        assert!(downloaded.is_invalid_state());
        assert!(!validation.is_invalid_state());
        assert_eq!(validation.field(), Some("id"));
        assert_eq!(downloaded.field(), None);
    }
}
