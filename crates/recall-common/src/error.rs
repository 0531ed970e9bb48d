//! Error types for the Recall engine
//!
//! Provides a unified error type and the domain-specific error families:
//! validation, not-found, state, and the "no matching productions" sentinel.

use thiserror::Error;

/// Result type alias using RecallError
pub type Result<T> = std::result::Result<T, RecallError>;

/// Unified error type for Recall operations
#[derive(Debug, Error)]
pub enum RecallError {
    // Malformed input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Unknown identifiers
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    // Operation not allowed in the current state
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Normal quiescence of the production system. `run` treats it as success.
    #[error("No matching productions")]
    NoMatchingProductions,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Duplicate ID: {0}")]
    DuplicateId(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Lookup failures on unknown identifiers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotFoundError {
    #[error("experience {0}")]
    Experience(String),

    #[error("production {0}")]
    Production(String),

    #[error("working memory item {0}")]
    WorkingMemoryItem(String),

    #[error("goal {0}")]
    Goal(String),

    #[error("unbound variable {0}")]
    Variable(String),
}

/// State errors: the request is well-formed but not allowed right now
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("Production {0} is disabled")]
    ProductionDisabled(String),

    #[error("Learning is disabled")]
    LearningDisabled,

    #[error("Sequence too short: {len} < {min}")]
    SequenceTooShort { len: usize, min: usize },

    #[error("Production capacity reached: max {max}")]
    CapacityReached { max: usize },

    #[error("Goal stack is empty")]
    EmptyGoalStack,
}

/// Coarse classification of a [`RecallError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    NoMatch,
    Config,
}

impl RecallError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecallError::Validation(_) => ErrorKind::Validation,
            RecallError::NotFound(_) => ErrorKind::NotFound,
            RecallError::State(_) => ErrorKind::State,
            RecallError::NoMatchingProductions => ErrorKind::NoMatch,
            RecallError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for the quiescence sentinel
    pub fn is_no_match(&self) -> bool {
        matches!(self, RecallError::NoMatchingProductions)
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        ValidationError::DimensionMismatch { expected, actual }.into()
    }
}

impl From<anyhow::Error> for RecallError {
    fn from(err: anyhow::Error) -> Self {
        RecallError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecallError::from(NotFoundError::Experience("exp-1".to_string()));
        assert!(err.to_string().contains("exp-1"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = RecallError::dimension_mismatch(8, 3);
        assert!(err.to_string().contains("expected 8, got 3"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_no_match_sentinel() {
        assert!(RecallError::NoMatchingProductions.is_no_match());
        let err = RecallError::from(StateError::LearningDisabled);
        assert!(!err.is_no_match());
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_every_variant_has_a_kind() {
        let cases = [
            (RecallError::dimension_mismatch(2, 1), ErrorKind::Validation),
            (NotFoundError::Goal("g".to_string()).into(), ErrorKind::NotFound),
            (StateError::EmptyGoalStack.into(), ErrorKind::State),
            (RecallError::NoMatchingProductions, ErrorKind::NoMatch),
            (anyhow::anyhow!("bad env value").into(), ErrorKind::Config),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_sequence_too_short() {
        let err = StateError::SequenceTooShort { len: 1, min: 2 };
        assert!(err.to_string().contains("1 < 2"));
    }
}
