//! Error types for the retention library.

use cohort_eval::EvaluationError;

/// Result type for retention library operations.
pub type RetentionResult<T> = Result<T, RetentionError>;

/// Errors that can occur while building or evaluating retention cohorts.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// Definition building or evaluation failed.
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Metadata configuration could not be loaded.
    #[error("Invalid metadata: {0}")]
    Metadata(String),

    /// Age bracket with a lower bound above its upper bound.
    #[error("Invalid age bracket: {min} to {max} years")]
    InvalidAgeBracket {
        /// Lower bound in years.
        min: i64,
        /// Upper bound in years.
        max: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetentionError::Metadata("missing field `artProgram`".to_string());
        assert_eq!(err.to_string(), "Invalid metadata: missing field `artProgram`");

        let err = RetentionError::InvalidAgeBracket { min: 15, max: 14 };
        assert_eq!(err.to_string(), "Invalid age bracket: 15 to 14 years");
    }

    #[test]
    fn test_from_evaluation_error() {
        let err: RetentionError = EvaluationError::UndefinedUniverse.into();
        assert!(matches!(err, RetentionError::Evaluation(EvaluationError::UndefinedUniverse)));
    }
}
