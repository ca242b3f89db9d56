//! Error types for cohort evaluation.

use std::time::Duration;

use cohort_expr::ExprError;
use thiserror::Error;

use crate::binding::{LocationId, ParameterType};
use crate::traits::QueryExecutionError;

/// Errors that can occur while building or evaluating a cohort.
///
/// Every error aborts the evaluation call it occurs in; no partial
/// result is ever returned alongside one.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// A required parameter is absent from the binding.
    #[error("Missing parameter: {name}")]
    MissingParameter {
        /// Name of the missing parameter.
        name: String,
    },

    /// A parameter is bound to a value of the wrong type.
    #[error("Parameter '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the parameter.
        name: String,
        /// Type declared by the schema.
        expected: ParameterType,
        /// Type of the bound value.
        actual: ParameterType,
    },

    /// A parameter value could not be parsed or is out of range.
    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameterValue {
        /// Name of the parameter.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// A location parameter names a facility the registry does not know.
    #[error("Unknown location: {0}")]
    UnknownLocation(LocationId),

    /// A composition refers to a search that was never registered.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// An `AND` or `OR` node has no operands.
    #[error("Empty composition: AND/OR requires at least one operand")]
    EmptyComposition,

    /// `NOT` used where no enclosing population is available.
    #[error("NOT requires an enclosing population to complement against")]
    UndefinedUniverse,

    /// The external query executor failed.
    #[error("External query '{query}' failed: {source}")]
    ExternalQuery {
        /// Identifier of the failing query.
        query: String,
        /// Error reported by the executor.
        #[source]
        source: QueryExecutionError,
    },

    /// Composition or mapping string could not be parsed.
    #[error("Composition parse error: {0}")]
    Parse(#[from] ExprError),

    /// A cohort definition is structurally invalid.
    #[error("Invalid cohort definition: {0}")]
    InvalidDefinition(String),

    /// The evaluation was cancelled by the caller.
    #[error("Evaluation cancelled")]
    Cancelled,

    /// The evaluation exceeded the configured timeout.
    #[error("Evaluation timeout after {0:?}")]
    Timeout(Duration),
}

/// Result type for cohort evaluation.
pub type EvalResult<T> = std::result::Result<T, EvaluationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_parameter() {
        let err = EvaluationError::MissingParameter {
            name: "onOrAfter".to_string(),
        };
        assert_eq!(err.to_string(), "Missing parameter: onOrAfter");
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = EvaluationError::TypeMismatch {
            name: "startDate".to_string(),
            expected: ParameterType::Date,
            actual: ParameterType::Integer,
        };
        assert_eq!(
            err.to_string(),
            "Parameter 'startDate' expects Date, got Integer"
        );
    }

    #[test]
    fn test_error_display_unknown_location() {
        let err = EvaluationError::UnknownLocation(LocationId(208));
        assert_eq!(err.to_string(), "Unknown location: 208");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = EvaluationError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Evaluation timeout after 30s");
    }

    #[test]
    fn test_external_query_keeps_source() {
        let err = EvaluationError::ExternalQuery {
            query: "RETAINED_ON_ART_3_MONTHS".to_string(),
            source: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "External query 'RETAINED_ON_ART_3_MONTHS' failed: connection reset"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_from_expr_error() {
        let err: EvaluationError = ExprError::EmptyExpression.into();
        assert!(matches!(err, EvaluationError::Parse(_)));
    }
}
