//! Error types for composition and mapping parsing.

use thiserror::Error;

/// Errors that can occur while parsing composition strings or mappings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Parse error at a specific position in the input.
    #[error("parse error at position {position}: {message}")]
    ParseError {
        /// Position in the input where the error occurred.
        position: usize,
        /// Description of the error.
        message: String,
    },

    /// Empty input provided.
    #[error("empty composition expression")]
    EmptyExpression,

    /// A parameter mapping entry is not of the form `target=${source}`.
    #[error("invalid parameter mapping: '{entry}'")]
    InvalidMapping {
        /// The offending entry, trimmed.
        entry: String,
    },

    /// The same target parameter is mapped twice.
    #[error("parameter '{0}' is mapped more than once")]
    DuplicateMapping(String),
}

/// Result type for expression parsing.
pub type ExprResult<T> = std::result::Result<T, ExprError>;
