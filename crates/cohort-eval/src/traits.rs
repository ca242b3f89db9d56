//! Traits for the services an evaluation depends on.
//!
//! The evaluator never talks to a database itself. It forwards each raw
//! query to a [`QueryExecutor`] supplied by the caller, and optionally checks
//! location parameters against a [`LocationRegistry`].
//!
//! # Example: Implementing QueryExecutor
//!
//! ```ignore
//! use cohort_eval::{QueryExecutionError, QueryExecutor, QueryRequest};
//! use cohort_expr::PatientId;
//! use std::collections::HashSet;
//!
//! struct SqlExecutor { pool: MyPool }
//!
//! impl QueryExecutor for SqlExecutor {
//!     fn execute(&self, request: &QueryRequest<'_>) -> Result<HashSet<PatientId>, QueryExecutionError> {
//!         let sql = self.render(request.query)?;
//!         let rows = self.pool.query(&sql, request.binding)?;
//!         Ok(rows.into_iter().map(|r| r.patient_id).collect())
//!     }
//! }
//! ```

use std::collections::HashSet;

use cohort_expr::PatientId;

use crate::binding::{LocationId, ParameterBinding};
use crate::cancel::CancellationToken;
use crate::query::QuerySpec;

/// Error type returned by executors; wrapped into
/// [`EvaluationError::ExternalQuery`](crate::EvaluationError::ExternalQuery).
pub type QueryExecutionError = Box<dyn std::error::Error + Send + Sync>;

/// One raw query to run against the patient data source.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    /// Name of the cohort query being evaluated.
    pub cohort: &'a str,
    /// Query identifier and fixed arguments.
    pub query: &'a QuerySpec,
    /// Validated parameter values.
    pub binding: &'a ParameterBinding,
    /// Cancellation flag of the enclosing evaluation.
    pub cancellation: &'a CancellationToken,
}

/// Service that executes raw cohort queries.
///
/// Implementations must be pure with respect to a fixed data source:
/// the same request yields the same set.
pub trait QueryExecutor: Send + Sync {
    /// Runs the query and returns the matching patients.
    fn execute(&self, request: &QueryRequest<'_>) -> Result<HashSet<PatientId>, QueryExecutionError>;
}

impl<F> QueryExecutor for F
where
    F: Fn(&QueryRequest<'_>) -> Result<HashSet<PatientId>, QueryExecutionError> + Send + Sync,
{
    fn execute(&self, request: &QueryRequest<'_>) -> Result<HashSet<PatientId>, QueryExecutionError> {
        self(request)
    }
}

/// Registry of facilities a report may be run for.
pub trait LocationRegistry: Send + Sync {
    /// Returns true if `location` identifies a known facility.
    fn is_known_location(&self, location: LocationId) -> bool;
}

impl LocationRegistry for HashSet<LocationId> {
    fn is_known_location(&self, location: LocationId) -> bool {
        self.contains(&location)
    }
}
