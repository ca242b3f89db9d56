//! Raw, externally executed cohort queries.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use cohort_expr::PatientId;

use crate::binding::{ParameterBinding, ParameterSpec};
use crate::cancel::CancellationToken;
use crate::error::{EvalResult, EvaluationError};
use crate::traits::{QueryExecutor, QueryRequest};

/// Identifier of an external query body plus its fixed arguments.
///
/// Arguments are resolved once, when the definition is built (encounter
/// types, concept ids, age bounds), and forwarded untouched to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuerySpec {
    id: String,
    arguments: BTreeMap<String, i64>,
}

impl QuerySpec {
    /// Creates a spec with no arguments.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            arguments: BTreeMap::new(),
        }
    }

    /// Adds a fixed argument.
    pub fn with_argument(mut self, name: impl Into<String>, value: i64) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// Returns the query identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a fixed argument by name.
    pub fn argument(&self, name: &str) -> Option<i64> {
        self.arguments.get(name).copied()
    }

    /// Iterates over fixed arguments in name order.
    pub fn arguments(&self) -> impl Iterator<Item = (&str, i64)> {
        self.arguments.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.arguments.is_empty() {
            write!(f, "(")?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", name, value)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A named, parameterized query answered by the external executor.
///
/// # Example
///
/// ```rust
/// use cohort_eval::{CohortQuery, ParameterSpec, QuerySpec};
///
/// let query = CohortQuery::new(
///     "patientsBetweenAgeBrackets",
///     vec![
///         ParameterSpec::date("endDate", "End Date"),
///         ParameterSpec::location("location", "Location"),
///     ],
///     QuerySpec::new("AGE_BRACKET")
///         .with_argument("minAge", 0)
///         .with_argument("maxAge", 14),
/// );
/// assert_eq!(query.parameters().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortQuery {
    name: String,
    parameters: Vec<ParameterSpec>,
    query: QuerySpec,
}

impl CohortQuery {
    /// Creates a fully specified query.
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterSpec>, query: QuerySpec) -> Self {
        Self {
            name: name.into(),
            parameters,
            query,
        }
    }

    /// Returns the query name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameter schema.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Returns the external query spec.
    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Validates `binding` and runs the query through `executor`.
    pub fn evaluate(
        &self,
        binding: &ParameterBinding,
        executor: &dyn QueryExecutor,
    ) -> EvalResult<HashSet<PatientId>> {
        self.evaluate_with_cancellation(binding, executor, &CancellationToken::new())
    }

    /// Like [`evaluate`](Self::evaluate), handing `cancellation` to the executor.
    ///
    /// # Errors
    ///
    /// - `MissingParameter` / `TypeMismatch` if the binding does not satisfy the schema
    /// - `Cancelled` if the token is already cancelled
    /// - `ExternalQuery` wrapping any executor failure
    pub fn evaluate_with_cancellation(
        &self,
        binding: &ParameterBinding,
        executor: &dyn QueryExecutor,
        cancellation: &CancellationToken,
    ) -> EvalResult<HashSet<PatientId>> {
        binding.validate(&self.parameters)?;
        if cancellation.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }

        log::trace!("Executing query '{}' [{}] with {}", self.name, self.query, binding);

        let request = QueryRequest {
            cohort: &self.name,
            query: &self.query,
            binding,
            cancellation,
        };
        executor
            .execute(&request)
            .map_err(|source| EvaluationError::ExternalQuery {
                query: self.query.id().to_string(),
                source,
            })
    }
}
