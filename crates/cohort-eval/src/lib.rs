//! # cohort-eval
//!
//! Set-algebra evaluation engine for parameterized patient cohorts.
//!
//! A cohort is either a raw query, answered by an external
//! [`QueryExecutor`], or a composition that names other cohorts as searches
//! and combines their results with `AND`, `OR` and `NOT`. Compositions
//! nest to any depth; every search gets its own parameters, renamed from the
//! parent's through `target=${source}` mappings.
//!
//! ## Key Features
//!
//! - **Pluggable data access** - raw queries go through the [`QueryExecutor`] trait
//! - **Each search evaluated once** - repeated references reuse the same result
//! - **Cancellation and timeouts** - checked between steps, no partial results
//! - **Optional parallelism** - enable the `parallel` feature to evaluate sibling searches concurrently
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cohort_eval::{CohortEvaluator, CohortQuery, CompositionCohort, ParameterBinding,
//!                   ParameterSpec, QuerySpec};
//!
//! let all = Arc::new(CohortQuery::new("retained", ParameterSpec::reporting_period(),
//!                                     QuerySpec::new("RETAINED_ON_ART_3_MONTHS")).into());
//! let pregnant = Arc::new(CohortQuery::new("pregnant", ParameterSpec::reporting_period(),
//!                                          QuerySpec::new("PREGNANT_ENROLLED_ON_ART")).into());
//!
//! let period = "startDate=${startDate},endDate=${endDate},location=${location}";
//! let not_pregnant = CompositionCohort::builder("retained, not pregnant")
//!     .parameters(ParameterSpec::reporting_period())
//!     .search("all", all, period)
//!     .search("pregnant", pregnant, period)
//!     .composition("all AND NOT pregnant")
//!     .build()?;
//!
//! // Assumes SqlExecutor implements QueryExecutor
//! let executor = SqlExecutor::connect(url)?;
//! let evaluator = CohortEvaluator::new(&executor);
//!
//! let binding = ParameterBinding::reporting_period(start, end, location);
//! let result = evaluator.evaluate(&not_pregnant.into(), &binding)?;
//! println!("{} patients", result.count());
//! ```
//!
//! ## With Configuration
//!
//! ```ignore
//! use cohort_eval::{CohortEvaluator, EvaluatorConfig};
//! use std::time::Duration;
//!
//! let config = EvaluatorConfig::builder()
//!     .with_parallel(true)
//!     .with_max_workers(4)
//!     .with_timeout(Duration::from_secs(60))
//!     .build();
//!
//! let evaluator = CohortEvaluator::with_config(&executor, config);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` - Evaluates the searches of a composition on a rayon pool
//! - `serde` - Serialize/Deserialize for parameter values and composition trees
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        cohort-eval                           │
//! │                                                              │
//! │  CohortEvaluator                                             │
//! │  ├── validate binding against declared parameters           │
//! │  ├── resolve each search's binding via its mappings         │
//! │  ├── run raw queries (via QueryExecutor trait)              │
//! │  ├── combine named results (AND/OR/NOT)                     │
//! │  └── return CohortResult with stats                         │
//! │                                                              │
//! │  Dependencies:                                               │
//! │  └── cohort-expr - composition and mapping parsers (AST)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod binding;
mod cancel;
mod config;
mod context;
mod definition;
mod error;
mod evaluator;
mod planner;
mod query;
mod result;
mod traits;

// Public re-exports
pub use binding::{
    LocationId, ParameterBinding, ParameterBindingBuilder, ParameterMappings, ParameterSpec,
    ParameterType, ParameterValue, END_DATE, LOCATION, START_DATE,
};
pub use cancel::CancellationToken;
pub use config::{EvaluatorConfig, EvaluatorConfigBuilder};
pub use context::EvaluationContext;
pub use definition::{CohortDefinition, CompositionCohort, CompositionCohortBuilder, NamedSearch};
pub use error::{EvalResult, EvaluationError};
pub use evaluator::CohortEvaluator;
pub use planner::{EvaluationPlan, PlanStep, StepKind};
pub use query::{CohortQuery, QuerySpec};
pub use result::{CohortResult, EvaluationStats};
pub use traits::{LocationRegistry, QueryExecutionError, QueryExecutor, QueryRequest};

// Re-export commonly used types from dependencies for convenience
pub use cohort_expr::{CompositionExpression, PatientId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<EvaluatorConfig> = None;
        let _: Option<CohortResult> = None;
        let _: Option<EvaluationStats> = None;
        let _: Option<EvaluationPlan> = None;
        let _: Option<EvalResult<()>> = None;
    }

    #[test]
    fn test_re_exports() {
        let _id: PatientId = 42;
        let expr: CompositionExpression = cohort_expr::parse("all AND NOT pregnant").unwrap();
        assert_eq!(expr.references().len(), 2);
    }
}
