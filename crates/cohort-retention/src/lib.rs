//! # cohort-retention
//!
//! Cohort definitions for the early ART retention indicator: patients
//! retained on ART three months after initiation, split into pregnant
//! women, breastfeeding women, children (0-14) and adults (15+), with
//! pregnant and breastfeeding women excluded from the age segments.
//!
//! Raw queries are identified by the constants in [`queries`]; the
//! [`QueryExecutor`](cohort_eval::QueryExecutor) that answers them is
//! supplied by the caller. Database ids those queries filter on come from a
//! [`HivMetadata`] implementation.
//!
//! ## Usage
//!
//! ```ignore
//! use cohort_eval::{CohortEvaluator, LocationId, ParameterBinding};
//! use cohort_retention::{RetentionCohorts, StaticHivMetadata};
//!
//! let metadata = StaticHivMetadata::from_json(&std::fs::read_to_string("metadata.json")?)?;
//! let cohorts = RetentionCohorts::new(&metadata)?;
//!
//! let evaluator = CohortEvaluator::new(&executor);
//! let binding = ParameterBinding::reporting_period(start, end, LocationId(208));
//! let children = evaluator.evaluate(&cohorts.children(), &binding)?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod library;
mod metadata;
pub mod queries;

pub use error::{RetentionError, RetentionResult};
pub use library::{RetentionCohorts, ADULT_AGES, CHILDREN_AGES};
pub use metadata::{HivMetadata, StaticHivMetadata};
