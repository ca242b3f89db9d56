//! # cohort-expr
//!
//! Parser and AST for cohort composition strings.
//!
//! A composition combines the results of named searches with boolean set
//! operators. This crate provides:
//! - **Composition parser**: turn `all AND children AND NOT(pregnant OR breastfeeding)`
//!   into a [`CompositionExpression`] tree
//! - **Mapping parser**: turn `onOrAfter=${startDate},location=${location}` into
//!   a list of [`ParameterMapping`]s
//!
//! ## Composition Usage
//!
//! ```rust
//! use cohort_expr::{parse, CompositionExpression};
//!
//! let expr = parse("all AND pregnant").unwrap();
//! assert_eq!(
//!     expr,
//!     CompositionExpression::and([
//!         CompositionExpression::leaf("all"),
//!         CompositionExpression::leaf("pregnant"),
//!     ])
//! );
//!
//! let expr = parse("all AND adults AND NOT(pregnant OR breastfeeding)").unwrap();
//! assert_eq!(expr.to_string(), "all AND adults AND NOT(pregnant OR breastfeeding)");
//! ```
//!
//! ## Mapping Usage
//!
//! ```rust
//! use cohort_expr::parse_mappings;
//!
//! let mappings = parse_mappings("onOrAfter=${startDate},onOrBefore=${endDate}").unwrap();
//! assert_eq!(mappings[0].target, "onOrAfter");
//! assert_eq!(mappings[0].source, "startDate");
//! ```
//!
//! ## Composition Syntax Quick Reference
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | (none) | Named search | `all` |
//! | `AND` | Intersection | `all AND children` |
//! | `OR` | Union | `pregnant OR breastfeeding` |
//! | `NOT` | Complement within the enclosing population | `all AND NOT pregnant` |
//! | `( )` | Grouping | `all AND NOT(pregnant OR breastfeeding)` |
//!
//! `AND` and `OR` share one precedence level and associate left to right;
//! use parentheses to group.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod mapping;
mod parser;

pub use ast::CompositionExpression;
pub use error::{ExprError, ExprResult};
pub use mapping::{parse_mappings, ParameterMapping};
pub use parser::parse;

/// Patient identifier type (64-bit unsigned integer).
pub type PatientId = u64;
