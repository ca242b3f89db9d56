//! Parameter mapping parser.
//!
//! A mapping string wires the parameters of a parent cohort into the
//! parameters of a search it contains:
//!
//! ```text
//! onOrAfter=${startDate},onOrBefore=${endDate},location=${location}
//! ```
//!
//! Each entry names the child parameter on the left and the parent
//! parameter it is read from on the right.

use std::collections::HashSet;

use nom::{
    bytes::complete::tag,
    character::complete::char,
    combinator::all_consuming,
    sequence::{delimited, separated_pair},
    IResult,
};

use crate::error::{ExprError, ExprResult};
use crate::parser::{identifier, ws};

/// One `target=${source}` entry of a mapping string.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterMapping {
    /// Parameter name as declared by the child search.
    pub target: String,
    /// Parameter name in the parent binding.
    pub source: String,
}

impl ParameterMapping {
    /// Creates a mapping from `source` in the parent to `target` in the child.
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Parse a comma separated mapping string.
///
/// An empty (or all-whitespace) string yields no mappings.
///
/// # Examples
///
/// ```rust
/// use cohort_expr::{parse_mappings, ParameterMapping};
///
/// let mappings = parse_mappings("endDate=${endDate}, location=${location}").unwrap();
/// assert_eq!(
///     mappings,
///     vec![
///         ParameterMapping::new("endDate", "endDate"),
///         ParameterMapping::new("location", "location"),
///     ]
/// );
/// ```
pub fn parse_mappings(input: &str) -> ExprResult<Vec<ParameterMapping>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut mappings = Vec::new();
    for entry in input.split(',') {
        let entry = entry.trim();
        let (_, (target, source)) = all_consuming(mapping_entry)(entry).map_err(|_| {
            ExprError::InvalidMapping {
                entry: entry.to_string(),
            }
        })?;
        if !seen.insert(target) {
            return Err(ExprError::DuplicateMapping(target.to_string()));
        }
        mappings.push(ParameterMapping::new(target, source));
    }
    Ok(mappings)
}

fn mapping_entry(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(identifier, delimited(ws, char('='), ws), placeholder)(input)
}

fn placeholder(input: &str) -> IResult<&str, &str> {
    delimited(tag("${"), delimited(ws, identifier, ws), char('}'))(input)
}
