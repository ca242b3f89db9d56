//! Parameter values, schemas, bindings and renaming.
//!
//! A [`ParameterBinding`] carries the externally supplied values
//! (`startDate`, `endDate`, `location`) into an evaluation. Each search of a
//! composition receives its own binding, derived from the parent one through
//! [`ParameterMappings`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use cohort_expr::ParameterMapping;

use crate::error::{EvalResult, EvaluationError};
use crate::traits::LocationRegistry;

/// Name of the reporting period start parameter.
pub const START_DATE: &str = "startDate";
/// Name of the reporting period end parameter.
pub const END_DATE: &str = "endDate";
/// Name of the facility parameter.
pub const LOCATION: &str = "location";

/// Identifier of a health facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct LocationId(pub u32);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterType {
    /// Calendar date.
    Date,
    /// Facility reference.
    Location,
    /// Whole number.
    Integer,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::Date => write!(f, "Date"),
            ParameterType::Location => write!(f, "Location"),
            ParameterType::Integer => write!(f, "Integer"),
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterValue {
    /// Calendar date.
    Date(NaiveDate),
    /// Facility reference.
    Location(LocationId),
    /// Whole number.
    Integer(i64),
}

impl ParameterValue {
    /// Returns the type of this value.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::Date(_) => ParameterType::Date,
            ParameterValue::Location(_) => ParameterType::Location,
            ParameterValue::Integer(_) => ParameterType::Integer,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ParameterValue::Location(location) => write!(f, "{}", location),
            ParameterValue::Integer(value) => write!(f, "{}", value),
        }
    }
}

impl From<NaiveDate> for ParameterValue {
    fn from(date: NaiveDate) -> Self {
        ParameterValue::Date(date)
    }
}

impl From<LocationId> for ParameterValue {
    fn from(location: LocationId) -> Self {
        ParameterValue::Location(location)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

/// One entry of a declared parameter schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSpec {
    /// Parameter name, as used in bindings and mappings.
    pub name: String,
    /// Human readable label.
    pub label: String,
    /// Expected value type.
    pub parameter_type: ParameterType,
}

impl ParameterSpec {
    /// Creates a parameter spec.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        parameter_type: ParameterType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            parameter_type,
        }
    }

    /// A date parameter.
    pub fn date(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ParameterType::Date)
    }

    /// A location parameter.
    pub fn location(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ParameterType::Location)
    }

    /// An integer parameter.
    pub fn integer(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ParameterType::Integer)
    }

    /// The standard `startDate`, `endDate`, `location` schema.
    pub fn reporting_period() -> Vec<ParameterSpec> {
        vec![
            Self::date(START_DATE, "Start Date"),
            Self::date(END_DATE, "End Date"),
            Self::location(LOCATION, "Location"),
        ]
    }
}

/// Immutable mapping from parameter names to values.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use cohort_eval::{LocationId, ParameterBinding};
///
/// let start = NaiveDate::from_ymd_opt(2019, 1, 21).unwrap();
/// let end = NaiveDate::from_ymd_opt(2019, 4, 20).unwrap();
/// let binding = ParameterBinding::reporting_period(start, end, LocationId(208));
///
/// assert_eq!(binding.date("startDate").unwrap(), start);
/// assert!(binding.get("onOrAfter").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterBinding {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterBinding {
    /// Creates a new builder.
    pub fn builder() -> ParameterBindingBuilder {
        ParameterBindingBuilder::default()
    }

    /// Binds the standard reporting period triple.
    pub fn reporting_period(start: NaiveDate, end: NaiveDate, location: LocationId) -> Self {
        Self::builder()
            .with_date(START_DATE, start)
            .with_date(END_DATE, end)
            .with_location(LOCATION, location)
            .build()
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> EvalResult<&ParameterValue> {
        self.values
            .get(name)
            .ok_or_else(|| EvaluationError::MissingParameter {
                name: name.to_string(),
            })
    }

    /// Returns the date bound to `name`.
    pub fn date(&self, name: &str) -> EvalResult<NaiveDate> {
        match self.get(name)? {
            ParameterValue::Date(date) => Ok(*date),
            other => Err(mismatch(name, ParameterType::Date, other)),
        }
    }

    /// Returns the location bound to `name`.
    pub fn location(&self, name: &str) -> EvalResult<LocationId> {
        match self.get(name)? {
            ParameterValue::Location(location) => Ok(*location),
            other => Err(mismatch(name, ParameterType::Location, other)),
        }
    }

    /// Returns the integer bound to `name`.
    pub fn integer(&self, name: &str) -> EvalResult<i64> {
        match self.get(name)? {
            ParameterValue::Integer(value) => Ok(*value),
            other => Err(mismatch(name, ParameterType::Integer, other)),
        }
    }

    /// Returns true if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the number of bound parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over bound parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Derives the binding for a child search.
    ///
    /// Each mapped target takes the value of its source. Parameters that are
    /// not the source of any mapping pass through under their own name.
    ///
    /// # Errors
    ///
    /// `MissingParameter` naming the source if a mapped source is unbound.
    pub fn resolve(&self, mappings: &ParameterMappings) -> EvalResult<ParameterBinding> {
        let consumed: HashSet<&str> = mappings.iter().map(|m| m.source.as_str()).collect();

        let mut values: BTreeMap<String, ParameterValue> = self
            .values
            .iter()
            .filter(|(name, _)| !consumed.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), *value))
            .collect();

        for mapping in mappings.iter() {
            let value = self.get(&mapping.source)?;
            values.insert(mapping.target.clone(), *value);
        }

        Ok(ParameterBinding { values })
    }

    /// Checks that every declared parameter is bound with the declared type.
    pub fn validate(&self, schema: &[ParameterSpec]) -> EvalResult<()> {
        for spec in schema {
            let value = self.get(&spec.name)?;
            if value.parameter_type() != spec.parameter_type {
                return Err(mismatch(&spec.name, spec.parameter_type, value));
            }
        }
        Ok(())
    }

    /// Checks every location value against a registry of known facilities.
    pub fn validate_locations(&self, registry: &dyn LocationRegistry) -> EvalResult<()> {
        for value in self.values.values() {
            if let ParameterValue::Location(location) = value {
                if !registry.is_known_location(*location) {
                    return Err(EvaluationError::UnknownLocation(*location));
                }
            }
        }
        Ok(())
    }

    /// Parses an ISO `YYYY-MM-DD` calendar date for parameter `name`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cohort_eval::ParameterBinding;
    ///
    /// assert!(ParameterBinding::parse_date("endDate", "2019-04-20").is_ok());
    /// assert!(ParameterBinding::parse_date("endDate", "2019-02-30").is_err());
    /// ```
    pub fn parse_date(name: &str, text: &str) -> EvalResult<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
            EvaluationError::InvalidParameterValue {
                name: name.to_string(),
                message: format!("'{}' is not a calendar date: {}", text, e),
            }
        })
    }
}

fn mismatch(name: &str, expected: ParameterType, actual: &ParameterValue) -> EvaluationError {
    EvaluationError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.parameter_type(),
    }
}

impl fmt::Display for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Builder for ParameterBinding.
#[derive(Debug, Clone, Default)]
pub struct ParameterBindingBuilder {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterBindingBuilder {
    /// Binds a date.
    pub fn with_date(self, name: impl Into<String>, date: NaiveDate) -> Self {
        self.with_value(name, ParameterValue::Date(date))
    }

    /// Binds a location.
    pub fn with_location(self, name: impl Into<String>, location: LocationId) -> Self {
        self.with_value(name, ParameterValue::Location(location))
    }

    /// Binds an integer.
    pub fn with_integer(self, name: impl Into<String>, value: i64) -> Self {
        self.with_value(name, ParameterValue::Integer(value))
    }

    /// Binds any value, replacing an earlier binding of the same name.
    pub fn with_value(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Builds the ParameterBinding.
    pub fn build(self) -> ParameterBinding {
        ParameterBinding {
            values: self.values,
        }
    }
}

/// Renaming rules from a parent binding into a child search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMappings {
    entries: Vec<ParameterMapping>,
}

impl ParameterMappings {
    /// Creates mappings from parsed entries.
    pub fn new(entries: Vec<ParameterMapping>) -> Self {
        Self { entries }
    }

    /// Parses `target=${source},...`.
    pub fn parse(input: &str) -> EvalResult<Self> {
        Ok(Self::new(cohort_expr::parse_mappings(input)?))
    }

    /// Maps each name to itself.
    pub fn identity<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            names
                .into_iter()
                .map(|name| ParameterMapping::new(name, name))
                .collect(),
        )
    }

    /// Iterates over the mapping entries.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterMapping> {
        self.entries.iter()
    }

    /// Returns true if nothing is mapped; the child sees the parent binding as is.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterMappings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mapping) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}=${{{}}}", mapping.target, mapping.source)?;
        }
        Ok(())
    }
}
