//! Cohort definitions: raw queries and compositions of named searches.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use cohort_expr::CompositionExpression;

use crate::binding::{ParameterMappings, ParameterSpec};
use crate::error::{EvalResult, EvaluationError};
use crate::query::CohortQuery;

/// A cohort definition is either answered by the external executor or
/// composed from other definitions.
#[derive(Debug, Clone)]
pub enum CohortDefinition {
    /// Raw query forwarded to the executor.
    Query(CohortQuery),
    /// Boolean composition over named searches.
    Composition(CompositionCohort),
}

impl CohortDefinition {
    /// Returns the definition name.
    pub fn name(&self) -> &str {
        match self {
            CohortDefinition::Query(query) => query.name(),
            CohortDefinition::Composition(composition) => composition.name(),
        }
    }

    /// Returns the declared parameter schema.
    pub fn parameters(&self) -> &[ParameterSpec] {
        match self {
            CohortDefinition::Query(query) => query.parameters(),
            CohortDefinition::Composition(composition) => composition.parameters(),
        }
    }

    /// Returns true for raw queries.
    pub fn is_query(&self) -> bool {
        matches!(self, CohortDefinition::Query(_))
    }
}

impl From<CohortQuery> for CohortDefinition {
    fn from(query: CohortQuery) -> Self {
        CohortDefinition::Query(query)
    }
}

impl From<CompositionCohort> for CohortDefinition {
    fn from(composition: CompositionCohort) -> Self {
        CohortDefinition::Composition(composition)
    }
}

/// A definition registered under a name inside a composition, together with
/// the mappings that derive its binding from the composition's binding.
#[derive(Debug, Clone)]
pub struct NamedSearch {
    /// The referenced definition, possibly shared with other compositions.
    pub definition: Arc<CohortDefinition>,
    /// Parameter renaming from the parent binding.
    pub mappings: ParameterMappings,
}

/// A boolean composition of named searches.
///
/// Built once through [`CompositionCohort::builder`] and immutable afterwards.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use cohort_eval::{CohortDefinition, CohortQuery, CompositionCohort, ParameterSpec, QuerySpec};
///
/// let all = Arc::new(CohortDefinition::from(CohortQuery::new(
///     "retained",
///     ParameterSpec::reporting_period(),
///     QuerySpec::new("RETAINED_ON_ART_3_MONTHS"),
/// )));
/// let pregnant = Arc::new(CohortDefinition::from(CohortQuery::new(
///     "pregnant",
///     ParameterSpec::reporting_period(),
///     QuerySpec::new("PREGNANT_ENROLLED_ON_ART"),
/// )));
///
/// let cohort = CompositionCohort::builder("Pregnant women retained on ART")
///     .parameters(ParameterSpec::reporting_period())
///     .search("all", all, "startDate=${startDate},endDate=${endDate},location=${location}")
///     .search("pregnant", pregnant, "startDate=${startDate},endDate=${endDate},location=${location}")
///     .composition("all AND pregnant")
///     .build()
///     .unwrap();
///
/// assert_eq!(cohort.expression().to_string(), "all AND pregnant");
/// ```
#[derive(Debug, Clone)]
pub struct CompositionCohort {
    name: String,
    parameters: Vec<ParameterSpec>,
    searches: BTreeMap<String, NamedSearch>,
    expression: CompositionExpression,
    universe: Option<String>,
}

impl CompositionCohort {
    /// Creates a new builder.
    pub fn builder(name: impl Into<String>) -> CompositionCohortBuilder {
        CompositionCohortBuilder::new(name)
    }

    /// Returns the composition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameter schema.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Returns a registered search by name.
    pub fn search(&self, name: &str) -> Option<&NamedSearch> {
        self.searches.get(name)
    }

    /// Iterates over all registered searches in name order.
    pub fn searches(&self) -> impl Iterator<Item = (&str, &NamedSearch)> {
        self.searches.iter().map(|(name, search)| (name.as_str(), search))
    }

    /// Returns the root expression.
    pub fn expression(&self) -> &CompositionExpression {
        &self.expression
    }

    /// Returns the search whose result is the population `NOT` complements
    /// against at the root, if declared.
    pub fn universe(&self) -> Option<&str> {
        self.universe.as_deref()
    }

    /// Names of the searches an evaluation must compute, in name order.
    pub fn required_searches(&self) -> Vec<&str> {
        let mut names = self.expression.references();
        if let Some(universe) = self.universe.as_deref() {
            names.insert(universe);
        }
        names.into_iter().collect()
    }
}

/// Builder for CompositionCohort.
///
/// Parse and consistency errors are collected and reported by
/// [`build`](Self::build).
#[derive(Debug)]
pub struct CompositionCohortBuilder {
    name: String,
    parameters: Vec<ParameterSpec>,
    searches: Vec<(String, Arc<CohortDefinition>, EvalResult<ParameterMappings>)>,
    expression: Option<EvalResult<CompositionExpression>>,
    universe: Option<String>,
}

impl CompositionCohortBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            searches: Vec::new(),
            expression: None,
            universe: None,
        }
    }

    /// Declares a parameter.
    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Declares several parameters.
    pub fn parameters(mut self, specs: impl IntoIterator<Item = ParameterSpec>) -> Self {
        self.parameters.extend(specs);
        self
    }

    /// Registers a search with a mapping string such as
    /// `onOrAfter=${startDate},location=${location}`.
    pub fn search(
        mut self,
        name: impl Into<String>,
        definition: Arc<CohortDefinition>,
        mappings: &str,
    ) -> Self {
        self.searches
            .push((name.into(), definition, ParameterMappings::parse(mappings)));
        self
    }

    /// Registers a search with already parsed mappings.
    pub fn search_with_mappings(
        mut self,
        name: impl Into<String>,
        definition: Arc<CohortDefinition>,
        mappings: ParameterMappings,
    ) -> Self {
        self.searches.push((name.into(), definition, Ok(mappings)));
        self
    }

    /// Sets the root expression from a composition string.
    pub fn composition(mut self, composition: &str) -> Self {
        self.expression = Some(cohort_expr::parse(composition).map_err(Into::into));
        self
    }

    /// Sets the root expression from a tree.
    pub fn expression(mut self, expression: CompositionExpression) -> Self {
        self.expression = Some(Ok(expression));
        self
    }

    /// Names the search that a root-level `NOT` complements against.
    pub fn universe(mut self, search: impl Into<String>) -> Self {
        self.universe = Some(search.into());
        self
    }

    /// Builds the CompositionCohort.
    ///
    /// # Errors
    ///
    /// - `Parse` if a composition or mapping string is malformed
    /// - `InvalidDefinition` for a missing composition, duplicate names, or a
    ///   mapping that reads an undeclared parameter
    /// - `UnresolvedReference` if the expression or universe names an
    ///   unregistered search
    /// - `UndefinedUniverse` if the root needs a population and none is declared
    pub fn build(self) -> EvalResult<CompositionCohort> {
        let expression = self.expression.ok_or_else(|| {
            EvaluationError::InvalidDefinition(format!(
                "composition '{}' has no composition string",
                self.name
            ))
        })??;

        let mut declared = HashSet::new();
        for spec in &self.parameters {
            if !declared.insert(spec.name.as_str()) {
                return Err(EvaluationError::InvalidDefinition(format!(
                    "parameter '{}' declared twice in '{}'",
                    spec.name, self.name
                )));
            }
        }

        let mut searches = BTreeMap::new();
        for (name, definition, mappings) in self.searches {
            let mappings = mappings?;
            if let Some(source) = mappings
                .iter()
                .map(|m| m.source.as_str())
                .find(|source| !declared.contains(source))
            {
                return Err(EvaluationError::InvalidDefinition(format!(
                    "search '{}' in '{}' maps from undeclared parameter '{}'",
                    name, self.name, source
                )));
            }
            if searches.contains_key(&name) {
                return Err(EvaluationError::InvalidDefinition(format!(
                    "search '{}' registered twice in '{}'",
                    name, self.name
                )));
            }
            searches.insert(name, NamedSearch { definition, mappings });
        }

        if let Some(missing) = expression
            .references()
            .into_iter()
            .find(|name| !searches.contains_key(*name))
        {
            return Err(EvaluationError::UnresolvedReference(missing.to_string()));
        }

        match self.universe.as_deref() {
            Some(universe) if !searches.contains_key(universe) => {
                return Err(EvaluationError::UnresolvedReference(universe.to_string()));
            }
            None if expression.needs_universe() => return Err(EvaluationError::UndefinedUniverse),
            _ => {}
        }

        Ok(CompositionCohort {
            name: self.name,
            parameters: self.parameters,
            searches,
            expression,
            universe: self.universe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QuerySpec;

    const PERIOD: &str = "startDate=${startDate},endDate=${endDate},location=${location}";

    fn raw(name: &str) -> Arc<CohortDefinition> {
        Arc::new(
            CohortQuery::new(name, ParameterSpec::reporting_period(), QuerySpec::new(name)).into(),
        )
    }

    fn builder() -> CompositionCohortBuilder {
        CompositionCohort::builder("test").parameters(ParameterSpec::reporting_period())
    }

    #[test]
    fn test_build_valid_composition() {
        let cohort = builder()
            .search("all", raw("all"), PERIOD)
            .search("pregnant", raw("pregnant"), PERIOD)
            .search("breastfeeding", raw("breastfeeding"), PERIOD)
            .composition("all AND NOT(pregnant OR breastfeeding)")
            .build()
            .unwrap();

        assert_eq!(cohort.name(), "test");
        assert_eq!(cohort.parameters().len(), 3);
        assert_eq!(cohort.searches().count(), 3);
        assert_eq!(
            cohort.required_searches(),
            vec!["all", "breastfeeding", "pregnant"]
        );
        assert!(cohort.universe().is_none());
    }

    #[test]
    fn test_definition_accessors() {
        let definition: CohortDefinition = builder()
            .search("all", raw("all"), PERIOD)
            .composition("all")
            .build()
            .unwrap()
            .into();
        assert_eq!(definition.name(), "test");
        assert!(!definition.is_query());
        assert!(raw("all").is_query());
    }

    #[test]
    fn test_missing_composition() {
        let err = builder().search("all", raw("all"), PERIOD).build().unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
    }

    #[test]
    fn test_unresolved_reference_rejected_at_build() {
        let err = builder()
            .search("all", raw("all"), PERIOD)
            .composition("all AND adults")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::UnresolvedReference(name) if name == "adults"));
    }

    #[test]
    fn test_bad_composition_string() {
        let err = builder()
            .search("all", raw("all"), PERIOD)
            .composition("all AND")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Parse(_)));
    }

    #[test]
    fn test_bad_mapping_string() {
        let err = builder()
            .search("all", raw("all"), "startDate=startDate")
            .composition("all")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Parse(_)));
    }

    #[test]
    fn test_mapping_from_undeclared_parameter() {
        let err = builder()
            .search("all", raw("all"), "startDate=${reportStart}")
            .composition("all")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
    }

    #[test]
    fn test_duplicate_search_name() {
        let err = builder()
            .search("all", raw("all"), PERIOD)
            .search("all", raw("other"), PERIOD)
            .composition("all")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = builder()
            .parameter(ParameterSpec::date("startDate", "Again"))
            .search("all", raw("all"), PERIOD)
            .composition("all")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
    }

    #[test]
    fn test_bare_not_requires_universe() {
        let err = builder()
            .search("pregnant", raw("pregnant"), PERIOD)
            .composition("NOT pregnant")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::UndefinedUniverse));

        let cohort = builder()
            .search("all", raw("all"), PERIOD)
            .search("pregnant", raw("pregnant"), PERIOD)
            .composition("NOT pregnant")
            .universe("all")
            .build()
            .unwrap();
        assert_eq!(cohort.universe(), Some("all"));
        assert_eq!(cohort.required_searches(), vec!["all", "pregnant"]);
    }

    #[test]
    fn test_unknown_universe() {
        let err = builder()
            .search("pregnant", raw("pregnant"), PERIOD)
            .composition("NOT pregnant")
            .universe("all")
            .build()
            .unwrap_err();
        assert!(matches!(err, EvaluationError::UnresolvedReference(name) if name == "all"));
    }
}
