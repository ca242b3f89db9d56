//! Integration tests for cohort evaluation.
//!
//! These tests drive the evaluator through the public API against an
//! in-memory executor.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use cohort_eval::{
    CancellationToken, CohortDefinition, CohortEvaluator, CohortQuery, CompositionCohort,
    EvaluationError, EvaluatorConfig, LocationId, ParameterBinding, ParameterSpec, PatientId,
    QueryExecutionError, QueryExecutor, QueryRequest, QuerySpec,
};

const PERIOD: &str = "startDate=${startDate},endDate=${endDate},location=${location}";

/// In-memory executor; every query id maps to a fixed patient set.
struct InMemoryExecutor {
    sets: HashMap<&'static str, HashSet<PatientId>>,
    executed: AtomicUsize,
}

impl InMemoryExecutor {
    fn new() -> Self {
        let mut sets = HashMap::new();
        sets.insert("ALL", set(&[1, 2, 3, 4, 5]));
        sets.insert("PREGNANT", set(&[2, 4]));
        sets.insert("BREASTFEEDING", set(&[4, 5]));
        sets.insert("AGE_0_14", set(&[1, 2]));
        sets.insert("AGE_15_200", set(&[3, 4, 5]));
        Self {
            sets,
            executed: AtomicUsize::new(0),
        }
    }

    fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl QueryExecutor for InMemoryExecutor {
    fn execute(&self, request: &QueryRequest<'_>) -> Result<HashSet<PatientId>, QueryExecutionError> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        match self.sets.get(request.query.id()) {
            Some(patients) => Ok(patients.clone()),
            None => Err(format!("no such query: {}", request.query.id()).into()),
        }
    }
}

fn set(ids: &[PatientId]) -> HashSet<PatientId> {
    ids.iter().copied().collect()
}

fn raw(id: &str) -> Arc<CohortDefinition> {
    Arc::new(CohortQuery::new(id, ParameterSpec::reporting_period(), QuerySpec::new(id)).into())
}

fn period() -> ParameterBinding {
    ParameterBinding::reporting_period(
        NaiveDate::from_ymd_opt(2019, 1, 21).unwrap(),
        NaiveDate::from_ymd_opt(2019, 4, 20).unwrap(),
        LocationId(208),
    )
}

fn retained(name: &str, search: &str, raw_id: &str) -> Arc<CohortDefinition> {
    Arc::new(
        CompositionCohort::builder(name)
            .parameters(ParameterSpec::reporting_period())
            .search("all", raw("ALL"), PERIOD)
            .search(search, raw(raw_id), PERIOD)
            .composition(&format!("all AND {}", search))
            .build()
            .unwrap()
            .into(),
    )
}

fn segment(name: &str, age_id: &str, age_search: &str) -> CohortDefinition {
    CompositionCohort::builder(name)
        .parameters(ParameterSpec::reporting_period())
        .search("all", raw("ALL"), PERIOD)
        .search(age_search, raw(age_id), PERIOD)
        .search("pregnant", retained("pregnant", "pregnant", "PREGNANT"), PERIOD)
        .search(
            "breastfeeding",
            retained("breastfeeding", "breastfeeding", "BREASTFEEDING"),
            PERIOD,
        )
        .composition(&format!(
            "all AND {} AND NOT(pregnant OR breastfeeding)",
            age_search
        ))
        .build()
        .unwrap()
        .into()
}

fn evaluate(definition: &CohortDefinition) -> Result<Vec<PatientId>, EvaluationError> {
    let executor = InMemoryExecutor::new();
    CohortEvaluator::new(&executor)
        .evaluate(definition, &period())
        .map(|result| result.to_vec())
}

fn composition_of(expression: &str) -> CohortDefinition {
    CompositionCohort::builder("test")
        .parameters(ParameterSpec::reporting_period())
        .search("all", raw("ALL"), PERIOD)
        .search("pregnant", raw("PREGNANT"), PERIOD)
        .search("breastfeeding", raw("BREASTFEEDING"), PERIOD)
        .composition(expression)
        .build()
        .unwrap()
        .into()
}

// ============================================================================
// Retention segments
// ============================================================================

#[test]
fn test_children_segment() {
    assert_eq!(evaluate(&segment("children", "AGE_0_14", "children")).unwrap(), vec![1]);
}

#[test]
fn test_adults_segment() {
    assert_eq!(evaluate(&segment("adults", "AGE_15_200", "adults")).unwrap(), vec![3]);
}

#[test]
fn test_nested_stats() {
    let executor = InMemoryExecutor::new();
    let result = CohortEvaluator::new(&executor)
        .evaluate(&segment("children", "AGE_0_14", "children"), &period())
        .unwrap();

    // all, age, and two nested compositions with two queries each
    assert_eq!(result.stats.queries_executed, 6);
    assert_eq!(result.stats.compositions_evaluated, 3);
    assert_eq!(executor.executed(), 6);
}

// ============================================================================
// Set algebra properties
// ============================================================================

#[test]
fn test_commutativity() {
    assert_eq!(
        evaluate(&composition_of("pregnant AND breastfeeding")).unwrap(),
        evaluate(&composition_of("breastfeeding AND pregnant")).unwrap()
    );
    assert_eq!(
        evaluate(&composition_of("pregnant OR breastfeeding")).unwrap(),
        evaluate(&composition_of("breastfeeding OR pregnant")).unwrap()
    );
}

#[test]
fn test_idempotence() {
    assert_eq!(evaluate(&composition_of("pregnant AND pregnant")).unwrap(), vec![2, 4]);
    assert_eq!(evaluate(&composition_of("pregnant OR pregnant")).unwrap(), vec![2, 4]);
}

#[test]
fn test_difference() {
    assert_eq!(evaluate(&composition_of("all AND NOT pregnant")).unwrap(), vec![1, 3, 5]);
}

#[test]
fn test_repeated_reference_executes_once() {
    let executor = InMemoryExecutor::new();
    let definition = composition_of("(pregnant AND all) OR (breastfeeding AND all) OR pregnant");
    let result = CohortEvaluator::new(&executor)
        .evaluate(&definition, &period())
        .unwrap();
    assert_eq!(result.to_vec(), vec![2, 4, 5]);
    assert_eq!(executor.executed(), 3);
}

// ============================================================================
// Parameters
// ============================================================================

fn breastfeeding_enrolled() -> Arc<CohortDefinition> {
    Arc::new(
        CohortQuery::new(
            "breastfeeding enrolled",
            vec![
                ParameterSpec::date("onOrAfter", "On or after"),
                ParameterSpec::date("onOrBefore", "On or before"),
                ParameterSpec::location("location", "Location"),
            ],
            QuerySpec::new("BREASTFEEDING"),
        )
        .into(),
    )
}

#[test]
fn test_renamed_parameters() {
    /// Records the bound onOrAfter date.
    struct RecordingExecutor(std::sync::Mutex<Option<NaiveDate>>);
    impl QueryExecutor for RecordingExecutor {
        fn execute(
            &self,
            request: &QueryRequest<'_>,
        ) -> Result<HashSet<PatientId>, QueryExecutionError> {
            *self.0.lock().unwrap() = Some(request.binding.date("onOrAfter")?);
            Ok(set(&[4, 5]))
        }
    }

    let definition: CohortDefinition = CompositionCohort::builder("breastfeeding")
        .parameters(ParameterSpec::reporting_period())
        .search(
            "breastfeeding",
            breastfeeding_enrolled(),
            "onOrAfter=${startDate},onOrBefore=${endDate},location=${location}",
        )
        .composition("breastfeeding")
        .build()
        .unwrap()
        .into();

    let executor = RecordingExecutor(std::sync::Mutex::new(None));
    let result = CohortEvaluator::new(&executor)
        .evaluate(&definition, &period())
        .unwrap();
    assert_eq!(result.to_vec(), vec![4, 5]);
    assert_eq!(
        *executor.0.lock().unwrap(),
        NaiveDate::from_ymd_opt(2019, 1, 21)
    );
}

#[test]
fn test_omitted_mapping_is_missing_parameter() {
    let definition: CohortDefinition = CompositionCohort::builder("breastfeeding")
        .parameters(ParameterSpec::reporting_period())
        .search(
            "breastfeeding",
            breastfeeding_enrolled(),
            "onOrBefore=${endDate},location=${location}",
        )
        .composition("breastfeeding")
        .build()
        .unwrap()
        .into();

    let err = evaluate(&definition).unwrap_err();
    assert!(matches!(err, EvaluationError::MissingParameter { name } if name == "onOrAfter"));
}

#[test]
fn test_missing_root_parameter() {
    let executor = InMemoryExecutor::new();
    let binding = ParameterBinding::builder()
        .with_date("startDate", NaiveDate::from_ymd_opt(2019, 1, 21).unwrap())
        .with_date("endDate", NaiveDate::from_ymd_opt(2019, 4, 20).unwrap())
        .build();
    let err = CohortEvaluator::new(&executor)
        .evaluate(&segment("adults", "AGE_15_200", "adults"), &binding)
        .unwrap_err();
    assert!(matches!(err, EvaluationError::MissingParameter { name } if name == "location"));
    assert_eq!(executor.executed(), 0);
}

#[test]
fn test_wrong_parameter_type() {
    let binding = ParameterBinding::builder()
        .with_date("startDate", NaiveDate::from_ymd_opt(2019, 1, 21).unwrap())
        .with_integer("endDate", 20190420)
        .with_location("location", LocationId(208))
        .build();
    let executor = InMemoryExecutor::new();
    let err = CohortEvaluator::new(&executor)
        .evaluate(&composition_of("pregnant"), &binding)
        .unwrap_err();
    assert!(matches!(err, EvaluationError::TypeMismatch { name, .. } if name == "endDate"));
}

#[test]
fn test_unknown_location() {
    let executor = InMemoryExecutor::new();
    let known: HashSet<LocationId> = [LocationId(1), LocationId(2)].into_iter().collect();
    let err = CohortEvaluator::new(&executor)
        .with_locations(&known)
        .evaluate(&composition_of("pregnant"), &period())
        .unwrap_err();
    assert!(matches!(err, EvaluationError::UnknownLocation(LocationId(208))));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_external_failure_returns_no_result() {
    let definition: CohortDefinition = CompositionCohort::builder("broken")
        .parameters(ParameterSpec::reporting_period())
        .search("all", raw("ALL"), PERIOD)
        .search("gone", raw("DROPPED_TABLE"), PERIOD)
        .composition("all OR gone")
        .build()
        .unwrap()
        .into();

    match evaluate(&definition) {
        Err(EvaluationError::ExternalQuery { query, source }) => {
            assert_eq!(query, "DROPPED_TABLE");
            assert!(source.to_string().contains("DROPPED_TABLE"));
        }
        other => panic!("expected external failure, got {:?}", other),
    }
}

#[test]
fn test_unresolved_reference_rejected_at_build() {
    let err = CompositionCohort::builder("bad")
        .parameters(ParameterSpec::reporting_period())
        .search("all", raw("ALL"), PERIOD)
        .composition("all AND nobody")
        .build()
        .unwrap_err();
    assert!(matches!(err, EvaluationError::UnresolvedReference(name) if name == "nobody"));
}

#[test]
fn test_malformed_composition_rejected_at_build() {
    let err = CompositionCohort::builder("bad")
        .parameters(ParameterSpec::reporting_period())
        .search("all", raw("ALL"), PERIOD)
        .composition("all AND (")
        .build()
        .unwrap_err();
    assert!(matches!(err, EvaluationError::Parse(_)));
}

#[test]
fn test_cancellation() {
    let executor = InMemoryExecutor::new();
    let token = CancellationToken::new();
    token.cancel();
    let err = CohortEvaluator::new(&executor)
        .evaluate_with_cancellation(&segment("children", "AGE_0_14", "children"), &period(), &token)
        .unwrap_err();
    assert!(matches!(err, EvaluationError::Cancelled));
    assert_eq!(executor.executed(), 0);
}

// ============================================================================
// Planning and configuration
// ============================================================================

#[test]
fn test_explain_counts_match_execution() {
    let executor = InMemoryExecutor::new();
    let evaluator = CohortEvaluator::new(&executor);
    let definition = segment("children", "AGE_0_14", "children");

    let plan = evaluator.explain(&definition);
    let result = evaluator.evaluate(&definition, &period()).unwrap();

    assert_eq!(plan.query_count(), result.stats.queries_executed);
    assert_eq!(plan.composition_count(), result.stats.compositions_evaluated);
}

#[test]
fn test_parallel_matches_sequential() {
    let config = EvaluatorConfig::builder()
        .with_parallel(true)
        .with_max_workers(4)
        .build();

    for (name, age_id, search) in [
        ("children", "AGE_0_14", "children"),
        ("adults", "AGE_15_200", "adults"),
    ] {
        let definition = segment(name, age_id, search);
        let executor = InMemoryExecutor::new();
        let parallel = CohortEvaluator::with_config(&executor, config.clone())
            .evaluate(&definition, &period())
            .unwrap();
        assert_eq!(parallel.to_vec(), evaluate(&definition).unwrap());
        assert_eq!(executor.executed(), 6);
    }
}
