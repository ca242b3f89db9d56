//! Cohort evaluator implementation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cohort_expr::PatientId;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::binding::ParameterBinding;
use crate::cancel::CancellationToken;
use crate::config::EvaluatorConfig;
use crate::context::EvaluationContext;
use crate::definition::{CohortDefinition, CompositionCohort};
use crate::error::{EvalResult, EvaluationError};
use crate::planner::EvaluationPlan;
use crate::result::{CohortResult, EvaluationStats};
use crate::traits::{LocationRegistry, QueryExecutor};

/// Main cohort evaluation engine.
///
/// The evaluator walks a [`CohortDefinition`], sends every raw query to the
/// injected [`QueryExecutor`] and combines the named results with the
/// composition expressions.
///
/// # Example
///
/// ```ignore
/// use cohort_eval::{CohortEvaluator, ParameterBinding};
///
/// // Assumes SqlExecutor implements QueryExecutor
/// let executor = SqlExecutor::connect(url)?;
/// let evaluator = CohortEvaluator::new(&executor);
///
/// let binding = ParameterBinding::reporting_period(start, end, location);
/// let result = evaluator.evaluate(&children, &binding)?;
/// println!("{} children retained", result.count());
/// ```
pub struct CohortEvaluator<'a> {
    /// Executor for raw queries.
    executor: &'a dyn QueryExecutor,
    /// Registry used to validate location parameters (optional).
    locations: Option<&'a dyn LocationRegistry>,
    /// Evaluator configuration.
    config: EvaluatorConfig,
    /// Worker pool for parallel search evaluation.
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

/// State of one `evaluate` call.
struct Run<'r> {
    cancellation: &'r CancellationToken,
    started: Instant,
    timeout: Option<Duration>,
    queries: AtomicUsize,
    compositions: AtomicUsize,
}

impl Run<'_> {
    fn checkpoint(&self) -> EvalResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            if self.started.elapsed() > timeout {
                return Err(EvaluationError::Timeout(timeout));
            }
        }
        Ok(())
    }
}

impl<'a> CohortEvaluator<'a> {
    /// Creates a new evaluator with default configuration.
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self::with_config(executor, EvaluatorConfig::default())
    }

    /// Creates an evaluator with custom configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = EvaluatorConfig::builder()
    ///     .with_parallel(true)
    ///     .with_max_workers(4)
    ///     .build();
    ///
    /// let evaluator = CohortEvaluator::with_config(&executor, config);
    /// ```
    pub fn with_config(executor: &'a dyn QueryExecutor, config: EvaluatorConfig) -> Self {
        #[cfg(not(feature = "parallel"))]
        if config.parallel {
            log::warn!("Parallel evaluation requested without the `parallel` feature; evaluating sequentially");
        }

        Self {
            executor,
            locations: None,
            #[cfg(feature = "parallel")]
            pool: build_pool(&config),
            config,
        }
    }

    /// Validates location parameters against `registry` before evaluating.
    pub fn with_locations(mut self, registry: &'a dyn LocationRegistry) -> Self {
        self.locations = Some(registry);
        self
    }

    /// Returns a reference to the evaluator configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluates a cohort definition.
    ///
    /// # Arguments
    ///
    /// * `definition` - The cohort to evaluate
    /// * `binding` - Parameter values declared by the definition
    ///
    /// # Returns
    ///
    /// * `Ok(CohortResult)` - The member patients and evaluation stats
    /// * `Err(EvaluationError)` - The first failure; no partial result
    pub fn evaluate(
        &self,
        definition: &CohortDefinition,
        binding: &ParameterBinding,
    ) -> EvalResult<CohortResult> {
        self.evaluate_with_cancellation(definition, binding, &CancellationToken::new())
    }

    /// Evaluates a cohort definition, aborting with `Cancelled` once
    /// `cancellation` is triggered.
    pub fn evaluate_with_cancellation(
        &self,
        definition: &CohortDefinition,
        binding: &ParameterBinding,
        cancellation: &CancellationToken,
    ) -> EvalResult<CohortResult> {
        let start = Instant::now();

        if let Some(registry) = self.locations {
            binding.validate_locations(registry)?;
        }

        log::debug!("Evaluating cohort '{}' with {}", definition.name(), binding);

        let run = Run {
            cancellation,
            started: start,
            timeout: self.config.timeout,
            queries: AtomicUsize::new(0),
            compositions: AtomicUsize::new(0),
        };
        let patient_ids = self.evaluate_definition(definition, binding, &run)?;

        let stats = EvaluationStats::new(
            start.elapsed(),
            run.queries.load(Ordering::Relaxed),
            run.compositions.load(Ordering::Relaxed),
        );
        log::debug!(
            "Cohort '{}' evaluated: {} patients, {} queries in {:?}",
            definition.name(),
            patient_ids.len(),
            stats.queries_executed,
            stats.duration
        );
        Ok(CohortResult::new(patient_ids, stats))
    }

    /// Returns an evaluation plan without executing anything.
    pub fn explain(&self, definition: &CohortDefinition) -> EvaluationPlan {
        EvaluationPlan::for_definition(definition)
    }

    /// Evaluates one definition; recursive over compositions.
    fn evaluate_definition(
        &self,
        definition: &CohortDefinition,
        binding: &ParameterBinding,
        run: &Run<'_>,
    ) -> EvalResult<HashSet<PatientId>> {
        run.checkpoint()?;

        match definition {
            CohortDefinition::Query(query) => {
                run.queries.fetch_add(1, Ordering::Relaxed);
                query.evaluate_with_cancellation(binding, self.executor, run.cancellation)
            }
            CohortDefinition::Composition(composition) => {
                run.compositions.fetch_add(1, Ordering::Relaxed);
                self.evaluate_composition(composition, binding, run)
            }
        }
    }

    fn evaluate_composition(
        &self,
        composition: &CompositionCohort,
        binding: &ParameterBinding,
        run: &Run<'_>,
    ) -> EvalResult<HashSet<PatientId>> {
        binding.validate(composition.parameters())?;

        let names = composition.required_searches();
        let context: EvaluationContext = self
            .evaluate_searches(composition, &names, binding, run)?
            .into_iter()
            .collect();

        run.checkpoint()?;

        let universe = match composition.universe() {
            Some(name) => Some(context.get(name)?),
            None => None,
        };
        let result = context.evaluate_within(composition.expression(), universe)?;

        log::trace!(
            "Composition '{}' [{}] -> {} patients",
            composition.name(),
            composition.expression(),
            result.len()
        );
        Ok(result)
    }

    /// Evaluates each named search once, in parallel when a pool is available.
    fn evaluate_searches(
        &self,
        composition: &CompositionCohort,
        names: &[&str],
        binding: &ParameterBinding,
        run: &Run<'_>,
    ) -> EvalResult<Vec<(String, HashSet<PatientId>)>> {
        #[cfg(feature = "parallel")]
        if let Some(pool) = self.pool.as_ref().filter(|_| names.len() > 1) {
            return pool.install(|| {
                names
                    .par_iter()
                    .map(|name| self.evaluate_search(composition, name, binding, run))
                    .collect()
            });
        }

        names
            .iter()
            .map(|name| self.evaluate_search(composition, name, binding, run))
            .collect()
    }

    fn evaluate_search(
        &self,
        composition: &CompositionCohort,
        name: &str,
        binding: &ParameterBinding,
        run: &Run<'_>,
    ) -> EvalResult<(String, HashSet<PatientId>)> {
        let search = composition
            .search(name)
            .ok_or_else(|| EvaluationError::UnresolvedReference(name.to_string()))?;
        let child_binding = binding.resolve(&search.mappings)?;

        log::trace!(
            "Search '{}' of '{}' -> '{}'",
            name,
            composition.name(),
            search.definition.name()
        );

        let patients = self.evaluate_definition(&search.definition, &child_binding, run)?;
        Ok((name.to_string(), patients))
    }
}

#[cfg(feature = "parallel")]
fn build_pool(config: &EvaluatorConfig) -> Option<rayon::ThreadPool> {
    if !config.parallel {
        return None;
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers.unwrap_or(0))
        .thread_name(|i| format!("cohort-eval-{}", i))
        .build();
    match pool {
        Ok(pool) => Some(pool),
        Err(e) => {
            log::warn!("Could not start evaluation worker pool ({}); evaluating sequentially", e);
            None
        }
    }
}
