//! Configuration types for the cohort evaluator.

use std::time::Duration;

/// Configuration for the cohort evaluator.
///
/// # Example
///
/// ```rust
/// use cohort_eval::EvaluatorConfig;
/// use std::time::Duration;
///
/// let config = EvaluatorConfig::builder()
///     .with_parallel(true)
///     .with_max_workers(4)
///     .with_timeout(Duration::from_secs(120))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    /// Evaluate independent searches in parallel (requires `parallel` feature).
    pub parallel: bool,
    /// Upper bound on worker threads for parallel evaluation (None = one per core).
    pub max_workers: Option<usize>,
    /// Evaluation timeout (None = no timeout).
    pub timeout: Option<Duration>,
}

impl EvaluatorConfig {
    /// Creates a new builder for EvaluatorConfig.
    pub fn builder() -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::default()
    }
}

/// Builder for EvaluatorConfig.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfigBuilder {
    parallel: bool,
    max_workers: Option<usize>,
    timeout: Option<Duration>,
}

impl EvaluatorConfigBuilder {
    /// Enables or disables parallel evaluation of independent searches.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Bounds the number of worker threads. Zero is treated as unbounded.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = (max_workers > 0).then_some(max_workers);
        self
    }

    /// Sets the evaluation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the EvaluatorConfig.
    pub fn build(self) -> EvaluatorConfig {
        EvaluatorConfig {
            parallel: self.parallel,
            max_workers: self.max_workers,
            timeout: self.timeout,
        }
    }
}
