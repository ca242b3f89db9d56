//! Cohort evaluation result types.

use std::collections::HashSet;
use std::time::Duration;

use cohort_expr::PatientId;

/// Result of a cohort evaluation.
///
/// Contains the member patient IDs and evaluation statistics.
///
/// # Example
///
/// ```ignore
/// let result = evaluator.evaluate(&children, &binding)?;
///
/// println!("{} children retained on ART", result.count());
///
/// for patient_id in result.to_vec() {
///     println!("Patient: {}", patient_id);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CohortResult {
    /// Set of member patient IDs.
    pub patient_ids: HashSet<PatientId>,
    /// Evaluation statistics.
    pub stats: EvaluationStats,
}

impl CohortResult {
    /// Creates a new CohortResult.
    pub fn new(patient_ids: HashSet<PatientId>, stats: EvaluationStats) -> Self {
        Self { patient_ids, stats }
    }

    /// Creates an empty CohortResult.
    pub fn empty() -> Self {
        Self {
            patient_ids: HashSet::new(),
            stats: EvaluationStats::default(),
        }
    }

    /// Returns the number of member patients.
    pub fn count(&self) -> usize {
        self.patient_ids.len()
    }

    /// Returns true if the cohort is empty.
    pub fn is_empty(&self) -> bool {
        self.patient_ids.is_empty()
    }

    /// Checks if a specific patient is a member.
    pub fn contains(&self, patient_id: PatientId) -> bool {
        self.patient_ids.contains(&patient_id)
    }

    /// Returns an iterator over member patient IDs.
    pub fn iter(&self) -> impl Iterator<Item = &PatientId> {
        self.patient_ids.iter()
    }

    /// Converts the result set to a sorted Vec.
    pub fn to_vec(&self) -> Vec<PatientId> {
        let mut vec: Vec<PatientId> = self.patient_ids.iter().copied().collect();
        vec.sort_unstable();
        vec
    }
}

impl IntoIterator for CohortResult {
    type Item = PatientId;
    type IntoIter = std::collections::hash_set::IntoIter<PatientId>;

    fn into_iter(self) -> Self::IntoIter {
        self.patient_ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a CohortResult {
    type Item = &'a PatientId;
    type IntoIter = std::collections::hash_set::Iter<'a, PatientId>;

    fn into_iter(self) -> Self::IntoIter {
        self.patient_ids.iter()
    }
}

/// Statistics from a cohort evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvaluationStats {
    /// Total evaluation duration.
    pub duration: Duration,
    /// Number of raw queries sent to the executor.
    pub queries_executed: usize,
    /// Number of compositions evaluated, including nested ones.
    pub compositions_evaluated: usize,
}

impl EvaluationStats {
    /// Creates new evaluation stats.
    pub fn new(duration: Duration, queries_executed: usize, compositions_evaluated: usize) -> Self {
        Self {
            duration,
            queries_executed,
            compositions_evaluated,
        }
    }
}
