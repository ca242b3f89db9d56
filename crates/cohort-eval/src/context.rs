//! Per-evaluation memo of named results and set-algebra over them.

use std::collections::{HashMap, HashSet};

use cohort_expr::{CompositionExpression, PatientId};

use crate::error::{EvalResult, EvaluationError};

/// Results of the named searches of one composition, computed once each.
///
/// A context lives for a single composition evaluation and is dropped
/// afterwards. Nested compositions build their own.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    results: HashMap<String, HashSet<PatientId>>,
}

impl EvaluationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of a named search.
    pub fn insert(&mut self, name: impl Into<String>, patients: HashSet<PatientId>) {
        self.results.insert(name.into(), patients);
    }

    /// Returns the result of a named search.
    pub fn get(&self, name: &str) -> EvalResult<&HashSet<PatientId>> {
        self.results
            .get(name)
            .ok_or_else(|| EvaluationError::UnresolvedReference(name.to_string()))
    }

    /// Returns true if `name` has a result.
    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    /// Returns the number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Evaluates an expression with no enclosing population.
    pub fn evaluate(&self, expression: &CompositionExpression) -> EvalResult<HashSet<PatientId>> {
        self.evaluate_within(expression, None)
    }

    /// Evaluates an expression; `universe` is the population `NOT` complements
    /// against when no enclosing `AND` provides one.
    ///
    /// Inside an `AND`, children that can be evaluated on their own are
    /// intersected first; that intersection is the population for the
    /// remaining children.
    pub fn evaluate_within(
        &self,
        expression: &CompositionExpression,
        universe: Option<&HashSet<PatientId>>,
    ) -> EvalResult<HashSet<PatientId>> {
        match expression {
            CompositionExpression::Leaf(name) => Ok(self.get(name)?.clone()),

            CompositionExpression::Or(children) => {
                if children.is_empty() {
                    return Err(EvaluationError::EmptyComposition);
                }
                let mut union = HashSet::new();
                for child in children {
                    union.extend(self.evaluate_within(child, universe)?);
                }
                Ok(union)
            }

            CompositionExpression::Not(inner) => {
                let universe = universe.ok_or(EvaluationError::UndefinedUniverse)?;
                let excluded = self.evaluate_within(inner, Some(universe))?;
                Ok(universe.difference(&excluded).copied().collect())
            }

            CompositionExpression::And(children) => {
                if children.is_empty() {
                    return Err(EvaluationError::EmptyComposition);
                }
                let (dependent, independent): (Vec<_>, Vec<_>) =
                    children.iter().partition(|child| child.needs_universe());

                let mut base: Option<HashSet<PatientId>> = None;
                for child in independent {
                    let result = self.evaluate_within(child, universe)?;
                    base = Some(match base {
                        Some(acc) => intersect(acc, &result),
                        None => result,
                    });
                }

                let mut dependent_results = Vec::with_capacity(dependent.len());
                {
                    let population = base.as_ref().or(universe);
                    for child in dependent {
                        dependent_results.push(self.evaluate_within(child, population)?);
                    }
                }

                let mut results = dependent_results.into_iter();
                let mut acc = match base {
                    Some(base) => base,
                    // All children needed a population; partition is never empty here.
                    None => results.next().unwrap_or_default(),
                };
                for result in results {
                    acc = intersect(acc, &result);
                }
                Ok(acc)
            }
        }
    }
}

fn intersect(mut acc: HashSet<PatientId>, other: &HashSet<PatientId>) -> HashSet<PatientId> {
    acc.retain(|id| other.contains(id));
    acc
}

impl FromIterator<(String, HashSet<PatientId>)> for EvaluationContext {
    fn from_iter<T: IntoIterator<Item = (String, HashSet<PatientId>)>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}
