//! Evaluation plans for cohort definitions.
//!
//! A plan lists, without executing anything, every raw query and
//! composition an evaluation would visit, children before parents.

use std::fmt;

use crate::definition::CohortDefinition;

/// Kind of work a plan step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// A raw query sent to the executor.
    Query,
    /// A composition combining already computed searches.
    Composition,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Query => write!(f, "Query"),
            StepKind::Composition => write!(f, "Compose"),
        }
    }
}

/// A single step in the evaluation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Kind of step.
    pub kind: StepKind,
    /// Search path from the root, e.g. `children/pregnant/all`. Empty for the root.
    pub path: String,
    /// Definition name.
    pub name: String,
    /// Nesting depth (root = 0).
    pub depth: usize,
    /// Query spec or composition string.
    pub detail: String,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { self.path.as_str() };
        write!(f, "{}{} {}: {}", "  ".repeat(self.depth), self.kind, path, self.detail)
    }
}

/// A complete evaluation plan for a cohort definition.
///
/// # Example
///
/// ```ignore
/// let plan = evaluator.explain(&children);
///
/// println!("{} raw queries", plan.query_count());
/// for step in &plan.steps {
///     println!("{}", step);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    /// Name of the planned definition.
    pub cohort: String,
    /// Steps in evaluation order.
    pub steps: Vec<PlanStep>,
}

impl EvaluationPlan {
    /// Plans the evaluation of `definition`.
    pub fn for_definition(definition: &CohortDefinition) -> Self {
        let mut plan = Self {
            cohort: definition.name().to_string(),
            steps: Vec::new(),
        };
        plan.visit(definition, String::new(), 0);
        plan
    }

    fn visit(&mut self, definition: &CohortDefinition, path: String, depth: usize) {
        match definition {
            CohortDefinition::Query(query) => self.steps.push(PlanStep {
                kind: StepKind::Query,
                path,
                name: query.name().to_string(),
                depth,
                detail: query.query().to_string(),
            }),
            CohortDefinition::Composition(composition) => {
                for name in composition.required_searches() {
                    if let Some(search) = composition.search(name) {
                        let child_path = if path.is_empty() {
                            name.to_string()
                        } else {
                            format!("{}/{}", path, name)
                        };
                        self.visit(&search.definition, child_path, depth + 1);
                    }
                }
                self.steps.push(PlanStep {
                    kind: StepKind::Composition,
                    path,
                    name: composition.name().to_string(),
                    depth,
                    detail: composition.expression().to_string(),
                });
            }
        }
    }

    /// Number of raw queries the evaluation will send.
    pub fn query_count(&self) -> usize {
        self.steps.iter().filter(|s| s.kind == StepKind::Query).count()
    }

    /// Number of compositions the evaluation will combine.
    pub fn composition_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Composition)
            .count()
    }
}

impl fmt::Display for EvaluationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation Plan for: {}", self.cohort)?;
        writeln!(
            f,
            "{} queries, {} compositions",
            self.query_count(),
            self.composition_count()
        )?;
        writeln!(f)?;
        writeln!(f, "Steps:")?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        Ok(())
    }
}
