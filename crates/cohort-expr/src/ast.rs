//! Abstract Syntax Tree types for composition expressions.

use std::collections::BTreeSet;
use std::fmt;

/// A boolean set expression over named search results.
///
/// Trees are built once per cohort definition and never mutated.
/// `And` and `Or` are n-ary; the parser flattens chains of the same
/// operator into a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompositionExpression {
    /// Reference to a named search: `all`
    Leaf(String),
    /// Intersection of all children: `A AND B AND C`
    And(Vec<CompositionExpression>),
    /// Union of all children: `A OR B OR C`
    Or(Vec<CompositionExpression>),
    /// Complement relative to the enclosing population: `NOT A`
    Not(Box<CompositionExpression>),
}

impl CompositionExpression {
    /// Creates a reference to a named search.
    pub fn leaf(name: impl Into<String>) -> Self {
        CompositionExpression::Leaf(name.into())
    }

    /// Creates an intersection node.
    pub fn and(children: impl IntoIterator<Item = CompositionExpression>) -> Self {
        CompositionExpression::And(children.into_iter().collect())
    }

    /// Creates a union node.
    pub fn or(children: impl IntoIterator<Item = CompositionExpression>) -> Self {
        CompositionExpression::Or(children.into_iter().collect())
    }

    /// Creates a complement node.
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: CompositionExpression) -> Self {
        CompositionExpression::Not(Box::new(inner))
    }

    /// Returns every search name referenced by a leaf, sorted and deduplicated.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            CompositionExpression::Leaf(name) => {
                names.insert(name.as_str());
            }
            CompositionExpression::And(children) | CompositionExpression::Or(children) => {
                for child in children {
                    child.collect_references(names);
                }
            }
            CompositionExpression::Not(inner) => inner.collect_references(names),
        }
    }

    /// Returns true if evaluating this node requires a population supplied
    /// from outside.
    ///
    /// A `Not` always needs one. An `And` supplies its own population to its
    /// `Not` children as long as at least one child is self-contained.
    pub fn needs_universe(&self) -> bool {
        match self {
            CompositionExpression::Leaf(_) => false,
            CompositionExpression::Not(_) => true,
            CompositionExpression::Or(children) => children.iter().any(|c| c.needs_universe()),
            CompositionExpression::And(children) => {
                !children.is_empty() && children.iter().all(|c| c.needs_universe())
            }
        }
    }

    /// Returns true if this is a compound (`And`/`Or`) node.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            CompositionExpression::And(_) | CompositionExpression::Or(_)
        )
    }
}

fn write_operands(
    f: &mut fmt::Formatter<'_>,
    children: &[CompositionExpression],
    operator: &str,
) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", operator)?;
        }
        if child.is_compound() {
            write!(f, "({})", child)?;
        } else {
            write!(f, "{}", child)?;
        }
    }
    Ok(())
}

impl fmt::Display for CompositionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionExpression::Leaf(name) => write!(f, "{}", name),
            CompositionExpression::And(children) => write_operands(f, children, "AND"),
            CompositionExpression::Or(children) => write_operands(f, children, "OR"),
            CompositionExpression::Not(inner) if inner.is_compound() => {
                write!(f, "NOT({})", inner)
            }
            CompositionExpression::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}
