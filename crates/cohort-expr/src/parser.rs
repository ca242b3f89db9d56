//! Composition string parser implementation using nom.
//!
//! Grammar:
//!
//! ```text
//! expression := unary ( (AND | OR) unary )*
//! unary      := NOT unary | primary
//! primary    := NAME | "(" expression ")"
//! NAME       := [A-Za-z_][A-Za-z0-9_]*   (not a keyword)
//! ```
//!
//! `AND` and `OR` have equal precedence and associate left to right.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, recognize, value, verify},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::ast::CompositionExpression;
use crate::error::{ExprError, ExprResult};

const KEYWORDS: [&str; 3] = ["AND", "OR", "NOT"];

/// Parse a composition string.
///
/// # Arguments
/// * `input` - The composition string to parse
///
/// # Returns
/// The parsed composition expression or an error
///
/// # Examples
///
/// ```rust
/// use cohort_expr::parse;
///
/// // Single search
/// let expr = parse("all").unwrap();
///
/// // Intersection
/// let expr = parse("all AND pregnant").unwrap();
///
/// // Exclusion of a union
/// let expr = parse("all AND children AND NOT(pregnant OR breastfeeding)").unwrap();
/// ```
pub fn parse(input: &str) -> ExprResult<CompositionExpression> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExprError::EmptyExpression);
    }

    match all_consuming(delimited(ws, expression, ws))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            let message = if e.input.is_empty() {
                "unexpected end of input".to_string()
            } else {
                format!("unexpected input at: '{}'", truncate(e.input, 20))
            };
            Err(ExprError::ParseError { position, message })
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprError::ParseError {
            position: input.len(),
            message: "unexpected end of input".to_string(),
        }),
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Compound expressions
// ============================================================================

fn expression(input: &str) -> IResult<&str, CompositionExpression> {
    let (input, first) = unary(input)?;
    compound_tail(input, first)
}

fn compound_tail(input: &str, left: CompositionExpression) -> IResult<&str, CompositionExpression> {
    match preceded(ws, binary_operator)(input) {
        Ok((remaining, op)) => {
            let (remaining, right) = preceded(ws, unary)(remaining)?;
            // Left associative
            compound_tail(remaining, combine(op, left, right))
        }
        Err(nom::Err::Error(_)) => Ok((input, left)),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    And,
    Or,
}

fn binary_operator(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::And, keyword("AND")),
        value(BinaryOp::Or, keyword("OR")),
    ))(input)
}

/// Joins two operands, flattening chains of the same operator.
fn combine(
    op: BinaryOp,
    left: CompositionExpression,
    right: CompositionExpression,
) -> CompositionExpression {
    let mut operands = Vec::new();
    for side in [left, right] {
        match (op, side) {
            (BinaryOp::And, CompositionExpression::And(children))
            | (BinaryOp::Or, CompositionExpression::Or(children)) => operands.extend(children),
            (_, other) => operands.push(other),
        }
    }
    match op {
        BinaryOp::And => CompositionExpression::And(operands),
        BinaryOp::Or => CompositionExpression::Or(operands),
    }
}

// ============================================================================
// Unary and primary expressions
// ============================================================================

fn unary(input: &str) -> IResult<&str, CompositionExpression> {
    alt((
        map(preceded(pair(keyword("NOT"), ws), unary), CompositionExpression::not),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, CompositionExpression> {
    alt((
        delimited(pair(char('('), ws), expression, pair(ws, char(')'))),
        map(search_name, CompositionExpression::leaf),
    ))(input)
}

// ============================================================================
// Lexical elements
// ============================================================================

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Identifier: letters, digits and underscores, not starting with a digit.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char)))(input)
}

fn search_name(input: &str) -> IResult<&str, &str> {
    verify(identifier, |name: &str| {
        !KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(name))
    })(input)
}

/// Case-insensitive keyword that must not run into a following name character.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_name_char)))
}

/// Optional whitespace
pub(crate) fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}
