//! Expression and segment parsing.
//!
//! An expression is the text between placeholder delimiters, with any
//! `| format` suffix already removed. It is split on dots into segments,
//! each following the grammar:
//!
//! ```text
//! segment := name ( "(" args ")" )? ( "[" conditions "]" )?
//! name    := word ( "__" word )*
//! ```
//!
//! Dots inside brackets, parentheses or quotes do not split, so
//! `program.users[email='a@b.com'].name` has three segments.
//!
//! Parsing validates the whole expression before anything is looked up: a
//! malformed expression never causes a partial resolution.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::clause::{parse_conditions, Condition};
use crate::error::{ExprError, Result};
use crate::literal::parse_args;
use crate::value::Value;

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+(?:__\w+)*)(?:\((.*?)\))?(?:\[(.*)\])?$").expect("valid segment pattern")
});

/// Punctuation allowed in raw segment text, besides alphanumerics, `_` and whitespace.
const ALLOWED_PUNCTUATION: &[char] = &[
    ',', '=', '(', ')', '[', ']', '\'', '"', '-', '+', '.', '@', ':', '/',
];

/// One dot-separated component of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// The segment text as written.
    pub raw: String,
    /// Attribute name, possibly chaining sub-keys with `__`.
    pub name: String,
    /// Arguments of an explicit call, `Some(vec![])` for `name()`.
    pub call_args: Option<Vec<Value>>,
    /// Equality conditions of a `[...]` filter.
    pub filter: Option<Vec<Condition>>,
}

impl Segment {
    /// Parses and validates one segment of `expr`.
    pub fn parse(raw: &str, expr: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ExprError::bad(expr, "empty segment"));
        }
        if let Some(ch) = raw.chars().find(|c| !is_allowed(*c)) {
            return Err(ExprError::bad(
                expr,
                format!("disallowed character '{}' in segment '{}'", ch, raw),
            ));
        }
        if raw.matches('(').count() != raw.matches(')').count() {
            return Err(ExprError::bad(
                expr,
                format!("unmatched round brackets in segment '{}'", raw),
            ));
        }
        if raw.matches('[').count() != raw.matches(']').count() {
            return Err(ExprError::bad(
                expr,
                format!("unmatched square brackets in segment '{}'", raw),
            ));
        }

        let caps = SEGMENT
            .captures(raw)
            .ok_or_else(|| ExprError::bad(expr, format!("segment '{}' is malformed", raw)))?;

        let filter = match caps.get(3) {
            Some(m) => Some(parse_conditions(m.as_str()).map_err(|part| {
                ExprError::bad(
                    expr,
                    format!("malformed condition '{}' in segment '{}'", part, raw),
                )
            })?),
            None => None,
        };

        Ok(Segment {
            raw: raw.to_string(),
            name: caps[1].to_string(),
            call_args: caps.get(2).map(|m| parse_args(m.as_str())),
            filter,
        })
    }

    /// The `__`-separated keys of the name, left to right.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.name.split("__")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A parsed placeholder expression.
///
/// Two expressions are equal when their source strings are equal.
///
/// # Example
///
/// ```
/// use deckfill_expr::Expression;
///
/// let expr = Expression::parse("program.users[is_active=True].email").unwrap();
/// let names: Vec<_> = expr.segments().iter().map(|s| s.name.as_str()).collect();
/// assert_eq!(names, ["program", "users", "email"]);
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    segments: Vec<Segment>,
}

impl Expression {
    /// Parses an expression, validating every segment.
    pub fn parse(text: &str) -> Result<Self> {
        let source = text.trim();

        if source.contains('{') || source.contains('}') {
            return Err(ExprError::bad(source, "unexpected curly brace"));
        }

        if source.is_empty() {
            return Ok(Expression {
                source: String::new(),
                segments: Vec::new(),
            });
        }

        let segments = split_expression(source)
            .into_iter()
            .map(|raw| Segment::parse(raw, source))
            .collect::<Result<Vec<_>>>()?;

        Ok(Expression {
            source: source.to_string(),
            segments,
        })
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` for an expression with no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Expression {}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Splits an expression on dots that are outside brackets, parentheses and quotes.
///
/// ```
/// use deckfill_expr::split_expression;
///
/// assert_eq!(
///     split_expression("program.users[is_active=True].email"),
///     ["program", "users[is_active=True]", "email"],
/// );
/// ```
pub fn split_expression(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in expr.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(ch),
            (None, '[') | (None, '(') => depth += 1,
            (None, ']') | (None, ')') => depth = depth.saturating_sub(1),
            (None, '.') if depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

fn is_allowed(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() || ALLOWED_PUNCTUATION.contains(&ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind_of(text: &str) -> ErrorKind {
        Expression::parse(text).unwrap_err().kind()
    }

    #[test]
    fn split_keeps_dots_inside_filters() {
        assert_eq!(
            split_expression("a.users[email='x@y.com'].name"),
            ["a", "users[email='x@y.com']", "name"]
        );
    }

    #[test]
    fn split_keeps_dots_inside_arguments() {
        assert_eq!(split_expression("price.round(2.5).x"), ["price", "round(2.5)", "x"]);
    }

    #[test]
    fn segment_with_args_and_filter() {
        let seg = Segment::parse("items(1, 'x')[active=true]", "e").unwrap();
        assert_eq!(seg.name, "items");
        assert_eq!(
            seg.call_args,
            Some(vec![Value::from(1), Value::from("x")])
        );
        assert_eq!(seg.filter, Some(vec![Condition::new("active", true)]));
    }

    #[test]
    fn empty_call_is_explicit() {
        let seg = Segment::parse("count()", "e").unwrap();
        assert_eq!(seg.call_args, Some(vec![]));
        assert_eq!(Segment::parse("count", "e").unwrap().call_args, None);
    }

    #[test]
    fn chained_name_keys() {
        let seg = Segment::parse("nested__key", "e").unwrap();
        assert_eq!(seg.keys().collect::<Vec<_>>(), ["nested", "key"]);
    }

    #[test]
    fn rejects_curly_braces() {
        assert_eq!(kind_of("dummy.{name}"), ErrorKind::BadExpression);
        assert_eq!(kind_of("dummy}"), ErrorKind::BadExpression);
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        assert_eq!(kind_of("users[is_active=true"), ErrorKind::BadExpression);
        assert_eq!(kind_of("fn(1"), ErrorKind::BadExpression);
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert_eq!(kind_of("user;drop"), ErrorKind::BadExpression);
        assert_eq!(kind_of("%%"), ErrorKind::BadExpression);
        assert_eq!(kind_of("a.#"), ErrorKind::BadExpression);
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!(kind_of("a..b"), ErrorKind::BadExpression);
        assert_eq!(kind_of("a."), ErrorKind::BadExpression);
    }

    #[test]
    fn rejects_malformed_conditions() {
        assert_eq!(kind_of("users[active]"), ErrorKind::BadExpression);
    }

    #[test]
    fn empty_expression_has_no_segments() {
        assert!(Expression::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn equality_is_by_source() {
        assert_eq!(
            Expression::parse("a.b").unwrap(),
            Expression::parse(" a.b ").unwrap()
        );
    }
}
