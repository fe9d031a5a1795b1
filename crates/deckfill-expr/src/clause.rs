//! Equality conditions used by bracketed filters.
//!
//! A filter clause such as `users[is_active=true, role__name='admin']` is a
//! comma-separated list of [`Condition`]s. An element is kept only when every
//! condition matches it.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::literal::{parse_literal, split_top_level};
use crate::traits::Invocable;
use crate::value::Value;

static CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*(?:==|=)\s*(.+)$").expect("valid condition pattern"));

/// A single `key=value` equality condition.
///
/// The key may chain sub-keys with `__` (`owner__name=Bob`). The value is a
/// literal, typed as described in [`crate::literal`].
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Key path, possibly containing `__` separators.
    pub key: String,
    /// Coerced literal to compare against.
    pub expected: Value,
}

impl Condition {
    /// Creates a condition from an already typed value.
    pub fn new(key: impl Into<String>, expected: impl Into<Value>) -> Self {
        Condition {
            key: key.into(),
            expected: expected.into(),
        }
    }

    /// Parses `key=value` or `key==value`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = CONDITION.captures(text.trim())?;
        Some(Condition {
            key: caps[1].to_string(),
            expected: parse_literal(&caps[2]),
        })
    }

    /// Evaluates this condition against one collection element.
    ///
    /// An element on which the key path does not resolve never matches.
    pub fn matches(&self, item: &Value) -> bool {
        match field_value(item, &self.key) {
            Some(actual) => actual.loose_eq(&self.expected),
            None => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.expected)
    }
}

/// Parses the inside of a `[...]` filter clause.
///
/// Returns the offending condition text on failure.
pub fn parse_conditions(filter: &str) -> Result<Vec<Condition>, String> {
    split_top_level(filter)
        .into_iter()
        .map(|part| Condition::parse(part).ok_or_else(|| part.to_string()))
        .collect()
}

/// Returns `true` if `item` satisfies every condition.
pub fn matches_all(item: &Value, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| c.matches(item))
}

fn field_value(item: &Value, key: &str) -> Option<Value> {
    let mut current = item.clone();
    for part in key.split("__") {
        current = current.as_keyed()?.lookup(part)?;
        if let Value::Callable(f) = &current {
            current = f.invoke(&[]).ok()?;
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, active: bool, age: i64) -> Value {
        Value::map([
            ("name", Value::from(name)),
            ("is_active", Value::from(active)),
            ("age", Value::from(age)),
        ])
    }

    #[test]
    fn parse_single_and_double_equals() {
        assert_eq!(
            Condition::parse("is_active=True"),
            Some(Condition::new("is_active", true))
        );
        assert_eq!(Condition::parse("age == 30"), Some(Condition::new("age", 30)));
        assert_eq!(Condition::parse("no operator"), None);
    }

    #[test]
    fn matches_coerced_literal() {
        let alice = user("Alice", true, 30);
        assert!(Condition::parse("is_active=true").unwrap().matches(&alice));
        assert!(Condition::parse("age=30.0").unwrap().matches(&alice));
        assert!(Condition::parse("name='Alice'").unwrap().matches(&alice));
        assert!(!Condition::parse("name=Bob").unwrap().matches(&alice));
    }

    #[test]
    fn missing_key_never_matches() {
        assert!(!Condition::parse("email=x").unwrap().matches(&user("A", true, 1)));
        assert!(!Condition::parse("name=A").unwrap().matches(&Value::from("A")));
    }

    #[test]
    fn chained_key() {
        let item = Value::map([("owner", Value::map([("name", "Bob")]))]);
        assert!(Condition::parse("owner__name=Bob").unwrap().matches(&item));
    }

    #[test]
    fn parse_conditions_reports_bad_part() {
        assert_eq!(parse_conditions("a=1, b=2").unwrap().len(), 2);
        assert_eq!(parse_conditions("a=1, oops").unwrap_err(), "oops");
    }
}
