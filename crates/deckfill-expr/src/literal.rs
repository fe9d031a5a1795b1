//! Literal values written inside expressions.
//!
//! Literals appear as call arguments (`format_name('short', 2)`) and as the
//! right-hand side of filter conditions (`users[is_active=true]`). They are
//! typed by the first rule that applies:
//!
//! 1. `true` / `false`, case-insensitive, become booleans
//! 2. integers become `Number::I64`
//! 3. other numbers become `Number::F64`
//! 4. text wrapped in matching single or double quotes loses the quotes
//! 5. anything else is kept as a raw string

use crate::value::Value;

/// Parses one literal.
///
/// # Example
///
/// ```
/// use deckfill_expr::{parse_literal, Value};
///
/// assert_eq!(parse_literal("True"), Value::from(true));
/// assert_eq!(parse_literal("42"), Value::from(42));
/// assert_eq!(parse_literal("'42'"), Value::from("42"));
/// assert_eq!(parse_literal("Alice"), Value::from("Alice"));
/// ```
pub fn parse_literal(text: &str) -> Value {
    let text = text.trim();

    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::from(f);
    }
    if let Some(inner) = strip_quotes(text) {
        return Value::from(inner);
    }
    Value::from(text)
}

/// Parses a comma-separated argument list. Empty input yields no arguments.
pub fn parse_args(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(text).into_iter().map(parse_literal).collect()
}

/// Removes one pair of matching surrounding quotes.
pub(crate) fn strip_quotes(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

/// Splits on commas that are not inside quotes.
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (None, '"') | (None, '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_ignore_case() {
        assert_eq!(parse_literal("TRUE"), Value::Bool(true));
        assert_eq!(parse_literal(" false "), Value::Bool(false));
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_literal("-7"), Value::from(-7));
        assert_eq!(parse_literal("2.5"), Value::from(2.5));
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(parse_literal("\"hello\""), Value::from("hello"));
        assert_eq!(parse_literal("'it'"), Value::from("it"));
        assert_eq!(parse_literal("'mismatched\""), Value::from("'mismatched\""));
    }

    #[test]
    fn args_respect_quotes() {
        let args = parse_args("'a, b', 3, yes");
        assert_eq!(
            args,
            vec![Value::from("a, b"), Value::from(3), Value::from("yes")]
        );
    }

    #[test]
    fn empty_args() {
        assert!(parse_args("").is_empty());
        assert!(parse_args("   ").is_empty());
    }
}
