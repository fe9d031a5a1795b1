//! Date format specifiers.
//!
//! Placeholders may carry a format after a pipe, `{{ now | MMMM dd, YYYY }}`.
//! The specifier uses document-style tokens which are translated to
//! strftime before being applied:
//!
//! | Token | Meaning | strftime |
//! |-------|---------|----------|
//! | `MMMM` | full month name | `%B` |
//! | `MMM` | abbreviated month name | `%b` |
//! | `MM` | month number | `%m` |
//! | `YYYY` | four-digit year | `%Y` |
//! | `YY` | two-digit year | `%y` |
//! | `DD` | full weekday name | `%A` |
//! | `ddd` | abbreviated weekday name | `%a` |
//! | `dd` | day of month | `%d` |
//! | `HH` | hour (24h) | `%H` |
//! | `hh` | hour (12h) | `%I` |
//! | `mm` | minute | `%M` |
//! | `ss` | second | `%S` |
//!
//! Any other text is copied literally.

use deckfill_expr::{FormatError, Value};

/// Longest tokens first so `MMMM` never reads as `MM` twice.
const TOKENS: &[(&str, &str)] = &[
    ("MMMM", "%B"),
    ("YYYY", "%Y"),
    ("MMM", "%b"),
    ("ddd", "%a"),
    ("MM", "%m"),
    ("YY", "%y"),
    ("DD", "%A"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Translates a document-style format specifier to strftime.
///
/// ```
/// use deckfill_render::convert_format;
///
/// assert_eq!(convert_format("MMMM dd, YYYY"), "%B %d, %Y");
/// assert_eq!(convert_format("HH:mm 100%"), "%H:%M 100%%");
/// ```
pub fn convert_format(spec: &str) -> String {
    let mut out = String::with_capacity(spec.len() * 2);
    let mut rest = spec;

    'scan: while let Some(ch) = rest.chars().next() {
        for (token, strftime) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(strftime);
                rest = tail;
                continue 'scan;
            }
        }
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Applies `spec` to a value.
///
/// Date-formattable values become strings; lists are formatted element by
/// element; every other value is returned unchanged.
pub fn apply_format(value: &Value, spec: &str) -> Result<Value, FormatError> {
    let pattern = convert_format(spec);
    format_with(value, &pattern)
}

fn format_with(value: &Value, pattern: &str) -> Result<Value, FormatError> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| format_with(item, pattern))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => match other.as_date() {
            Some(date) => date.format_date(pattern).map(Value::String),
            None => Ok(other.clone()),
        },
    }
}
