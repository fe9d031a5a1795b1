//! Placeholder substitution in text spans.
//!
//! A placeholder is `{{ expression }}` or `{{ expression | format }}`. A
//! span is *pure* when, trimmed, it is exactly one placeholder; otherwise
//! it is *mixed* text. How a span renders depends on its [`Mode`]:
//!
//! | Span | `Inline` | `Broadcast` |
//! |------|----------|-------------|
//! | pure, scalar | string form | string form |
//! | pure, list | joined with the delimiter | one string per element |
//! | mixed, scalar | substituted in place | substituted in place |
//! | mixed, list | joined, then substituted | one copy of the text per element |
//!
//! Broadcast mixed text may contain only one placeholder.
//!
//! Each placeholder is resolved with the permission check applied to every
//! segment, then formatted.
//! A failure in any of those steps is recorded in the returned [`Outcome`]
//! and the placeholder renders as an empty string; the other placeholders
//! of the span are still processed.

use std::fmt;

use deckfill_expr::{Context, ResolveOptions, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Outcome, RenderError};
use crate::format::apply_format;
use crate::permissions::{resolve_permitted, DenyPolicy, PermissionCheck};

pub const OPEN: &str = "{{";
pub const CLOSE: &str = "}}";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid placeholder pattern"));

/// How a span's placeholders combine into output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single string output, lists joined.
    #[default]
    Inline,
    /// Lists expand into one output string per element.
    Broadcast,
}

/// Rendered span content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOutput {
    Text(String),
    List(Vec<String>),
}

impl TextOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TextOutput::Text(s) => Some(s),
            TextOutput::List(_) => None,
        }
    }

    /// All output strings; a single text is one string.
    pub fn into_strings(self) -> Vec<String> {
        match self {
            TextOutput::Text(s) => vec![s],
            TextOutput::List(items) => items,
        }
    }
}

impl fmt::Display for TextOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextOutput::Text(s) => f.write_str(s),
            TextOutput::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Options for [`process_text`].
#[derive(Debug, Clone)]
pub struct TextOptions {
    pub mode: Mode,
    /// Separator used when a list is joined into one string.
    pub delimiter: String,
    /// In inline mode, return a pure placeholder's list as
    /// [`TextOutput::List`] instead of joining it.
    pub keep_lists: bool,
    /// What a rejected value does to its placeholder.
    pub policy: DenyPolicy,
    pub resolve: ResolveOptions,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Inline,
            delimiter: ", ".to_string(),
            keep_lists: false,
            policy: DenyPolicy::Raise,
            resolve: ResolveOptions::default(),
        }
    }
}

impl TextOptions {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_policy(mut self, policy: DenyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolve(mut self, resolve: ResolveOptions) -> Self {
        self.resolve = resolve;
        self
    }

    pub fn keeping_lists(mut self) -> Self {
        self.keep_lists = true;
        self
    }
}

/// One `{{ ... }}` occurrence in a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'t> {
    /// The full match including delimiters.
    pub raw: &'t str,
    /// Byte range of `raw` within the span.
    pub start: usize,
    pub end: usize,
    /// The expression, trimmed.
    pub expression: &'t str,
    /// The format specifier after `|`, trimmed; `None` when absent or empty.
    pub format: Option<&'t str>,
}

/// Finds every placeholder in `text`, left to right.
pub fn find_placeholders(text: &str) -> Vec<Placeholder<'_>> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?.as_str();
            let (expression, format) = match inner.split_once('|') {
                Some((expr, spec)) => {
                    let spec = unquote(spec.trim());
                    (expr.trim(), Some(spec).filter(|s| !s.is_empty()))
                }
                None => (inner.trim(), None),
            };
            Some(Placeholder {
                raw: whole.as_str(),
                start: whole.start(),
                end: whole.end(),
                expression,
                format,
            })
        })
        .collect()
}

/// Strips one pair of matching `"` or `'` around a format specifier.
fn unquote(spec: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| spec.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(spec)
}

pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Returns `true` if the trimmed text is exactly one placeholder.
pub fn is_pure(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with(OPEN)
        && trimmed.ends_with(CLOSE)
        && trimmed.matches(OPEN).count() == 1
        && trimmed.matches(CLOSE).count() == 1
}

/// Substitutes the placeholders of one text span.
///
/// Returns `Err` only for usage errors that make the whole span
/// meaningless, currently broadcast mixed text with more than one
/// placeholder. Per-placeholder failures are recorded in the outcome.
///
/// # Example
///
/// ```
/// use deckfill_expr::{Context, Value};
/// use deckfill_render::{process_text, Mode, TextOptions, TextOutput};
///
/// let ctx = Context::from_iter([("names", Value::list(["ann", "bo"]))]);
///
/// let inline = process_text("Team: {{ names }}", &ctx, None, &TextOptions::default()).unwrap();
/// assert_eq!(inline.output, TextOutput::Text("Team: ann, bo".into()));
///
/// let options = TextOptions::default().with_mode(Mode::Broadcast);
/// let rows = process_text("- {{ names }}", &ctx, None, &options).unwrap();
/// assert_eq!(rows.output, TextOutput::List(vec!["- ann".into(), "- bo".into()]));
/// ```
pub fn process_text(
    text: &str,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    options: &TextOptions,
) -> Result<Outcome<TextOutput>, RenderError> {
    let placeholders = find_placeholders(text);
    if placeholders.is_empty() {
        return Ok(Outcome::new(TextOutput::Text(text.to_string())));
    }

    let mut outcome = Outcome::new(TextOutput::Text(String::new()));

    if is_pure(text) {
        let value = evaluate(&placeholders[0], ctx, predicate, options, &mut outcome);
        outcome.output = match (options.mode, value) {
            (Mode::Broadcast, Value::List(items)) => {
                TextOutput::List(items.iter().map(Value::to_string).collect())
            }
            (Mode::Inline, Value::List(items)) if options.keep_lists => {
                TextOutput::List(items.iter().map(Value::to_string).collect())
            }
            (_, value) => TextOutput::Text(join(&value, &options.delimiter)),
        };
        return Ok(outcome);
    }

    match options.mode {
        Mode::Broadcast => {
            if placeholders.len() != 1 {
                return Err(RenderError::Usage(format!(
                    "broadcast text may contain only one placeholder, found {} in '{}'",
                    placeholders.len(),
                    text
                )));
            }
            let placeholder = &placeholders[0];
            let value = evaluate(placeholder, ctx, predicate, options, &mut outcome);
            outcome.output = match value {
                Value::List(items) => TextOutput::List(
                    items
                        .iter()
                        .map(|item| splice(text, placeholder, &item.to_string()))
                        .collect(),
                ),
                other => TextOutput::Text(splice(text, placeholder, &other.to_string())),
            };
        }
        Mode::Inline => {
            let mut rendered = String::with_capacity(text.len());
            let mut last = 0;
            for placeholder in &placeholders {
                let value = evaluate(placeholder, ctx, predicate, options, &mut outcome);
                rendered.push_str(&text[last..placeholder.start]);
                rendered.push_str(&join(&value, &options.delimiter));
                last = placeholder.end;
            }
            rendered.push_str(&text[last..]);
            outcome.output = TextOutput::Text(rendered);
        }
    }

    Ok(outcome)
}

/// Resolves, enforces and formats one placeholder. Failures are recorded and yield `None`.
fn evaluate(
    placeholder: &Placeholder<'_>,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    options: &TextOptions,
    outcome: &mut Outcome<TextOutput>,
) -> Value {
    let resolved = match resolve_permitted(
        placeholder.expression,
        ctx,
        predicate,
        options.policy,
        &options.resolve,
    ) {
        Ok(permitted) => outcome.absorb(permitted),
        Err(err) => {
            outcome.record(err);
            return Value::None;
        }
    };
    let value = resolved.value;

    let Some(spec) = placeholder.format else {
        return value;
    };
    match apply_format(&value, spec) {
        Ok(formatted) => formatted,
        Err(err) => {
            outcome.record(RenderError::Format {
                expr: resolved.expression,
                reason: err.0,
            });
            Value::None
        }
    }
}

fn join(value: &Value, delimiter: &str) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .filter(|item| !item.is_none())
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(delimiter),
        other => other.to_string(),
    }
}

fn splice(text: &str, placeholder: &Placeholder<'_>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..placeholder.start]);
    out.push_str(replacement);
    out.push_str(&text[placeholder.end..]);
    out
}
