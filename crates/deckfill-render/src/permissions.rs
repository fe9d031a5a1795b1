//! Permission enforcement on resolved values.
//!
//! Enforcement is opt-in per call: with no predicate, values pass through
//! unchanged. The predicate is asked about every scalar, and about every
//! element of a list. It should return `true` for values that carry no
//! authorization (plain strings, numbers) so only entity types are gated.
//!
//! [`resolve_permitted`] applies the predicate after every segment of an
//! expression, so fields of a rejected object are never read.

use deckfill_expr::{resolve_gated, Context, ResolveOptions, Resolved, SegmentGate, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Outcome, RenderError};

/// Caller-supplied authorization predicate.
pub type PermissionCheck = dyn Fn(&Value) -> bool;

/// What happens when the predicate rejects a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenyPolicy {
    /// Fail the whole value.
    #[default]
    Raise,
    /// Keep what is permitted and record one error.
    Record,
}

/// Gates `value` through `predicate`.
///
/// - Scalar rejected: `Raise` returns [`RenderError::PermissionDenied`];
///   `Record` yields `Value::None` plus that error.
/// - List with rejected elements: `Raise` returns the error; `Record`
///   yields the permitted elements in their original order plus exactly
///   one error naming the full original list.
///
/// `Value::None` is never passed to the predicate.
///
/// # Example
///
/// ```
/// use deckfill_expr::Value;
/// use deckfill_render::{enforce, DenyPolicy};
///
/// let only_short = |v: &Value| v.to_string().len() < 4;
/// let value = Value::list(["ann", "robert", "bo"]);
///
/// let outcome = enforce(value, "team.names", Some(&only_short), DenyPolicy::Record).unwrap();
/// assert_eq!(outcome.output, Value::list(["ann", "bo"]));
/// assert_eq!(outcome.errors.len(), 1);
/// ```
pub fn enforce(
    value: Value,
    expr: &str,
    predicate: Option<&PermissionCheck>,
    policy: DenyPolicy,
) -> Result<Outcome<Value>, RenderError> {
    let Some(allowed) = predicate else {
        return Ok(Outcome::new(value));
    };

    match value {
        Value::None => Ok(Outcome::new(Value::None)),
        Value::List(items) => {
            let permitted: Vec<Value> = items
                .iter()
                .filter(|item| item.is_none() || allowed(*item))
                .cloned()
                .collect();
            if permitted.len() == items.len() {
                return Ok(Outcome::new(Value::List(items)));
            }
            let err = denied(expr, &Value::List(items));
            match policy {
                DenyPolicy::Raise => Err(err),
                DenyPolicy::Record => Ok(Outcome::with_errors(Value::List(permitted), vec![err])),
            }
        }
        scalar => {
            if allowed(&scalar) {
                return Ok(Outcome::new(scalar));
            }
            let err = denied(expr, &scalar);
            match policy {
                DenyPolicy::Raise => Err(err),
                DenyPolicy::Record => Ok(Outcome::with_errors(Value::None, vec![err])),
            }
        }
    }
}

/// [`SegmentGate`] running [`enforce`] on each segment's value.
///
/// Under [`DenyPolicy::Record`] rejected values are dropped and the errors
/// are kept on the gate; under [`DenyPolicy::Raise`] the first rejection
/// stops resolution.
pub struct PermissionGate<'a> {
    predicate: Option<&'a PermissionCheck>,
    policy: DenyPolicy,
    errors: Vec<RenderError>,
}

impl<'a> PermissionGate<'a> {
    pub fn new(predicate: Option<&'a PermissionCheck>, policy: DenyPolicy) -> Self {
        Self {
            predicate,
            policy,
            errors: Vec::new(),
        }
    }

    pub fn into_errors(self) -> Vec<RenderError> {
        self.errors
    }
}

impl SegmentGate for PermissionGate<'_> {
    type Error = RenderError;

    fn admit(&mut self, expr: &str, value: Value) -> Result<Value, RenderError> {
        let outcome = enforce(value, expr, self.predicate, self.policy)?;
        self.errors.extend(outcome.errors);
        Ok(outcome.output)
    }
}

/// Resolves `text` with the predicate applied to every segment.
///
/// # Example
///
/// ```
/// use deckfill_expr::{Context, ResolveOptions, Value};
/// use deckfill_render::{resolve_permitted, DenyPolicy, ErrorKind};
///
/// let ctx = Context::from_iter([(
///     "boss",
///     Value::map([("__type", Value::from("Salary")), ("amount", Value::from(99))]),
/// )]);
/// let no_maps = |v: &Value| !matches!(v, Value::Map(_));
///
/// let err = resolve_permitted("boss.amount", &ctx, Some(&no_maps), DenyPolicy::Raise, &ResolveOptions::default())
///     .unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::PermissionDenied);
/// ```
pub fn resolve_permitted(
    text: &str,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    policy: DenyPolicy,
    options: &ResolveOptions,
) -> Result<Outcome<Resolved>, RenderError> {
    let mut gate = PermissionGate::new(predicate, policy);
    let resolved = resolve_gated(text, ctx, options, &mut gate)?;
    Ok(Outcome::with_errors(resolved, gate.into_errors()))
}

fn denied(expr: &str, value: &Value) -> RenderError {
    tracing::debug!(expr, "permission denied");
    RenderError::PermissionDenied {
        expr: expr.to_string(),
        value: value.to_string(),
    }
}
