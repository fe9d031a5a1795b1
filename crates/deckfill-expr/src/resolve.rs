//! Segment-by-segment expression resolution.
//!
//! Resolution walks the segments of an [`Expression`] left to right. Each
//! segment is applied to the current value:
//!
//! 1. If the current value is a list, the segment is applied to every
//!    element and the results are flattened one level (broadcasting).
//! 2. Otherwise the segment's name is looked up through the value's
//!    [`KeyedLookup`] capability, following `__` sub-keys.
//! 3. Callables are invoked: with the segment's arguments if it has any,
//!    with none otherwise.
//! 4. A `[...]` filter keeps the elements matching every condition.
//!
//! A current value of `None` short-circuits: the remaining segments are
//! skipped and the expression resolves to `None`.
//!
//! A [`SegmentGate`] sees the value produced by every segment before the
//! next segment is applied, so a value it rejects is never read through.

use chrono::NaiveDateTime;

use crate::clause::matches_all;
use crate::context::Context;
use crate::error::{CallError, ExprError, Result};
use crate::parser::{Expression, Segment};
use crate::traits::KeyedLookup;
use crate::value::Value;

/// Reserved first segment that resolves to the current date and time.
pub const NOW: &str = "now";

/// Default limit on list nesting during broadcasting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Options controlling resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Deepest list nesting broadcasting will descend into.
    pub max_depth: usize,
    /// Fixed value for `now`. The local clock is read when unset.
    pub now: Option<NaiveDateTime>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            now: None,
        }
    }
}

impl ResolveOptions {
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The value `now` resolves to.
    pub fn current_time(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}

/// The result of resolving an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Source text of the resolved expression.
    pub expression: String,
    /// Resolved value. Any list is flat.
    pub value: Value,
}

impl Resolved {
    pub fn is_list(&self) -> bool {
        self.value.is_list()
    }

    /// The value as a list of items; a scalar becomes a single item and `None` no items.
    pub fn items(&self) -> Vec<Value> {
        match &self.value {
            Value::List(items) => items.clone(),
            Value::None => Vec::new(),
            other => vec![other.clone()],
        }
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Inspects the value produced by each segment of an expression.
///
/// `admit` runs after every segment, the last one included. It may pass
/// the value on, replace it (a `None` short-circuits the rest of the
/// expression), or stop resolution with an error.
pub trait SegmentGate {
    type Error: From<ExprError>;

    fn admit(&mut self, expr: &str, value: Value) -> std::result::Result<Value, Self::Error>;
}

/// A gate that admits every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ungated;

impl SegmentGate for Ungated {
    type Error = ExprError;

    fn admit(&mut self, _expr: &str, value: Value) -> Result<Value> {
        Ok(value)
    }
}

/// Parses and resolves `text` against `ctx`.
///
/// # Example
///
/// ```
/// use deckfill_expr::{resolve, Context, ResolveOptions, Value};
///
/// let ctx = Context::from_iter([(
///     "user",
///     Value::map([("name", Value::from("Alice"))]),
/// )]);
/// let resolved = resolve("user.name", &ctx, &ResolveOptions::default()).unwrap();
/// assert_eq!(resolved.value, Value::from("Alice"));
/// ```
pub fn resolve(text: &str, ctx: &Context, options: &ResolveOptions) -> Result<Resolved> {
    resolve_gated(text, ctx, options, &mut Ungated)
}

/// Parses and resolves `text`, passing every segment's value through `gate`.
///
/// The whole expression is parsed before the first lookup, so a malformed
/// expression never reaches the gate.
pub fn resolve_gated<G: SegmentGate>(
    text: &str,
    ctx: &Context,
    options: &ResolveOptions,
    gate: &mut G,
) -> std::result::Result<Resolved, G::Error> {
    let expr = Expression::parse(text)?;
    resolve_expression_gated(&expr, ctx, options, gate)
}

/// Resolves an already parsed expression.
pub fn resolve_expression(
    expr: &Expression,
    ctx: &Context,
    options: &ResolveOptions,
) -> Result<Resolved> {
    resolve_expression_gated(expr, ctx, options, &mut Ungated)
}

/// Resolves an already parsed expression through `gate`.
pub fn resolve_expression_gated<G: SegmentGate>(
    expr: &Expression,
    ctx: &Context,
    options: &ResolveOptions,
    gate: &mut G,
) -> std::result::Result<Resolved, G::Error> {
    let source = expr.as_str();
    let mut segments = expr.segments().iter();

    let mut current = match segments.next() {
        None => Value::None,
        Some(first) if first.raw == NOW => Value::DateTime(options.current_time()),
        Some(first) => apply_keyed(ctx, first, source)?,
    };
    current = gate.admit(source, current)?;

    for segment in segments {
        if current.is_none() {
            tracing::debug!(expr = source, segment = %segment, "short-circuit on none");
            break;
        }
        current = resolve_segment(&current, segment, source, options)?;
        current = gate.admit(source, current)?;
    }

    tracing::debug!(expr = source, kind = current.type_name(), "resolved expression");
    Ok(Resolved {
        expression: source.to_string(),
        value: current,
    })
}

/// Applies one segment to `current`, broadcasting over lists.
///
/// Nested lists are walked with an explicit stack; nesting deeper than
/// `options.max_depth` fails with [`ExprError::ExpansionLimit`].
pub fn resolve_segment(
    current: &Value,
    segment: &Segment,
    expr: &str,
    options: &ResolveOptions,
) -> Result<Value> {
    let Value::List(items) = current else {
        return apply_scalar(current, segment, expr);
    };

    let mut out = Vec::new();
    let mut stack: Vec<(&Value, usize)> = items.iter().rev().map(|v| (v, 1)).collect();

    while let Some((item, depth)) = stack.pop() {
        match item {
            Value::List(inner) => {
                if depth >= options.max_depth {
                    return Err(ExprError::ExpansionLimit {
                        expr: expr.to_string(),
                        depth: options.max_depth,
                    });
                }
                stack.extend(inner.iter().rev().map(|v| (v, depth + 1)));
            }
            scalar => match apply_scalar(scalar, segment, expr)? {
                Value::List(results) => out.extend(results),
                single => out.push(single),
            },
        }
    }

    Ok(Value::List(out))
}

fn apply_scalar(current: &Value, segment: &Segment, expr: &str) -> Result<Value> {
    if current.is_none() {
        return Ok(Value::None);
    }
    let keyed = current.as_keyed().ok_or_else(|| missing(segment, expr))?;
    apply_keyed(keyed, segment, expr)
}

fn apply_keyed(keyed: &dyn KeyedLookup, segment: &Segment, expr: &str) -> Result<Value> {
    let value = lookup_chain(keyed, segment, expr)?;
    let value = invoke(value, segment, expr)?;
    apply_filter(value, segment, expr)
}

fn lookup_chain(keyed: &dyn KeyedLookup, segment: &Segment, expr: &str) -> Result<Value> {
    let mut keys = segment.keys();
    let first = keys.next().unwrap_or_default();
    let mut value = keyed.lookup(first).ok_or_else(|| missing(segment, expr))?;

    for key in keys {
        if let Value::Callable(f) = &value {
            value = f.invoke(&[]).map_err(|e| not_callable(segment, expr, e))?;
        }
        if value.is_none() {
            return Ok(Value::None);
        }
        let next = value
            .as_keyed()
            .and_then(|k| k.lookup(key))
            .ok_or_else(|| missing(segment, expr))?;
        value = next;
    }

    Ok(value)
}

fn invoke(value: Value, segment: &Segment, expr: &str) -> Result<Value> {
    if let Value::Callable(f) = &value {
        let args = segment.call_args.as_deref().unwrap_or(&[]);
        return f.invoke(args).map_err(|e| not_callable(segment, expr, e));
    }
    if segment.call_args.is_some() {
        return Err(ExprError::NotCallable {
            name: segment.name.clone(),
            expr: expr.to_string(),
            reason: format!("{} is not callable", value.type_name()),
        });
    }
    Ok(value)
}

fn apply_filter(value: Value, segment: &Segment, expr: &str) -> Result<Value> {
    if let Value::Query(query) = &value {
        let query = match &segment.filter {
            Some(conditions) => query
                .filter(conditions)
                .map_err(|e| not_callable(segment, expr, e))?,
            None => query.clone(),
        };
        let items = query
            .materialize()
            .map_err(|e| not_callable(segment, expr, e))?;
        return Ok(Value::List(items));
    }

    let Some(conditions) = &segment.filter else {
        return Ok(value);
    };

    let items = match value {
        Value::List(items) => items,
        other => vec![other],
    };
    Ok(Value::List(
        items
            .into_iter()
            .filter(|item| matches_all(item, conditions))
            .collect(),
    ))
}

fn missing(segment: &Segment, expr: &str) -> ExprError {
    ExprError::MissingData {
        segment: segment.raw.clone(),
        expr: expr.to_string(),
    }
}

fn not_callable(segment: &Segment, expr: &str, err: CallError) -> ExprError {
    ExprError::NotCallable {
        name: segment.name.clone(),
        expr: expr.to_string(),
        reason: err.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn opts() -> ResolveOptions {
        ResolveOptions::default()
    }

    fn ctx() -> Context {
        let users = Value::list([
            Value::map([("name", Value::from("ann")), ("age", Value::from(31))]),
            Value::map([("name", Value::from("bob")), ("age", Value::from(25))]),
        ]);
        Context::from_iter([
            ("users", users),
            ("nothing", Value::None),
            ("title", Value::from("Report")),
            (
                "double",
                Value::function(|args: &[Value]| {
                    let n = args.first().and_then(Value::as_i64).unwrap_or(1);
                    Ok(Value::from(n * 2))
                }),
            ),
            (
                "broken",
                Value::function(|_: &[Value]| Err(CallError::new("boom"))),
            ),
        ])
    }

    fn value_of(text: &str) -> Value {
        resolve(text, &ctx(), &opts()).unwrap().value
    }

    fn kind_of(text: &str) -> ErrorKind {
        resolve(text, &ctx(), &opts()).unwrap_err().kind()
    }

    #[test]
    fn broadcasts_over_lists() {
        assert_eq!(value_of("users.name"), Value::list(["ann", "bob"]));
    }

    #[test]
    fn filter_then_broadcast() {
        assert_eq!(value_of("users[age=25].name"), Value::list(["bob"]));
    }

    #[test]
    fn filter_on_scalar_wraps_it() {
        assert_eq!(value_of("title[length=3]"), Value::list(Vec::<Value>::new()));
    }

    #[test]
    fn callables_auto_invoke() {
        assert_eq!(value_of("double"), Value::from(2));
        assert_eq!(value_of("double(21)"), Value::from(42));
    }

    #[test]
    fn args_on_non_callable_fail() {
        assert_eq!(kind_of("title(1)"), ErrorKind::NotCallable);
    }

    #[test]
    fn callable_errors_are_reported() {
        let err = resolve("broken", &ctx(), &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotCallable);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn missing_key_fails() {
        assert_eq!(kind_of("absent"), ErrorKind::MissingData);
        assert_eq!(kind_of("users.email"), ErrorKind::MissingData);
    }

    #[test]
    fn none_short_circuits() {
        assert_eq!(value_of("nothing.anything.at_all"), Value::None);
    }

    #[test]
    fn empty_expression_is_none() {
        assert_eq!(value_of(""), Value::None);
    }

    #[test]
    fn now_uses_fixed_clock() {
        let now = NaiveDate::from_ymd_opt(2025, 2, 18)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let options = opts().with_now(now);
        let resolved = resolve("now.year", &Context::new(), &options).unwrap();
        assert_eq!(resolved.value, Value::from(2025));
    }

    #[test]
    fn nesting_beyond_limit_fails() {
        let mut deep = Value::map([("x", Value::from(1))]);
        for _ in 0..5 {
            deep = Value::list([deep]);
        }
        let ctx = Context::from_iter([("deep", deep)]);
        let options = opts().with_max_depth(3);
        let err = resolve("deep.x", &ctx, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpansionLimit);

        let options = opts().with_max_depth(8);
        let ok = resolve("deep.x", &ctx, &options).unwrap();
        assert_eq!(ok.value, Value::list([1]));
    }

    /// Rejects maps carrying `secret`, recording what it was shown.
    #[derive(Default)]
    struct NoSecrets {
        seen: Vec<String>,
    }

    impl SegmentGate for NoSecrets {
        type Error = ExprError;

        fn admit(&mut self, expr: &str, value: Value) -> Result<Value> {
            self.seen.push(value.type_name().to_string());
            let secret = value
                .as_keyed()
                .is_some_and(|k| k.lookup("secret").is_some());
            if secret {
                return Err(ExprError::MissingData {
                    segment: "secret".into(),
                    expr: expr.to_string(),
                });
            }
            Ok(value)
        }
    }

    #[test]
    fn gate_sees_every_segment() {
        let vault_ctx = Context::from_iter([(
            "vault",
            Value::map([
                ("secret", Value::from(true)),
                ("inner", Value::map([("code", Value::from(7))])),
            ]),
        )]);

        let mut gate = NoSecrets::default();
        let err = resolve_gated("vault.inner.code", &vault_ctx, &opts(), &mut gate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingData);
        assert_eq!(gate.seen.len(), 1);

        let mut gate = NoSecrets::default();
        let resolved = resolve_gated("users.name", &ctx(), &opts(), &mut gate).unwrap();
        assert_eq!(resolved.value, Value::list(["ann", "bob"]));
        assert_eq!(gate.seen.len(), 2);
    }

    #[test]
    fn malformed_expressions_never_reach_the_gate() {
        let mut gate = NoSecrets::default();
        let err = resolve_gated("users.{x}", &ctx(), &opts(), &mut gate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadExpression);
        assert!(gate.seen.is_empty());
    }

    #[test]
    fn items_of_resolved() {
        let resolved = resolve("title", &ctx(), &opts()).unwrap();
        assert_eq!(resolved.items(), vec![Value::from("Report")]);
        assert!(!resolved.is_list());
    }
}
