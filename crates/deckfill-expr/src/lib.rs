//! deckfill-expr - Placeholder expressions resolved against a context.
//!
//! An expression is a dotted path such as `program.users[is_active=True].email`.
//! Each segment names an attribute, optionally calls it with literal
//! arguments, and optionally filters the result with equality conditions.
//! Resolution supports:
//!
//! - Attribute and key lookup through [`KeyedLookup`], including `__` sub-keys
//! - Callables, invoked automatically or with explicit arguments
//! - Filters with AND semantics over lists and lazy collections
//! - Broadcasting: a segment applied to a list applies to every element
//! - The reserved `now` root, read from the clock or fixed in [`ResolveOptions`]
//!
//! # Quick Start
//!
//! ```rust
//! use deckfill_expr::{resolve, Context, ResolveOptions, Value};
//!
//! let users = Value::list([
//!     Value::map([("email", Value::from("a@example.com")), ("is_active", Value::from(true))]),
//!     Value::map([("email", Value::from("b@example.com")), ("is_active", Value::from(false))]),
//! ]);
//! let ctx = Context::from_iter([("program", Value::map([("users", users)]))]);
//!
//! let resolved = resolve(
//!     "program.users[is_active=True].email",
//!     &ctx,
//!     &ResolveOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(resolved.value, Value::list(["a@example.com"]));
//! ```
//!
//! # Literals
//!
//! Call arguments and condition values are parsed the same way, trying in
//! order:
//!
//! | Text | Value |
//! |------|-------|
//! | `true`, `False` | boolean (case-insensitive) |
//! | `42`, `-7` | integer |
//! | `2.5` | float |
//! | `'x'`, `"x"` | string without quotes |
//! | anything else | raw string |
//!
//! # Errors
//!
//! Every failure is an [`ExprError`]. Parsing validates the whole expression
//! first, so a malformed expression never performs a partial lookup.

mod clause;
mod context;
mod error;
mod literal;
mod parser;
mod resolve;
mod traits;
mod value;

// Re-export public API
pub use clause::{matches_all, parse_conditions, Condition};
pub use context::Context;
pub use error::{CallError, ErrorKind, ExprError, FormatError, Result};
pub use literal::{parse_args, parse_literal};
pub use parser::{split_expression, Expression, Segment};
pub use resolve::{
    resolve, resolve_expression, resolve_expression_gated, resolve_gated, resolve_segment,
    Resolved, ResolveOptions, SegmentGate, Ungated, DEFAULT_MAX_DEPTH, NOW,
};
pub use traits::{DateFormattable, Invocable, KeyedLookup, LazyFilterable, Object};
pub use value::{Number, Value};
