//! Capability interfaces for context values.
//!
//! The resolver never inspects a value's concrete type. Instead, each
//! [`Value`] variant declares which of these capabilities it carries, and
//! the resolver dispatches on that:
//!
//! | Capability | Carried by |
//! |------------|------------|
//! | [`KeyedLookup`] | `Value::Map`, `Value::Object`, `Value::DateTime`, [`Context`](crate::Context) |
//! | [`Invocable`] | `Value::Callable` |
//! | [`LazyFilterable`] | `Value::Query` |
//! | [`DateFormattable`] | `Value::DateTime`, objects returning `Some` from [`Object::as_date`] |
//!
//! # Manual Implementation
//!
//! ```
//! use std::any::Any;
//! use deckfill_expr::{KeyedLookup, Object, Value};
//!
//! #[derive(Debug)]
//! struct User {
//!     name: String,
//!     active: bool,
//! }
//!
//! impl KeyedLookup for User {
//!     fn lookup(&self, key: &str) -> Option<Value> {
//!         match key {
//!             "name" => Some(Value::from(self.name.as_str())),
//!             "active" => Some(Value::from(self.active)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Object for User {
//!     fn type_name(&self) -> &str {
//!         "User"
//!     }
//!
//!     fn display(&self) -> String {
//!         self.name.clone()
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let user = Value::object(User { name: "Alice".into(), active: true });
//! assert_eq!(user.to_string(), "Alice");
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::rc::Rc;

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::clause::Condition;
use crate::error::{CallError, FormatError};
use crate::value::Value;

/// Named attribute or key access.
pub trait KeyedLookup {
    /// Returns the value stored under `key`, or `None` if there is no such key.
    ///
    /// A key that exists but holds nothing should return `Some(Value::None)`;
    /// the resolver treats the two cases differently.
    fn lookup(&self, key: &str) -> Option<Value>;
}

/// A value that can be called with literal arguments.
///
/// Any closure of the right shape is invocable:
///
/// ```
/// use deckfill_expr::{CallError, Invocable, Value};
///
/// let double = |args: &[Value]| -> Result<Value, CallError> {
///     let n = args.first().and_then(Value::as_i64).unwrap_or(0);
///     Ok(Value::from(n * 2))
/// };
/// assert_eq!(double.invoke(&[Value::from(21)]).unwrap(), Value::from(42));
/// ```
pub trait Invocable {
    fn invoke(&self, args: &[Value]) -> Result<Value, CallError>;
}

impl<F> Invocable for F
where
    F: Fn(&[Value]) -> Result<Value, CallError>,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, CallError> {
        self(args)
    }
}

/// A collection that can be narrowed before it is loaded.
///
/// This models query sets backed by a store: filtering is delegated to the
/// collection (which may push it down to the store), and
/// [`materialize`](LazyFilterable::materialize) loads the remaining items.
pub trait LazyFilterable: fmt::Debug {
    /// Returns a narrowed collection keeping items matching every condition.
    fn filter(&self, conditions: &[Condition]) -> Result<Rc<dyn LazyFilterable>, CallError>;

    /// Loads all items of the collection.
    fn materialize(&self) -> Result<Vec<Value>, CallError>;
}

/// A value that can render itself with a strftime-style pattern.
pub trait DateFormattable {
    fn format_date(&self, pattern: &str) -> Result<String, FormatError>;
}

/// A capability-bearing application object, such as a domain entity.
///
/// Objects always support keyed lookup. Authorization predicates can use
/// [`type_name`](Object::type_name) or downcast through
/// [`as_any`](Object::as_any) to decide which entity types are subject to
/// permission checks.
pub trait Object: KeyedLookup + fmt::Debug {
    /// Short type name, used in messages and by permission predicates.
    fn type_name(&self) -> &str;

    /// String form used when the object is written into a document.
    fn display(&self) -> String {
        format!("<{}>", self.type_name())
    }

    /// Date formatting capability, if the object has one.
    fn as_date(&self) -> Option<&dyn DateFormattable> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

impl KeyedLookup for BTreeMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl KeyedLookup for Rc<dyn Object> {
    fn lookup(&self, key: &str) -> Option<Value> {
        (**self).lookup(key)
    }
}

impl KeyedLookup for NaiveDateTime {
    fn lookup(&self, key: &str) -> Option<Value> {
        let value = match key {
            "year" => Value::from(self.year() as i64),
            "month" => Value::from(self.month() as i64),
            "day" => Value::from(self.day() as i64),
            "hour" => Value::from(self.hour() as i64),
            "minute" => Value::from(self.minute() as i64),
            "second" => Value::from(self.second() as i64),
            "weekday" => Value::from(self.format("%A").to_string()),
            "date" => Value::from(self.format("%Y-%m-%d").to_string()),
            _ => return None,
        };
        Some(value)
    }
}

impl DateFormattable for NaiveDateTime {
    fn format_date(&self, pattern: &str) -> Result<String, FormatError> {
        let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(FormatError(format!("invalid date pattern '{}'", pattern)));
        }

        // Writing (rather than `to_string`) turns an inapplicable specifier,
        // such as a timezone on a naive timestamp, into an error.
        let mut out = String::new();
        write!(out, "{}", self.format_with_items(items.into_iter())).map_err(|_| {
            FormatError(format!("pattern '{}' cannot be applied to {}", pattern, self))
        })?;
        Ok(out)
    }
}
