//! Resolution context.
//!
//! A [`Context`] maps top-level names to values. It is immutable: loop
//! expansion and per-page variables are added with [`Context::with`], which
//! returns a new layer over the existing one instead of mutating it. Inner
//! layers shadow outer ones.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::traits::KeyedLookup;
use crate::value::Value;

/// Layered, immutable mapping from names to values.
///
/// # Example
///
/// ```
/// use deckfill_expr::{Context, Value};
///
/// let global = Context::from_iter([("title", Value::from("Q3"))]);
/// let page = global.with("page_number", 2);
///
/// assert_eq!(page.get("title"), Some(Value::from("Q3")));
/// assert_eq!(page.get("page_number"), Some(Value::from(2)));
/// assert_eq!(global.get("page_number"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: Rc<BTreeMap<String, Value>>,
    parent: Option<Rc<Context>>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a JSON object. Returns `None` for any other JSON value.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(map) => Some(Self::from_iter(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
            _ => None,
        }
    }

    /// Returns a new context with `name` bound to `value` on top of this one.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Context {
        self.layered([(name.into(), value.into())])
    }

    /// Returns a new context with all of `vars` bound on top of this one.
    pub fn layered<I, K, V>(&self, vars: I) -> Context
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Context {
            vars: Rc::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            parent: Some(Rc::new(self.clone())),
        }
    }

    /// Looks up a name, innermost layer first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut layer = Some(self);
        while let Some(ctx) = layer {
            if let Some(value) = ctx.vars.get(name) {
                return Some(value.clone());
            }
            layer = ctx.parent.as_deref();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All names visible from this context.
    pub fn names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut layer = Some(self);
        while let Some(ctx) = layer {
            names.extend(ctx.vars.keys().cloned());
            layer = ctx.parent.as_deref();
        }
        names
    }
}

impl KeyedLookup for Context {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key)
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context {
            vars: Rc::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            parent: None,
        }
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(vars: BTreeMap<String, Value>) -> Self {
        Context {
            vars: Rc::new(vars),
            parent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inner_layer_shadows_outer() {
        let outer = Context::from_iter([("user", "alice")]);
        let inner = outer.with("user", "bob");
        assert_eq!(inner.get("user"), Some(Value::from("bob")));
        assert_eq!(outer.get("user"), Some(Value::from("alice")));
    }

    #[test]
    fn names_span_all_layers() {
        let ctx = Context::from_iter([("a", 1)]).layered([("b", 2), ("c", 3)]);
        assert_eq!(
            ctx.names().into_iter().collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
    }

    #[test]
    fn from_json_requires_object() {
        assert!(Context::from_json(json!([1, 2])).is_none());
        let ctx = Context::from_json(json!({"n": 3, "nested": {"k": "v"}})).unwrap();
        assert_eq!(ctx.get("n"), Some(Value::from(3)));
        assert!(ctx.contains("nested"));
    }

    #[test]
    fn explicit_none_is_present() {
        let ctx = Context::from_iter([("empty", Value::None)]);
        assert_eq!(ctx.lookup("empty"), Some(Value::None));
        assert_eq!(ctx.lookup("absent"), None);
    }
}
